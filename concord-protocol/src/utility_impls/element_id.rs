use std::{
    cmp::{Ordering, PartialOrd},
    convert::TryFrom,
    fmt,
    str::FromStr,
};

use crate::{error::InvalidElementId, ActorId, ElementId, HEAD_STR};

impl PartialOrd for ElementId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ElementId::Head, ElementId::Head) => Ordering::Equal,
            (ElementId::Head, _) => Ordering::Less,
            (_, ElementId::Head) => Ordering::Greater,
            (ElementId::Id(actor, counter), ElementId::Id(other_actor, other_counter)) => counter
                .cmp(other_counter)
                .then_with(|| actor.cmp(other_actor)),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Head => write!(f, "{}", HEAD_STR),
            ElementId::Id(actor, counter) => write!(f, "{}:{}", actor, counter),
        }
    }
}

impl FromStr for ElementId {
    type Err = InvalidElementId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == HEAD_STR {
            return Ok(ElementId::Head);
        }
        // the actor id never contains a colon, so the last one separates
        // actor from counter
        let (actor, counter) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidElementId(s.to_string()))?;
        let counter = counter
            .parse::<u64>()
            .map_err(|_| InvalidElementId(s.to_string()))?;
        if actor.is_empty() {
            return Err(InvalidElementId(s.to_string()));
        }
        Ok(ElementId::Id(ActorId(actor.to_string()), counter))
    }
}

impl TryFrom<&str> for ElementId {
    type Error = InvalidElementId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ElementId::from_str(value)
    }
}
