use std::{convert::TryFrom, fmt, str::FromStr};

use crate::{error::InvalidObjectId, ObjectId, ROOT_STR};

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Root => write!(f, "{}", ROOT_STR),
            ObjectId::Id(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ROOT_STR {
            Ok(ObjectId::Root)
        } else {
            uuid::Uuid::parse_str(s)
                .map(|_| ObjectId::Id(s.to_string()))
                .map_err(|_| InvalidObjectId(s.to_string()))
        }
    }
}

impl TryFrom<&str> for ObjectId {
    type Error = InvalidObjectId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ObjectId::from_str(value)
    }
}
