use std::{fmt, str::FromStr};

use serde::{
    de::{Error, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{ActorId, Conflict, DataType, ElementValue, ObjectId, PrimitiveValue};

impl Serialize for Conflict {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map_serializer = serializer.serialize_map(None)?;
        map_serializer.serialize_entry("actor", &self.actor)?;
        if let Some(datatype) = &self.datatype {
            map_serializer.serialize_entry("datatype", datatype)?;
        }
        match &self.value {
            ElementValue::Primitive(v) => map_serializer.serialize_entry("value", &v)?,
            ElementValue::Link(oid) => {
                map_serializer.serialize_entry("value", &oid)?;
                map_serializer.serialize_entry("link", &true)?;
            }
        };
        map_serializer.end()
    }
}

impl<'de> Deserialize<'de> for Conflict {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const FIELDS: &[&str] = &["actor", "value", "datatype", "link"];
        struct ConflictVisitor;
        impl<'de> Visitor<'de> for ConflictVisitor {
            type Value = Conflict;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a conflict object")
            }

            fn visit_map<V>(self, mut map: V) -> Result<Conflict, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut actor: Option<ActorId> = None;
                let mut value_raw: Option<PrimitiveValue> = None;
                let mut datatype: Option<DataType> = None;
                let mut link: Option<bool> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_ref() {
                        "actor" => {
                            if actor.is_some() {
                                return Err(Error::duplicate_field("actor"));
                            }
                            actor = Some(map.next_value()?);
                        }
                        "datatype" => {
                            if datatype.is_some() {
                                return Err(Error::duplicate_field("datatype"));
                            }
                            datatype = Some(map.next_value()?);
                        }
                        "value" => {
                            if value_raw.is_some() {
                                return Err(Error::duplicate_field("value"));
                            }
                            value_raw = Some(map.next_value()?);
                        }
                        "link" => {
                            if link.is_some() {
                                return Err(Error::duplicate_field("link"));
                            }
                            link = Some(map.next_value()?);
                        }
                        _ => return Err(Error::unknown_field(&key, FIELDS)),
                    }
                }

                let actor = actor.ok_or_else(|| Error::missing_field("actor"))?;
                let value_raw = value_raw.ok_or_else(|| Error::missing_field("value"))?;
                let value = match (link.unwrap_or(false), value_raw) {
                    (true, PrimitiveValue::Str(s)) => {
                        let oid = ObjectId::from_str(&s)
                            .map_err(|_| Error::custom("invalid object id in conflict link"))?;
                        ElementValue::Link(oid)
                    }
                    (false, v) => ElementValue::Primitive(v),
                    _ => {
                        return Err(Error::custom(
                            "received a conflict with `link` set to true but no object id in `value`",
                        ))
                    }
                };
                Ok(Conflict {
                    actor,
                    value,
                    datatype,
                })
            }
        }
        deserializer.deserialize_struct("Conflict", FIELDS, ConflictVisitor)
    }
}
