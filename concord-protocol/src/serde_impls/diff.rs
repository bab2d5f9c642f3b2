use std::{fmt, str::FromStr};

use serde::{
    de::{Error, MapAccess, Unexpected, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    Conflict, DataType, Diff, DiffAction, ElementId, ElementValue, Key, MapType, ObjectId,
    PrimitiveValue, SequenceType,
};

fn serialize_element_value<S>(
    map_serializer: &mut S,
    value: &ElementValue,
) -> Result<(), S::Error>
where
    S: SerializeMap,
{
    match value {
        ElementValue::Primitive(v) => map_serializer.serialize_entry("value", v),
        ElementValue::Link(oid) => {
            map_serializer.serialize_entry("link", &true)?;
            map_serializer.serialize_entry("value", oid)
        }
    }
}

impl Serialize for Diff {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map_serializer = serializer.serialize_map(None)?;
        if !self.conflicts.is_empty() {
            map_serializer.serialize_entry("conflicts", &self.conflicts)?;
        }
        match &self.action {
            DiffAction::CreateMap(oid, map_type) => {
                map_serializer.serialize_entry("action", "create")?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("type", &map_type)?;
            }
            DiffAction::CreateList(oid, seq_type) => {
                map_serializer.serialize_entry("action", "create")?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("type", &seq_type)?;
            }
            DiffAction::MaxElem(oid, max, seq_type) => {
                map_serializer.serialize_entry("action", "maxElem")?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("value", &max)?;
                map_serializer.serialize_entry("type", &seq_type)?;
            }
            DiffAction::RemoveMapKey(oid, map_type, key) => {
                map_serializer.serialize_entry("action", "remove")?;
                map_serializer.serialize_entry("type", &map_type)?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("key", &key)?;
            }
            DiffAction::SetMapKey(oid, map_type, key, value, datatype) => {
                map_serializer.serialize_entry("action", "set")?;
                map_serializer.serialize_entry("type", &map_type)?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("key", &key)?;
                if let Some(datatype) = datatype {
                    map_serializer.serialize_entry("datatype", datatype)?;
                }
                serialize_element_value(&mut map_serializer, value)?;
            }
            DiffAction::RemoveSequenceElement(oid, seq_type, index) => {
                map_serializer.serialize_entry("action", "remove")?;
                map_serializer.serialize_entry("type", &seq_type)?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("index", &index)?;
            }
            DiffAction::InsertSequenceElement(oid, seq_type, index, value, datatype, element_id) => {
                map_serializer.serialize_entry("action", "insert")?;
                map_serializer.serialize_entry("type", &seq_type)?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("index", &index)?;
                map_serializer.serialize_entry("elemId", &element_id)?;
                serialize_element_value(&mut map_serializer, value)?;
                if let Some(datatype) = datatype {
                    map_serializer.serialize_entry("datatype", datatype)?;
                }
            }
            DiffAction::SetSequenceElement(oid, seq_type, index, value, datatype) => {
                map_serializer.serialize_entry("action", "set")?;
                map_serializer.serialize_entry("type", &seq_type)?;
                map_serializer.serialize_entry("obj", &oid)?;
                map_serializer.serialize_entry("index", &index)?;
                serialize_element_value(&mut map_serializer, value)?;
                if let Some(datatype) = datatype {
                    map_serializer.serialize_entry("datatype", datatype)?;
                }
            }
        }
        map_serializer.end()
    }
}

fn map_type_from_str<E>(s: &str) -> Result<MapType, E>
where
    E: Error,
{
    match s {
        "map" => Ok(MapType::Map),
        "table" => Ok(MapType::Table),
        _ => Err(Error::invalid_value(Unexpected::Str(s), &"a valid map type")),
    }
}

fn seq_type_from_str<E>(s: &str) -> Result<SequenceType, E>
where
    E: Error,
{
    match s {
        "list" => Ok(SequenceType::List),
        "text" => Ok(SequenceType::Text),
        _ => Err(Error::invalid_value(
            Unexpected::Str(s),
            &"a valid sequence type",
        )),
    }
}

impl<'de> Deserialize<'de> for Diff {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const FIELDS: &[&str] = &[
            "action",
            "obj",
            "type",
            "key",
            "index",
            "value",
            "elemId",
            "conflicts",
            "datatype",
            "link",
        ];
        struct DiffVisitor;
        impl<'de> Visitor<'de> for DiffVisitor {
            type Value = Diff;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a diff object")
            }

            fn visit_map<V>(self, mut map: V) -> Result<Diff, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut object_id: Option<ObjectId> = None;
                let mut type_str: Option<String> = None;
                let mut action: Option<String> = None;
                let mut key: Option<Key> = None;
                let mut value: Option<PrimitiveValue> = None;
                let mut datatype: Option<DataType> = None;
                let mut conflicts: Option<Vec<Conflict>> = None;
                let mut index: Option<usize> = None;
                let mut is_link: Option<bool> = None;
                let mut elem_id: Option<ElementId> = None;

                while let Some(map_key) = map.next_key::<String>()? {
                    match map_key.as_ref() {
                        "action" => {
                            if action.is_some() {
                                return Err(Error::duplicate_field("action"));
                            }
                            action = Some(map.next_value()?);
                        }
                        "obj" => {
                            if object_id.is_some() {
                                return Err(Error::duplicate_field("obj"));
                            }
                            object_id = Some(map.next_value()?);
                        }
                        "type" => {
                            if type_str.is_some() {
                                return Err(Error::duplicate_field("type"));
                            }
                            type_str = Some(map.next_value()?);
                        }
                        "key" => {
                            if key.is_some() {
                                return Err(Error::duplicate_field("key"));
                            }
                            key = Some(map.next_value()?);
                        }
                        "index" => {
                            if index.is_some() {
                                return Err(Error::duplicate_field("index"));
                            }
                            index = Some(map.next_value()?);
                        }
                        "value" => {
                            if value.is_some() {
                                return Err(Error::duplicate_field("value"));
                            }
                            value = Some(map.next_value()?);
                        }
                        "elemId" => {
                            if elem_id.is_some() {
                                return Err(Error::duplicate_field("elemId"));
                            }
                            elem_id = Some(map.next_value()?);
                        }
                        "conflicts" => {
                            if conflicts.is_some() {
                                return Err(Error::duplicate_field("conflicts"));
                            }
                            conflicts = Some(map.next_value()?);
                        }
                        "datatype" => {
                            if datatype.is_some() {
                                return Err(Error::duplicate_field("datatype"));
                            }
                            datatype = Some(map.next_value()?);
                        }
                        "link" => {
                            if is_link.is_some() {
                                return Err(Error::duplicate_field("link"));
                            }
                            is_link = Some(map.next_value()?);
                        }
                        _ => return Err(Error::unknown_field(&map_key, FIELDS)),
                    }
                }

                let value = match (is_link.unwrap_or(false), value) {
                    (true, Some(PrimitiveValue::Str(s))) => {
                        let oid = ObjectId::from_str(&s)
                            .map_err(|_| Error::custom("invalid object id in diff link"))?;
                        Some(ElementValue::Link(oid))
                    }
                    (false, Some(v)) => Some(ElementValue::Primitive(v)),
                    (_, None) => None,
                    _ => {
                        return Err(Error::custom(
                            "received a diff with `link` set to true but no object id in `value`",
                        ))
                    }
                };

                let action_str = action.ok_or_else(|| Error::missing_field("action"))?;
                let obj_id = object_id.ok_or_else(|| Error::missing_field("obj"))?;
                let type_str = type_str.ok_or_else(|| Error::missing_field("type"))?;
                let diff_action = match action_str.as_ref() {
                    "create" => match type_str.as_ref() {
                        "map" => DiffAction::CreateMap(obj_id, MapType::Map),
                        "table" => DiffAction::CreateMap(obj_id, MapType::Table),
                        "list" => DiffAction::CreateList(obj_id, SequenceType::List),
                        "text" => DiffAction::CreateList(obj_id, SequenceType::Text),
                        _ => {
                            return Err(Error::invalid_value(
                                Unexpected::Str(&type_str),
                                &"a valid object type",
                            ))
                        }
                    },
                    "maxElem" => {
                        let seq_type = seq_type_from_str(&type_str)?;
                        let max = match value {
                            Some(ElementValue::Primitive(PrimitiveValue::Int(n))) if n >= 0 => {
                                n as u64
                            }
                            _ => return Err(Error::custom("invalid value for maxElem")),
                        };
                        DiffAction::MaxElem(obj_id, max, seq_type)
                    }
                    "remove" => match key {
                        Some(key) => {
                            DiffAction::RemoveMapKey(obj_id, map_type_from_str(&type_str)?, key)
                        }
                        None => {
                            let index = index.ok_or_else(|| Error::missing_field("index"))?;
                            DiffAction::RemoveSequenceElement(
                                obj_id,
                                seq_type_from_str(&type_str)?,
                                index,
                            )
                        }
                    },
                    "set" => {
                        let value = value.ok_or_else(|| Error::missing_field("value"))?;
                        match key {
                            Some(key) => DiffAction::SetMapKey(
                                obj_id,
                                map_type_from_str(&type_str)?,
                                key,
                                value,
                                datatype,
                            ),
                            None => {
                                let index = index.ok_or_else(|| Error::missing_field("index"))?;
                                DiffAction::SetSequenceElement(
                                    obj_id,
                                    seq_type_from_str(&type_str)?,
                                    index,
                                    value,
                                    datatype,
                                )
                            }
                        }
                    }
                    "insert" => {
                        let seq_type = seq_type_from_str(&type_str)?;
                        let index = index.ok_or_else(|| Error::missing_field("index"))?;
                        let elem_id = elem_id.ok_or_else(|| Error::missing_field("elemId"))?;
                        let value = value.ok_or_else(|| Error::missing_field("value"))?;
                        DiffAction::InsertSequenceElement(
                            obj_id, seq_type, index, value, datatype, elem_id,
                        )
                    }
                    _ => {
                        return Err(Error::invalid_value(
                            Unexpected::Str(&action_str),
                            &"a valid diff action",
                        ))
                    }
                };
                Ok(Diff {
                    action: diff_action,
                    conflicts: conflicts.unwrap_or_default(),
                })
            }
        }
        deserializer.deserialize_struct("Diff", FIELDS, DiffVisitor)
    }
}
