use std::fmt;

use smol_str::SmolStr;

use crate::{ElementId, Key};

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(SmolStr::new(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(SmolStr::new(s))
    }
}

impl From<&ElementId> for Key {
    fn from(elem: &ElementId) -> Self {
        Key(SmolStr::new(elem.to_string()))
    }
}

impl From<ElementId> for Key {
    fn from(elem: ElementId) -> Self {
        Key::from(&elem)
    }
}
