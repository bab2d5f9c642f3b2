use smol_str::SmolStr;

use crate::PrimitiveValue;

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        PrimitiveValue::Str(SmolStr::new(s))
    }
}

impl From<SmolStr> for PrimitiveValue {
    fn from(s: SmolStr) -> Self {
        PrimitiveValue::Str(s)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(n: i64) -> Self {
        PrimitiveValue::Int(n)
    }
}

impl From<f64> for PrimitiveValue {
    fn from(n: f64) -> Self {
        PrimitiveValue::F64(n)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(b: bool) -> Self {
        PrimitiveValue::Boolean(b)
    }
}
