use std::sync::Arc;
use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

pub type Dict<K = Arc<str>, V = Value> = BTreeMap<K, V>;

/// Represents any value that can be bound for templates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    /// Pre-rendered markup that must not be escaped again.
    #[serde(skip_deserializing)]
    Html(Arc<str>),
    Array(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
}

impl Value {
    /// Wraps already rendered markup.
    pub fn html<S: Into<Arc<str>>>(markup: S) -> Value {
        Value::Html(markup.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Html(s) => Some(&**s),
            _ => None
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(v) => Some(&**v),
            _ => None
        }
    }

    pub fn into_dict(self) -> Result<Arc<Dict>, Value> {
        match self {
            Value::Dict(v) => Ok(v),
            _ => Err(self)
        }
    }

    /// Follows a dotted `path` through nested dictionaries.
    pub fn find(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |value, key| value.as_dict()?.get(key))
    }
}

macro_rules! impl_from_primitive {
    ($($T:ty),+ => $E:ident::$kind:ident) => {
        $(
            impl From<$T> for $E {
                fn from(value: $T) -> Self {
                    $E::$kind(value.into())
                }
            }
        )+
    };
}

impl_from_primitive!(bool => Value::Bool);
impl_from_primitive!(&str => Value::String);
impl_from_primitive!(String => Value::String);
impl_from_primitive!(Arc<str> => Value::String);
impl_from_primitive!(Arc<Vec<Value>> => Value::Array);
impl_from_primitive!(Arc<Dict> => Value::Dict);
impl_from_primitive!(u8, u16, u32, i8, i16, i32, i64 => Value::Int);
impl_from_primitive!(f32, f64 => Value::Float);

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map(Value::Int).unwrap_or(Value::Float(value as f64))
    }
}

impl From<()> for Value  {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T> From<Option<T>> for Value where Value: From<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl<T> From<Vec<T>> for Value where Value: From<T> {
    fn from(value: Vec<T>) -> Self {
        value.into_iter()
            .map(Value::from)
            .collect()
    }
}

impl<K, V> From<Dict<K, V>> for Value where Arc<str>: From<K>, Value: From<V> {
    fn from(value: Dict<K, V>) -> Self {
        let dict = value.into_iter()
            .map(|(k, v)| (<Arc::<str>>::from(k), Value::from(v)))
            .collect::<Dict>();

        Value::Dict(Arc::new(dict))
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let vec = iter.into_iter().collect::<Vec<Value>>();
        Value::Array(Arc::new(vec))
    }
}

impl TryFrom<Value> for Arc<str> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) | Value::Html(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl TryFrom<Value> for Arc<Dict> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.into_dict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;

    #[test]
    fn find_walks_nested_dicts() {
        let inner = dict! { "name" => "Plume" };
        let value = Value::from(dict! { "site" => Value::from(inner) });

        assert_eq!(value.find("site.name").and_then(Value::as_str), Some("Plume"));
        assert!(value.find("site.missing").is_none());
        assert!(value.find("site.name.deeper").is_none());
    }

    #[test]
    fn html_serializes_as_plain_string() {
        let json = serde_json::to_string(&Value::html("<p>hi</p>")).unwrap();
        assert_eq!(json, r#""<p>hi</p>""#);
    }

    #[test]
    fn toml_tables_deserialize_into_dicts() {
        let value: Value = toml::from_str("a = 1\nb = [\"x\", true]\n[c]\nd = 2.5").unwrap();
        assert_eq!(value.find("a"), Some(&Value::Int(1)));
        assert_eq!(value.find("c.d"), Some(&Value::Float(2.5)));
        assert_eq!(value.find("b").and_then(Value::as_slice).map(|s| s.len()), Some(2));
    }
}
