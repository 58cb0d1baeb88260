//! Attribute values bound into template instances

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A value that can be bound to a template attribute
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truth value used by `if(...)`
    ///
    /// Null is false, booleans are themselves, empty lists and maps are
    /// false. Everything else, including the empty string, is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            _ => true,
        }
    }

    /// Property lookup for `<value.key>`
    pub fn property(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Iterate the value as a sequence: lists yield their items, maps their
    /// keys, null nothing, and scalars themselves
    pub fn iter(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        match self {
            Value::Null => Box::new(std::iter::empty()),
            Value::List(items) => Box::new(items.iter().cloned()),
            Value::Map(entries) => Box::new(entries.keys().map(|k| Value::Str(k.clone()))),
            other => Box::new(std::iter::once(other.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => {
                for item in self.iter() {
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(n as i64)
            }
        })*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::List(items.iter().cloned().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(entries: BTreeMap<String, V>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(entries: HashMap<String, V>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from(vec!["a"]).is_truthy());
        assert!(!Value::Map(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("text").to_string(), "text");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "ab");
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(7)), Value::Int(7));
    }

    #[test]
    fn test_map_property_and_keys() {
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), 2);
        entries.insert("a".to_string(), 1);
        let value = Value::from(entries);
        assert_eq!(value.property("a"), Some(&Value::Int(1)));
        assert_eq!(value.property("z"), None);
        assert_eq!(value.to_string(), "ab");
    }

    #[test]
    fn test_collect() {
        let value: Value = ["id", "name"].into_iter().collect();
        assert_eq!(value, Value::from(vec!["id", "name"]));
    }
}
