use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One property bag: property name to tagged value.
///
/// A bag is owned exclusively by the store that mirrors it; it is
/// never handed out by reference across domains.
pub type PropertyBag = BTreeMap<String, PropValue>;

/// A remote property value.
///
/// Mirrors the variant set the remote object protocol actually uses;
/// equality is structural and drives all change detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    StrList(Vec<String>),
    Bag(PropertyBag),
    BagList(Vec<PropertyBag>),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Self::StrList(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_bag(&self) -> Option<&PropertyBag> {
        match self {
            Self::Bag(bag) => Some(bag),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Convenience for building bags in construction paths and tests.
pub fn bag_from<const N: usize>(entries: [(&str, PropValue); N]) -> PropertyBag {
    entries.into_iter().map(|(key, value)| (key.to_string(), value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        let left = bag_from([("State", "active".into()), ("Multiparty", false.into())]);
        let right = bag_from([("Multiparty", false.into()), ("State", "active".into())]);
        assert_eq!(left, right);
        assert_ne!(
            PropValue::Bag(left),
            PropValue::Bag(bag_from([("State", "held".into())]))
        );
    }

    #[test]
    fn typed_accessors_reject_other_variants() {
        let value = PropValue::Str("dialing".to_string());
        assert_eq!(value.as_str(), Some("dialing"));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_int(), None);
    }
}
