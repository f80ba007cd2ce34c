// Record Model
// Opaque string-keyed CRM records and the object kinds the migration moves

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::constants::{EMAIL_FIELD, ID_FIELD, NAME_FIELD};

/// Read-only access to a named field of some record shape
pub trait FieldSource {
    /// Value stored under `name`, if any
    fn field(&self, name: &str) -> Option<&str>;
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// CRM object types handled by the migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Lead,
    Account,
}

impl ObjectKind {
    /// Id prefix used by generated identifiers
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ObjectKind::Lead => "00Q",
            ObjectKind::Account => "001",
        }
    }

    /// Directory holding records of this kind in a directory store
    pub fn dir_name(&self) -> &'static str {
        match self {
            ObjectKind::Lead => "leads",
            ObjectKind::Account => "accounts",
        }
    }

    /// Business key used to match records of this kind across organizations
    pub fn match_field(&self) -> &'static str {
        match self {
            ObjectKind::Lead => EMAIL_FIELD,
            ObjectKind::Account => NAME_FIELD,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Lead => f.write_str("Lead"),
            ObjectKind::Account => f.write_str("Account"),
        }
    }
}

/// A CRM record: field name to string value
///
/// Field names are case-sensitive. Typed values belong to the mapping layer;
/// here everything is text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD)
    }

    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL_FIELD)
    }

    /// Copy of this record with the listed fields dropped
    pub fn without_fields<S: AsRef<str>>(&self, fields: &[S]) -> Record {
        let mut copy = self.clone();
        for field in fields {
            copy.remove(field.as_ref());
        }
        copy
    }

    /// Overlay `other`'s fields on top of this record
    pub fn merge(&mut self, other: Record) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short label for logs: the Id, else the email, else a placeholder
    pub fn label(&self) -> &str {
        self.id().or_else(|| self.email()).unwrap_or("<unidentified>")
    }
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for Record {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for Record {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

/// Scalar as it may appear in a hand-written YAML record
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl ScalarValue {
    fn into_text(self) -> Option<String> {
        match self {
            ScalarValue::Text(s) => Some(s),
            ScalarValue::Integer(n) => Some(n.to_string()),
            ScalarValue::Float(n) => Some(n.to_string()),
            ScalarValue::Bool(b) => Some(b.to_string()),
            ScalarValue::Null => None,
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, ScalarValue>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(field, value)| value.into_text().map(|text| (field, text)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_scalars_become_text() {
        let yaml = "Name: ACME\nNumberOfEmployees: 9000\nActive: true\nFax: ~\n";
        let record: Record = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(record.get("Name"), Some("ACME"));
        assert_eq!(record.get("NumberOfEmployees"), Some("9000"));
        assert_eq!(record.get("Active"), Some("true"));
        assert!(!record.contains("Fax"));
    }

    #[test]
    fn test_without_fields_leaves_original_untouched() {
        let record = Record::new()
            .with("Id", "00Q1")
            .with("Email", "a@fakemail.com")
            .with("LastModifiedDate", "2013-12-09T22:15:33.001Z");

        let mapped = record.without_fields(&["Id", "LastModifiedDate"]);

        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped.email(), Some("a@fakemail.com"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_label_prefers_id() {
        let record = Record::new().with("Email", "a@fakemail.com");
        assert_eq!(record.label(), "a@fakemail.com");
        assert_eq!(record.with("Id", "00Q1").label(), "00Q1");
        assert_eq!(Record::new().label(), "<unidentified>");
    }

    #[test]
    fn test_field_source_for_plain_maps() {
        let mut map = HashMap::new();
        map.insert("LastModifiedDate".to_string(), "x".to_string());
        assert_eq!(map.field("LastModifiedDate"), Some("x"));
        assert_eq!(map.field("lastmodifieddate"), None);
    }
}
