//! Label Model
//!
//! Label records, label manifests and the equality rules the diff engine relies on

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Label
///
/// A fully-populated label as it exists (or should exist) in a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    /// Label name, unique within a repository
    pub name: String,

    /// Label description (empty when absent)
    #[serde(default)]
    pub description: String,

    /// Label color, compared byte-for-byte
    pub color: String,

    /// Whether this is a platform-provided default label
    #[serde(default)]
    pub default: bool,
}

impl Label {
    /// Create a label with an empty description
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            color: color.into(),
            default: false,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validate the label
    ///
    /// # Errors
    /// - If the name is empty
    /// - If the color is empty or contains whitespace
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::label_validation("Label name cannot be empty"));
        }

        if self.color.is_empty() || self.color.chars().any(char::is_whitespace) {
            return Err(Error::InvalidLabelColor(format!(
                "{:?} (label {:?})",
                self.color, self.name
            )));
        }

        Ok(())
    }
}

impl From<octocrab::models::Label> for Label {
    fn from(label: octocrab::models::Label) -> Self {
        Label {
            name: label.name,
            description: label.description.unwrap_or_default(),
            color: label.color,
            default: label.default,
        }
    }
}

/// Structural equality over name, description, color and default flag
pub fn equals(a: &Label, b: &Label) -> bool {
    a == b
}

/// Whether both labels configure the same label (names match)
pub fn same_definition(a: &Label, b: &Label) -> bool {
    a.name == b.name
}

/// Label definition as authored in a manifest
///
/// Either a bare color string or an object with a color and an optional description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelDefinition {
    Color(String),
    Detailed {
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl LabelDefinition {
    /// Expand the definition into a label called `name`
    pub fn hydrate(&self, name: &str) -> Label {
        match self {
            LabelDefinition::Color(color) => Label::new(name, color.as_str()),
            LabelDefinition::Detailed { color, description } => Label {
                name: name.to_string(),
                description: description.clone().unwrap_or_default(),
                color: color.clone(),
                default: false,
            },
        }
    }
}

/// Label Manifest
///
/// The desired label set of one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelManifest {
    /// Remove labels that are not part of the manifest
    #[serde(default)]
    pub strict: bool,

    /// Labels keyed by name, in authored order
    #[serde(default)]
    pub labels: OrderedMap<LabelDefinition>,
}

impl LabelManifest {
    /// Expand the manifest into labels, see [`hydrate`]
    pub fn hydrate(&self) -> Vec<Label> {
        hydrate(self)
    }
}

/// Expand a manifest into fully-populated labels
///
/// Missing descriptions become empty and `default` is always false.
/// Output follows manifest order.
pub fn hydrate(manifest: &LabelManifest) -> Vec<Label> {
    manifest
        .labels
        .iter()
        .map(|(name, definition)| definition.hydrate(name))
        .collect()
}

/// Insertion-ordered string-keyed map
///
/// Deserializing rejects duplicate keys.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing (in place) an existing value with the same key
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with unique string keys")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if map.contains_key(&key) {
                        return Err(serde::de::Error::custom(format!("duplicate key `{key}`")));
                    }
                    map.entries.push((key, value));
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}
