//! Key/value variable store threaded through a run.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{name}` placeholders; names may contain dots (`file.Name`).
static PLACEHOLDER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("placeholder regex"));

/// String-keyed, dynamically typed variable store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables {
  inner: BTreeMap<String, Value>,
}

/// Renders a JSON value the way it is substituted into text.
pub(crate) fn value_to_text(v: &Value) -> String {
  match v {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

impl Variables {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.inner.get(key)
  }

  /// Value as text; numbers and booleans are rendered, null is `None`.
  pub fn get_str(&self, key: &str) -> Option<String> {
    match self.inner.get(key)? {
      Value::Null => None,
      v => Some(value_to_text(v)),
    }
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.inner.insert(key.into(), value.into())
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> {
    self.inner.remove(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.inner.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.inner.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.inner.iter()
  }

  /// Copies every entry of `other` over this store.
  pub fn merge(&mut self, other: &Variables) {
    for (k, v) in &other.inner {
      self.inner.insert(k.clone(), v.clone());
    }
  }

  /// Replaces `{name}` placeholders with variable values; unknown names are left as-is.
  pub fn expand(&self, text: &str) -> String {
    PLACEHOLDER
      .replace_all(text, |caps: &regex::Captures<'_>| match self.inner.get(&caps[1]) {
        Some(v) => value_to_text(v),
        None => caps[0].to_string(),
      })
      .into_owned()
  }
}

impl FromIterator<(String, Value)> for Variables {
  fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
    Self {
      inner: iter.into_iter().collect(),
    }
  }
}

impl From<BTreeMap<String, Value>> for Variables {
  fn from(inner: BTreeMap<String, Value>) -> Self {
    Self { inner }
  }
}

impl IntoIterator for Variables {
  type Item = (String, Value);
  type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

  fn into_iter(self) -> Self::IntoIter {
    self.inner.into_iter()
  }
}
