//! Canonical request keys and cache key generation.

use super::digest::{digest, DedupDigest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A request parameter value.
///
/// Lists are treated as unordered sets of values: their element order never affects the
/// canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}
impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}
impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Text(s.clone())
    }
}
impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}
impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}
impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Int(i64::from(n))
    }
}
impl From<usize> for ParamValue {
    fn from(n: usize) -> Self {
        i64::try_from(n)
            .map(ParamValue::Int)
            .unwrap_or_else(|_| ParamValue::Text(n.to_string()))
    }
}
impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Float(n)
    }
}
impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<ParamValue> + Clone> From<&[T]> for ParamValue {
    fn from(items: &[T]) -> Self {
        ParamValue::List(items.iter().cloned().map(Into::into).collect())
    }
}
impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => n
                    .as_f64()
                    .map(ParamValue::Float)
                    .unwrap_or_else(|| ParamValue::Text(n.to_string())),
            },
            Value::String(s) => ParamValue::Text(s),
            Value::Array(items) => ParamValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ParamValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// The semantically relevant parts of one call: operation, path and parameters.
///
/// Constructed per call, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub operation: String,
    pub path: String,
    pub params: BTreeMap<String, ParamValue>,
}

impl RequestDescriptor {
    pub fn new(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn canonicalize(&self) -> CanonicalKey {
        canonicalize(self)
    }
}

/// Order-independent string form of a [`RequestDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes a descriptor as `OPERATION path {params}`.
///
/// Parameters are emitted in key order and list elements are sorted by their encoded
/// form, so two descriptors that differ only in ordering produce the same key. Every
/// value has an encoding; non-finite floats are written as quoted strings.
pub fn canonicalize(descriptor: &RequestDescriptor) -> CanonicalKey {
    let mut out = String::new();
    out.push_str(&descriptor.operation.trim().to_uppercase());
    out.push(' ');
    out.push_str(descriptor.path.trim());
    out.push(' ');
    write_map(&mut out, &descriptor.params);
    CanonicalKey(out)
}

fn write_map(out: &mut String, map: &BTreeMap<String, ParamValue>) {
    out.push('{');
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_text(out, k);
        out.push(':');
        write_value(out, v);
    }
    out.push('}');
}

fn write_value(out: &mut String, value: &ParamValue) {
    match value {
        ParamValue::Null => out.push_str("null"),
        ParamValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ParamValue::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        ParamValue::Float(f) if f.is_finite() => {
            let _ = write!(out, "{}", f);
        }
        ParamValue::Float(f) => write_text(out, &f.to_string()),
        ParamValue::Text(s) => write_text(out, s),
        ParamValue::List(items) => {
            let mut encoded: Vec<String> = items
                .iter()
                .map(|item| {
                    let mut s = String::new();
                    write_value(&mut s, item);
                    s
                })
                .collect();
            encoded.sort();
            out.push('[');
            out.push_str(&encoded.join(","));
            out.push(']');
        }
        ParamValue::Map(map) => write_map(out, map),
    }
}

fn write_text(out: &mut String, s: &str) {
    out.push_str(&serde_json::Value::String(s.to_string()).to_string());
}

/// Cache key: the dedup digest plus the path it was derived from.
///
/// Lookups use the digest; pattern invalidation matches against the scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub digest: DedupDigest,
    pub scope: String,
}

impl CacheKey {
    pub fn new(digest: DedupDigest, scope: impl Into<String>) -> Self {
        Self {
            digest,
            scope: scope.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        self.digest.as_str()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.scope, self.digest)
    }
}

/// Builds cache keys for a fixed contract version.
#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    contract_version: String,
}

impl CacheKeyGenerator {
    pub fn new(contract_version: impl Into<String>) -> Self {
        Self {
            contract_version: contract_version.into(),
        }
    }

    pub fn contract_version(&self) -> &str {
        &self.contract_version
    }

    pub fn generate(&self, descriptor: &RequestDescriptor) -> CacheKey {
        let canonical = canonicalize(descriptor);
        CacheKey::new(
            digest(&canonical, &self.contract_version),
            descriptor.path.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legs(equipment: Vec<&str>) -> RequestDescriptor {
        RequestDescriptor::new("post", "/api/workouts/generate")
            .param("workoutType", "Legs")
            .param("durationMinutes", 30u32)
            .param("equipment", equipment)
    }

    #[test]
    fn list_order_does_not_matter() {
        let a = legs(vec!["dumbbells", "bench", "bodyweight"]);
        let b = legs(vec!["bodyweight", "dumbbells", "bench"]);
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn param_insertion_order_does_not_matter() {
        let a = RequestDescriptor::new("GET", "/x").param("a", 1i64).param("b", 2i64);
        let b = RequestDescriptor::new("GET", "/x").param("b", 2i64).param("a", 1i64);
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn values_matter() {
        let a = legs(vec!["bodyweight"]);
        let b = legs(vec!["kettlebell"]);
        assert_ne!(canonicalize(&a), canonicalize(&b));

        let c = legs(vec!["bodyweight"]).param("durationMinutes", 45u32);
        assert_ne!(canonicalize(&a), canonicalize(&c));
    }

    #[test]
    fn canonical_form_is_readable() {
        let key = canonicalize(&legs(vec!["bodyweight"]));
        assert_eq!(
            key.as_str(),
            r#"POST /api/workouts/generate {"durationMinutes":30,"equipment":["bodyweight"],"workoutType":"Legs"}"#
        );
    }

    #[test]
    fn nested_lists_and_maps_are_canonical() {
        let mut m1 = BTreeMap::new();
        m1.insert("tags".to_string(), ParamValue::from(vec!["b", "a"]));
        let mut m2 = BTreeMap::new();
        m2.insert("tags".to_string(), ParamValue::from(vec!["a", "b"]));
        let a = RequestDescriptor::new("GET", "/p")
            .param("nested", ParamValue::List(vec![ParamValue::Map(m1), ParamValue::Int(1)]));
        let b = RequestDescriptor::new("GET", "/p")
            .param("nested", ParamValue::List(vec![ParamValue::Int(1), ParamValue::Map(m2)]));
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn non_finite_floats_are_still_encoded() {
        let d = RequestDescriptor::new("GET", "/f").param("x", f64::NAN);
        assert!(canonicalize(&d).as_str().contains(r#""x":"NaN""#));
    }

    #[test]
    fn json_values_convert_totally() {
        let v: ParamValue = serde_json::json!({"a": [3, 1, 2], "b": null, "c": 1.5}).into();
        let d = RequestDescriptor::new("GET", "/j").param("v", v);
        assert_eq!(
            canonicalize(&d).as_str(),
            r#"GET /j {"v":{"a":[1,2,3],"b":null,"c":1.5}}"#
        );
    }

    #[test]
    fn generator_scopes_by_path() {
        let gen = CacheKeyGenerator::new("v2");
        let key = gen.generate(&legs(vec!["bodyweight"]));
        assert_eq!(key.scope, "/api/workouts/generate");
        assert_eq!(key.as_str().len(), 64);
    }
}
