//! Declarative resource documents as loaded from manifest files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A single resource document. `kind`, `name` and `namespace` are lifted out of
/// the body; everything else stays opaque and is only read through accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestDocument {
    kind: String,
    name: String,
    namespace: String,
    body: Map<String, Json>,
}

impl ManifestDocument {
    /// Build a document from a decoded JSON object.
    /// Requires `apiVersion` and `kind`; `metadata.name` and `metadata.namespace` may be absent.
    pub fn from_json(value: Json) -> Result<Self, String> {
        let body = match value {
            Json::Object(map) => map,
            other => return Err(format!("expected a mapping at document root, found {}", json_type(&other))),
        };
        match body.get("apiVersion") {
            Some(Json::String(s)) if !s.is_empty() => {}
            _ => return Err("Object 'apiVersion' is missing".to_string()),
        }
        let kind = match body.get("kind") {
            Some(Json::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err("Object 'Kind' is missing".to_string()),
        };
        let meta = body.get("metadata");
        let name = meta.and_then(|m| m.get("name")).and_then(|v| v.as_str()).unwrap_or("").to_string();
        let namespace = meta.and_then(|m| m.get("namespace")).and_then(|v| v.as_str()).unwrap_or("").to_string();
        Ok(Self { kind, name, namespace, body })
    }

    pub fn kind(&self) -> &str { &self.kind }
    pub fn name(&self) -> &str { &self.name }
    /// Empty when the source document did not set one.
    pub fn namespace(&self) -> &str { &self.namespace }

    pub fn api_version(&self) -> &str {
        self.body.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("")
    }

    /// Split `apiVersion` into `(group, version)`; the core group is empty.
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version().split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", self.api_version()),
        }
    }

    /// Top-level field lookup into the opaque remainder (e.g. "spec", "data").
    pub fn field(&self, key: &str) -> Option<&Json> {
        self.body.get(key)
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
    }

    /// Fill the namespace only if the document left it empty. Returns whether it changed.
    pub fn default_namespace(&mut self, namespace: &str) -> bool {
        if self.namespace.is_empty() && !namespace.is_empty() {
            self.namespace = namespace.to_string();
            true
        } else {
            false
        }
    }

    /// Full object as submitted to the API server, with the current name and namespace
    /// written back into `metadata`.
    pub fn to_json(&self) -> Json {
        let mut body = self.body.clone();
        let meta = body.entry("metadata").or_insert_with(|| Json::Object(Map::new()));
        if let Some(obj) = meta.as_object_mut() {
            if !self.name.is_empty() {
                obj.insert("name".into(), Json::String(self.name.clone()));
            }
            if self.namespace.is_empty() {
                obj.remove("namespace");
            } else {
                obj.insert("namespace".into(), Json::String(self.namespace.clone()));
            }
        }
        Json::Object(body)
    }

    /// `Kind/name` as printed in previews and logs.
    pub fn display_key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

fn json_type(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "sequence",
        Json::Object(_) => "mapping",
    }
}
