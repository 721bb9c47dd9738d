//! Config Loading
//!
//! Discovers configuration fragments from inline maps and directories and
//! deep-merges them into one tree. Sources apply in a fixed order: global
//! sources, then sources scoped to the schema, then the inline schema map.
//! Maps merge key by key; every other value replaces what was there.
//!
//! Directory sources are walked recursively in file-name order. A fragment at
//! the directory root is namespaced by its file stem (`types.yml` lands under
//! `types`), a nested fragment by its parent directory (`models/blog.yml`
//! lands under `models`). Namespaces that are not config sections merge at the
//! root.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::definition::{SchemaConfig, SECTIONS};
use crate::error::{Result, SchemaError};

/// Fragment extensions picked up from directory sources
pub const FRAGMENT_EXTENSIONS: [&str; 4] = ["yml", "yaml", "json", "toml"];

/// Value that switches a source off
pub const DISABLED: &str = "disabled";

/// One place configuration is read from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Inline(Value),
    Directory(PathBuf),
    Disabled,
}

impl ConfigSource {
    /// Interpret a source as written in settings: a path or `"disabled"`
    pub fn from_setting(value: &str) -> Self {
        if value.eq_ignore_ascii_case(DISABLED) {
            ConfigSource::Disabled
        } else {
            ConfigSource::Directory(PathBuf::from(value))
        }
    }
}

/// Recursively merge `incoming` into `base`
///
/// Maps merge key by key. Anything else, lists included, replaces.
pub fn merge_values(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, incoming) => *base = incoming,
    }
}

/// Assembles the configuration tree for one schema
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    schema_key: String,
    global_sources: Vec<ConfigSource>,
    schema_sources: Vec<ConfigSource>,
    inline: Option<Value>,
}

impl ConfigLoader {
    pub fn new(schema_key: impl Into<String>) -> Self {
        Self {
            schema_key: schema_key.into(),
            global_sources: Vec::new(),
            schema_sources: Vec::new(),
            inline: None,
        }
    }

    /// Add a source shared by every schema
    pub fn with_global_source(mut self, source: ConfigSource) -> Self {
        self.global_sources.push(source);
        self
    }

    /// Add a source scoped to this schema
    pub fn with_schema_source(mut self, source: ConfigSource) -> Self {
        self.schema_sources.push(source);
        self
    }

    /// Set the schema-level config map, applied last
    pub fn with_inline(mut self, config: Value) -> Self {
        self.inline = Some(config);
        self
    }

    pub fn schema_key(&self) -> &str {
        &self.schema_key
    }

    /// Merge every source into one untyped tree
    pub fn load_tree(&self) -> Result<Value> {
        let mut tree = Value::Object(Map::new());
        for source in self.global_sources.iter().chain(&self.schema_sources) {
            match source {
                ConfigSource::Inline(value) => merge_values(&mut tree, value.clone()),
                ConfigSource::Directory(dir) => {
                    merge_values(&mut tree, load_directory(dir, &self.schema_key)?)
                }
                ConfigSource::Disabled => {
                    warn!(schema = %self.schema_key, "Skipping disabled config source");
                }
            }
        }
        if let Some(inline) = &self.inline {
            merge_values(&mut tree, inline.clone());
        }
        Ok(tree)
    }

    /// Merge every source and parse the result
    pub fn load(&self) -> Result<SchemaConfig> {
        SchemaConfig::from_tree(&self.load_tree()?)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn is_fragment(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAGMENT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Scan a directory source into a tree
pub fn load_directory(dir: &Path, schema_key: &str) -> Result<Value> {
    if !dir.is_dir() {
        return Err(SchemaError::config(
            dir.display().to_string(),
            "Config source directory does not exist",
        ));
    }

    let mut tree = Value::Object(Map::new());
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| {
            SchemaError::config(dir.display().to_string(), e.to_string())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_fragment(path) {
            continue;
        }

        let Some(fragment) = read_fragment(path)? else {
            debug!(path = %path.display(), "Skipping empty fragment");
            continue;
        };

        if fragment.get(schema_key).is_some() {
            return Err(SchemaError::config(
                path.display().to_string(),
                format!(
                    "Fragment contains the schema key \"{}\" at its top level. Fragments are already scoped to their schema; move the contents up one level",
                    schema_key
                ),
            ));
        }

        let namespace = if entry.depth() == 1 {
            path.file_stem().and_then(|s| s.to_str())
        } else {
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
        }
        .unwrap_or_default();

        debug!(path = %path.display(), namespace, "Loaded config fragment");

        let scoped = if SECTIONS.contains(&namespace) {
            let mut wrapper = Map::new();
            wrapper.insert(namespace.to_string(), fragment);
            Value::Object(wrapper)
        } else {
            fragment
        };
        merge_values(&mut tree, scoped);
    }
    Ok(tree)
}

/// Parse one fragment file; `None` when it is empty
pub fn read_fragment(path: &Path) -> Result<Option<Value>> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let at = || path.display().to_string();
    let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => {
            serde_json::from_str(&content).map_err(|e| SchemaError::config(at(), e.to_string()))?
        }
        Some("toml") => {
            toml::from_str(&content).map_err(|e| SchemaError::config(at(), e.to_string()))?
        }
        _ => serde_yaml::from_str(&content).map_err(|e| SchemaError::config(at(), e.to_string()))?,
    };
    match value {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(value)),
        _ => Err(SchemaError::config(at(), "Config fragments must contain a map")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_merge_values_layers_maps() {
        let mut base = json!({"types": {"Post": {"fields": {"id": "ID"}}}, "builders": ["a"]});
        merge_values(
            &mut base,
            json!({"types": {"Post": {"fields": {"title": "String"}}}, "builders": ["b"]}),
        );
        assert_eq!(
            base,
            json!({"types": {"Post": {"fields": {"id": "ID", "title": "String"}}}, "builders": ["b"]})
        );
    }

    #[test]
    fn test_directory_namespaces() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "types.yml", "Post:\n  fields:\n    id: ID!\n");
        write(tmp.path(), "models/article.yml", "Article:\n  fields: '*'\n");
        write(tmp.path(), "schema.json", r#"{"scalars": {"Date": {}}}"#);
        write(tmp.path(), "empty.yml", "   \n");
        write(tmp.path(), ".hidden/types.yml", "Secret: {}\n");
        write(tmp.path(), "notes.txt", "ignored");

        let tree = load_directory(tmp.path(), "default").unwrap();
        assert_eq!(tree["types"]["Post"]["fields"]["id"], json!("ID!"));
        assert_eq!(tree["models"]["Article"]["fields"], json!("*"));
        assert_eq!(tree["scalars"]["Date"], json!({}));
        assert!(tree["types"].get("Secret").is_none());
    }

    #[test]
    fn test_later_sources_win() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "types.yml", "Post:\n  description: first\n");
        write(second.path(), "types.toml", "[Post]\ndescription = \"second\"\n");

        let tree = ConfigLoader::new("default")
            .with_global_source(ConfigSource::Directory(first.path().to_path_buf()))
            .with_schema_source(ConfigSource::Directory(second.path().to_path_buf()))
            .with_inline(json!({"types": {"Post": {"input": true}}}))
            .load_tree()
            .unwrap();
        assert_eq!(tree["types"]["Post"], json!({"description": "second", "input": true}));
    }

    #[test]
    fn test_disabled_source_is_skipped() {
        let tree = ConfigLoader::new("default")
            .with_schema_source(ConfigSource::from_setting("disabled"))
            .load_tree()
            .unwrap();
        assert_eq!(tree, json!({}));
    }

    #[test]
    fn test_missing_directory_fails() {
        let err = ConfigLoader::new("default")
            .with_schema_source(ConfigSource::Directory(PathBuf::from("/does/not/exist")))
            .load_tree()
            .unwrap_err();
        assert!(matches!(err, SchemaError::Config { .. }));
    }

    #[test]
    fn test_fragment_with_schema_key_fails() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "types.yml", "admin:\n  Post: {}\n");
        let err = load_directory(tmp.path(), "admin").unwrap_err();
        assert!(err.to_string().contains("schema key"));
    }

    #[test]
    fn test_unparseable_fragment_names_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "types.json", "{not json");
        let err = load_directory(tmp.path(), "default").unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path.ends_with("types.json")));
    }
}
