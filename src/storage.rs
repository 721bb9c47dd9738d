//! Schema storage
//!
//! Where assembled schemas go once they validate. [`FileSchemaStorage`] lays
//! each schema key out in its own directory:
//!
//! ```text
//! <root>/
//! └── default/
//!     ├── schema.json
//!     ├── schema.graphql
//!     ├── manifest.json
//!     └── checksums.sha256
//! ```
//!
//! Reads verify every file against its recorded checksum.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::builder::AssembledSchema;
use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};

pub const DOCUMENT_FILE: &str = "schema.json";
pub const SDL_FILE: &str = "schema.graphql";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHECKSUMS_FILE: &str = "checksums.sha256";

/// A persisted schema as read back from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSchema {
    pub schema_key: String,
    pub document: Value,
    pub sdl: String,
    pub fingerprint: Checksum,
    pub generated_at: DateTime<Utc>,
}

impl StoredSchema {
    fn from_assembled(assembled: &AssembledSchema) -> Self {
        Self {
            schema_key: assembled.schema_key().to_string(),
            document: assembled.document.clone(),
            sdl: assembled.sdl.clone(),
            fingerprint: assembled.fingerprint.clone(),
            generated_at: Utc::now(),
        }
    }
}

pub trait SchemaStorage {
    fn persist_schema(&mut self, assembled: &AssembledSchema) -> Result<()>;

    fn get_schema(&self, schema_key: &str) -> Result<Option<StoredSchema>>;

    /// Drop whatever is stored for `schema_key`
    fn clear(&mut self, schema_key: &str) -> Result<()>;
}

// =============================================================================
// File storage
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub path: String,
    pub checksum: Checksum,
}

/// Describes one persisted schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaManifest {
    pub schema_key: String,
    pub fingerprint: Checksum,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone)]
pub struct FileSchemaStorage {
    root: PathBuf,
}

impl FileSchemaStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `schema_key`, which must be a single plain path segment
    pub fn schema_dir(&self, schema_key: &str) -> Result<PathBuf> {
        let mut components = Path::new(schema_key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) if segment == schema_key => {
                Ok(self.root.join(segment))
            }
            _ => Err(SchemaError::config(
                format!("schemas.{}", schema_key),
                "Schema keys must be a single directory name without separators or `..`",
            )),
        }
    }

    pub fn manifest(&self, schema_key: &str) -> Result<Option<SchemaManifest>> {
        let path = self.schema_dir(schema_key)?.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn read_verified(dir: &Path, entry: &ManifestEntry) -> Result<String> {
        let content = fs::read_to_string(dir.join(&entry.path))?;
        if !entry.checksum.verify(content.as_bytes()) {
            return Err(SchemaError::ChecksumMismatch {
                path: dir.join(&entry.path).display().to_string(),
                expected: entry.checksum.to_string(),
                actual: Checksum::from_bytes(content.as_bytes()).to_string(),
            });
        }
        Ok(content)
    }
}

impl SchemaStorage for FileSchemaStorage {
    fn persist_schema(&mut self, assembled: &AssembledSchema) -> Result<()> {
        let schema_key = assembled.schema_key();
        let dir = self.schema_dir(schema_key)?;
        fs::create_dir_all(&dir)?;

        let document = serde_json::to_string_pretty(&assembled.document)?;
        let artifacts = [(DOCUMENT_FILE, document.as_str()), (SDL_FILE, assembled.sdl.as_str())];

        let mut files = Vec::with_capacity(artifacts.len());
        for (name, content) in artifacts {
            fs::write(dir.join(name), content)?;
            files.push(ManifestEntry {
                path: name.to_string(),
                checksum: Checksum::from_bytes(content.as_bytes()),
            });
        }

        let manifest = SchemaManifest {
            schema_key: schema_key.to_string(),
            fingerprint: assembled.fingerprint.clone(),
            generated_at: Utc::now(),
            files,
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;

        let checksums: String = manifest
            .files
            .iter()
            .map(|entry| format!("{}  {}", entry.checksum, entry.path))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(dir.join(CHECKSUMS_FILE), checksums)?;

        info!(
            schema = schema_key,
            path = %dir.display(),
            fingerprint = %manifest.fingerprint,
            "Persisted schema"
        );
        Ok(())
    }

    fn get_schema(&self, schema_key: &str) -> Result<Option<StoredSchema>> {
        let Some(manifest) = self.manifest(schema_key)? else {
            return Ok(None);
        };
        let dir = self.schema_dir(schema_key)?;

        let mut contents: IndexMap<&str, String> = IndexMap::new();
        for entry in &manifest.files {
            contents.insert(entry.path.as_str(), Self::read_verified(&dir, entry)?);
        }
        let missing = |file: &str| {
            SchemaError::builder(format!("Stored schema {} is missing {}", schema_key, file))
        };
        let document = contents.get(DOCUMENT_FILE).ok_or_else(|| missing(DOCUMENT_FILE))?;
        let sdl = contents.get(SDL_FILE).ok_or_else(|| missing(SDL_FILE))?;

        debug!(schema = schema_key, "Loaded stored schema");
        Ok(Some(StoredSchema {
            schema_key: manifest.schema_key.clone(),
            document: serde_json::from_str(document)?,
            sdl: sdl.clone(),
            fingerprint: manifest.fingerprint.clone(),
            generated_at: manifest.generated_at,
        }))
    }

    fn clear(&mut self, schema_key: &str) -> Result<()> {
        let dir = self.schema_dir(schema_key)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(schema = schema_key, path = %dir.display(), "Cleared stored schema");
        }
        Ok(())
    }
}

// =============================================================================
// Memory storage
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemorySchemaStorage {
    schemas: IndexMap<String, StoredSchema>,
}

impl MemorySchemaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaStorage for MemorySchemaStorage {
    fn persist_schema(&mut self, assembled: &AssembledSchema) -> Result<()> {
        self.schemas.insert(
            assembled.schema_key().to_string(),
            StoredSchema::from_assembled(assembled),
        );
        Ok(())
    }

    fn get_schema(&self, schema_key: &str) -> Result<Option<StoredSchema>> {
        Ok(self.schemas.get(schema_key).cloned())
    }

    fn clear(&mut self, schema_key: &str) -> Result<()> {
        self.schemas.shift_remove(schema_key);
        Ok(())
    }
}
