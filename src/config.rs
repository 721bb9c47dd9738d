//! Assembler settings
//!
//! Supports loading settings from:
//! - Default values
//! - Config file (assembler.toml)
//! - Environment variables (ASSEMBLER__*)
//!
//! ## Example config file (assembler.toml):
//! ```toml
//! [build]
//! output_dir = "./generated/schemas"
//! catalog = "./models.yml"
//!
//! # Sources shared by every schema
//! [schemas."*"]
//! src = "./graphql/_shared"
//!
//! [schemas.default]
//! config = "./graphql/default.yml"
//!
//! [schemas.default.src]
//! blog = "./graphql/blog"
//! legacy = "disabled"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::builder::{AssembledSchema, SchemaBuilder};
use crate::error::{Result, SchemaError};
use crate::loader::{read_fragment, ConfigLoader, ConfigSource};
use crate::model::{ModelCatalog, ModelSource};
use crate::plugin::PluginRegistry;

/// Key under `[schemas]` holding sources shared by every schema
pub const GLOBAL_SCHEMA: &str = "*";

/// Main settings for the assembler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblerSettings {
    #[serde(default)]
    pub build: BuildSettings,

    /// Schema key to schema settings
    #[serde(default)]
    pub schemas: IndexMap<String, SchemaSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Where built schemas are persisted
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Model catalog backing the build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

/// Sources and inline config for one schema key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<SourceSetting>,

    /// File holding the schema-level config map, applied after every source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

/// `src` as written in settings: one path, or named paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSetting {
    Path(String),
    Named(IndexMap<String, SourceValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceValue {
    /// A directory, or `"disabled"`
    Path(String),
    /// `false` disables the source
    Enabled(bool),
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./generated/schemas")
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            catalog: None,
        }
    }
}

impl SourceSetting {
    /// Sources in declaration order
    pub fn sources(&self) -> Result<Vec<ConfigSource>> {
        match self {
            SourceSetting::Path(path) => Ok(vec![ConfigSource::from_setting(path)]),
            SourceSetting::Named(named) => named
                .iter()
                .map(|(name, value)| match value {
                    SourceValue::Path(path) => Ok(ConfigSource::from_setting(path)),
                    SourceValue::Enabled(false) => Ok(ConfigSource::Disabled),
                    SourceValue::Enabled(true) => Err(SchemaError::config(
                        format!("src.{}", name),
                        "Source must be a path or \"disabled\"",
                    )),
                })
                .collect(),
        }
    }
}

impl AssemblerSettings {
    /// Load settings from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load settings, adding a specific file on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["assembler.toml", ".assembler.toml", "config/assembler.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "assembler") {
            let xdg_config = dirs.config_dir().join("assembler.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ASSEMBLER")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Output directory, resolved against the working directory
    pub fn output_dir(&self) -> Result<PathBuf> {
        resolve(&self.build.output_dir)
    }

    pub fn catalog_path(&self) -> Result<Option<PathBuf>> {
        self.build.catalog.as_deref().map(resolve).transpose()
    }

    /// The configured model catalog, or an empty one
    pub fn catalog(&self) -> Result<ModelCatalog> {
        match self.catalog_path()? {
            Some(path) => ModelCatalog::from_path(&path),
            None => Ok(ModelCatalog::default()),
        }
    }

    /// Load the config for `schema_key` and assemble it
    pub fn build_schema(
        &self,
        schema_key: &str,
        source: &dyn ModelSource,
        registry: &PluginRegistry,
    ) -> Result<AssembledSchema> {
        let config = self.loader(schema_key)?.load()?;
        SchemaBuilder::new(schema_key, source, registry).build(&config)
    }

    /// Configured schema keys, excluding the global entry
    pub fn schema_keys(&self) -> impl Iterator<Item = &str> {
        self.schemas
            .keys()
            .map(String::as_str)
            .filter(|key| *key != GLOBAL_SCHEMA)
    }

    /// Build the loader for one schema key
    pub fn loader(&self, schema_key: &str) -> Result<ConfigLoader> {
        let mut loader = ConfigLoader::new(schema_key);

        if let Some(global) = self.schemas.get(GLOBAL_SCHEMA) {
            for source in global.sources()? {
                loader = loader.with_global_source(source);
            }
            if let Some(path) = &global.config {
                if let Some(value) = read_fragment(&resolve(path)?)? {
                    loader = loader.with_global_source(ConfigSource::Inline(value));
                }
            }
        }

        let settings = self.schemas.get(schema_key).ok_or_else(|| {
            SchemaError::config(
                format!("schemas.{}", schema_key),
                "No settings for this schema key",
            )
        })?;
        for source in settings.sources()? {
            loader = loader.with_schema_source(source);
        }
        if let Some(path) = &settings.config {
            if let Some(value) = read_fragment(&resolve(path)?)? {
                loader = loader.with_inline(value);
            }
        }

        debug!(schema = schema_key, "Prepared config loader");
        Ok(loader)
    }
}

impl SchemaSettings {
    fn sources(&self) -> Result<Vec<ConfigSource>> {
        match &self.src {
            Some(src) => src.sources(),
            None => Ok(Vec::new()),
        }
    }
}

fn resolve(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = AssemblerSettings::default();
        assert_eq!(settings.build.output_dir, PathBuf::from("./generated/schemas"));
        assert_eq!(settings.schema_keys().count(), 0);
    }

    #[test]
    fn test_serialize_settings() {
        let mut settings = AssemblerSettings::default();
        settings.schemas.insert(
            "default".to_string(),
            SchemaSettings {
                src: Some(SourceSetting::Path("./graphql".to_string())),
                config: None,
            },
        );
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("[build]"));
        assert!(toml_str.contains("[schemas.default]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assembler.toml");
        fs::write(
            &path,
            r#"
[build]
output_dir = "out"

[schemas.default.src]
blog = "./graphql/blog"
legacy = "disabled"
"#,
        )
        .unwrap();

        let settings = AssemblerSettings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.build.output_dir, PathBuf::from("out"));
        let sources = settings.schemas["default"].sources().unwrap();
        assert_eq!(
            sources,
            vec![
                ConfigSource::Directory(PathBuf::from("./graphql/blog")),
                ConfigSource::Disabled,
            ]
        );
    }

    #[test]
    fn test_loader_layers_global_and_schema_sources() {
        let dir = tempdir().unwrap();
        let shared = dir.path().join("shared");
        let blog = dir.path().join("blog");
        fs::create_dir_all(&shared).unwrap();
        fs::create_dir_all(&blog).unwrap();
        fs::write(shared.join("scalars.yml"), "Date:\n  description: shared\n").unwrap();
        fs::write(blog.join("scalars.yml"), "Date:\n  description: blog\n").unwrap();
        let inline = dir.path().join("default.json");
        fs::write(&inline, r#"{"enums": {"Status": {"values": ["OPEN"]}}}"#).unwrap();

        let mut settings = AssemblerSettings::default();
        settings.schemas.insert(
            GLOBAL_SCHEMA.to_string(),
            SchemaSettings {
                src: Some(SourceSetting::Path(shared.display().to_string())),
                config: None,
            },
        );
        settings.schemas.insert(
            "default".to_string(),
            SchemaSettings {
                src: Some(SourceSetting::Path(blog.display().to_string())),
                config: Some(inline),
            },
        );

        assert_eq!(settings.schema_keys().collect::<Vec<_>>(), vec!["default"]);
        let tree = settings.loader("default").unwrap().load_tree().unwrap();
        assert_eq!(tree["scalars"]["Date"], json!({"description": "blog"}));
        assert_eq!(tree["enums"]["Status"]["values"], json!(["OPEN"]));
    }

    #[test]
    fn test_enabled_true_is_rejected() {
        let setting = SourceSetting::Named(IndexMap::from([(
            "blog".to_string(),
            SourceValue::Enabled(true),
        )]));
        assert!(setting.sources().is_err());
    }

    #[test]
    fn test_paths_resolve_against_working_dir() {
        let dir = tempdir().unwrap();
        let mut settings = AssemblerSettings::default();
        settings.build.catalog = Some(dir.path().join("models.yml"));

        assert_eq!(
            settings.output_dir().unwrap(),
            std::env::current_dir().unwrap().join("./generated/schemas")
        );
        assert_eq!(settings.catalog_path().unwrap(), Some(dir.path().join("models.yml")));
        assert_eq!(AssemblerSettings::default().catalog_path().unwrap(), None);
    }

    #[test]
    fn test_unknown_schema_key() {
        let settings = AssemblerSettings::default();
        assert!(settings.loader("missing").is_err());
    }
}
