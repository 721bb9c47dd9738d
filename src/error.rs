//! Error types for schema assembly

use thiserror::Error;

/// Result type for schema assembly operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema assembly errors
///
/// Every variant is fatal to the build that raised it. Nothing is retried
/// inside the assembler and no partial schema reaches storage.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid config at {path}: {message}")]
    Config { path: String, message: String },

    #[error("{0}")]
    Builder(String),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("Failed to apply plugin {plugin} to {construct}: {source}")]
    PluginApplication {
        plugin: String,
        construct: String,
        #[source]
        source: Box<SchemaError>,
    },

    #[error("{construct}: {source}")]
    Provider {
        construct: String,
        #[source]
        source: ProviderError,
    },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Plugin ordering failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("Circular plugin dependency between: {}", .0.join(", "))]
    Circular(Vec<String>),

    #[error("Plugin {plugin} is ordered against {reference}, which is not a plugin on the same construct")]
    UnresolvedReference { plugin: String, reference: String },

    #[error("Plugin {plugin} runs {bucket} every plugin, so it cannot also be ordered against {reference}")]
    ConflictingConstraints {
        plugin: String,
        bucket: &'static str,
        reference: String,
    },
}

/// Error reported by a data-model provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl SchemaError {
    /// Malformed configuration at `path`
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Structural violation discovered during assembly
    pub fn builder(message: impl Into<String>) -> Self {
        SchemaError::Builder(message.into())
    }

    /// Tag a provider error with the construct that asked for it
    pub fn provider(construct: impl Into<String>, source: ProviderError) -> Self {
        SchemaError::Provider {
            construct: construct.into(),
            source,
        }
    }
}

/// Fail the build with a [`SchemaError::Builder`] unless `$test` holds.
macro_rules! invariant {
    ($test:expr, $($arg:tt)+) => {
        if !$test {
            return Err($crate::error::SchemaError::Builder(format!($($arg)+)));
        }
    };
}

pub(crate) use invariant;

#[cfg(test)]
mod tests {
    use super::*;

    fn check(value: usize) -> Result<usize> {
        invariant!(value > 2, "Value {} is too small", value);
        Ok(value)
    }

    #[test]
    fn test_invariant_macro() {
        assert_eq!(check(3).unwrap(), 3);
        let err = check(1).unwrap_err();
        assert_eq!(err.to_string(), "Value 1 is too small");
    }

    #[test]
    fn test_plugin_error_names_construct() {
        let err = SchemaError::PluginApplication {
            plugin: "paginate".to_string(),
            construct: "readArticles".to_string(),
            source: Box::new(SchemaError::builder("no limit")),
        };
        assert_eq!(
            err.to_string(),
            "Failed to apply plugin paginate to readArticles: no limit"
        );
    }

    #[test]
    fn test_circular_message_lists_members() {
        let err = DependencyError::Circular(vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(err.to_string(), "Circular plugin dependency between: p1, p2");
    }
}
