use std::path::PathBuf;

/// Failures raised while configuring backends, talking to them, or making sense of what they
/// return.
///
/// The taxonomy follows how callers react: configuration faults stop a run before any request
/// is made, transport and parse faults end a single page or encounter, and an empty search is
/// an ordinary outcome that flatteners turn into an empty table.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to read secret {field} at {path}: {message}")]
    Secret {
        path: String,
        field: String,
        message: String,
    },
    #[error("failed to read {path}: {source}", path = path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("no {resource_type} resources returned")]
    NoSearchResults { resource_type: String },
    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },
    #[error("patient lookup failed: {0}")]
    Lookup(String),
}

impl CoreError {
    pub(crate) fn parse(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoreError::Parse {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn no_results(resource_type: &str) -> Self {
        CoreError::NoSearchResults {
            resource_type: resource_type.to_owned(),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
