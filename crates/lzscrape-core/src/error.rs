use thiserror::Error;

/// Errors raised while assembling process-wide configuration: environment
/// variables, the countries/categories YAML files, and the warehouse key file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(
        "credential file {path} not found; request the warehouse key file from the operator contact and save it as {path}"
    )]
    MissingCredentialFile { path: String },

    #[error("credential file {path} is not a valid key file: {source}")]
    CredentialParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config validation failed: {0}")]
    Validation(String),
}
