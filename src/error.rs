//! Error types for environment resolution and definitions-file loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while resolving variables or loading a definitions file.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The variable is absent from the environment and no default was given.
    #[error("Environment variable '{var}' is not set")]
    NotSet { var: String },

    /// The raw value could not be converted to the requested type.
    #[error("Invalid value for '{var}': {message}")]
    Cast { var: String, message: String },

    /// A named cast was requested that no caster is registered under.
    #[error("Unknown cast '{kind}'")]
    UnknownCast { kind: String },

    /// A chain of proxied values exceeded the hop budget (usually a cycle).
    #[error("Proxy chain for '{var}' exceeded {max_depth} hops")]
    ProxyDepth { var: String, max_depth: usize },

    /// A definitions file existed but could not be read.
    #[error("Failed to read definitions file '{}': {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
