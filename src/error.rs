//! Unified error type.

use thiserror::Error;

use crate::template::TemplateError;

/// The error type returned by hawkwing's fallible operations.
///
/// Application-level errors (404, 403, 500, …) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, reading configuration, loading
/// templates, watching directories.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("template: {0}")]
    Template(#[from] TemplateError),

    #[error("watch: {0}")]
    Watch(#[from] notify::Error),
}
