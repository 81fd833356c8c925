//! A bunch of wrap errors.

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors of the node daemon, wrapping the engine and its surroundings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Ring engine error: {0}")]
    Core(#[from] ringlet_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("HTTP server error: {0}")]
    HttpServer(#[from] hyper::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid network address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Could not register the global logger")]
    LoggerInit,
}
