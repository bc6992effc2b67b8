use thiserror::Error;

/// Failures while resolving paths or loading `config.json`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting is out of range.
    #[error("invalid setting: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Server URL or a fallback host does not parse.
    #[error("bad server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to put `~/.certprep` under.
    #[error("cannot resolve data directory: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
