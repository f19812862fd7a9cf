use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error("invalid endpoint url: {0}")]
    Endpoint(String),

    // The backend answered, but with a reason string instead of data.
    #[error("rejected by backend: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown variant '{0}' (expected 'tasks' or 'weather')")]
    InvalidVariant(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unknown route '{0}'")]
    UnknownRoute(String),
}
