use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A write or delete answered with something other than `OK`.
    #[error("expected OK got '{0}'")]
    Unexpected(String),

    /// The server refused a read or delete; `detail` is the response body.
    #[error("object unavailable ({status}): {detail}")]
    Unavailable { status: u16, detail: String },

    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// `true` if the server reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Unavailable { status: 404, .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
