#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Provider endpoint answered with a non-success status.
    #[error("provider {operation} failed (status {status:?}): {detail}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ID token error: {0}")]
    Token(String),
}
