use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Prompt rejected before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("prompt is {len} characters, the maximum is {max}")]
    PromptTooLong { len: usize, max: usize },
}

/// Failure to obtain a response from the generation endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("request to generation endpoint failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation endpoint unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

/// The byte channel failed part-way through the body.
#[derive(Debug, Error)]
#[error("byte channel failed after {bytes_read} bytes: {source}")]
pub struct DecodeError {
    pub bytes_read: usize,
    #[source]
    pub source: BoxError,
}

impl DecodeError {
    /// True when the body was malformed or cut short, as opposed to the
    /// connection itself failing.
    pub fn is_malformed_body(&self) -> bool {
        if let Some(err) = self.source.downcast_ref::<reqwest::Error>() {
            return err.is_decode() || (err.is_body() && chain_has_malformed_io(err));
        }
        if let Some(err) = self.source.downcast_ref::<std::io::Error>() {
            return is_malformed_io(err);
        }
        false
    }
}

fn is_malformed_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
    )
}

/// Chunked bodies that end early surface as an `UnexpectedEof` somewhere
/// below the reqwest error.
fn chain_has_malformed_io(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = err.source();
    while let Some(source) = current {
        if let Some(io) = source.downcast_ref::<std::io::Error>() {
            if is_malformed_io(io) {
                return true;
            }
        }
        current = source.source();
    }
    false
}
