use thiserror::Error;

/// All verification failures collapse to one variant on the wire per the spec's
/// "all collapse to Invalid" rule; the split here exists only for logging.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl TokenError {
    pub fn is_invalid(self) -> bool {
        true
    }
}
