use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Malformed textual input. Carries the offending input and the byte
    /// offset at which parsing failed.
    #[error("parse error at offset {offset} in {input:?}: {reason}")]
    Parse {
        input: String,
        offset: usize,
        reason: String,
    },

    /// A value cannot be represented in the requested form.
    #[error("conversion error: {0}")]
    Conversion(String),
}

impl TypeError {
    /// Construct a [`TypeError::Parse`] for `input` failing at `offset`.
    pub fn parse(input: impl Into<String>, offset: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            offset,
            reason: reason.into(),
        }
    }
}
