//! Raw replay reader output.

/// Literal the reader writes when it could not recover the replay.
pub const ERROR_SENTINEL: &str = "ERROR";

/// Raw text of one replay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayBlob {
    /// The reader reported a transient failure; the attempt should be retried.
    Sentinel,
    /// Anything else; decoded by [`super::parse_blob`].
    Payload(String),
}

impl ReplayBlob {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text == ERROR_SENTINEL {
            ReplayBlob::Sentinel
        } else {
            ReplayBlob::Payload(text)
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, ReplayBlob::Sentinel)
    }
}

/// Turn the reader's dict-like text into JSON.
///
/// The reader prints a Python-style mapping with single quotes. Every single
/// quote becomes a double quote; region names containing a quote are not
/// representable.
pub fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_exact() {
        assert!(ReplayBlob::from_text("ERROR").is_sentinel());
        assert!(!ReplayBlob::from_text("ERROR\n").is_sentinel());
        assert!(!ReplayBlob::from_text("{}").is_sentinel());
    }

    #[test]
    fn quotes_are_normalized() {
        assert_eq!(
            normalize_quotes("{'entropy': {'10': {'.text': 5.5}}}"),
            r#"{"entropy": {"10": {".text": 5.5}}}"#
        );
    }
}
