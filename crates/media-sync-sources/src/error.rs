use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("local library error: {0}")]
    Local(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification the orchestrator recovers by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, timeout or auth trouble: serve cache and retry next run
    Unavailable,
    /// Malformed response: treat the facet as "no data this run"
    InvalidData,
    /// Local side failure, isolated per item
    Local,
}

impl SourceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SourceError::Unavailable(_) | SourceError::Timeout(_) | SourceError::NotAuthenticated(_) => {
                ErrorClass::Unavailable
            }
            SourceError::InvalidData(_) => ErrorClass::InvalidData,
            SourceError::Local(_) | SourceError::Io(_) => ErrorClass::Local,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout(e.to_string())
        } else if e.is_decode() {
            SourceError::InvalidData(e.to_string())
        } else {
            SourceError::Unavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::InvalidData(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(SourceError::Timeout("30s".into()).class(), ErrorClass::Unavailable);
        assert_eq!(SourceError::NotAuthenticated("no token".into()).class(), ErrorClass::Unavailable);
        assert_eq!(SourceError::InvalidData("bad json".into()).class(), ErrorClass::InvalidData);
        assert_eq!(SourceError::Local("locked".into()).class(), ErrorClass::Local);
    }

    #[test]
    fn test_json_errors_are_invalid_data() {
        let err = serde_json::from_str::<Vec<u32>>("{").unwrap_err();
        assert_eq!(SourceError::from(err).class(), ErrorClass::InvalidData);
    }
}
