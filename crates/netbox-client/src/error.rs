//! NetBox client errors

use thiserror::Error;

/// Failures talking to the NetBox REST API.
#[derive(Debug, Error)]
pub enum NetBoxError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success answer other than 400/401/403/404
    #[error("NetBox answered {status}: {message}")]
    Api { status: u16, message: String },

    /// Request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response body did not match the expected model
    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// Token missing, invalid or lacking permission (401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected by NetBox validation (400), e.g. an unknown tag slug
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl NetBoxError {
    /// HTTP status NetBox answered with, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetBoxError::Http(e) => e.status().map(|s| s.as_u16()),
            NetBoxError::Api { status, .. } => Some(*status),
            NetBoxError::Authentication(_) => Some(401),
            NetBoxError::NotFound(_) => Some(404),
            NetBoxError::InvalidRequest(_) => Some(400),
            NetBoxError::Serialization(_) | NetBoxError::Decode(_) => None,
        }
    }

    /// 409: the prefix cannot hold the requested addresses.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_conflict() {
        let full = NetBoxError::Api {
            status: 409,
            message: "Insufficient space".to_string(),
        };
        assert!(full.is_conflict());
        assert_eq!(full.to_string(), "NetBox answered 409: Insufficient space");

        assert_eq!(NetBoxError::InvalidRequest("bad slug".into()).status(), Some(400));
        assert!(!NetBoxError::NotFound("prefix 7".into()).is_conflict());
        assert_eq!(NetBoxError::Decode("truncated".into()).status(), None);
    }
}
