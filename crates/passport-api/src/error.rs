use thiserror::Error;

/// Errors returned by [`crate::PassportClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an RPC error envelope.
    #[error("{procedure} failed ({code}): {message}")]
    Rpc {
        procedure: String,
        code: String,
        message: String,
    },

    #[error("procedure not found: {procedure}")]
    NotFound { procedure: String },

    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {procedure}")]
    UnexpectedStatus { status: u16, procedure: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl ApiError {
    /// The message shown to a user when an action fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rpc { message, .. } => message.clone(),
            ApiError::RateLimited { retry_after_secs } => {
                format!("Too many requests, try again in {retry_after_secs}s")
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_shows_service_message() {
        let err = ApiError::Rpc {
            procedure: "bulkImport.approve".to_string(),
            code: "CONFLICT".to_string(),
            message: "Job is not ready for approval".to_string(),
        };
        assert_eq!(err.user_message(), "Job is not ready for approval");
    }

    #[test]
    fn rate_limit_names_the_wait() {
        let err = ApiError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(err.user_message(), "Too many requests, try again in 30s");
    }

    #[test]
    fn other_errors_fall_back_to_display() {
        let err = ApiError::NotFound {
            procedure: "bulkImport.status".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "procedure not found: bulkImport.status"
        );
    }
}
