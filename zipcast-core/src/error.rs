use thiserror::Error;

/// Failure kinds surfaced by the lookup layer.
///
/// Every failure is returned as a value; nothing is thrown past the API
/// client boundary. The orchestrator never recovers from any of these, it
/// surfaces the first one encountered and aborts the remaining steps.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Connectivity failure from the underlying HTTP client.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Geocoding returned no match for the requested zip code.
    #[error("no location found for the requested zip code")]
    NotFound,

    /// The response body does not conform to the expected schema.
    #[error("malformed {context}: {source}")]
    Malformed {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The saved-locations database rejected an operation.
    #[error("location store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else {
            LookupError::Network(err)
        }
    }
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_mentions_context() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = LookupError::Malformed {
            context: "geocoding response",
            source,
        };
        assert!(err.to_string().contains("geocoding response"));
    }

    #[test]
    fn http_carries_status_and_message() {
        let err = LookupError::Http {
            status: 401,
            message: "Invalid API key".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid API key"));
    }
}
