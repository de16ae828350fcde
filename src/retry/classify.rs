//! Classification of call outcomes into retry decisions.

use std::collections::HashMap;

use crate::error::{HarvestError, status_codes};

/// What the retrier should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Back off exponentially and try again, consuming one attempt.
    Transient,
    /// Sleep the fixed cooldown and try again without consuming an attempt.
    RateLimited,
    /// Give up immediately.
    Fatal,
    /// Propagate immediately; never retried.
    Cancelled,
}

/// Maps errors to a [`RetryClass`].
///
/// Status codes are looked up in an explicit table first. Codes absent from
/// the table fall back to their range: 5xx is transient, anything else fatal.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    table: HashMap<u16, RetryClass>,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        use status_codes::*;

        let table = [
            (BAD_REQUEST, RetryClass::Fatal),
            (UNAUTHORIZED, RetryClass::Fatal),
            (FORBIDDEN, RetryClass::Fatal),
            (NOT_FOUND, RetryClass::Fatal),
            (METHOD_NOT_ALLOWED, RetryClass::Fatal),
            (UNSUPPORTED_MEDIA_TYPE, RetryClass::Fatal),
            (TOO_MANY_REQUESTS, RetryClass::RateLimited),
            (INTERNAL_SERVER_ERROR, RetryClass::Transient),
            (BAD_GATEWAY, RetryClass::Transient),
            (SERVICE_UNAVAILABLE, RetryClass::Transient),
            (GATEWAY_TIMEOUT, RetryClass::Transient),
        ]
        .into_iter()
        .collect();

        Self { table }
    }
}

impl StatusClassifier {
    /// Override the class of one status code.
    pub fn with_status(mut self, status: u16, class: RetryClass) -> Self {
        self.table.insert(status, class);
        self
    }

    pub fn classify_status(&self, status: u16) -> RetryClass {
        match self.table.get(&status) {
            Some(class) => *class,
            None if (500..600).contains(&status) => RetryClass::Transient,
            None => RetryClass::Fatal,
        }
    }

    pub fn classify(&self, error: &HarvestError) -> RetryClass {
        match error {
            HarvestError::Cancelled => RetryClass::Cancelled,
            HarvestError::Timeout(_)
            | HarvestError::Connection(_)
            | HarvestError::IncompleteRead(_) => RetryClass::Transient,
            HarvestError::Status(e) => self.classify_status(e.status),
            HarvestError::Http(e) => match e.status() {
                Some(status) => self.classify_status(status.as_u16()),
                None if e.is_timeout() || e.is_connect() || e.is_body() => RetryClass::Transient,
                None => RetryClass::Fatal,
            },
            _ => RetryClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;

    #[test]
    fn test_status_table() {
        let classifier = StatusClassifier::default();
        assert_eq!(classifier.classify_status(429), RetryClass::RateLimited);
        assert_eq!(classifier.classify_status(503), RetryClass::Transient);
        assert_eq!(classifier.classify_status(599), RetryClass::Transient);
        assert_eq!(classifier.classify_status(404), RetryClass::Fatal);
        assert_eq!(classifier.classify_status(418), RetryClass::Fatal);
    }

    #[test]
    fn test_error_kinds() {
        let classifier = StatusClassifier::default();
        assert_eq!(classifier.classify(&HarvestError::Cancelled), RetryClass::Cancelled);
        assert_eq!(
            classifier.classify(&HarvestError::Timeout("read".into())),
            RetryClass::Transient
        );
        assert_eq!(
            classifier.classify(&HarvestError::IncompleteRead("eof".into())),
            RetryClass::Transient
        );
        assert_eq!(
            classifier.classify(&StatusError::new(401).into()),
            RetryClass::Fatal
        );
        assert_eq!(
            classifier.classify(&HarvestError::InvalidResponse("x".into())),
            RetryClass::Fatal
        );
    }

    #[test]
    fn test_override() {
        let classifier = StatusClassifier::default().with_status(404, RetryClass::Transient);
        assert_eq!(classifier.classify_status(404), RetryClass::Transient);
    }
}
