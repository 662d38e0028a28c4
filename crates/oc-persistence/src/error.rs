use std::fmt;

/// Error taxonomy surfaced by the persistence facade (spec §7): the only
/// kinds a C11 call can produce. Mapped to HTTP status once, at the
/// processor's ingress layer.
#[derive(Debug, Clone)]
pub enum PersistenceError {
    NotFound { what: String },
    ExternalUnavailable { detail: String },
    Internal { detail: String },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::NotFound { what } => write!(f, "not found: {what}"),
            PersistenceError::ExternalUnavailable { detail } => {
                write!(f, "persistence facade unavailable: {detail}")
            }
            PersistenceError::Internal { detail } => write!(f, "internal persistence error: {detail}"),
        }
    }
}

impl std::error::Error for PersistenceError {}
