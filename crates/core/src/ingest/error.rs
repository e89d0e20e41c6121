use std::fmt;

/// Why a single provider call produced nothing usable. Never leaves the ingest layer:
/// fetchers log it and hand back an absent value instead.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Empty {
        endpoint: String,
    },
    SchemaMismatch {
        endpoint: String,
        columns: Vec<String>,
    },
    Http {
        endpoint: String,
        status: u16,
    },
    Transport {
        endpoint: String,
        detail: String,
    },
    Decode {
        endpoint: String,
        detail: String,
    },
}

impl FetchError {
    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::Empty { endpoint }
            | FetchError::SchemaMismatch { endpoint, .. }
            | FetchError::Http { endpoint, .. }
            | FetchError::Transport { endpoint, .. }
            | FetchError::Decode { endpoint, .. } => endpoint,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Empty { endpoint } => write!(f, "{endpoint}: empty result"),
            FetchError::SchemaMismatch { endpoint, columns } => write!(
                f,
                "{endpoint}: no known field alias matched columns [{}]",
                columns.join(", ")
            ),
            FetchError::Http { endpoint, status } => write!(f, "{endpoint}: HTTP {status}"),
            FetchError::Transport { endpoint, detail } => {
                write!(f, "{endpoint}: request failed: {detail}")
            }
            FetchError::Decode { endpoint, detail } => {
                write!(f, "{endpoint}: undecodable response: {detail}")
            }
        }
    }
}

impl std::error::Error for FetchError {}
