use std::fmt;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Parse,
    Write,
    Load,
    Render,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::Parse => "parse",
            Phase::Write => "write",
            Phase::Load => "load",
            Phase::Render => "render",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Network error: {url} failed after {attempts} attempt(s): {message}")]
    Network {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Parse error in field '{field}': {message}")]
    Parse { field: String, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{phase} phase aborted after {processed} record(s): {source}")]
    Aborted {
        phase: Phase,
        processed: usize,
        #[source]
        source: Box<PriceError>,
    },
}

impl PriceError {
    pub(crate) fn parse(field: &str, message: impl Into<String>) -> Self {
        PriceError::Parse {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Wrap an error with the phase it aborted and the records processed so far.
    pub fn aborted(self, phase: Phase, processed: usize) -> Self {
        PriceError::Aborted {
            phase,
            processed,
            source: Box::new(self),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures and 5xx/429 responses are transient;
    /// 4xx responses and decoding failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            PriceError::Http(e) => {
                if let Some(status) = e.status() {
                    status.is_server_error() || status.as_u16() == 429
                } else {
                    e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
                }
            }
            PriceError::Io(_) => true,
            _ => false,
        }
    }

    /// The phase this error aborted, if it was wrapped by the pipeline.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PriceError::Aborted { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PriceError>;
