use std::fmt;

use crate::models::CaptchaStatus;

/// Engine error type.
///
/// Variants are tagged by kind so callers branch on what went wrong instead
/// of sniffing message strings: adapter trouble, challenge outcomes, store
/// failures and cancellation are all distinct.
#[derive(Debug)]
pub enum EngineError {
    /// The browser session could not be opened at all.
    SessionOpenFailed { detail: String },
    /// Navigation to the job page failed.
    NavigationFailed { url: String, detail: String },
    /// A single adapter operation (scan / fill / submit / script) failed.
    Adapter { op: &'static str, detail: String },
    /// The page rendered but exposed no fillable form fields.
    NoFormFields,
    /// The target site rejected the submission.
    SubmitRejected { detail: String },
    /// The challenge session stayed pending for the full wait window.
    ChallengeTimeout,
    /// An operator marked the challenge expired or skipped.
    ChallengeAbandoned { status: CaptchaStatus },
    /// A persistence operation failed.
    Store { op: &'static str, detail: String },
    /// A referenced record does not exist.
    NotFound { entity: &'static str, id: String },
    /// The generative text service failed or returned garbage.
    Generative { model: String, detail: String },
    /// The engine was asked to stop while this application was in flight.
    Cancelled,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SessionOpenFailed { detail } => {
                write!(f, "failed to open browser session: {}", detail)
            }
            EngineError::NavigationFailed { url, detail } => {
                write!(f, "failed to navigate to {}: {}", url, detail)
            }
            EngineError::Adapter { op, detail } => {
                write!(f, "browser adapter error during {}: {}", op, detail)
            }
            EngineError::NoFormFields => write!(f, "no form fields found on page"),
            EngineError::SubmitRejected { detail } => {
                write!(f, "submission rejected: {}", detail)
            }
            EngineError::ChallengeTimeout => write!(f, "challenge timeout"),
            EngineError::ChallengeAbandoned { status } => {
                write!(f, "challenge {}", status.as_str())
            }
            EngineError::Store { op, detail } => {
                write!(f, "store error during {}: {}", op, detail)
            }
            EngineError::NotFound { entity, id } => {
                write!(f, "{} not found: {}", entity, id)
            }
            EngineError::Generative { model, detail } => {
                write!(f, "generative service error (model: {}): {}", model, detail)
            }
            EngineError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Human-readable message persisted on a failed application.
    ///
    /// Bounded so terminal records never carry a stack-trace-sized blob.
    pub fn user_message(&self) -> String {
        crate::utils::truncate_text(&self.to_string(), 200)
    }

    pub fn store(op: &'static str, source: impl fmt::Display) -> Self {
        EngineError::Store {
            op,
            detail: source.to_string(),
        }
    }

    pub fn adapter(op: &'static str, source: impl fmt::Display) -> Self {
        EngineError::Adapter {
            op,
            detail: source.to_string(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for EngineError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        EngineError::Adapter {
            op: "script",
            detail: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Adapter {
            op: "decode",
            detail: err.to_string(),
        }
    }
}

/// Engine result type.
pub type Result<T> = std::result::Result<T, EngineError>;
