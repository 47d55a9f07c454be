/// Error type for throttler lifecycle operations.
///
/// The admission path never errors: [`Throttler::allow`](crate::Throttler::allow)
/// always returns a boolean.
#[derive(Debug)]
pub enum ThrottleError {
    /// `start` was called before any configuration was loaded.
    NoConfiguration,
    /// `start` was called while the throttler was already running.
    AlreadyStarted,
    /// A limit definition failed validation during `load_config`.
    InvalidDefinition { id: String, reason: &'static str },
}

impl std::fmt::Display for ThrottleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleError::NoConfiguration => write!(f, "no configuration loaded"),
            ThrottleError::AlreadyStarted => write!(f, "already started"),
            ThrottleError::InvalidDefinition { id, reason } => {
                write!(f, "invalid limit definition '{id}': {reason}")
            }
        }
    }
}

impl std::error::Error for ThrottleError {}
