//! Error type shared by every Orca operation.
//!
//! The native engine reports failures as a `pv_status_t` code plus an
//! ordered stack of contextual messages fetched with `pv_get_error_stack`.
//! [`OrcaError`] keeps the two together: the variant encodes the failure
//! kind, [`ErrorDetail`] keeps the primary message and the raw stack.
//!
//! ```text
//! Initialization failed:
//!   [0] Invalid AccessKey
//!   [1] Activation failed
//! ```

use std::fmt;

/// Primary message plus the native message stack, in native order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    pub message_stack: Vec<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), message_stack: Vec::new() }
    }

    pub fn with_stack(message: impl Into<String>, message_stack: Vec<String>) -> Self {
        Self { message: message.into(), message_stack }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.message_stack.is_empty() {
            f.write_str(":")?;
            for (i, entry) in self.message_stack.iter().enumerate() {
                write!(f, "\n  [{i}] {entry}")?;
            }
        }
        Ok(())
    }
}

/// Every failure an Orca call can produce.
///
/// Local validation errors (`InvalidArgument`, `InvalidState`) are raised
/// before any native call and therefore carry an empty message stack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrcaError {
    #[error("{0}")]
    OutOfMemory(ErrorDetail),
    #[error("{0}")]
    Io(ErrorDetail),
    #[error("{0}")]
    InvalidArgument(ErrorDetail),
    #[error("{0}")]
    StopIteration(ErrorDetail),
    #[error("{0}")]
    Key(ErrorDetail),
    #[error("{0}")]
    InvalidState(ErrorDetail),
    #[error("{0}")]
    Runtime(ErrorDetail),
    #[error("{0}")]
    ActivationError(ErrorDetail),
    #[error("{0}")]
    ActivationLimit(ErrorDetail),
    #[error("{0}")]
    ActivationThrottled(ErrorDetail),
    #[error("{0}")]
    ActivationRefused(ErrorDetail),
    /// Unknown status codes and failures loading the engine library.
    #[error("{0}")]
    Generic(ErrorDetail),
}

pub type Result<T, E = OrcaError> = std::result::Result<T, E>;

impl OrcaError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(ErrorDetail::new(message))
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(ErrorDetail::new(message))
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(ErrorDetail::new(message))
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(ErrorDetail::new(message))
    }

    /// Build the error matching a native status code.
    ///
    /// `PvStatus::Success` should never reach here; it maps to `Generic`.
    pub fn from_status(
        status: PvStatus,
        message: impl Into<String>,
        message_stack: Vec<String>,
    ) -> Self {
        let detail = ErrorDetail::with_stack(message, message_stack);
        match status {
            PvStatus::OutOfMemory => Self::OutOfMemory(detail),
            PvStatus::IoError => Self::Io(detail),
            PvStatus::InvalidArgument => Self::InvalidArgument(detail),
            PvStatus::StopIteration => Self::StopIteration(detail),
            PvStatus::KeyError => Self::Key(detail),
            PvStatus::InvalidState => Self::InvalidState(detail),
            PvStatus::RuntimeError => Self::Runtime(detail),
            PvStatus::ActivationError => Self::ActivationError(detail),
            PvStatus::ActivationLimitReached => Self::ActivationLimit(detail),
            PvStatus::ActivationThrottled => Self::ActivationThrottled(detail),
            PvStatus::ActivationRefused => Self::ActivationRefused(detail),
            PvStatus::Success | PvStatus::Unknown(_) => Self::Generic(detail),
        }
    }

    pub fn detail(&self) -> &ErrorDetail {
        match self {
            Self::OutOfMemory(d)
            | Self::Io(d)
            | Self::InvalidArgument(d)
            | Self::StopIteration(d)
            | Self::Key(d)
            | Self::InvalidState(d)
            | Self::Runtime(d)
            | Self::ActivationError(d)
            | Self::ActivationLimit(d)
            | Self::ActivationThrottled(d)
            | Self::ActivationRefused(d)
            | Self::Generic(d) => d,
        }
    }

    /// The primary message, without the stack.
    pub fn message(&self) -> &str {
        &self.detail().message
    }

    /// The raw native message stack.
    pub fn message_stack(&self) -> &[String] {
        &self.detail().message_stack
    }

    /// `true` for the four licensing/activation failures.
    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            Self::ActivationError(_)
                | Self::ActivationLimit(_)
                | Self::ActivationThrottled(_)
                | Self::ActivationRefused(_)
        )
    }
}

impl From<std::io::Error> for OrcaError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native status codes
// ─────────────────────────────────────────────────────────────────────────────

/// `pv_status_t` as returned by every fallible native function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvStatus {
    Success,
    OutOfMemory,
    IoError,
    InvalidArgument,
    StopIteration,
    KeyError,
    InvalidState,
    RuntimeError,
    ActivationError,
    ActivationLimitReached,
    ActivationThrottled,
    ActivationRefused,
    Unknown(i32),
}

impl From<i32> for PvStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::OutOfMemory,
            2 => Self::IoError,
            3 => Self::InvalidArgument,
            4 => Self::StopIteration,
            5 => Self::KeyError,
            6 => Self::InvalidState,
            7 => Self::RuntimeError,
            8 => Self::ActivationError,
            9 => Self::ActivationLimitReached,
            10 => Self::ActivationThrottled,
            11 => Self::ActivationRefused,
            other => Self::Unknown(other),
        }
    }
}

impl PvStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
