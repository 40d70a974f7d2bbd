//!
//! # Chiplet21 Result and Error Types
//!

// Workspace Imports
use chiplet21utils::{self as utils, context_path, ErrorContext};

/// # [ChipError] Result Type
pub type ChipResult<T> = Result<T, ChipError>;

///
/// # Chip-Model Error Enumeration
///
/// Every variant other than [ChipError::Boxed] and [ChipError::Str] carries the
/// [ErrorContext] stack active when it was raised, identifying the offending record, chip, or net.
///
pub enum ChipError {
    /// A chip or net names a library record or chip which does not exist,
    /// or a name is defined more than once.
    Reference {
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// A numeric field lies outside its documented domain
    Range {
        field: String,
        value: f64,
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// A malformed field, e.g. an unparseable stackup string
    Format {
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// Degenerate geometry: non-positive areas, or dies which do not fit their wafer
    Geometry {
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// Non-positive production quantity
    Amortization {
        quantity: i64,
        stack: Vec<ErrorContext>,
    },
    /// A computation reached a value it cannot continue from, e.g. a zero test pass-rate
    Evaluation {
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// Boxed External Errors
    Boxed(Box<dyn std::error::Error + Send + Sync>),
    /// Uncategorized Error, with String Message
    Str(String),
}
impl ChipError {
    /// Create a [ChipError::Str] from anything String-convertible
    pub fn msg(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }
    /// Create an error-variant [Result] of our [ChipError::Str] variant from anything String-convertible
    pub fn fail<T>(s: impl Into<String>) -> Result<T, Self> {
        Err(Self::msg(s))
    }
    /// Context stack of the error, if it carries one
    pub fn stack(&self) -> &[ErrorContext] {
        match self {
            Self::Reference { stack, .. }
            | Self::Range { stack, .. }
            | Self::Format { stack, .. }
            | Self::Geometry { stack, .. }
            | Self::Amortization { stack, .. }
            | Self::Evaluation { stack, .. } => stack,
            Self::Boxed(_) | Self::Str(_) => &[],
        }
    }
}
impl std::fmt::Debug for ChipError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let at = context_path(self.stack());
        match self {
            ChipError::Reference { message, .. } => {
                write!(f, "Configuration Reference Error: \n - {} \n - at {}", message, at)
            }
            ChipError::Range {
                field,
                value,
                message,
                ..
            } => write!(
                f,
                "Range Violation: \n - `{}` = {}: {} \n - at {}",
                field, value, message, at
            ),
            ChipError::Format { message, .. } => {
                write!(f, "Format Error: \n - {} \n - at {}", message, at)
            }
            ChipError::Geometry { message, .. } => {
                write!(f, "Geometry Error: \n - {} \n - at {}", message, at)
            }
            ChipError::Amortization { quantity, .. } => write!(
                f,
                "Amortization Error: \n - quantity must be positive, got {} \n - at {}",
                quantity, at
            ),
            ChipError::Evaluation { message, .. } => {
                write!(f, "Evaluation Error: \n - {} \n - at {}", message, at)
            }
            ChipError::Boxed(err) => std::fmt::Display::fmt(err, f),
            ChipError::Str(err) => f.write_str(err),
        }
    }
}
impl std::fmt::Display for ChipError {
    /// Delegates to the [Debug] implementation
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
impl std::error::Error for ChipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Boxed(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<String> for ChipError {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
impl From<&str> for ChipError {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}
impl From<utils::ser::Error> for ChipError {
    fn from(e: utils::ser::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<std::io::Error> for ChipError {
    fn from(e: std::io::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<serde_json::Error> for ChipError {
    fn from(e: serde_json::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
