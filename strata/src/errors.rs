use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for Strata operations
///
/// Each kind names one category of failure so callers can tell configuration
/// mistakes (raised before any partition is touched) apart from failures that
/// surface while partitions are being processed.
///
/// # Examples
///
/// ```rust
/// use strata::errors::{ErrorKind, StrataError, StrataResult};
///
/// fn example() -> StrataResult<()> {
///     Err(StrataError::new("k must be greater than zero", ErrorKind::InvalidConfiguration))
/// }
///
/// assert!(example().unwrap_err().is_configuration_error());
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Configuration Errors - raised at construction time
    /// A configuration parameter (k, partition count, sample rate, ...) is invalid
    InvalidConfiguration,
    /// The requested index kind is not known
    UnsupportedIndexKind,
    /// Key column count or declared type does not fit the index kind
    KeyTypeMismatch,
    /// A key expression references a column the schema does not have
    ColumnNotFound,

    // Evaluation Errors - raised while rows are processed
    /// A key expression evaluated to a non-numeric value
    TypeError,
    /// Operands of a geometric operation have different dimensions
    DimensionMismatch,

    // Index Errors
    /// The index kind does not support the requested capability
    IndexTypeMismatch,

    // Execution Errors
    /// A per-partition task failed
    ExecutionError,
    /// The materialization cache could not serve a request
    CacheError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidConfiguration => write!(f, "Invalid configuration"),
            ErrorKind::UnsupportedIndexKind => write!(f, "Unsupported index kind"),
            ErrorKind::KeyTypeMismatch => write!(f, "Key type mismatch"),
            ErrorKind::ColumnNotFound => write!(f, "Column not found"),
            ErrorKind::TypeError => write!(f, "Type error"),
            ErrorKind::DimensionMismatch => write!(f, "Dimension mismatch"),
            ErrorKind::IndexTypeMismatch => write!(f, "Index type mismatch"),
            ErrorKind::ExecutionError => write!(f, "Execution error"),
            ErrorKind::CacheError => write!(f, "Cache error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Strata error type.
///
/// `StrataError` carries a message, an [`ErrorKind`], an optional cause and
/// the backtrace captured where the error was created.
///
/// # Examples
///
/// ```rust
/// use strata::errors::{ErrorKind, StrataError};
///
/// let cause = StrataError::new("value is not numeric", ErrorKind::TypeError);
/// let err = StrataError::new_with_cause("partition 3 failed", ErrorKind::ExecutionError, cause);
/// assert_eq!(err.kind(), &ErrorKind::ExecutionError);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct StrataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StrataError>>,
    backtrace: Arc<Backtrace>,
}

impl StrataError {
    /// Creates a new `StrataError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new `StrataError` wrapping the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StrataError) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&StrataError> {
        self.cause.as_deref()
    }

    /// Returns `true` for the kinds that are raised before any work is
    /// scheduled: bad parameters, unknown index kinds and key declarations
    /// that do not fit the requested index.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::InvalidConfiguration
                | ErrorKind::UnsupportedIndexKind
                | ErrorKind::KeyTypeMismatch
                | ErrorKind::ColumnNotFound
        )
    }
}

impl Display for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = (*self.backtrace).clone();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, backtrace)
            }
        }
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

impl From<String> for StrataError {
    fn from(msg: String) -> Self {
        StrataError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for StrataError {
    fn from(msg: &str) -> Self {
        StrataError::new(msg, ErrorKind::InternalError)
    }
}
