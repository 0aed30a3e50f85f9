//! Errors returned by the optimizer.

use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// The error type used by the optimizer and its components.
#[derive(Debug)]
pub enum OptimizerError {
    /// An operation has been called with invalid arguments. [ArgumentKind] tells what was wrong with them.
    Argument(ArgumentError),
    /// One of the invariants of the memo or of the search has been violated.
    Internal(InternalError),
    /// The request is valid but can not be handled by the optimizer.
    Unsupported(String),
}

/// What was wrong with the arguments of a failed operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArgumentKind {
    /// A join or a catalog operation refers to a table the catalog does not have.
    UnknownTable,
    /// The join list is empty, one of its joins is not connected to the tables joined before it
    /// or it joins a table twice.
    InvalidJoins,
    /// A memo expression has a wrong number of inputs or its inputs cover the same table.
    InvalidInputs,
    /// Any other invalid argument.
    Other,
}

impl OptimizerError {
    /// Creates an [argument error](OptimizerError::Argument) of kind [ArgumentKind::Other].
    pub fn argument<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Argument(ArgumentError::new(ArgumentKind::Other, message))
    }

    /// Creates an error for a table that is not present in the catalog.
    pub fn unknown_table(table: &str) -> OptimizerError {
        OptimizerError::Argument(ArgumentError::new(ArgumentKind::UnknownTable, table))
    }

    /// Creates an error for a join list that does not describe a single join tree.
    pub fn invalid_joins<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Argument(ArgumentError::new(ArgumentKind::InvalidJoins, message))
    }

    /// Creates an error for an expression whose inputs do not fit its operator.
    pub fn invalid_inputs<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Argument(ArgumentError::new(ArgumentKind::InvalidInputs, message))
    }

    /// Creates an [internal error](OptimizerError::Internal).
    pub fn internal<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Internal(InternalError::new(message, None))
    }

    /// Creates an [internal error](OptimizerError::Internal) caused by another error.
    pub fn internal_with_cause<T>(message: T, cause: OptimizerError) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Internal(InternalError::new(message, Some(cause)))
    }

    /// Creates an [unsupported error](OptimizerError::Unsupported).
    pub fn unsupported<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Unsupported(message.into())
    }

    /// Returns the kind of an argument error or `None` for other errors.
    pub fn argument_kind(&self) -> Option<ArgumentKind> {
        match self {
            OptimizerError::Argument(err) => Some(err.kind),
            _ => None,
        }
    }
}

impl Display for OptimizerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerError::Argument(err) => write!(f, "{}", err),
            OptimizerError::Internal(err) => write!(f, "Internal error: {}", err),
            OptimizerError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
        }
    }
}

impl Error for OptimizerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OptimizerError::Internal(InternalError { cause: Some(error), .. }) => Some(error),
            _ => None,
        }
    }
}

/// Argument error. See [OptimizerError::Argument].
#[derive(Debug)]
pub struct ArgumentError {
    kind: ArgumentKind,
    message: String,
    backtrace: Backtrace,
}

impl ArgumentError {
    /// Creates an argument error of the given kind. This method captures a backtrace.
    pub fn new<T>(kind: ArgumentKind, message: T) -> Self
    where
        T: Into<String>,
    {
        ArgumentError {
            kind,
            message: message.into(),
            backtrace: Backtrace::new(),
        }
    }

    pub fn kind(&self) -> ArgumentKind {
        self.kind
    }

    /// The backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ArgumentKind::UnknownTable => write!(f, "Unknown table: {}", self.message),
            ArgumentKind::InvalidJoins => write!(f, "Invalid join list: {}", self.message),
            ArgumentKind::InvalidInputs => write!(f, "Invalid inputs: {}", self.message),
            ArgumentKind::Other => write!(f, "Argument error: {}", self.message),
        }
    }
}

/// Internal error. See [OptimizerError::Internal].
#[derive(Debug)]
pub struct InternalError {
    message: String,
    cause: Option<Box<OptimizerError>>,
    backtrace: Backtrace,
}

impl InternalError {
    fn new<T>(message: T, cause: Option<OptimizerError>) -> Self
    where
        T: Into<String>,
    {
        InternalError {
            message: message.into(),
            cause: cause.map(Box::new),
            backtrace: Backtrace::new(),
        }
    }

    /// The backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        match &self.cause {
            Some(cause) => write!(f, " caused by: {}", cause),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::error::{ArgumentKind, OptimizerError};
    use std::error::Error;

    #[test]
    fn test_internal_error_cause() {
        let cause = OptimizerError::internal("no best expression");
        let expected = cause.to_string();

        let err = OptimizerError::internal_with_cause("copy-out failed", cause);
        let source = err.source().expect("no source error");
        assert_eq!(source.to_string(), expected);
        assert_eq!(err.to_string(), "Internal error: copy-out failed caused by: Internal error: no best expression");

        assert!(OptimizerError::internal("err").source().is_none());
    }

    #[test]
    fn test_argument_kinds() {
        let err = OptimizerError::unknown_table("Z");
        assert_eq!(err.argument_kind(), Some(ArgumentKind::UnknownTable));
        assert_eq!(err.to_string(), "Unknown table: Z");
        assert!(err.source().is_none());

        let err = OptimizerError::invalid_joins("Join list is empty");
        assert_eq!(err.argument_kind(), Some(ArgumentKind::InvalidJoins));
        assert_eq!(err.to_string(), "Invalid join list: Join list is empty");

        let err = OptimizerError::invalid_inputs("Join expects 2 input(s) but got 1");
        assert_eq!(err.argument_kind(), Some(ArgumentKind::InvalidInputs));

        let err = OptimizerError::argument("negative row size");
        assert_eq!(err.argument_kind(), Some(ArgumentKind::Other));
        assert_eq!(err.to_string(), "Argument error: negative row size");
    }

    #[test]
    fn test_unsupported() {
        let err = OptimizerError::unsupported("65 rules");
        assert_eq!(err.argument_kind(), None);
        assert_eq!(err.to_string(), "Not supported: 65 rules");
    }
}
