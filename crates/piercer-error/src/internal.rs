//! The `InternalError` type, and the `internal!` macro for generating it.

use std::fmt::{self, Debug, Display};
use std::panic;

use super::*;

#[derive(Debug, Clone)]
/// Internal error (a bug).
//
// Boxed because it is fairly large (>=12 words), and will be in a variant in many other errors.
pub struct InternalError(Box<InternalErrorRepr>);

#[derive(Debug, Clone)]
/// Internal error (a bug)
struct InternalErrorRepr {
    /// Message, usually from `internal!()` like `format!`.
    message: String,

    /// File and line number.
    location: &'static panic::Location<'static>,
}

impl InternalError {
    /// Create an internal error capturing this call site.
    ///
    /// Prefer [`internal!`], which makes it easy to add additional
    /// information via format parameters.
    #[track_caller]
    pub fn new<S: Into<String>>(message: S) -> Self {
        InternalError::new_inner(message.into())
    }

    /// Create an internal error.
    #[track_caller]
    fn new_inner(message: String) -> Self {
        InternalError(
            InternalErrorRepr {
                message,
                location: panic::Location::caller(),
            }
            .into(),
        )
    }
}

impl std::error::Error for InternalError {}

impl Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "internal error (bug): {:?}: {}",
            &self.0.location, &self.0.message
        )
    }
}

/// Create an internal error, including a message like `format!`, and
/// capturing this call site.
///
/// # Examples
///
/// ```
/// use piercer_error::internal;
///
/// # fn main() -> Result<(), piercer_error::InternalError> {
/// # let mut items = [()].iter();
/// let need_item = items.next().ok_or_else(|| internal!("no items"))?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! internal {
    { $( $arg:tt )* } => {
        $crate::InternalError::new(format!($($arg)*))
    }
}

impl HasKind for InternalError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
