//! Adapters on `Result` for the common error-path operations.

use crate::annotate::prefix_annotate;
use crate::boundary;
use crate::category::{Category, CategoryValue, Kind};
use crate::error::Error;
use crate::failure::{self, Failure};

/// Extension methods for `Result<T, E>` where `E` is any [`Failure`].
///
/// ```
/// use errcat::{Error, ResultExt};
///
/// fn read() -> Result<(), Error> {
///     Err(Error::new("io", "disk on fire"))
/// }
///
/// let err = read()
///     .annotate("reading {{.path}}", &[("path", "/etc/hosts")])
///     .recategorize("config")
///     .unwrap_err();
/// assert_eq!(err.to_string(), "reading /etc/hosts: disk on fire");
/// assert!(err.category().is(&"config"));
/// ```
pub trait ResultExt<T, E> {
    /// Category of the error, `None` on success.
    fn category(&self) -> Option<CategoryValue>;

    /// Prefix the error message; see [`prefix_annotate`].
    ///
    /// # Errors
    /// Returns the annotated error if `self` is an error.
    fn annotate(self, template: &str, extra: &[(&str, &str)]) -> Result<T, Error>;

    /// Re-label the error, keeping message and details.
    ///
    /// # Errors
    /// Returns the re-labelled error if `self` is an error.
    fn recategorize<C: Category>(self, category: C) -> Result<T, Error>;

    /// Boundary assertion at the caller's location.
    ///
    /// # Errors
    /// Returns the original error if its category is of kind `C`, a
    /// rejection error otherwise.
    fn require_category<C: Category>(self) -> Result<T, E>
    where
        E: From<Error>;

    /// Panicking boundary assertion at the caller's location.
    ///
    /// # Errors
    /// Returns the original error if its category is of kind `C`.
    ///
    /// # Panics
    /// When the error's category is not of kind `C`.
    fn require_category_or_panic<C: Category>(self) -> Result<T, E>;
}

impl<T, E: Failure> ResultExt<T, E> for Result<T, E> {
    fn category(&self) -> Option<CategoryValue> {
        failure::category(self.as_ref().err())
    }

    fn annotate(self, template: &str, extra: &[(&str, &str)]) -> Result<T, Error> {
        self.map_err(|e| prefix_annotate(&e, template, extra))
    }

    fn recategorize<C: Category>(self, category: C) -> Result<T, Error> {
        self.map_err(|e| failure::relabel(category, &e))
    }

    #[track_caller]
    fn require_category<C: Category>(self) -> Result<T, E>
    where
        E: From<Error>,
    {
        boundary::require_category(self, Kind::of::<C>())
    }

    #[track_caller]
    fn require_category_or_panic<C: Category>(self) -> Result<T, E> {
        boundary::require_category_or_panic(self, Kind::of::<C>())
    }
}
