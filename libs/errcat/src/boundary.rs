//! Boundary assertions: enforcing a function's error contract at runtime.
//!
//! A function that promises "every error I return has a category of kind
//! `StoreCategory`" can have that promise checked at its exit:
//!
//! ```
//! use errcat::{guard, Error, Kind, CATEGORY_FILTER_REJECTION};
//! use serde::Serialize;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
//! enum StoreCategory { NotFound }
//!
//! fn load() -> Result<(), Error> {
//!     guard(Kind::of::<StoreCategory>(), || {
//!         // a category of the wrong kind slips out
//!         Err(Error::new("some-other-tag", "boom"))
//!     })
//! }
//!
//! let err = load().unwrap_err();
//! assert!(err.category().is(&CATEGORY_FILTER_REJECTION));
//! assert!(err.message().contains("(original error: boom)"));
//! ```
//!
//! Errors that pass are returned untouched. Errors of the wrong kind are
//! rewritten into a [`CATEGORY_FILTER_REJECTION`] error whose message names
//! the assertion site, the expected and actual kinds, and the original
//! error. Already-rejected errors pass through as they are, so nested
//! assertions never double-wrap.

use std::panic::Location;
use std::sync::LazyLock;

use crate::category::{CATEGORY_FILTER_REJECTION, CategoryValue, Kind};
use crate::config::{BoundaryConfig, LocationStyle};
use crate::error::{Categorized, Error};
use crate::failure::{self, Failure};

static DEFAULT_BOUNDARY: LazyLock<Boundary> = LazyLock::new(Boundary::default);

/// Outcome of checking one outgoing result.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Success, an allowed category, or an existing rejection.
    Passed,
    /// The error broke the contract; this is its replacement.
    Rewritten(Error),
}

/// Configured boundary assertion.
///
/// The free functions ([`guard`], [`require_category`] and their
/// `_or_panic` forms) use [`Boundary::default`].
#[derive(Debug, Clone, Default)]
pub struct Boundary {
    config: BoundaryConfig,
}

impl Boundary {
    #[must_use]
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn from_config(config: &BoundaryConfig) -> Self {
        Self::new(config.clone())
    }

    /// Check an outgoing failure against `expected`.
    pub fn evaluate<F: Failure + ?Sized>(
        &self,
        err: Option<&F>,
        expected: Kind,
        site: &Location<'_>,
    ) -> Verdict {
        let Some(err) = err else {
            return Verdict::Passed;
        };
        let actual = err
            .as_categorized()
            .map_or(CategoryValue::UNKNOWN, Categorized::category);
        let allowed = !actual.is_unknown() && actual.kind() == expected;
        if allowed || actual.is(&CATEGORY_FILTER_REJECTION) {
            return Verdict::Passed;
        }

        let file = match self.config.location {
            LocationStyle::FileName => {
                site.file().rsplit(['/', '\\']).next().unwrap_or(site.file())
            }
            LocationStyle::FullPath => site.file(),
        };
        let actual_kind = actual.kind();
        if self.config.log_rejections {
            tracing::warn!(
                expected = %expected,
                actual = %actual_kind,
                file,
                line = site.line(),
                "error category contract violated"
            );
        }
        let message = format!(
            "{CATEGORY_FILTER_REJECTION} at {file}:{line} -- required {expected}, \
             got {actual_kind}({value}) (original error: {text})",
            line = site.line(),
            value = describe(&actual),
            text = err.text(),
        );
        Verdict::Rewritten(Error::detailed(
            CATEGORY_FILTER_REJECTION,
            message,
            failure::details(Some(err)),
        ))
    }

    /// Check `result` at the caller's location; a contract violation
    /// replaces the error.
    #[track_caller]
    pub fn require<T, E>(&self, result: Result<T, E>, expected: Kind) -> Result<T, E>
    where
        E: Failure + From<Error>,
    {
        self.check(result, expected, Location::caller())
    }

    /// Like [`Boundary::require`], but a violation panics with the
    /// rejection [`Error`] as payload.
    ///
    /// # Panics
    /// When the error's category is not of kind `expected`. This is meant
    /// for contracts whose violation is a programming defect, not a
    /// recoverable condition.
    #[track_caller]
    pub fn require_or_panic<T, E>(&self, result: Result<T, E>, expected: Kind) -> Result<T, E>
    where
        E: Failure,
    {
        self.check_or_panic(result, expected, Location::caller())
    }

    /// Run `scope` and check whatever it returns, however it returns.
    ///
    /// The recorded location is the call to `guard`.
    #[track_caller]
    pub fn guard<T, E, F>(&self, expected: Kind, scope: F) -> Result<T, E>
    where
        E: Failure + From<Error>,
        F: FnOnce() -> Result<T, E>,
    {
        let site = Location::caller();
        self.check(scope(), expected, site)
    }

    /// Panicking form of [`Boundary::guard`].
    ///
    /// # Panics
    /// When `scope` returns an error whose category is not of kind
    /// `expected`; the payload is the rejection [`Error`].
    #[track_caller]
    pub fn guard_or_panic<T, E, F>(&self, expected: Kind, scope: F) -> Result<T, E>
    where
        E: Failure,
        F: FnOnce() -> Result<T, E>,
    {
        let site = Location::caller();
        self.check_or_panic(scope(), expected, site)
    }

    fn check<T, E>(&self, result: Result<T, E>, expected: Kind, site: &Location<'_>) -> Result<T, E>
    where
        E: Failure + From<Error>,
    {
        let verdict = self.evaluate(result.as_ref().err(), expected, site);
        match verdict {
            Verdict::Passed => result,
            Verdict::Rewritten(rejection) => Err(E::from(rejection)),
        }
    }

    fn check_or_panic<T, E>(
        &self,
        result: Result<T, E>,
        expected: Kind,
        site: &Location<'_>,
    ) -> Result<T, E>
    where
        E: Failure,
    {
        let verdict = self.evaluate(result.as_ref().err(), expected, site);
        match verdict {
            Verdict::Passed => result,
            Verdict::Rewritten(rejection) => std::panic::panic_any(rejection),
        }
    }
}

/// Category value as it appears in a rejection message: its wire form, or
/// `Unknown` for the sentinel.
fn describe(category: &CategoryValue) -> String {
    if category.is_unknown() {
        return "Unknown".to_owned();
    }
    category
        .to_wire()
        .map_or_else(|e| format!("<unserializable: {e}>"), |v| v.to_string())
}

/// Run `scope` and rewrite any error it returns whose category is not of
/// kind `expected`.
///
/// Failures without a category never satisfy the check.
#[track_caller]
pub fn guard<T, E, F>(expected: Kind, scope: F) -> Result<T, E>
where
    E: Failure + From<Error>,
    F: FnOnce() -> Result<T, E>,
{
    DEFAULT_BOUNDARY.guard(expected, scope)
}

/// Panicking form of [`guard`].
///
/// # Panics
/// When `scope` returns an error of the wrong kind; the payload is the
/// rejection [`Error`].
#[track_caller]
pub fn guard_or_panic<T, E, F>(expected: Kind, scope: F) -> Result<T, E>
where
    E: Failure,
    F: FnOnce() -> Result<T, E>,
{
    DEFAULT_BOUNDARY.guard_or_panic(expected, scope)
}

/// Check an outgoing result at the call site.
#[track_caller]
pub fn require_category<T, E>(result: Result<T, E>, expected: Kind) -> Result<T, E>
where
    E: Failure + From<Error>,
{
    DEFAULT_BOUNDARY.require(result, expected)
}

/// Panicking form of [`require_category`].
///
/// # Panics
/// When `result` holds an error of the wrong kind; the payload is the
/// rejection [`Error`].
#[track_caller]
pub fn require_category_or_panic<T, E>(result: Result<T, E>, expected: Kind) -> Result<T, E>
where
    E: Failure,
{
    DEFAULT_BOUNDARY.require_or_panic(result, expected)
}
