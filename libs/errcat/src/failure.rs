//! Inspecting arbitrary failure values.
//!
//! Code rarely holds an [`Error`] directly; it holds whatever its callees
//! returned. [`Failure`] is the bridge: it asks a failure value whether it
//! conforms to [`Categorized`], and for its textual form either way.
//!
//! Type-erased errors (`dyn Error`, `Box<dyn Error>`, `anyhow::Error`) are
//! searched along their `source()` chain for the first [`Error`]. Caller
//! types implementing [`Categorized`] are only visible that way once wrapped
//! with [`Error::wrap`] before erasure.

use crate::category::{Category, CategoryValue};
use crate::error::{Categorized, Details, Error};

type DynError = dyn std::error::Error + Send + Sync + 'static;

/// Any failure value, categorized or not.
pub trait Failure {
    /// The categorized view of this failure, if it conforms.
    fn as_categorized(&self) -> Option<&dyn Categorized>;

    /// The textual form of the failure.
    fn text(&self) -> String;
}

impl<T: Categorized> Failure for T {
    fn as_categorized(&self) -> Option<&dyn Categorized> {
        Some(self)
    }

    fn text(&self) -> String {
        self.to_string()
    }
}

impl Failure for dyn Categorized {
    fn as_categorized(&self) -> Option<&dyn Categorized> {
        Some(self)
    }

    fn text(&self) -> String {
        self.to_string()
    }
}

/// First [`Error`] in the `source()` chain starting at `err`.
fn find_in_chain<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a dyn Categorized> {
    std::iter::successors(Some(err), |e| e.source())
        .find_map(|e| e.downcast_ref::<Error>())
        .map(|e| e as &dyn Categorized)
}

impl Failure for DynError {
    fn as_categorized(&self) -> Option<&dyn Categorized> {
        find_in_chain(self)
    }

    fn text(&self) -> String {
        self.to_string()
    }
}

impl Failure for dyn std::error::Error + 'static {
    fn as_categorized(&self) -> Option<&dyn Categorized> {
        find_in_chain(self)
    }

    fn text(&self) -> String {
        self.to_string()
    }
}

impl Failure for Box<DynError> {
    fn as_categorized(&self) -> Option<&dyn Categorized> {
        self.as_ref().as_categorized()
    }

    fn text(&self) -> String {
        self.to_string()
    }
}

impl Failure for anyhow::Error {
    fn as_categorized(&self) -> Option<&dyn Categorized> {
        self.downcast_ref::<Error>()
            .or_else(|| self.chain().find_map(|e| e.downcast_ref::<Error>()))
            .map(|e| e as &dyn Categorized)
    }

    fn text(&self) -> String {
        self.to_string()
    }
}

/// The category of a failure.
///
/// * `None` when there is no failure,
/// * the failure's own category when it conforms to [`Categorized`],
/// * [`CategoryValue::UNKNOWN`] otherwise.
///
/// ```
/// use errcat::{category, CategoryValue, Error};
///
/// let ok: Result<(), Error> = Ok(());
/// assert_eq!(category(ok.as_ref().err()), None);
///
/// let err: Result<(), Error> = Err(Error::new("err-asdf", "boom"));
/// assert!(category(err.as_ref().err()).is_some_and(|c| c.is(&"err-asdf")));
///
/// let wild: Box<dyn std::error::Error + Send + Sync> = "womp womp".into();
/// assert_eq!(category(Some(&wild)), Some(CategoryValue::UNKNOWN));
/// ```
pub fn category<F: Failure + ?Sized>(err: Option<&F>) -> Option<CategoryValue> {
    let err = err?;
    Some(
        err.as_categorized()
            .map_or(CategoryValue::UNKNOWN, Categorized::category),
    )
}

/// The details of a failure; empty when there are none or the failure does
/// not conform to [`Categorized`].
pub fn details<F: Failure + ?Sized>(err: Option<&F>) -> Details {
    err.and_then(Failure::as_categorized)
        .and_then(Categorized::details)
        .cloned()
        .unwrap_or_default()
}

/// Re-label a failure with a new category.
///
/// No failure stays no failure. Message and details are carried over
/// unchanged; a failure that does not conform to [`Categorized`] keeps its
/// textual form as the message.
pub fn recategorize<C, F>(category: C, err: Option<&F>) -> Option<Error>
where
    C: Category,
    F: Failure + ?Sized,
{
    err.map(|e| relabel(category, e))
}

pub(crate) fn relabel<C, F>(category: C, err: &F) -> Error
where
    C: Category,
    F: Failure + ?Sized,
{
    let (message, details) = match err.as_categorized() {
        Some(e) => (
            e.message().to_owned(),
            e.details().cloned().unwrap_or_default(),
        ),
        None => (err.text(), Details::new()),
    };
    Error::from_parts(CategoryValue::new(category), message, details)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    enum ErrorCategory {
        #[serde(rename = "err-asdf")]
        Asdf,
    }

    /// A caller-defined error type with the categorized shape.
    #[derive(Debug)]
    struct QuotaExceeded {
        details: Details,
    }

    impl fmt::Display for QuotaExceeded {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("quota exceeded")
        }
    }

    impl std::error::Error for QuotaExceeded {}

    impl Categorized for QuotaExceeded {
        fn category(&self) -> CategoryValue {
            CategoryValue::new("quota")
        }

        fn message(&self) -> &str {
            "quota exceeded"
        }

        fn details(&self) -> Option<&Details> {
            Some(&self.details)
        }
    }

    #[test]
    fn category_of_created_error_is_its_category() {
        let err = Error::new(ErrorCategory::Asdf, "asdf: fmtme");
        let cat = category(Some(&err)).unwrap();
        assert!(cat.is(&ErrorCategory::Asdf));
        assert_eq!(cat, CategoryValue::new(ErrorCategory::Asdf));
    }

    #[test]
    fn no_failure_has_no_category() {
        assert_eq!(category::<Error>(None), None);
        assert!(details::<Error>(None).is_empty());
    }

    #[test]
    fn uncategorized_errors_are_unknown_not_none() {
        let io = std::io::Error::other("womp womp");
        let wild: Box<DynError> = Box::new(io);
        assert_eq!(category(Some(&wild)), Some(CategoryValue::UNKNOWN));

        let any = anyhow::anyhow!("womp womp");
        assert_eq!(category(Some(&any)), Some(CategoryValue::UNKNOWN));
        assert!(details(Some(&any)).is_empty());
    }

    #[test]
    fn boxed_categorized_errors_are_recognized() {
        let boxed: Box<DynError> = Box::new(Error::new(ErrorCategory::Asdf, "boxed"));
        assert!(category(Some(&boxed)).is_some_and(|c| c.is(&ErrorCategory::Asdf)));

        let any = anyhow::Error::new(Error::detailed("x", "m", [("k", "v")]));
        assert_eq!(details(Some(&any)).get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn caller_defined_types_conform() {
        let err = QuotaExceeded {
            details: [("limit".to_owned(), "10".to_owned())].into(),
        };
        assert!(category(Some(&err)).is_some_and(|c| c.is(&"quota")));
        assert_eq!(details(Some(&err)).len(), 1);

        let as_dyn: &dyn Categorized = &err;
        assert!(category(Some(as_dyn)).is_some_and(|c| c.is(&"quota")));
    }

    #[test]
    fn erased_caller_types_need_wrapping() {
        let quota = || QuotaExceeded {
            details: [("limit".to_owned(), "10".to_owned())].into(),
        };

        let bare: Box<DynError> = Box::new(quota());
        assert_eq!(category(Some(&bare)), Some(CategoryValue::UNKNOWN));

        let boxed: Box<DynError> = Box::new(Error::wrap(quota()));
        assert!(category(Some(&boxed)).is_some_and(|c| c.is(&"quota")));
        assert_eq!(details(Some(&boxed)).get("limit").map(String::as_str), Some("10"));
        assert_eq!(boxed.text(), "quota exceeded");

        let any = anyhow::Error::new(Error::wrap(quota()));
        assert!(category(Some(&any)).is_some_and(|c| c.is(&"quota")));
        assert!(any.chain().nth(1).is_some_and(|e| e.is::<QuotaExceeded>()));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("saving profile")]
    struct SaveFailed(#[source] Error);

    #[test]
    fn source_chain_is_searched() {
        let inner = Error::detailed(ErrorCategory::Asdf, "disk full", [("k", "v")]);
        let boxed: Box<DynError> = Box::new(SaveFailed(inner.clone()));
        assert!(category(Some(&boxed)).is_some_and(|c| c.is(&ErrorCategory::Asdf)));
        assert_eq!(details(Some(&boxed)).len(), 1);

        let any = anyhow::Error::new(inner).context("while saving");
        assert!(category(Some(&any)).is_some_and(|c| c.is(&ErrorCategory::Asdf)));

        let io = anyhow::Error::new(std::io::Error::other("eof")).context("reading");
        assert_eq!(category(Some(&io)), Some(CategoryValue::UNKNOWN));
    }

    #[test]
    fn recategorize_passes_success_through() {
        assert!(recategorize::<_, Error>("outer", None).is_none());
    }

    #[test]
    fn recategorize_keeps_message_and_details() {
        let err = Error::detailed("inner", "a msg", [("deta", "il")]);
        let re = recategorize(ErrorCategory::Asdf, Some(&err)).unwrap();
        assert!(re.category().is(&ErrorCategory::Asdf));
        assert_eq!(re.message(), "a msg");
        assert_eq!(re.details(), err.details());
        assert!(err.category().is(&"inner"));
    }

    #[test]
    fn recategorize_wild_error_keeps_text() {
        let wild: Box<DynError> = "sad panda".into();
        let re = recategorize(ErrorCategory::Asdf, Some(&wild)).unwrap();
        assert_eq!(re.message(), "sad panda");
        assert!(re.details().is_empty());
    }
}
