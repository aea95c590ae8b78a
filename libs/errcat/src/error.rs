//! The standard categorized error record.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::category::{Category, CategoryValue};

/// Diagnostic key/value pairs attached to an error.
pub type Details = BTreeMap<String, String>;

/// The capability set every categorized error offers.
///
/// [`Error`] is the standard implementation; callers may implement this for
/// their own error types and they will be handled the same way by
/// [`category`](fn@crate::category), annotation and boundary assertions.
/// The textual form (`Display`) is expected to be the message.
///
/// A caller type is recognized by its own type only. Once it is erased into
/// `Box<dyn std::error::Error>` or `anyhow::Error` it can no longer be seen
/// as `Categorized`; erase [`Error::wrap`]`(err)` instead, which carries the
/// same category, message and details and keeps `err` as its `source()`.
pub trait Categorized: std::error::Error + Send + Sync + 'static {
    /// The category to branch on.
    fn category(&self) -> CategoryValue;

    /// Human-readable description.
    fn message(&self) -> &str;

    /// Attached details, if any.
    fn details(&self) -> Option<&Details>;
}

/// A categorized error: category, message and optional details.
///
/// Errors are immutable; annotation and recategorization produce new values.
/// `Display` prints exactly the message.
#[derive(Debug, Clone)]
#[must_use]
pub struct Error {
    category: CategoryValue,
    message: String,
    details: Details,
    source: Option<Arc<dyn Categorized>>,
}

impl Error {
    /// Create an error without details.
    pub fn new<C: Category>(category: C, message: impl Into<String>) -> Self {
        Self::from_parts(CategoryValue::new(category), message.into(), Details::new())
    }

    /// Create an error with details attached.
    ///
    /// An empty iterator is the same as no details.
    pub fn detailed<C, I, K, V>(category: C, message: impl Into<String>, details: I) -> Self
    where
        C: Category,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let details = details
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_parts(CategoryValue::new(category), message.into(), details)
    }

    pub(crate) fn from_parts(category: CategoryValue, message: String, details: Details) -> Self {
        Self {
            category,
            message,
            details,
            source: None,
        }
    }

    /// Standard record of a caller-defined categorized error, keeping the
    /// original as [`source`](std::error::Error::source).
    ///
    /// ```
    /// use errcat::{category, Categorized, CategoryValue, Details, Error};
    ///
    /// #[derive(Debug)]
    /// struct Quota;
    ///
    /// impl std::fmt::Display for Quota {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    ///         f.write_str("quota exceeded")
    ///     }
    /// }
    ///
    /// impl std::error::Error for Quota {}
    ///
    /// impl Categorized for Quota {
    ///     fn category(&self) -> CategoryValue {
    ///         CategoryValue::new("quota")
    ///     }
    ///     fn message(&self) -> &str {
    ///         "quota exceeded"
    ///     }
    ///     fn details(&self) -> Option<&Details> {
    ///         None
    ///     }
    /// }
    ///
    /// let erased = anyhow::Error::new(Error::wrap(Quota));
    /// assert!(category(Some(&erased)).is_some_and(|c| c.is(&"quota")));
    /// ```
    pub fn wrap<E: Categorized>(err: E) -> Self {
        let mut wrapped = Self::from_categorized(&err);
        wrapped.source = Some(Arc::new(err));
        wrapped
    }

    /// Copies any categorized error into the standard record.
    pub fn from_categorized(err: &dyn Categorized) -> Self {
        Self::from_parts(
            err.category(),
            err.message().to_owned(),
            err.details().cloned().unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn category(&self) -> &CategoryValue {
        &self.category
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn details(&self) -> &Details {
        &self.details
    }

    /// Same error under a different category; message and details are kept.
    pub fn recategorize<C: Category>(self, category: C) -> Self {
        Self {
            category: CategoryValue::new(category),
            ..self
        }
    }

    /// Prefix the message with a rendered template; see
    /// [`prefix_annotate`](crate::prefix_annotate).
    pub fn annotate(&self, template: &str, extra: &[(&str, &str)]) -> Self {
        crate::annotate::prefix_annotate(self, template, extra)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Categorized for Error {
    fn category(&self) -> CategoryValue {
        self.category.clone()
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn details(&self) -> Option<&Details> {
        if self.details.is_empty() {
            None
        } else {
            Some(&self.details)
        }
    }
}

/// Create an [`Error`] with a formatted message.
///
/// ```
/// use errcat::errorf;
///
/// let err = errorf!("err-asdf", "asdf: {}", "fmtme");
/// assert_eq!(err.to_string(), "asdf: fmtme");
/// ```
#[macro_export]
macro_rules! errorf {
    ($category:expr, $($arg:tt)+) => {
        $crate::Error::new($category, ::std::format!($($arg)+))
    };
}
