//! Prefix annotation: adding context to an error's message on its way up.

use std::sync::LazyLock;

use crate::category::CategoryValue;
use crate::config::TemplateConfig;
use crate::error::{Details, Error};
use crate::failure::Failure;
use crate::template::{MissingKey, Scope, Transforms, render_or_placeholder};

/// Separator between the rendered prefix and the original message.
pub const SEPARATOR: &str = ": ";

static DEFAULT_ANNOTATOR: LazyLock<Annotator> = LazyLock::new(Annotator::default);

/// Renders annotation templates and builds annotated errors.
///
/// Holds the transform table and the missing-variable policy; the free
/// function [`prefix_annotate`] uses the defaults.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    transforms: Transforms,
    missing_key: MissingKey,
}

impl Annotator {
    #[must_use]
    pub fn new(transforms: Transforms, missing_key: MissingKey) -> Self {
        Self {
            transforms,
            missing_key,
        }
    }

    #[must_use]
    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(Transforms::default(), config.missing_key)
    }

    #[must_use]
    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    /// Build a new error whose message is `rendered + ": " + original`.
    ///
    /// Only `extra` is visible to the template; the original error's details
    /// are not. Template failures never fail the call, they are rendered
    /// into the prefix as `[[<error>]]`.
    ///
    /// Details of the result are the original details plus `extra`; when a
    /// key exists on both sides the original value is kept.
    ///
    /// A failure that does not conform to [`Categorized`](crate::Categorized) is annotated as an
    /// error of [`CategoryValue::UNKNOWN`] with an empty message.
    pub fn annotate<F: Failure + ?Sized>(
        &self,
        err: &F,
        template: &str,
        extra: &[(&str, &str)],
    ) -> Error {
        let conforming = err.as_categorized();
        let (category, message, original) = match conforming {
            Some(e) => (e.category(), e.message(), e.details()),
            None => (CategoryValue::UNKNOWN, "", None),
        };

        let scope = Scope::from_pairs(extra);
        let prefix = render_or_placeholder(template, &scope, &self.transforms, self.missing_key);

        let mut details = original.cloned().unwrap_or_default();
        merge_missing(&mut details, extra);

        Error::from_parts(category, format!("{prefix}{SEPARATOR}{message}"), details)
    }
}

// Reverse order so that a key repeated in `extra` keeps its last value.
fn merge_missing(details: &mut Details, extra: &[(&str, &str)]) {
    for (k, v) in extra.iter().rev() {
        details
            .entry((*k).to_owned())
            .or_insert_with(|| (*v).to_owned());
    }
}

/// Annotate an error with the default [`Annotator`].
///
/// ```
/// use errcat::{prefix_annotate, Error};
///
/// let err = Error::detailed("err-asdf", "a msg", [("deta", "il")]);
/// let err = prefix_annotate(&err, "using {{.tmpl|quote}}", &[("tmpl", "templated details")]);
/// assert_eq!(err.to_string(), "using \"templated details\": a msg");
/// assert_eq!(err.details().len(), 2);
/// ```
pub fn prefix_annotate<F: Failure + ?Sized>(
    err: &F,
    template: &str,
    extra: &[(&str, &str)],
) -> Error {
    DEFAULT_ANNOTATOR.annotate(err, template, extra)
}
