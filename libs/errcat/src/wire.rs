//! Serialized form of errors.
//!
//! ```json
//! {"category": "err-asdf", "message": "asdf: fmtme", "details": {"k": "v"}}
//! ```
//!
//! `details` is omitted when empty. The category is written through its own
//! `Serialize` impl. Reading an [`Error`] back keeps the category loosely
//! typed as a `serde_json::Value`; deserialize into [`Record<C>`] instead
//! when the category type is known.

use serde::de::DeserializeOwned;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::category::{Category, CategoryValue};
use crate::error::{Details, Error};

/// Typed wire record of an [`Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<C = serde_json::Value> {
    pub category: C,
    pub message: String,
    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub details: Details,
}

impl<C> Record<C>
where
    C: Category + Clone + DeserializeOwned,
{
    /// Typed view of `err`, or `None` if its category does not fit `C`.
    #[must_use]
    pub fn from_error(err: &Error) -> Option<Self> {
        Some(Self {
            category: err.category().coerce::<C>()?,
            message: err.message().to_owned(),
            details: err.details().clone(),
        })
    }
}

impl<C: Category> From<Record<C>> for Error {
    fn from(record: Record<C>) -> Self {
        Self::from_parts(
            CategoryValue::new(record.category),
            record.message,
            record.details,
        )
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let category = self.category().to_wire().map_err(S::Error::custom)?;
        let has_details = !self.details().is_empty();

        let mut state = serializer.serialize_struct("Error", if has_details { 3 } else { 2 })?;
        state.serialize_field("category", &category)?;
        state.serialize_field("message", self.message())?;
        if has_details {
            state.serialize_field("details", self.details())?;
        } else {
            state.skip_field("details")?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for Error {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Record::<serde_json::Value>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    enum ErrorCategory {
        #[serde(rename = "err-asdf")]
        Asdf,
    }

    #[test]
    fn fixture_bytes() {
        let err = crate::errorf!(ErrorCategory::Asdf, "asdf: {}", "fmtme");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"category":"err-asdf","message":"asdf: fmtme"}"#);
    }

    #[test]
    fn details_are_written_when_present() {
        let err = Error::detailed(ErrorCategory::Asdf, "m", [("k", "v")]);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"category": "err-asdf", "message": "m", "details": {"k": "v"}})
        );
    }

    #[test]
    fn typed_record_restores_equality() {
        let json = r#"{"category":"err-asdf","message":"asdf: fmtme"}"#;
        let record: Record<ErrorCategory> = serde_json::from_str(json).unwrap();
        let err = Error::from(record);
        assert!(err.category().is(&ErrorCategory::Asdf));
        assert_eq!(err.message(), "asdf: fmtme");
        assert!(err.details().is_empty());
    }

    #[test]
    fn loose_error_needs_coercion() {
        let json = r#"{"category":"err-asdf","message":"asdf: fmtme","details":{"k":"v"}}"#;
        let err: Error = serde_json::from_str(json).unwrap();
        assert!(!err.category().is(&ErrorCategory::Asdf));
        assert_eq!(err.category().coerce::<ErrorCategory>(), Some(ErrorCategory::Asdf));

        let typed = Record::<ErrorCategory>::from_error(&err).unwrap();
        assert_eq!(typed.category, ErrorCategory::Asdf);
        assert_eq!(typed.details.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn unknown_category_refuses_to_serialize() {
        let wild: Box<dyn std::error::Error + Send + Sync> = "womp".into();
        let err = crate::prefix_annotate(&wild, "ctx", &[]);
        assert!(err.category().is_unknown());
        assert!(serde_json::to_string(&err).is_err());
    }

    #[test]
    fn record_for_wrong_type_is_none() {
        let err = Error::new(42_u32, "m");
        assert!(Record::<ErrorCategory>::from_error(&err).is_none());
    }
}
