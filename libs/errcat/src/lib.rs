#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Categorized errors.
//!
//! Every [`Error`] carries a *category*: a caller-defined, comparable,
//! serializable tag meant to be branched on, next to a human-readable
//! message and optional key/value details. The crate provides
//!
//! * construction ([`Error::new`], [`Error::detailed`], [`errorf!`]),
//! * inspection of arbitrary failures ([`category`], [`details`]),
//! * context prefixes rendered from small templates ([`prefix_annotate`]),
//! * re-labelling across layers ([`recategorize`]),
//! * boundary assertions that rewrite errors of an unexpected category kind
//!   ([`guard`], [`require_category`]),
//! * a stable JSON form ([`wire`]).
//!
//! ```
//! use errcat::{guard, Error, Kind, ResultExt};
//! use serde::Serialize;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
//! enum StoreCategory {
//!     #[serde(rename = "store-missing")]
//!     Missing,
//! }
//!
//! fn load(id: &str) -> Result<String, Error> {
//!     guard(Kind::of::<StoreCategory>(), || {
//!         Err(errcat::errorf!(StoreCategory::Missing, "no row {id}"))
//!     })
//! }
//!
//! let err = load("7").annotate("loading user", &[("id", "7")]).unwrap_err();
//! assert!(err.category().is(&StoreCategory::Missing));
//! assert_eq!(err.to_string(), "loading user: no row 7");
//! ```

pub mod annotate;
pub mod boundary;
pub mod category;
pub mod config;
pub mod error;
pub mod ext;
pub mod failure;
pub mod template;
pub mod wire;

pub use annotate::{Annotator, SEPARATOR, prefix_annotate};
pub use boundary::{
    Boundary, Verdict, guard, guard_or_panic, require_category, require_category_or_panic,
};
pub use category::{
    CATEGORY_FILTER_REJECTION, Category, CategoryValue, ErrcatCategory, Kind, UnknownCode,
};
pub use config::{BoundaryConfig, ConfigError, ErrcatConfig, LocationStyle, TemplateConfig};
pub use error::{Categorized, Details, Error};
pub use ext::ResultExt;
pub use failure::{Failure, category, details, recategorize};
pub use template::{MissingKey, Template, TemplateError, Transform, Transforms};
pub use wire::Record;

#[cfg(feature = "macros")]
pub use errcat_macros::declare_categories;

// Used by code generated from `declare_categories!`.
#[doc(hidden)]
pub mod __private {
    pub use serde;
}
