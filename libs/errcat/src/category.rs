//! Category tags, their kinds, and the type-erased holder stored in errors.
//!
//! A category is any `'static` value that can be compared, debug-printed and
//! serialized. Categories are open: each package declares its own category
//! type, and errors carry them type-erased in a [`CategoryValue`]. The
//! [`Kind`] of a category is its concrete Rust type, which is what the
//! boundary assertion compares.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A comparable, serializable error category.
///
/// Implemented automatically for every `'static` type that is
/// `PartialEq + Debug + Serialize + Send + Sync`; there is nothing to
/// implement by hand. Typical categories are fieldless enums or string
/// newtypes.
pub trait Category: Any + fmt::Debug + Send + Sync {
    /// The kind (concrete type) of this category.
    fn kind(&self) -> Kind;

    /// Value equality against another, possibly differently typed, category.
    fn dyn_eq(&self, other: &dyn Category) -> bool;

    /// The serialized form of this category.
    ///
    /// # Errors
    /// Returns the serializer error if the category cannot be represented
    /// as JSON.
    fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;
}

impl<T> Category for T
where
    T: PartialEq + fmt::Debug + Serialize + Send + Sync + 'static,
{
    fn kind(&self) -> Kind {
        Kind::of::<T>()
    }

    fn dyn_eq(&self, other: &dyn Category) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The kind of a category: its concrete type.
///
/// Two categories have the same kind exactly when they have the same Rust
/// type, regardless of their values.
#[derive(Clone, Copy)]
pub struct Kind {
    id: TypeId,
    name: &'static str,
}

impl Kind {
    #[must_use]
    pub fn of<C: Category>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    /// The kind of `category`'s type.
    #[must_use]
    pub fn of_val<C: Category>(_category: &C) -> Self {
        Self::of::<C>()
    }

    /// The kind of the [`CategoryValue::UNKNOWN`] sentinel.
    ///
    /// Crate-private: it is not a category contract, and boundary checks
    /// reject uncategorized failures whatever kind they expect.
    #[must_use]
    pub(crate) fn unknown() -> Self {
        Self {
            id: TypeId::of::<UnknownMarker>(),
            name: "errcat::Unknown",
        }
    }

    /// Fully qualified type name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Kind {}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

struct UnknownMarker;

#[derive(Clone)]
enum Repr {
    Known(Arc<dyn Category>),
    Unknown,
}

/// A type-erased category as carried by an error.
///
/// Cloning is cheap; the underlying category is shared and never mutated.
#[derive(Clone)]
pub struct CategoryValue(Repr);

impl CategoryValue {
    /// Sentinel for failures that carry no category at all.
    ///
    /// Equal only to itself, never to a real category, and refuses to be
    /// serialized.
    pub const UNKNOWN: Self = Self(Repr::Unknown);

    #[must_use]
    pub fn new<C: Category>(category: C) -> Self {
        Self(Repr::Known(Arc::new(category)))
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match &self.0 {
            Repr::Known(c) => c.kind(),
            Repr::Unknown => Kind::unknown(),
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self.0, Repr::Unknown)
    }

    /// Whether this holds a category of kind `C` (any value).
    #[must_use]
    pub fn is_kind<C: Category>(&self) -> bool {
        self.kind() == Kind::of::<C>()
    }

    /// Value comparison against a concrete category.
    #[must_use]
    pub fn is<C: Category>(&self, category: &C) -> bool {
        self.downcast_ref::<C>()
            .is_some_and(|held| held.dyn_eq(category))
    }

    /// Typed access to the held category, for `match`ing on it.
    #[must_use]
    pub fn downcast_ref<C: Category>(&self) -> Option<&C> {
        match &self.0 {
            Repr::Known(c) => c.as_any().downcast_ref::<C>(),
            Repr::Unknown => None,
        }
    }

    /// Recovers a typed category from a loosely typed one.
    ///
    /// Categories read back from the wire are held as `serde_json::Value`;
    /// this re-reads their serialized form as `C`. Returns `None` for the
    /// unknown sentinel or when the serialized form does not fit `C`.
    #[must_use]
    pub fn coerce<C: Category + Clone + DeserializeOwned>(&self) -> Option<C> {
        if let Some(typed) = self.downcast_ref::<C>() {
            return Some(typed.clone());
        }
        let wire = self.to_wire().ok()?;
        serde_json::from_value(wire).ok()
    }

    /// The serialized form of the held category.
    ///
    /// # Errors
    /// Fails for [`CategoryValue::UNKNOWN`], which is never persisted, and
    /// when the category's own serialization fails.
    pub fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error> {
        match &self.0 {
            Repr::Known(c) => c.to_wire(),
            Repr::Unknown => Err(serde::ser::Error::custom(
                "the unknown category sentinel cannot be serialized",
            )),
        }
    }
}

impl PartialEq for CategoryValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Known(a), Repr::Known(b)) => a.dyn_eq(b.as_ref()),
            (Repr::Unknown, Repr::Unknown) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Known(c) => fmt::Debug::fmt(c.as_ref(), f),
            Repr::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Categories produced by errcat itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrcatCategory {
    /// A boundary assertion caught an error of an unexpected kind.
    #[serde(rename = "errcat-category-filter-rejection")]
    CategoryFilterRejection,
}

impl ErrcatCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryFilterRejection => "errcat-category-filter-rejection",
        }
    }
}

impl fmt::Display for ErrcatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of every error rewritten by a boundary assertion.
pub const CATEGORY_FILTER_REJECTION: ErrcatCategory = ErrcatCategory::CategoryFilterRejection;

/// A code that is not part of a category catalog.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {catalog} code '{code}'")]
pub struct UnknownCode {
    pub catalog: &'static str,
    pub code: String,
}
