#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Categories generated from a JSON catalog behave like hand-written ones.

use std::str::FromStr;

use errcat::{CATEGORY_FILTER_REJECTION, Error, Kind, Record, ResultExt, guard};

errcat::declare_categories! {
    path = "tests/fixtures/store_categories.json",
    name = "StoreCategory",
    vis = "pub"
}

#[test]
fn catalog_metadata() {
    assert_eq!(StoreCategory::ALL.len(), 3);
    assert_eq!(StoreCategory::StoreNotFound.code(), "store.not-found");
    assert_eq!(StoreCategory::WriteConflict.title(), "Write conflict");
    assert_eq!(StoreCategory::StoreUnavailable.to_string(), "store.unavailable");
}

#[test]
fn codes_parse_back() {
    for category in StoreCategory::ALL {
        assert_eq!(StoreCategory::from_str(category.code()).unwrap(), *category);
    }
    let err = StoreCategory::from_str("store.gone").unwrap_err();
    assert_eq!(err.to_string(), "unknown StoreCategory code 'store.gone'");
}

#[test]
fn serialized_form_is_the_code() {
    let err = StoreCategory::StoreNotFound.error("no row 7");
    assert_eq!(
        serde_json::to_string(&err).unwrap(),
        r#"{"category":"store.not-found","message":"no row 7"}"#
    );
}

#[test]
fn typed_round_trip_restores_equality() {
    let err = Error::detailed(StoreCategory::WriteConflict, "version 3 != 4", [("table", "users")]);
    let json = serde_json::to_string(&err).unwrap();

    let record: Record<StoreCategory> = serde_json::from_str(&json).unwrap();
    let back = Error::from(record);
    assert_eq!(back.category(), err.category());
    assert_eq!(back.message(), err.message());
    assert_eq!(back.details(), err.details());
}

#[test]
fn generated_kind_works_with_guards() {
    let passed: Result<(), Error> = guard(Kind::of::<StoreCategory>(), || {
        Err(StoreCategory::StoreUnavailable.error("down"))
    });
    assert!(passed.category().is_some_and(|c| c.is(&StoreCategory::StoreUnavailable)));

    let rejected: Result<(), Error> =
        guard(Kind::of::<StoreCategory>(), || Err(Error::new("plain", "x")));
    assert!(rejected.category().is_some_and(|c| c.is(&CATEGORY_FILTER_REJECTION)));
}
