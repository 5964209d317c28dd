//! Process-Wide Authorized Types Tests
//!
//! The process-wide set is fixed once, so these run in their own test binary.

use aerokit::schema::{decl, AuthorizedTypes, TypeTag};
use aerokit::{Document, DocumentClass, Value};

/// An installed set replaces the default for every class built afterwards.
#[test]
fn test_installed_set_applies_to_new_classes() {
    let installed = AuthorizedTypes::default().with(TypeTag::Set);
    assert!(installed.clone().install().is_ok());
    assert_eq!(AuthorizedTypes::global(), &installed);

    // fixed after the first install
    let rejected = AuthorizedTypes::default().install().unwrap_err();
    assert_eq!(rejected, AuthorizedTypes::default());
    assert!(AuthorizedTypes::global().contains(TypeTag::Set));

    let class = DocumentClass::builder("Tags")
        .structure(decl::map([("tags", TypeTag::Set)]))
        .build()
        .unwrap();
    assert!(class.authorized().contains(TypeTag::Set));

    let mut doc = Document::new(&class);
    doc.set("tags", Value::set(vec![1.into(), 2.into()])).unwrap();
    assert!(doc.validate().is_ok());

    // an explicit per-class set still wins
    let err = DocumentClass::builder("Strict")
        .authorized_types(AuthorizedTypes::default())
        .structure(decl::map([("tags", TypeTag::Set)]))
        .build()
        .unwrap_err();
    assert!(err.message.contains("not an authorized type"));
}
