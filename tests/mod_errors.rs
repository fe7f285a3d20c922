use mongo_fluent::{BuilderError, StoreError};

#[test]
fn display_strings() {
    assert_eq!(BuilderError::InvalidArgument("x".into()).to_string(), "Invalid argument: x");
    assert_eq!(BuilderError::MissingCollection("get".into()).to_string(), "No collection selected for get");
    assert_eq!(BuilderError::InvalidIdentifier("7".into()).to_string(), "Invalid identifier: 7");
    assert_eq!(BuilderError::IndexError("no keys".into()).to_string(), "Index error: no keys");
    assert_eq!(BuilderError::Config("c".into()).to_string(), "Configuration error: c");
    assert_eq!(BuilderError::InvalidInstance("n".into()).to_string(), "Invalid instance name given: n");
    assert_eq!(BuilderError::Io("disk".into()).to_string(), "I/O error: disk");
}

#[test]
fn remote_wraps_store_errors() {
    let e = BuilderError::remote("insert", StoreError::with_code("E11000 duplicate key", 11000));
    assert_eq!(e.to_string(), "insert failed: E11000 duplicate key");
    match e {
        BuilderError::RemoteOperationFailed { code, .. } => assert_eq!(code, Some(11000)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(StoreError::new("boom").to_string(), "boom");
    assert_eq!(StoreError::new("boom").code, None);
}

#[test]
fn toml_errors_convert() {
    let err: BuilderError = toml::from_str::<toml::Table>("= nope").unwrap_err().into();
    assert!(err.to_string().starts_with("TOML: "));
}
