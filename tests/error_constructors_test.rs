use stromspot::error::StromspotError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        StromspotError::config("x"),
        StromspotError::Config { .. }
    ));
    assert!(matches!(
        StromspotError::validation("f", "m"),
        StromspotError::Validation { .. }
    ));
    assert!(matches!(
        StromspotError::auth(Some(401), "x"),
        StromspotError::Authentication { status: Some(401), .. }
    ));
    assert!(matches!(
        StromspotError::network("x"),
        StromspotError::Network { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        StromspotError::timeout("x"),
        StromspotError::Timeout { .. }
    ));
    assert!(matches!(
        StromspotError::upstream_data("x"),
        StromspotError::UpstreamData { .. }
    ));
    assert!(matches!(
        StromspotError::rate_limit("x"),
        StromspotError::RateLimit { .. }
    ));
    assert!(matches!(
        StromspotError::api(Some(500), "x"),
        StromspotError::Api { .. }
    ));
    assert!(matches!(StromspotError::io("x"), StromspotError::Io { .. }));
}

#[test]
fn only_401_counts_as_rejected_token() {
    assert!(StromspotError::auth(Some(401), "x").is_unauthorized());
    assert!(!StromspotError::auth(Some(403), "x").is_unauthorized());
    assert!(!StromspotError::auth(None, "x").is_unauthorized());
    assert!(!StromspotError::api(Some(401), "x").is_unauthorized());
}

#[test]
fn conversions_from_library_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(StromspotError::from(io), StromspotError::Io { .. }));

    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        StromspotError::from(json),
        StromspotError::Serialization { .. }
    ));

    let chrono_err = chrono::DateTime::parse_from_rfc3339("nope").unwrap_err();
    assert!(matches!(
        StromspotError::from(chrono_err),
        StromspotError::UpstreamData { .. }
    ));
}
