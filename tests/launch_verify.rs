use std::time::Duration;
use studentio::security::{
    LaunchData, LaunchVerifier, compute_hash, extract_user_id, sign_launch_data, verify,
};

const SECRET: &str = "7000000000:AAF-integration-secret";

fn signed_fixture() -> String {
    sign_launch_data(
        [
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
            ("user", r#"{"id":279058397,"first_name":"Vladislav","language_code":"ru"}"#),
            ("auth_date", "1662771648"),
        ],
        SECRET,
    )
    .expect("signing should succeed")
}

#[test]
fn signed_data_verifies_and_yields_user() {
    let raw = signed_fixture();
    assert!(verify(&raw, SECRET));
    assert_eq!(extract_user_id(&raw).as_deref(), Some("279058397"));
}

#[test]
fn field_order_does_not_matter() {
    let raw = signed_fixture();
    let reordered = raw.split('&').rev().collect::<Vec<_>>().join("&");
    assert!(verify(&reordered, SECRET));
}

#[test]
fn any_single_change_is_rejected() {
    let raw = signed_fixture();
    assert!(!verify(&raw, "another-secret"));
    assert!(!verify(&raw.replace("auth_date=1662771648", "auth_date=1662771649"), SECRET));
    assert!(!verify(&format!("{raw}&extra=1"), SECRET));
    assert!(!verify("", SECRET));
    assert!(!verify(&raw, ""));
}

#[test]
fn hash_matches_parsed_recomputation() {
    let raw = signed_fixture();
    let data = LaunchData::parse(&raw);
    let expected = compute_hash(&data, SECRET).expect("hash should compute");
    assert_eq!(data.hash(), Some(expected.as_str()));
    assert_eq!(expected.len(), 64);
}

#[test]
fn extraction_is_independent_of_signature() {
    assert_eq!(
        extract_user_id("user=%7B%22id%22%3A%22abc%22%7D").as_deref(),
        Some("abc")
    );
    assert_eq!(extract_user_id("user=not-json"), None);
    assert_eq!(extract_user_id("auth_date=1"), None);
}

#[test]
fn verifier_enforces_freshness_when_configured() {
    let raw = signed_fixture();
    let lenient = LaunchVerifier::new(SECRET);
    assert!(lenient.verify(&raw));
    assert_eq!(lenient.authenticated_user_id(&raw).as_deref(), Some("279058397"));

    let strict = LaunchVerifier::new(SECRET).with_max_age(Duration::from_secs(3600));
    assert!(!strict.verify(&raw));
    assert_eq!(strict.authenticated_user_id(&raw), None);
}
