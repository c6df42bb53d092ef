//! Signed launch data handed to the app by its hosting client.
//!
//! The host encodes a flat set of fields as a query string and adds a `hash`
//! field: `HMAC-SHA256(key = HMAC-SHA256("WebAppData", secret), check_string)`
//! rendered as lowercase hex, where `check_string` is every other field as
//! `key=value`, sorted by key and joined with `\n`.
//!
//! Verification only ever answers yes or no. Anything malformed, unsigned or
//! mis-signed is a plain `false`.

use super::hmac::{hmac_sha256, hmac_sha256_hex};
use crate::error::SecurityError;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Field carrying the signature; never part of the signed payload.
pub const HASH_FIELD: &str = "hash";
/// Optional JSON-encoded user object.
pub const USER_FIELD: &str = "user";
/// Unix timestamp the host signed the data at.
pub const AUTH_DATE_FIELD: &str = "auth_date";

const DERIVATION_KEY: &[u8] = b"WebAppData";
/// Tolerated clock drift for `auth_date` values in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Decoded launch-data fields, keyed and ordered by field name.
///
/// Duplicate names keep the last occurrence. `BTreeMap<String, _>` orders
/// keys byte-wise, which is exactly the canonical signing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchData {
    fields: BTreeMap<String, String>,
}

impl LaunchData {
    /// Decode `raw` with standard query-string rules (`&` pairs, `=` split,
    /// percent and `+` decoding). Never fails; garbage simply yields odd fields.
    pub fn parse(raw: &str) -> Self {
        let fields = url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect();
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn hash(&self) -> Option<&str> {
        self.get(HASH_FIELD)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical string the signature covers.
    pub fn check_string(&self) -> String {
        self.fields
            .iter()
            .filter(|(key, _)| key.as_str() != HASH_FIELD)
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Embedded user id, coerced to text. Unauthenticated: only meaningful
    /// after [`verify`] accepted the same input.
    pub fn user_id(&self) -> Option<String> {
        let user: Value = serde_json::from_str(self.get(USER_FIELD)?).ok()?;
        match user.get("id")? {
            Value::Null => None,
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn auth_date(&self) -> Option<i64> {
        self.get(AUTH_DATE_FIELD)?.trim().parse().ok()
    }
}

/// Expected `hash` for `data` under `secret`.
pub fn compute_hash(data: &LaunchData, secret: &str) -> Result<String, SecurityError> {
    if secret.is_empty() {
        return Err(SecurityError::MissingSecret);
    }
    let derived_key = Zeroizing::new(hmac_sha256(DERIVATION_KEY, secret.as_bytes())?);
    hmac_sha256_hex(derived_key.as_slice(), data.check_string().as_bytes())
}

/// Check that `raw` was signed with `secret`.
pub fn verify(raw: &str, secret: &str) -> bool {
    if raw.is_empty() || secret.is_empty() {
        return false;
    }
    verify_parsed(&LaunchData::parse(raw), secret)
}

fn verify_parsed(data: &LaunchData, secret: &str) -> bool {
    let Some(expected) = data.hash() else {
        tracing::debug!("launch data rejected: no hash field");
        return false;
    };

    match compute_hash(data, secret) {
        Ok(candidate) => constant_time_eq(&candidate, expected),
        Err(error) => {
            tracing::warn!(%error, "launch data rejected: signature could not be computed");
            false
        }
    }
}

/// Pull the embedded user id out of `raw`. Performs no authentication.
pub fn extract_user_id(raw: &str) -> Option<String> {
    LaunchData::parse(raw).user_id()
}

/// Build a signed launch-data string the way a host would.
pub fn sign_launch_data<'a, I>(fields: I, secret: &str) -> Result<String, SecurityError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let data = LaunchData {
        fields: fields
            .into_iter()
            .filter(|(key, _)| *key != HASH_FIELD)
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect(),
    };
    let hash = compute_hash(&data, secret)?;

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &data.fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair(HASH_FIELD, &hash);
    Ok(serializer.finish())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verifier bound to one shared secret, with an optional freshness window.
#[derive(Clone)]
pub struct LaunchVerifier {
    secret: Zeroizing<String>,
    max_age: Option<Duration>,
}

impl LaunchVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            max_age: None,
        }
    }

    /// Also require an `auth_date` no older than `max_age`. A zero duration
    /// disables the check.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = (!max_age.is_zero()).then_some(max_age);
        self
    }

    pub fn verify(&self, raw: &str) -> bool {
        self.verify_at(raw, Utc::now().timestamp())
    }

    /// Verified user id, or `None` when the data is rejected or carries no id.
    pub fn authenticated_user_id(&self, raw: &str) -> Option<String> {
        if !self.verify(raw) {
            return None;
        }
        extract_user_id(raw)
    }

    fn verify_at(&self, raw: &str, now: i64) -> bool {
        if raw.is_empty() || self.secret.is_empty() {
            return false;
        }
        let data = LaunchData::parse(raw);
        if !verify_parsed(&data, &self.secret) {
            return false;
        }

        let Some(max_age) = self.max_age else {
            return true;
        };
        let Some(auth_date) = data.auth_date() else {
            tracing::debug!("launch data rejected: freshness required but auth_date missing");
            return false;
        };
        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let age = now.saturating_sub(auth_date);
        if age > max_age_secs || age < -MAX_CLOCK_SKEW_SECS {
            tracing::debug!(age, "launch data rejected: auth_date outside allowed window");
            return false;
        }
        true
    }
}

impl fmt::Debug for LaunchVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchVerifier")
            .field("secret", &"[REDACTED]")
            .field("max_age", &self.max_age)
            .finish()
    }
}
