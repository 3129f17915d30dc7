//! JWT expiry inspection. Signatures are not verified; the claim is only a
//! scheduling hint.

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};

/// Expiry from the token's `exp` claim, if it has one and decodes.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let segment = token.split('.').nth(1)?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD_NO_PAD.decode(segment))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = payload.get("exp")?;
    let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|v| v as i64))?;
    DateTime::from_timestamp(seconds, 0)
}

/// Whether less than `threshold` remains before expiry at `now`.
///
/// Already expired tokens are near expiry; undecodable tokens are not.
pub fn is_near_expiry(token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
    let Some(expiry) = expires_at(token) else {
        tracing::warn!("Could not read token expiry");
        return false;
    };
    let Ok(threshold) = chrono::Duration::from_std(threshold) else {
        return true;
    };
    expiry - now < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn reads_exp_claim() {
        let token = jwt(r#"{"sub":"1","exp":1700000000}"#);
        assert_eq!(expires_at(&token).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn near_expiry_compares_remaining_time() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let soon = jwt(r#"{"exp":1700000100}"#);
        let later = jwt(r#"{"exp":1700003600}"#);
        let past = jwt(r#"{"exp":1699990000}"#);
        let threshold = Duration::from_secs(300);
        assert!(is_near_expiry(&soon, threshold, now));
        assert!(!is_near_expiry(&later, threshold, now));
        assert!(is_near_expiry(&past, threshold, now));
    }

    #[test]
    fn malformed_tokens_are_never_near_expiry() {
        let now = Utc::now();
        let threshold = Duration::from_secs(300);
        let tokens = vec![
            String::new(),
            "opaque".to_string(),
            "a.b".to_string(),
            "a.!!!.c".to_string(),
            jwt("not json"),
            jwt(r#"{"sub":"x"}"#),
        ];
        for token in &tokens {
            assert!(!is_near_expiry(token, threshold, now), "token {token:?}");
        }
    }
}
