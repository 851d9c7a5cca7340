//! Expiry inspection for bearer tokens.
//!
//! Tokens are treated as opaque except for the `exp` claim (epoch seconds) in
//! the payload segment. No signature is checked. Anything that cannot be read
//! counts as expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: Option<serde_json::Number>,
}

pub struct TokenInspector;

impl TokenInspector {
    /// Decode the `exp` claim, or `None` if the token is malformed.
    pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
        let mut segments = token.split('.');
        let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
        if segments.next().is_some() {
            return None;
        }

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
        let exp = claim.exp?;
        let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f.floor() as i64))?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Whether `token` stays usable for at least `buffer` from now.
    pub fn is_fresh(token: &str, buffer: Duration) -> bool {
        Self::is_fresh_at(token, buffer, Utc::now())
    }

    pub fn is_fresh_at(token: &str, buffer: Duration, now: DateTime<Utc>) -> bool {
        match Self::expiry(token) {
            Some(expiry) => now < expiry - buffer,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::token_with_payload;

    fn token_expiring_at(exp: i64) -> String {
        token_with_payload(&serde_json::json!({ "exp": exp, "user_id": 7 }))
    }

    #[test]
    fn test_expiry_decodes_claim() {
        let token = token_expiring_at(1_800_000_000);
        assert_eq!(
            TokenInspector::expiry(&token),
            DateTime::from_timestamp(1_800_000_000, 0)
        );
    }

    #[test]
    fn test_malformed_tokens_are_never_fresh() {
        let buffer = Duration::minutes(5);
        let far_future = token_expiring_at(4_000_000_000);
        let payload_only = far_future.split('.').nth(1).unwrap().to_string();

        let bad = [
            String::new(),
            "not-a-token".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            "header.%%%.sig".to_string(),
            format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json")),
            token_with_payload(&serde_json::json!({ "sub": "no-exp" })),
            token_with_payload(&serde_json::json!({ "exp": "soon" })),
            token_with_payload(&serde_json::json!({ "exp": null })),
            payload_only,
        ];
        for token in &bad {
            assert!(!TokenInspector::is_fresh(token, buffer), "{token:?} should not be fresh");
        }
        assert!(TokenInspector::is_fresh(&far_future, buffer));
    }

    #[test]
    fn test_buffer_boundary() {
        let expiry = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let token = token_expiring_at(expiry.timestamp());
        let buffer = Duration::minutes(5);
        let threshold = expiry - buffer;

        assert!(TokenInspector::is_fresh_at(&token, buffer, threshold - Duration::seconds(1)));
        assert!(!TokenInspector::is_fresh_at(&token, buffer, threshold));
        assert!(!TokenInspector::is_fresh_at(&token, buffer, threshold + Duration::seconds(1)));
        assert!(!TokenInspector::is_fresh_at(&token, buffer, expiry));
        assert!(!TokenInspector::is_fresh_at(&token, buffer, expiry + Duration::hours(1)));
    }

    #[test]
    fn test_fractional_and_padded_claims() {
        let token = token_with_payload(&serde_json::json!({ "exp": 1_800_000_000.75 }));
        assert_eq!(
            TokenInspector::expiry(&token).map(|t| t.timestamp()),
            Some(1_800_000_000)
        );

        let mut parts: Vec<String> = token_expiring_at(1_800_000_000)
            .split('.')
            .map(str::to_string)
            .collect();
        parts[1].push_str("==");
        assert!(TokenInspector::expiry(&parts.join(".")).is_some());
    }
}
