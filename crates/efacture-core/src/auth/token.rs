use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT segments may arrive with or without `=` padding.
const LENIENT_PADDING: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT_PADDING);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT_PADDING);

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token: expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("Malformed token payload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Malformed token payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Token payload has no numeric exp claim")]
    MissingExpiration,

    #[error("Token exp claim out of range: {0}")]
    ExpirationOutOfRange(f64),
}

/// Decode the `exp` claim of a three-segment JWT without verifying its
/// signature. The platform is the only party that validates the token.
pub fn decode_expiration(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Segments(segments.len()));
    }

    let raw = URL_SAFE_LENIENT
        .decode(segments[1])
        .or_else(|_| STANDARD_LENIENT.decode(segments[1]))?;
    let payload: serde_json::Value = serde_json::from_slice(&raw)?;

    let exp = payload
        .get("exp")
        .and_then(serde_json::Value::as_f64)
        .ok_or(TokenError::MissingExpiration)?;

    let millis = exp * 1000.0;
    if !millis.is_finite() {
        return Err(TokenError::ExpirationOutOfRange(exp));
    }
    DateTime::<Utc>::from_timestamp_millis(millis.trunc() as i64)
        .ok_or(TokenError::ExpirationOutOfRange(exp))
}

/// Bearer token record, one per subscription.
///
/// Serialized with the token store's column layout; `expires_at` is written
/// as ISO-8601 with milliseconds (`2023-11-14T22:13:20.000Z`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub subscription_id: String,
    pub login: String,
    pub token: String,
    #[serde(with = "iso_millis")]
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Build the record for a freshly issued token. Fails if the token's
    /// expiration claim cannot be read.
    pub fn from_token(
        subscription_id: impl Into<String>,
        login: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let token = token.into();
        let expires_at = decode_expiration(&token)?;
        Ok(Self {
            subscription_id: subscription_id.into(),
            login: login.into(),
            token,
            expires_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::utils::format_timestamp;

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jwt_with_payload(payload: &str) -> String {
        let header = URL_SAFE_LENIENT.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_LENIENT.encode(payload);
        format!("{}.{}.signature", header.trim_end_matches('='), body.trim_end_matches('='))
    }

    #[test]
    fn test_decode_expiration_integer_claim() {
        let token = jwt_with_payload(r#"{"sub":"alice","exp":1700000000}"#);
        let expires_at = decode_expiration(&token).unwrap();
        assert_eq!(expires_at, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn test_decode_expiration_fractional_claim() {
        let token = jwt_with_payload(r#"{"exp":1700000000.5}"#);
        let expires_at = decode_expiration(&token).unwrap();
        assert_eq!(expires_at.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_decode_expiration_standard_padded_alphabet() {
        // Payload chosen so standard base64 contains '+' and padding.
        let payload = r#"{"exp":1700000000,"n":">>>"}"#;
        let body = STANDARD_LENIENT.encode(payload);
        let token = format!("h.{}.s", body);
        assert!(decode_expiration(&token).is_ok());
    }

    #[test]
    fn test_decode_expiration_rejects_wrong_segment_count() {
        assert!(matches!(decode_expiration("abc"), Err(TokenError::Segments(1))));
        assert!(matches!(decode_expiration("a.b.c.d"), Err(TokenError::Segments(4))));
    }

    #[test]
    fn test_decode_expiration_rejects_bad_payload() {
        assert!(matches!(decode_expiration("a.!!!.c"), Err(TokenError::Encoding(_))));

        let not_json = format!("a.{}.c", URL_SAFE_LENIENT.encode("not json"));
        assert!(matches!(decode_expiration(&not_json), Err(TokenError::Payload(_))));

        let no_exp = jwt_with_payload(r#"{"sub":"alice"}"#);
        assert!(matches!(decode_expiration(&no_exp), Err(TokenError::MissingExpiration)));

        let string_exp = jwt_with_payload(r#"{"exp":"soon"}"#);
        assert!(matches!(decode_expiration(&string_exp), Err(TokenError::MissingExpiration)));
    }

    #[test]
    fn test_auth_token_serializes_store_layout() {
        let token = jwt_with_payload(r#"{"exp":1700000000}"#);
        let record = AuthToken::from_token("sub-1", "alice", token.clone()).unwrap();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["subscription_id"], "sub-1");
        assert_eq!(value["login"], "alice");
        assert_eq!(value["token"], token.as_str());
        assert_eq!(value["expires_at"], "2023-11-14T22:13:20.000Z");

        let back: AuthToken = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_auth_token_reads_postgres_offset_timestamp() {
        let json = r#"{"subscription_id":"s","login":"l","token":"t","expires_at":"2023-11-14T22:13:20+00:00"}"#;
        let record: AuthToken = serde_json::from_str(json).unwrap();
        assert_eq!(record.expires_at, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn test_is_expired_at() {
        let token = jwt_with_payload(r#"{"exp":1700000000}"#);
        let record = AuthToken::from_token("sub-1", "alice", token).unwrap();
        assert!(!record.is_expired_at(Utc.timestamp_opt(1_699_999_999, 0).unwrap()));
        assert!(record.is_expired_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        assert!(record.is_expired());
        assert_eq!(record.minutes_until_expiry(), 0);
    }
}
