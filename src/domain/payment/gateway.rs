//! Payment gateway adapter.
//!
//! Turns provider callbacks into canonical `PaymentEvent`s. Every callback
//! passes the shared-secret check before its content is looked at.
//!
//! Two shapes are understood:
//!
//! - Generic JSON webhook, signed with `X-Webhook-Signature: sha256=<hex>`
//!   (HMAC-SHA256 of the raw body keyed by the webhook secret).
//! - Multi-channel dialect: a flat query string carrying the anti-phishing
//!   `key` and exactly one method field group. Groups are tried in a fixed
//!   priority order: reference pair, mobile push, mandate.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value as JsonValue};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::webhook_errors::WebhookError;
use super::{PaymentEvent, PaymentEventStatus, PaymentMethod};

/// Header carrying the generic webhook signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Status assumed when a dialect callback carries none: the provider only
/// calls back once the payer has paid.
const DIALECT_DEFAULT_STATUS: &str = "paid";

/// Checks callback authenticity against the configured secrets.
pub struct SharedSecretVerifier {
    webhook_secret: SecretString,
    anti_phishing_key: SecretString,
}

impl SharedSecretVerifier {
    pub fn new(webhook_secret: SecretString, anti_phishing_key: SecretString) -> Self {
        Self {
            webhook_secret,
            anti_phishing_key,
        }
    }

    /// Verifies a `sha256=<hex>` signature over the raw body.
    pub fn verify_signature(&self, body: &[u8], header: Option<&str>) -> Result<(), WebhookError> {
        let header = header.ok_or(WebhookError::InvalidSignature)?.trim();
        let hex_sig = header
            .strip_prefix(SIGNATURE_PREFIX)
            .unwrap_or(header);
        let provided = hex::decode(hex_sig).map_err(|_| WebhookError::InvalidSignature)?;

        let expected = self.compute_signature(body)?;
        if !constant_time_compare(&expected, &provided) {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    /// Verifies the anti-phishing key sent by the dialect callback.
    pub fn verify_key(&self, key: Option<&str>) -> Result<(), WebhookError> {
        let key = key.ok_or(WebhookError::InvalidKey)?;
        let expected = self.anti_phishing_key.expose_secret();
        if expected.is_empty() || !constant_time_compare(expected.as_bytes(), key.as_bytes()) {
            return Err(WebhookError::InvalidKey);
        }
        Ok(())
    }

    fn compute_signature(&self, body: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

// ════════════════════════════════════════════════════════════════
// Generic JSON webhook
// ════════════════════════════════════════════════════════════════

fn string_field(obj: &Map<String, JsonValue>, name: &str) -> Option<String> {
    match obj.get(name)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalizes a generic webhook body. The signature must already be verified.
pub fn normalize_generic(body: &[u8]) -> Result<PaymentEvent, WebhookError> {
    let payload: JsonValue =
        serde_json::from_slice(body).map_err(|e| WebhookError::ParseError(e.to_string()))?;
    let obj = payload
        .as_object()
        .ok_or_else(|| WebhookError::ParseError("expected a JSON object".to_string()))?;

    let external_payment_id = string_field(obj, "payment_id")
        .or_else(|| string_field(obj, "external_payment_id"))
        .ok_or(WebhookError::MissingField("payment_id"))?;
    let raw_status = string_field(obj, "status").ok_or(WebhookError::MissingField("status"))?;
    let reason = string_field(obj, "reason");

    Ok(PaymentEvent {
        external_payment_id: Some(external_payment_id),
        request_id: None,
        order_id: None,
        status: PaymentEventStatus::from_provider(&raw_status),
        raw_status,
        reason,
        method: None,
        raw_payload: payload,
    })
}

// ════════════════════════════════════════════════════════════════
// Dialect callback
// ════════════════════════════════════════════════════════════════

/// Method-specific field group identified in a dialect callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFields {
    ReferencePair { entity: String, reference: String },
    MobilePush { mobile_number: String },
    Mandate { mandate_reference: String },
}

impl MethodFields {
    pub fn method(&self) -> PaymentMethod {
        match self {
            MethodFields::ReferencePair { .. } => PaymentMethod::ReferencePair,
            MethodFields::MobilePush { .. } => PaymentMethod::MobilePush,
            MethodFields::Mandate { .. } => PaymentMethod::Mandate,
        }
    }
}

/// Flat query-string parameters of a dialect callback.
pub type Params = HashMap<String, String>;

fn param(params: &Params, name: &str) -> Option<String> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn reference_pair(params: &Params) -> Option<MethodFields> {
    Some(MethodFields::ReferencePair {
        entity: param(params, "entity")?,
        reference: param(params, "reference")?,
    })
}

fn mobile_push(params: &Params) -> Option<MethodFields> {
    Some(MethodFields::MobilePush {
        mobile_number: param(params, "mobileNumber")?,
    })
}

fn mandate(params: &Params) -> Option<MethodFields> {
    Some(MethodFields::Mandate {
        mandate_reference: param(params, "mandateReference")?,
    })
}

/// Field-group parsers in priority order.
const METHOD_DECODERS: [fn(&Params) -> Option<MethodFields>; 3] =
    [reference_pair, mobile_push, mandate];

/// A decoded dialect callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectCallback {
    pub method: MethodFields,
    pub request_id: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<String>,
    pub status: Option<String>,
}

impl DialectCallback {
    /// Decodes the query parameters. The key must already be verified.
    pub fn decode(params: &Params) -> Result<Self, WebhookError> {
        let method = METHOD_DECODERS
            .iter()
            .find_map(|decode| decode(params))
            .ok_or(WebhookError::UnrecognizedCallback)?;

        let request_id = param(params, "requestId");
        let order_id = param(params, "orderId");
        if request_id.is_none() && order_id.is_none() {
            return Err(WebhookError::MissingField("requestId"));
        }

        Ok(Self {
            method,
            request_id,
            order_id,
            amount: param(params, "amount"),
            status: param(params, "status"),
        })
    }

    /// Builds the canonical event. The anti-phishing key is not kept in the
    /// raw payload.
    pub fn into_event(self, params: &Params) -> PaymentEvent {
        let mut raw = Map::new();
        for (k, v) in params {
            if k != "key" {
                raw.insert(k.clone(), JsonValue::String(v.clone()));
            }
        }

        let raw_status = self
            .status
            .unwrap_or_else(|| DIALECT_DEFAULT_STATUS.to_string());

        PaymentEvent {
            external_payment_id: None,
            request_id: self.request_id,
            order_id: self.order_id,
            status: PaymentEventStatus::from_provider(&raw_status),
            raw_status,
            reason: None,
            method: Some(self.method.method()),
            raw_payload: JsonValue::Object(raw),
        }
    }
}

/// Verifies and normalizes callbacks of both shapes.
pub struct PaymentGateway {
    verifier: SharedSecretVerifier,
}

impl PaymentGateway {
    pub fn new(verifier: SharedSecretVerifier) -> Self {
        Self { verifier }
    }

    pub fn generic(&self, body: &[u8], signature: Option<&str>) -> Result<PaymentEvent, WebhookError> {
        self.verifier.verify_signature(body, signature)?;
        normalize_generic(body)
    }

    pub fn dialect(&self, params: &Params) -> Result<PaymentEvent, WebhookError> {
        self.verifier.verify_key(params.get("key").map(String::as_str))?;
        let callback = DialectCallback::decode(params)?;
        Ok(callback.into_event(params))
    }
}

/// Computes a `sha256=<hex>` signature header value.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret_12345";
    const KEY: &str = "anti-phishing-key-123";

    fn gateway() -> PaymentGateway {
        PaymentGateway::new(SharedSecretVerifier::new(
            SecretString::new(SECRET.to_string()),
            SecretString::new(KEY.to_string()),
        ))
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ══════════════════════════════════════════════════════════════
    // Signature and key checks
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"payment_id":"p1","status":"paid"}"#;
        let sig = compute_test_signature(SECRET, body);
        assert!(gateway().generic(body, Some(&sig)).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = br#"{"payment_id":"p1","status":"paid"}"#;
        let sig = compute_test_signature(SECRET, body);
        let result = gateway().generic(br#"{"payment_id":"p2","status":"paid"}"#, Some(&sig));
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn missing_or_garbage_signature_is_rejected() {
        let body = br#"{}"#;
        assert_eq!(gateway().generic(body, None).unwrap_err(), WebhookError::InvalidSignature);
        assert_eq!(
            gateway().generic(body, Some("sha256=zz")).unwrap_err(),
            WebhookError::InvalidSignature
        );
    }

    #[test]
    fn signature_is_checked_before_parsing() {
        let result = gateway().generic(b"not json", Some("sha256=00"));
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn wrong_key_is_rejected_before_decoding() {
        let result = gateway().dialect(&params(&[("key", "nope")]));
        assert_eq!(result.unwrap_err(), WebhookError::InvalidKey);

        let result = gateway().dialect(&params(&[]));
        assert_eq!(result.unwrap_err(), WebhookError::InvalidKey);
    }

    #[test]
    fn empty_configured_key_rejects_everything() {
        let verifier = SharedSecretVerifier::new(
            SecretString::new(SECRET.to_string()),
            SecretString::new(String::new()),
        );
        assert_eq!(verifier.verify_key(Some("")), Err(WebhookError::InvalidKey));
    }

    // ══════════════════════════════════════════════════════════════
    // Generic normalization
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn generic_accepts_either_id_field() {
        let event = normalize_generic(br#"{"external_payment_id":"p9","status":"failed","reason":"declined"}"#)
            .unwrap();
        assert_eq!(event.external_payment_id.as_deref(), Some("p9"));
        assert_eq!(event.status, PaymentEventStatus::Failed);
        assert_eq!(event.reason.as_deref(), Some("declined"));
    }

    #[test]
    fn generic_unknown_status_is_pending() {
        let event = normalize_generic(br#"{"payment_id":"p1","status":"chargeback_opened"}"#).unwrap();
        assert_eq!(event.status, PaymentEventStatus::Pending);
        assert_eq!(event.raw_status, "chargeback_opened");
    }

    #[test]
    fn generic_requires_id_and_status() {
        assert_eq!(
            normalize_generic(br#"{"status":"paid"}"#).unwrap_err(),
            WebhookError::MissingField("payment_id")
        );
        assert_eq!(
            normalize_generic(br#"{"payment_id":"p1"}"#).unwrap_err(),
            WebhookError::MissingField("status")
        );
        assert!(matches!(
            normalize_generic(b"[1,2]").unwrap_err(),
            WebhookError::ParseError(_)
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Dialect decoding
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn reference_pair_takes_priority() {
        let p = params(&[
            ("entity", "11604"),
            ("reference", "999999999"),
            ("mobileNumber", "912345678"),
            ("requestId", "r1"),
        ]);
        let callback = DialectCallback::decode(&p).unwrap();
        assert_eq!(callback.method.method(), PaymentMethod::ReferencePair);
    }

    #[test]
    fn half_reference_pair_falls_through_to_next_group() {
        let p = params(&[("entity", "11604"), ("mandateReference", "M-1"), ("orderId", "o1")]);
        let callback = DialectCallback::decode(&p).unwrap();
        assert_eq!(
            callback.method,
            MethodFields::Mandate {
                mandate_reference: "M-1".to_string()
            }
        );
    }

    #[test]
    fn no_method_group_is_unrecognized() {
        let p = params(&[("requestId", "r1"), ("amount", "10.00")]);
        assert_eq!(
            DialectCallback::decode(&p).unwrap_err(),
            WebhookError::UnrecognizedCallback
        );
    }

    #[test]
    fn missing_identifiers_are_rejected() {
        let p = params(&[("mobileNumber", "912345678")]);
        assert_eq!(
            DialectCallback::decode(&p).unwrap_err(),
            WebhookError::MissingField("requestId")
        );
    }

    #[test]
    fn dialect_event_defaults_to_paid_and_drops_key() {
        let p = params(&[
            ("key", KEY),
            ("mobileNumber", "912345678"),
            ("requestId", "r1"),
            ("amount", "20.00"),
        ]);

        let event = gateway().dialect(&p).unwrap();

        assert_eq!(event.status, PaymentEventStatus::Completed);
        assert_eq!(event.method, Some(PaymentMethod::MobilePush));
        assert_eq!(event.request_id.as_deref(), Some("r1"));
        assert!(event.raw_payload.get("key").is_none());
        assert_eq!(event.raw_payload["amount"], "20.00");
    }

    #[test]
    fn dialect_explicit_status_is_honoured() {
        let p = params(&[
            ("key", KEY),
            ("mandateReference", "M-1"),
            ("orderId", "o1"),
            ("status", "rejected"),
        ]);
        let event = gateway().dialect(&p).unwrap();
        assert_eq!(event.status, PaymentEventStatus::Failed);
    }
}
