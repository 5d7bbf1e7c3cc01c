//! Header Codec: Base64-encoded JSON in x402 HTTP headers.
//!
//! This module is the only place that knows how typed messages travel in
//! `PAYMENT-SIGNATURE`/`X-PAYMENT`, `PAYMENT-REQUIRED` and
//! `PAYMENT-RESPONSE`. All functions fail with an error value on malformed
//! input; none panic.

use base64::prelude::*;
use r402::proto::{SettleResponse, VersionedPayload, VersionedPaymentRequired};
use serde::Serialize;

use crate::error::{DecodeError, EncodeError};

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodeError> {
    let json = serde_json::to_vec(value)?;
    Ok(BASE64_STANDARD.encode(json))
}

fn decode_json(header_value: &str) -> Result<serde_json::Value, DecodeError> {
    let bytes = BASE64_STANDARD.decode(header_value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encodes a 402 response for the `PAYMENT-REQUIRED` header.
///
/// # Errors
///
/// Returns [`EncodeError`] if JSON serialization fails.
pub fn encode_payment_required(
    required: &VersionedPaymentRequired,
) -> Result<String, EncodeError> {
    encode_json(required)
}

/// Decodes a `PAYMENT-REQUIRED` header value.
///
/// # Errors
///
/// Returns [`DecodeError`] on Base64, JSON or structural failure.
pub fn decode_payment_required(
    header_value: &str,
) -> Result<VersionedPaymentRequired, DecodeError> {
    Ok(VersionedPaymentRequired::from_json(decode_json(header_value)?)?)
}

/// Encodes a payment payload for the `PAYMENT-SIGNATURE` header.
///
/// # Errors
///
/// Returns [`EncodeError`] if JSON serialization fails.
pub fn encode_payment_payload(payload: &VersionedPayload) -> Result<String, EncodeError> {
    encode_json(payload)
}

/// Decodes a `PAYMENT-SIGNATURE` or `X-PAYMENT` header value. Both V1 and
/// V2 payload shapes are accepted; the `x402Version` field selects one.
///
/// # Errors
///
/// Returns [`DecodeError`] on invalid encoding or a structurally incomplete
/// payload.
pub fn decode_payment_payload(header_value: &str) -> Result<VersionedPayload, DecodeError> {
    Ok(VersionedPayload::from_json(decode_json(header_value)?)?)
}

/// Encodes a settlement receipt for the `PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`EncodeError`] if JSON serialization fails.
pub fn encode_settle_response(response: &SettleResponse) -> Result<String, EncodeError> {
    encode_json(response)
}

/// Decodes a `PAYMENT-RESPONSE` header value.
///
/// # Errors
///
/// Returns [`DecodeError`] on Base64 or JSON failure.
pub fn decode_settle_response(header_value: &str) -> Result<SettleResponse, DecodeError> {
    Ok(serde_json::from_value(decode_json(header_value)?)?)
}
