//! HTTP-specific constants for the x402 protocol.

/// Canonical request header carrying the payment payload (client → server).
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Legacy alias of [`PAYMENT_SIGNATURE_HEADER`].
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying V2 payment requirements (server → client).
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// Response header carrying the settlement receipt (server → client).
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// CORS header name for exposing custom headers.
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";

/// `Content-Type` header name.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// JSON media type.
pub const APPLICATION_JSON: &str = "application/json";

/// HTML media type.
pub const TEXT_HTML: &str = "text/html";

/// User-agent token identifying browsers.
pub const BROWSER_USER_AGENT_MARKER: &str = "Mozilla";

/// HTTP 402 Payment Required status code.
pub const HTTP_STATUS_PAYMENT_REQUIRED: u16 = 402;

/// Default facilitator service URL.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Error reason when no payment header was sent.
pub const ERROR_PAYMENT_REQUIRED: &str = "Payment required";

/// Error reason when the payload fits none of the offered requirements.
pub const ERROR_NO_MATCHING_REQUIREMENTS: &str = "No matching payment requirements";

/// Error reason when the facilitator rejects without giving a reason.
pub const ERROR_VERIFICATION_FAILED: &str = "Payment verification failed";

/// Error reason when settlement fails without a reason.
pub const ERROR_SETTLEMENT_FAILED: &str = "Settlement failed";
