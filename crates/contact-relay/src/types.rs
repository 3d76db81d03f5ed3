//! Request-scoped types for the intake pipeline
//!
//! Nothing here is persisted: every value lives for exactly one request.

use chrono::{DateTime, Utc};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// Contact-form payload as sent by the browser script (untrusted)
///
/// `email` and `message` are optional at the serde level so that a missing
/// field is reported as `MissingFields` rather than as unparseable JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    /// Client hints collected by the form script
    #[serde(flatten)]
    pub hints: ClientHints,
}

impl SubmissionRequest {
    /// Create a request with only the required fields set
    pub fn new(email: &str, message: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            message: Some(message.to_string()),
            hints: ClientHints::default(),
        }
    }
}

/// Optional device/browser hints supplied by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientHints {
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    /// `navigator.hardwareConcurrency`
    #[serde(default)]
    pub cores: Option<f64>,
    /// `navigator.deviceMemory` in GB
    #[serde(default)]
    pub memory: Option<f64>,
}

/// A submission that passed the field checks
///
/// `email` and `message` are trimmed and non-empty; `message` is already
/// truncated to the configured maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub email: String,
    pub message: String,
    pub hints: ClientHints,
}

/// Rendered notification handed to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Used by channels that carry a subject (email)
    pub subject: String,
    /// Plain-text body, sent without markup interpretation
    pub text: String,
}

/// Device family derived from the user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    AndroidPhone,
    IPhone,
    IPad,
    WindowsDesktop,
    LinuxDesktop,
    Unknown,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AndroidPhone => write!(f, "Android phone"),
            Self::IPhone => write!(f, "iPhone"),
            Self::IPad => write!(f, "iPad"),
            Self::WindowsDesktop => write!(f, "Windows desktop / laptop"),
            Self::LinuxDesktop => write!(f, "Linux desktop / laptop"),
            Self::Unknown => write!(f, "Unknown device"),
        }
    }
}

/// Metadata derived from the inbound request headers
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Client IP or `"unknown"`
    pub ip: String,
    pub user_agent: String,
    pub device_class: DeviceClass,
    /// `a.b.c.0/24` or `"unknown"`
    pub subnet: String,
    pub accept_language: Option<String>,
    pub forwarded_proto: Option<String>,
    /// ISO country code from the hosting platform's geolocation headers
    pub country: Option<String>,
    /// Autonomous system number from the hosting platform
    pub asn: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Why a submission was rejected before dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// `email` or `message` missing or blank
    MissingFields,
    /// Message shorter than the configured minimum
    MessageTooShort,
    /// Email is not shaped like `local@domain.tld`
    InvalidSyntax,
    /// Domain not in the configured allow-list
    DomainNotAllowed,
    /// MX lookup failed or returned no records
    DomainUnreachable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields => write!(f, "Missing fields"),
            Self::MessageTooShort => write!(f, "Message too short"),
            Self::InvalidSyntax => write!(f, "Invalid email format"),
            Self::DomainNotAllowed => write!(f, "Email domain not allowed"),
            Self::DomainUnreachable => write!(f, "Email domain invalid"),
        }
    }
}

/// Result of the email validation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected { reason: RejectReason },
}

impl ValidationOutcome {
    pub fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Result of a single outbound call to a notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Channel answered with a 2xx status
    Delivered,
    /// Channel answered with a non-success status; body kept for diagnostics
    ChannelRejected { status: u16, body: String },
    /// The request never produced a response (connect error, timeout, ...)
    TransportFailed { cause: String },
}

impl DispatchResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl std::fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::ChannelRejected { status, body } => {
                write!(f, "channel rejected with HTTP {}: {}", status, body)
            }
            Self::TransportFailed { cause } => write!(f, "transport failed: {}", cause),
        }
    }
}

/// Response produced by the intake handler
#[derive(Debug, Clone)]
pub struct IntakeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl IntakeResponse {
    /// Response without a body (preflight)
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    /// JSON response
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            // Serializing plain structs and json! values cannot fail
            body: serde_json::to_string(body).unwrap_or_default(),
        }
    }

    /// Attach the CORS headers every response must carry
    pub fn with_cors(mut self) -> Self {
        self.headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        self.headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        );
        self.headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        self
    }
}
