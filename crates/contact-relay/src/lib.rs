//! Contact Relay - verified contact-form intake with notification dispatch
//!
//! This crate turns an untrusted contact-form submission into a notification
//! delivered to the site operator:
//!
//! 1. **Method gate** - `OPTIONS` preflight answered immediately, only `POST` accepted
//! 2. **Field checks** - `email` and `message` must be present and non-empty
//! 3. **Email verification** - syntax, optional domain allow-list, optional MX liveness
//! 4. **Metadata** - client IP, /24 subnet, device class, locale and geo hints
//! 5. **Fingerprint** - `fp_` + truncated SHA-256 over the client hint tuple
//! 6. **Dispatch** - one outbound call per configured channel (Telegram, Resend)
//!
//! ## Architecture
//!
//! ```text
//! Browser form → contact-relay-server (axum) → IntakeHandler
//!                                                 ├─ EmailValidator ─→ DNS-over-HTTPS (MX)
//!                                                 ├─ metadata / fingerprint / format
//!                                                 └─ Dispatcher ─────→ Telegram / Resend
//! ```
//!
//! The handler is framework independent: it takes an [`InboundRequest`] and
//! always returns a well-formed [`IntakeResponse`] carrying CORS headers.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod format;
pub mod handler;
pub mod metadata;
pub mod types;
pub mod validation;

pub use config::{ChannelConfig, ChannelKind, ConfigError, EmailPolicy, RelayConfig};
pub use dispatch::{Dispatcher, HttpDispatcher};
pub use error::{ErrorKind, IntakeError};
pub use fingerprint::{fingerprint, fingerprint_for, FingerprintPart};
pub use format::{format_notification, render_html, subject_line};
pub use handler::{InboundRequest, IntakeHandler, Stage};
pub use metadata::{classify_device, derive_subnet, extract, resolve_ip, HeaderSource};
pub use types::{
    ClientHints, DeviceClass, DispatchResult, IntakeResponse, Notification, RejectReason,
    RequestContext, Submission, SubmissionRequest, ValidationOutcome,
};
pub use validation::{check_fields, DohResolver, EmailValidator, MxResolver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder used wherever a header or client hint is absent
pub const UNKNOWN: &str = "unknown";
