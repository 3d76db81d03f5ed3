//! Submission and email validation
//!
//! Field checks and the first two email stages are pure. Only the optional MX
//! liveness stage touches the network, and it runs last so malformed input
//! never costs an outbound call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::EmailPolicy;
use crate::types::{RejectReason, Submission, SubmissionRequest, ValidationOutcome};

/// RFC 5321 path limit
pub const EMAIL_MAX_LENGTH: usize = 254;

/// DNS record type for MX
const MX_RECORD_TYPE: u16 = 15;

lazy_static! {
    /// `local@label.label[.label...]` with no whitespace and a single `@`
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").unwrap();
}

/// Check required fields and normalize the message
///
/// Both fields lose NUL bytes and are trimmed. The message is cut to `max_chars` characters.
pub fn check_fields(
    request: SubmissionRequest,
    min_chars: usize,
    max_chars: usize,
) -> Result<Submission, RejectReason> {
    let email = sanitize(request.email.as_deref());
    let message = sanitize(request.message.as_deref());

    if email.is_empty() || message.is_empty() {
        return Err(RejectReason::MissingFields);
    }

    let message: String = message.chars().take(max_chars).collect();
    if message.chars().count() < min_chars {
        return Err(RejectReason::MessageTooShort);
    }

    Ok(Submission {
        email,
        message,
        hints: request.hints,
    })
}

/// Drop NUL bytes and surrounding whitespace
fn sanitize(value: Option<&str>) -> String {
    value
        .map(|v| v.replace('\0', "").trim().to_string())
        .unwrap_or_default()
}

/// Stage 1: `local@domain.tld` shape
pub fn is_valid_syntax(email: &str) -> bool {
    email.len() <= EMAIL_MAX_LENGTH && EMAIL_PATTERN.is_match(email)
}

/// Domain part of an address
pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}

/// Stage 2: case-insensitive allow-list; an empty list allows everything
pub fn is_allowed_domain(domain: &str, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|d| d.eq_ignore_ascii_case(domain))
}

/// MX liveness lookup
///
/// Implementations must not fail: any error means "no MX records".
#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn has_mx(&self, domain: &str) -> bool;
}

/// MX resolver backed by a DNS-over-HTTPS JSON endpoint
pub struct DohResolver {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status", default)]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohRecord>,
}

#[derive(Debug, Deserialize)]
struct DohRecord {
    #[serde(rename = "type")]
    record_type: u16,
}

impl DohResolver {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Create with an existing client (shares its connection pool)
    pub fn with_client(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl MxResolver for DohResolver {
    async fn has_mx(&self, domain: &str) -> bool {
        let response = self
            .client
            .get(&self.url)
            .query(&[("name", domain), ("type", "MX")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await;

        let response = match response {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(domain = %domain, status = resp.status().as_u16(), "MX lookup rejected");
                return false;
            }
            Err(e) => {
                warn!(domain = %domain, error = %e.without_url(), "MX lookup failed");
                return false;
            }
        };

        match response.json::<DohResponse>().await {
            Ok(body) => {
                body.status == 0 && body.answer.iter().any(|r| r.record_type == MX_RECORD_TYPE)
            }
            Err(e) => {
                warn!(domain = %domain, error = %e.without_url(), "MX lookup returned malformed JSON");
                false
            }
        }
    }
}

/// Three-stage email validator
pub struct EmailValidator {
    policy: EmailPolicy,
    resolver: Arc<dyn MxResolver>,
}

impl EmailValidator {
    pub fn new(policy: EmailPolicy, resolver: Arc<dyn MxResolver>) -> Self {
        Self { policy, resolver }
    }

    pub fn policy(&self) -> &EmailPolicy {
        &self.policy
    }

    /// Run syntax, allow-list and liveness checks, stopping at the first failure
    pub async fn validate(&self, email: &str) -> ValidationOutcome {
        if !is_valid_syntax(email) {
            return ValidationOutcome::rejected(RejectReason::InvalidSyntax);
        }

        let Some(domain) = email_domain(email) else {
            return ValidationOutcome::rejected(RejectReason::InvalidSyntax);
        };

        if !is_allowed_domain(domain, &self.policy.allowed_domains) {
            debug!(domain = %domain, "Domain not in allow-list");
            return ValidationOutcome::rejected(RejectReason::DomainNotAllowed);
        }

        if self.policy.mx_check {
            let domain = domain.to_lowercase();
            let lookup = self.resolver.has_mx(&domain);
            match tokio::time::timeout(self.policy.dns_timeout, lookup).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(domain = %domain, "No MX records");
                    return ValidationOutcome::rejected(RejectReason::DomainUnreachable);
                }
                Err(_) => {
                    warn!(domain = %domain, timeout = ?self.policy.dns_timeout, "MX lookup timed out");
                    return ValidationOutcome::rejected(RejectReason::DomainUnreachable);
                }
            }
        }

        ValidationOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver stub answering a fixed value and counting lookups
    struct StubResolver {
        answer: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl StubResolver {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answer: true,
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MxResolver for StubResolver {
        async fn has_mx(&self, _domain: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer
        }
    }

    fn policy(allowed: &[&str], mx_check: bool) -> EmailPolicy {
        EmailPolicy {
            allowed_domains: allowed.iter().map(|d| d.to_string()).collect(),
            mx_check,
            ..EmailPolicy::default()
        }
    }

    #[test]
    fn test_syntax() {
        assert!(is_valid_syntax("user@example.com"));
        assert!(is_valid_syntax("first.last+tag@mail.example.co.uk"));

        assert!(!is_valid_syntax("not-an-email"));
        assert!(!is_valid_syntax("a@b"));
        assert!(!is_valid_syntax("a@b@c.com"));
        assert!(!is_valid_syntax("a b@example.com"));
        assert!(!is_valid_syntax("user@example."));
        assert!(!is_valid_syntax("user@.example.com"));
        assert!(!is_valid_syntax("user@example..com"));
        assert!(!is_valid_syntax("@example.com"));
        assert!(!is_valid_syntax(""));
    }

    #[test]
    fn test_syntax_rejects_overlong_address() {
        let email = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_syntax(&email));
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let allowed = vec!["gmail.com".to_string(), "googlemail.com".to_string()];
        assert!(is_allowed_domain("GMail.COM", &allowed));
        assert!(!is_allowed_domain("yahoo.com", &allowed));
        assert!(is_allowed_domain("anything.org", &[]));
    }

    #[test]
    fn test_check_fields() {
        let ok = check_fields(SubmissionRequest::new("  user@example.com ", " hello "), 1, 2000)
            .unwrap();
        assert_eq!(ok.email, "user@example.com");
        assert_eq!(ok.message, "hello");

        let missing = SubmissionRequest {
            email: None,
            ..SubmissionRequest::new("", "hello")
        };
        assert_eq!(check_fields(missing, 1, 2000), Err(RejectReason::MissingFields));
        assert_eq!(
            check_fields(SubmissionRequest::new("user@example.com", "   "), 1, 2000),
            Err(RejectReason::MissingFields)
        );
        assert_eq!(
            check_fields(SubmissionRequest::new("user@example.com", "short"), 10, 2000),
            Err(RejectReason::MessageTooShort)
        );

        let ok = check_fields(SubmissionRequest::new("user@exa\0mple.com", "he\0llo\0"), 1, 2000)
            .unwrap();
        assert_eq!(ok.email, "user@example.com");
        assert_eq!(ok.message, "hello");
        assert_eq!(
            check_fields(SubmissionRequest::new("user@example.com", "\0 \0"), 1, 2000),
            Err(RejectReason::MissingFields)
        );
    }

    #[test]
    fn test_check_fields_truncates_on_char_boundary() {
        let message = "é".repeat(30);
        let ok = check_fields(SubmissionRequest::new("user@example.com", &message), 1, 10).unwrap();
        assert_eq!(ok.message.chars().count(), 10);
    }

    #[tokio::test]
    async fn test_invalid_syntax_skips_network() {
        let resolver = StubResolver::new(true);
        let validator = EmailValidator::new(policy(&[], true), resolver.clone());

        for email in ["not-an-email", "a@b", "a@b@c.com"] {
            assert_eq!(
                validator.validate(email).await,
                ValidationOutcome::rejected(RejectReason::InvalidSyntax),
                "{email}"
            );
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disallowed_domain_skips_network() {
        let resolver = StubResolver::new(true);
        let validator = EmailValidator::new(policy(&["gmail.com"], true), resolver.clone());

        assert_eq!(
            validator.validate("user@yahoo.com").await,
            ValidationOutcome::rejected(RejectReason::DomainNotAllowed)
        );
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);

        assert!(validator.validate("user@GMAIL.com").await.is_accepted());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_mx_is_unreachable() {
        let validator = EmailValidator::new(policy(&[], true), StubResolver::new(false));
        assert_eq!(
            validator.validate("user@example.com").await,
            ValidationOutcome::rejected(RejectReason::DomainUnreachable)
        );
    }

    #[tokio::test]
    async fn test_mx_timeout_is_unreachable() {
        let policy = EmailPolicy {
            mx_check: true,
            dns_timeout: Duration::from_millis(20),
            ..EmailPolicy::default()
        };
        let validator = EmailValidator::new(policy, StubResolver::slow(Duration::from_secs(5)));
        assert_eq!(
            validator.validate("user@example.com").await,
            ValidationOutcome::rejected(RejectReason::DomainUnreachable)
        );
    }

    #[tokio::test]
    async fn test_policies_off_by_default() {
        let resolver = StubResolver::new(false);
        let validator = EmailValidator::new(EmailPolicy::default(), resolver.clone());
        assert!(validator.validate("anyone@anywhere.example").await.is_accepted());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_doh_resolver_unreachable_endpoint_degrades() {
        // Nothing listens on port 9 locally; the lookup must fail closed
        let resolver =
            DohResolver::new("http://127.0.0.1:9/resolve", Duration::from_millis(500)).unwrap();
        assert!(!resolver.has_mx("example.com").await);
    }

    /// DNS-over-HTTPS stub answering a fixed status and JSON body
    #[derive(Clone)]
    struct StubDoh {
        status: axum::http::StatusCode,
        reply: &'static str,
        queries: Arc<std::sync::Mutex<Vec<HashMap<String, String>>>>,
    }

    async fn doh_handler(
        axum::extract::State(stub): axum::extract::State<StubDoh>,
        axum::extract::Query(query): axum::extract::Query<HashMap<String, String>>,
    ) -> (axum::http::StatusCode, &'static str) {
        stub.queries.lock().unwrap().push(query);
        (stub.status, stub.reply)
    }

    async fn spawn_doh(status: u16, reply: &'static str) -> (DohResolver, StubDoh) {
        let stub = StubDoh {
            status: axum::http::StatusCode::from_u16(status).unwrap(),
            reply,
            queries: Arc::new(std::sync::Mutex::new(Vec::new())),
        };
        let app = axum::Router::new()
            .route("/resolve", axum::routing::get(doh_handler))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{}/resolve", addr);
        let resolver = DohResolver::new(&url, Duration::from_secs(5)).unwrap();
        (resolver, stub)
    }

    #[tokio::test]
    async fn test_doh_resolver_finds_mx() {
        let (resolver, stub) = spawn_doh(
            200,
            r#"{"Status":0,"Answer":[{"name":"gmail.com.","type":15,"TTL":3600,"data":"5 gmail-smtp-in.l.google.com."}]}"#,
        )
        .await;

        assert!(resolver.has_mx("gmail.com").await);

        let queries = stub.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0]["name"], "gmail.com");
        assert_eq!(queries[0]["type"], "MX");
    }

    #[tokio::test]
    async fn test_doh_resolver_negative_answers() {
        let cases: [(u16, &'static str); 4] = [
            // NXDOMAIN
            (200, r#"{"Status":3}"#),
            // Answer without an MX record
            (
                200,
                r#"{"Status":0,"Answer":[{"name":"example.com.","type":5,"TTL":60,"data":"alias.example.com."}]}"#,
            ),
            (503, r#"{"Status":2}"#),
            (200, "not json"),
        ];

        for (status, reply) in cases {
            let (resolver, stub) = spawn_doh(status, reply).await;
            assert!(!resolver.has_mx("example.com").await, "{} {}", status, reply);
            assert_eq!(stub.queries.lock().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_doh_response_parsing() {
        let json = r#"{"Status":0,"Answer":[{"name":"gmail.com.","type":15,"TTL":3600,"data":"5 gmail-smtp-in.l.google.com."}]}"#;
        let body: DohResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.status, 0);
        assert_eq!(body.answer[0].record_type, MX_RECORD_TYPE);

        let nx: DohResponse = serde_json::from_str(r#"{"Status":3}"#).unwrap();
        assert_eq!(nx.status, 3);
        assert!(nx.answer.is_empty());
    }
}
