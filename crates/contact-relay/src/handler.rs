//! Intake handler - orchestrates the pipeline for one request
//!
//! ```text
//! AwaitingMethod → ParsingBody → ValidatingFields → ValidatingEmail
//!   → ExtractingMetadata → Dispatching → Responding
//! ```
//!
//! Stages run strictly in order and every exit path goes through
//! [`IntakeHandler::handle`], which attaches the CORS headers.

use std::sync::Arc;

use chrono::Utc;
use http::{HeaderMap, Method, StatusCode};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::config::{ChannelConfig, ChannelKind, ConfigError, RelayConfig};
use crate::dispatch::{Dispatcher, HttpDispatcher};
use crate::error::IntakeError;
use crate::fingerprint::fingerprint_for;
use crate::format::{format_notification, subject_line};
use crate::metadata::{self, HeaderSource};
use crate::types::{
    DispatchResult, IntakeResponse, Notification, SubmissionRequest, ValidationOutcome,
};
use crate::validation::{check_fields, DohResolver, EmailValidator, MxResolver};

/// Pipeline stage, recorded in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingMethod,
    ParsingBody,
    ValidatingFields,
    ValidatingEmail,
    ExtractingMetadata,
    Dispatching,
    Responding,
}

/// Framework-independent view of an inbound request
#[derive(Debug, Clone)]
pub struct InboundRequest<H = HeaderMap> {
    pub method: Method,
    pub headers: H,
    pub body: Vec<u8>,
}

impl<H> InboundRequest<H> {
    pub fn new(method: Method, headers: H, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method,
            headers,
            body: body.into(),
        }
    }
}

/// The intake handler
///
/// Holds only immutable configuration and shared clients, so one instance
/// serves any number of concurrent requests.
pub struct IntakeHandler {
    config: Arc<RelayConfig>,
    validator: EmailValidator,
    dispatcher: Arc<dyn Dispatcher>,
}

impl IntakeHandler {
    /// Create with explicit collaborators
    pub fn new(
        config: RelayConfig,
        resolver: Arc<dyn MxResolver>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let validator = EmailValidator::new(config.email_policy.clone(), resolver);
        Self {
            config: Arc::new(config),
            validator,
            dispatcher,
        }
    }

    /// Create with the HTTP dispatcher and DNS-over-HTTPS resolver
    pub fn from_config(config: RelayConfig) -> Result<Self, ConfigError> {
        let dispatcher = HttpDispatcher::new(config.dispatch_timeout)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let resolver = DohResolver::new(
            &config.email_policy.resolver_url,
            config.email_policy.dns_timeout,
        )
        .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self::new(config, Arc::new(resolver), Arc::new(dispatcher)))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run the pipeline; always returns a response with CORS headers
    #[instrument(skip_all, fields(method = %request.method))]
    pub async fn handle<H>(&self, request: InboundRequest<H>) -> IntakeResponse
    where
        H: HeaderSource + Send + Sync,
    {
        let response = match self.process(request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };

        debug!(stage = ?Stage::Responding, status = response.status.as_u16());
        response.with_cors()
    }

    async fn process<H>(&self, request: InboundRequest<H>) -> Result<IntakeResponse, IntakeError>
    where
        H: HeaderSource + Send + Sync,
    {
        debug!(stage = ?Stage::AwaitingMethod);
        if request.method == Method::OPTIONS {
            return Ok(IntakeResponse::empty(StatusCode::NO_CONTENT));
        }
        if request.method != Method::POST {
            return Err(IntakeError::MethodNotAllowed(request.method));
        }

        debug!(stage = ?Stage::ParsingBody, bytes = request.body.len());
        let payload: SubmissionRequest = serde_json::from_slice(&request.body)?;

        debug!(stage = ?Stage::ValidatingFields);
        let submission = check_fields(
            payload,
            self.config.message_min_chars,
            self.config.message_max_chars,
        )
        .map_err(IntakeError::Rejected)?;

        debug!(stage = ?Stage::ValidatingEmail);
        if let ValidationOutcome::Rejected { reason } =
            self.validator.validate(&submission.email).await
        {
            return Err(IntakeError::Rejected(reason));
        }

        debug!(stage = ?Stage::ExtractingMetadata);
        let context = metadata::extract(&request.headers, Utc::now());
        let fingerprint = fingerprint_for(&submission, &context);
        let notification = Notification {
            subject: subject_line(&submission),
            text: format_notification(&submission, &context, &fingerprint),
        };

        debug!(stage = ?Stage::Dispatching);
        let channels = self.config.channel_configs()?;
        self.dispatch_all(channels, notification).await?;

        info!(
            fingerprint = %fingerprint,
            device = %context.device_class,
            subnet = %context.subnet,
            "Contact message relayed"
        );
        Ok(IntakeResponse::json(
            StatusCode::OK,
            &json!({ "status": "success" }),
        ))
    }

    /// Dispatch to every channel in order
    ///
    /// Runs on a spawned task so a caller hanging up mid-request does not
    /// cancel delivery. Every channel is attempted; the first failure is
    /// reported.
    async fn dispatch_all(
        &self,
        channels: Vec<ChannelConfig>,
        notification: Notification,
    ) -> Result<(), IntakeError> {
        let dispatcher = Arc::clone(&self.dispatcher);

        let task = tokio::spawn(async move {
            let mut failures: Vec<(ChannelKind, DispatchResult)> = Vec::new();
            for channel in &channels {
                let result = dispatcher.dispatch(channel, &notification).await;
                if !result.is_delivered() {
                    failures.push((channel.kind(), result));
                }
            }
            failures
        });

        let failures = task
            .await
            .map_err(|e| IntakeError::Task(e.to_string()))?;

        match failures.into_iter().next() {
            Some((channel, result)) => Err(IntakeError::Channel { channel, result }),
            None => Ok(()),
        }
    }
}
