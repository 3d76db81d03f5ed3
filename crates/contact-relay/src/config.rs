//! Relay configuration
//!
//! Built once at startup and shared immutably with the handler. Channel
//! credentials are optional here: a channel that is selected but missing its
//! credentials is reported per request by [`RelayConfig::channel_configs`],
//! so the handler can answer 500 before any outbound call.

use std::time::Duration;

/// Default from address for the email channel
pub const DEFAULT_FROM_ADDRESS: &str = "Contact Form <onboarding@resend.dev>";

/// Telegram Bot API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Resend API endpoint
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// DNS-over-HTTPS JSON endpoint used for MX lookups
pub const DNS_RESOLVER_URL: &str = "https://dns.google/resolve";

/// Default bounds on outbound calls
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 3_000;

/// Message length bounds (characters)
pub const DEFAULT_MESSAGE_MIN_CHARS: usize = 1;
pub const DEFAULT_MESSAGE_MAX_CHARS: usize = 2_000;

/// Notification channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Chat push via the Telegram Bot API
    Telegram,
    /// Transactional email via Resend
    Email,
}

impl std::str::FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "email" | "resend" => Ok(Self::Email),
            other => Err(ConfigError::UnknownChannel(other.to_string())),
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Telegram => write!(f, "telegram"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// Fully resolved credentials for one channel
#[derive(Clone, PartialEq, Eq)]
pub enum ChannelConfig {
    Telegram {
        api_base: String,
        bot_token: String,
        chat_id: String,
    },
    Email {
        api_url: String,
        api_key: String,
        from: String,
        to: String,
    },
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Telegram { .. } => ChannelKind::Telegram,
            Self::Email { .. } => ChannelKind::Email,
        }
    }
}

// Credentials must never reach logs
impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Telegram {
                api_base, chat_id, ..
            } => f
                .debug_struct("Telegram")
                .field("api_base", api_base)
                .field("bot_token", &"<redacted>")
                .field("chat_id", chat_id)
                .finish(),
            Self::Email {
                api_url, from, to, ..
            } => f
                .debug_struct("Email")
                .field("api_url", api_url)
                .field("api_key", &"<redacted>")
                .field("from", from)
                .field("to", to)
                .finish(),
        }
    }
}

/// Email acceptance policy
#[derive(Debug, Clone, PartialEq)]
pub struct EmailPolicy {
    /// Lower-cased domains accepted; empty disables the allow-list
    pub allowed_domains: Vec<String>,
    /// Require at least one MX record for the domain
    pub mx_check: bool,
    pub resolver_url: String,
    pub dns_timeout: Duration,
}

impl Default for EmailPolicy {
    fn default() -> Self {
        Self {
            allowed_domains: vec![],
            mx_check: false,
            resolver_url: DNS_RESOLVER_URL.to_string(),
            dns_timeout: Duration::from_millis(DEFAULT_DNS_TIMEOUT_MS),
        }
    }
}

/// Configuration for the relay
#[derive(Clone, PartialEq)]
pub struct RelayConfig {
    /// Channels every submission is dispatched to, in order
    pub channels: Vec<ChannelKind>,

    pub telegram_api_base: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub resend_api_url: String,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub receiver_email: Option<String>,

    pub email_policy: EmailPolicy,

    /// Upper bound on each outbound dispatch call
    pub dispatch_timeout: Duration,

    pub message_min_chars: usize,
    pub message_max_chars: usize,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("channels", &self.channels)
            .field("telegram_api_base", &self.telegram_api_base)
            .field("telegram_bot_token", &self.telegram_bot_token.as_ref().map(|_| "<redacted>"))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("resend_api_url", &self.resend_api_url)
            .field("resend_api_key", &self.resend_api_key.as_ref().map(|_| "<redacted>"))
            .field("email_from", &self.email_from)
            .field("receiver_email", &self.receiver_email)
            .field("email_policy", &self.email_policy)
            .field("dispatch_timeout", &self.dispatch_timeout)
            .field("message_min_chars", &self.message_min_chars)
            .field("message_max_chars", &self.message_max_chars)
            .finish()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channels: vec![ChannelKind::Telegram],
            telegram_api_base: TELEGRAM_API_BASE.to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            resend_api_url: RESEND_API_URL.to_string(),
            resend_api_key: None,
            email_from: DEFAULT_FROM_ADDRESS.to_string(),
            receiver_email: None,
            email_policy: EmailPolicy::default(),
            dispatch_timeout: Duration::from_millis(DEFAULT_DISPATCH_TIMEOUT_MS),
            message_min_chars: DEFAULT_MESSAGE_MIN_CHARS,
            message_max_chars: DEFAULT_MESSAGE_MAX_CHARS,
        }
    }
}

impl RelayConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, `.env` map, tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let channels = match var("CONTACT_CHANNELS") {
            Some(list) => parse_channels(&list)?,
            None => defaults.channels,
        };

        let allowed_domains = var("EMAIL_ALLOWED_DOMAINS")
            .map(|list| {
                list.split(',')
                    .map(|d| d.trim().to_lowercase())
                    .filter(|d| !d.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mx_check = match var("EMAIL_MX_CHECK") {
            Some(v) => parse_flag("EMAIL_MX_CHECK", &v)?,
            None => false,
        };

        Ok(Self {
            channels,
            telegram_api_base: var("TELEGRAM_API_BASE").unwrap_or(defaults.telegram_api_base),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: var("TELEGRAM_CHAT_ID"),
            resend_api_url: var("RESEND_API_URL").unwrap_or(defaults.resend_api_url),
            resend_api_key: var("RESEND_API_KEY"),
            email_from: var("EMAIL_FROM").unwrap_or(defaults.email_from),
            receiver_email: var("RECEIVER_EMAIL"),
            email_policy: EmailPolicy {
                allowed_domains,
                mx_check,
                resolver_url: var("DNS_RESOLVER_URL")
                    .unwrap_or(defaults.email_policy.resolver_url),
                dns_timeout: parse_millis(var("DNS_TIMEOUT_MS"), "DNS_TIMEOUT_MS")?
                    .unwrap_or(defaults.email_policy.dns_timeout),
            },
            dispatch_timeout: parse_millis(var("DISPATCH_TIMEOUT_MS"), "DISPATCH_TIMEOUT_MS")?
                .unwrap_or(defaults.dispatch_timeout),
            message_min_chars: parse_number(var("MESSAGE_MIN_CHARS"), "MESSAGE_MIN_CHARS")?
                .unwrap_or(defaults.message_min_chars),
            message_max_chars: parse_number(var("MESSAGE_MAX_CHARS"), "MESSAGE_MAX_CHARS")?
                .unwrap_or(defaults.message_max_chars),
        })
    }

    /// Configure the Telegram channel credentials
    pub fn with_telegram(mut self, bot_token: &str, chat_id: &str) -> Self {
        self.telegram_bot_token = Some(bot_token.to_string());
        self.telegram_chat_id = Some(chat_id.to_string());
        self
    }

    /// Configure the Resend channel credentials
    pub fn with_email(mut self, api_key: &str, from: &str, to: &str) -> Self {
        self.resend_api_key = Some(api_key.to_string());
        self.email_from = from.to_string();
        self.receiver_email = Some(to.to_string());
        self
    }

    pub fn with_channels(mut self, channels: &[ChannelKind]) -> Self {
        self.channels = channels.to_vec();
        self
    }

    pub fn with_email_policy(mut self, policy: EmailPolicy) -> Self {
        self.email_policy = policy;
        self
    }

    /// Resolve credentials for every selected channel
    pub fn channel_configs(&self) -> Result<Vec<ChannelConfig>, ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        self.channels
            .iter()
            .map(|kind| self.channel_config(*kind))
            .collect()
    }

    fn channel_config(&self, kind: ChannelKind) -> Result<ChannelConfig, ConfigError> {
        let required = |value: &Option<String>, var: &'static str| {
            value
                .clone()
                .ok_or(ConfigError::MissingVar { channel: kind, var })
        };

        match kind {
            ChannelKind::Telegram => Ok(ChannelConfig::Telegram {
                api_base: self.telegram_api_base.trim_end_matches('/').to_string(),
                bot_token: required(&self.telegram_bot_token, "TELEGRAM_BOT_TOKEN")?,
                chat_id: required(&self.telegram_chat_id, "TELEGRAM_CHAT_ID")?,
            }),
            ChannelKind::Email => Ok(ChannelConfig::Email {
                api_url: self.resend_api_url.clone(),
                api_key: required(&self.resend_api_key, "RESEND_API_KEY")?,
                from: self.email_from.clone(),
                to: required(&self.receiver_email, "RECEIVER_EMAIL")?,
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {var} for {channel} channel")]
    MissingVar {
        channel: ChannelKind,
        var: &'static str,
    },

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("No notification channels configured")]
    NoChannels,

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

fn parse_channels(list: &str) -> Result<Vec<ChannelKind>, ConfigError> {
    let mut channels = Vec::new();
    for name in list.split(',').filter(|n| !n.trim().is_empty()) {
        let kind: ChannelKind = name.parse()?;
        if !channels.contains(&kind) {
            channels.push(kind);
        }
    }
    Ok(channels)
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_number(value: Option<String>, var: &'static str) -> Result<Option<usize>, ConfigError> {
    value
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue { var, value: v })
        })
        .transpose()
}

fn parse_millis(value: Option<String>, var: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_number(value, var)?.map(|ms| Duration::from_millis(ms as u64)))
}
