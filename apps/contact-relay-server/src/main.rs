//! Contact Relay Server
//!
//! Serves the contact-form intake endpoint over HTTP:
//!
//! - `GET /health` - liveness probe
//! - any other path - the intake handler (`OPTIONS` preflight, `POST` submission)
//!
//! Configuration comes from the environment (optionally a `.env` file); see
//! `RelayConfig::from_env` for the recognised variables.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use contact_relay::{IntakeHandler, RelayConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

mod api;

/// Command-line arguments for the contact relay server
#[derive(Parser, Debug)]
#[command(name = "contact-relay-server")]
#[command(about = "Contact form intake with Telegram / email notification")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = RelayConfig::from_env()?;
    match config.channel_configs() {
        Ok(channels) => {
            let names: Vec<String> = channels.iter().map(|c| c.kind().to_string()).collect();
            info!(channels = %names.join(","), "Notification channels configured");
        }
        // Requests are still answered; each submission will fail with 500
        Err(e) => warn!(error = %e, "Notification channels incomplete"),
    }
    info!(
        mx_check = config.email_policy.mx_check,
        allowed_domains = config.email_policy.allowed_domains.len(),
        "Email policy loaded"
    );

    let handler = Arc::new(IntakeHandler::from_config(config)?);
    let app = api::router(handler);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        version = contact_relay::VERSION,
        "Contact relay listening on http://{}", addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("contact_relay={}", log_level).parse()?)
        .add_directive(format!("contact_relay_server={}", log_level).parse()?)
        .add_directive("tower_http=debug".parse()?);

    if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_ansi(false)
            .with_current_span(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
