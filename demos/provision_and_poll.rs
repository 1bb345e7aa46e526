//! Example: Provision a disposable mailbox and wait for a verification code.
//!
//! Creates a mailbox (named if `MAILBOX_NAME` is set), prints its credentials and
//! polls until a message with a verification code or link arrives.
//!
//! # Usage
//!
//! ```bash
//! # Optional
//! export MAILBOX_NAME="signup-test"
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=tempmail_sync=debug
//!
//! cargo run --example provision_and_poll
//! ```

use std::env;
use std::time::Duration;
use tempmail_sync::{CodeExtractor, Error, MailboxProvisioner, MessagePoller, ServiceConfig};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> tempmail_sync::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tempmail_sync=info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .init();

    let config = ServiceConfig::builder()
        .poll_interval(Duration::from_secs(5))
        .max_wait(Duration::from_secs(120))
        .request_deadline(Duration::from_secs(60))
        .build()?;

    let provisioner = MailboxProvisioner::new(&config)?;
    let poller = MessagePoller::new(&config)?;

    let status = provisioner.health_check().await;
    tracing::info!(healthy = status.healthy, latency = ?status.latency, "Provider probed");

    let name = env::var("MAILBOX_NAME").ok();
    let account = provisioner.create_account(name.as_deref()).await?;

    println!("Mailbox:  {}", account.email);
    println!("Password: {}", account.password());
    println!("Send a message with a verification code to it (waiting up to 2 minutes)...");

    let extractor = CodeExtractor::new();
    match poller.wait_for_code(&account.email, &extractor).await {
        Ok(code) => println!("Got code: {code}"),
        Err(Error::WaitTimeout { timeout }) => println!("No code within {timeout:?}"),
        Err(e) => return Err(e),
    }

    for message in poller.get_messages(&account.email, None).await {
        let found = extractor.extract_from_message(&message);
        println!(
            "[{}] {} <{}>: code={:?} link={:?}",
            message.timestamp, message.subject, message.sender, found.code, found.link
        );
    }

    provisioner.delete_account(&account.email).await;
    provisioner.cleanup().await;
    poller.cleanup().await;

    Ok(())
}
