//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run the gateway against the local console loop
//! - `config show|path` -- read configuration
//! - `version` -- print version info

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tracing::info;

use crate::config::{config_path, Config};
use crate::credentials::FileCredentialStore;
use crate::gateway::Gateway;
use crate::pairing::ConsolePairingDisplay;
use crate::session::SessionManager;
use crate::transport::channel::ChannelTransport;
use crate::transport::{OutboundPayload, TransportEvent};
use crate::uploads::UploadStore;

/// Pincer gateway: remote command execution over a chat transport.
#[derive(Parser, Debug)]
#[command(
    name = "pincer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pincer — a chat-transport gateway for remote command execution"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway (default when no subcommand is given).
    Start,

    /// Read configuration values.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved configuration as JSON.
    Show,
    /// Print the config file path.
    Path,
}

/// Print the resolved configuration.
pub fn handle_config_show() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Print the config file path.
pub fn handle_config_path() {
    println!("{}", config_path().display());
}

/// Print version info.
pub fn handle_version() {
    println!("pincer {}", env!("CARGO_PKG_VERSION"));
}

/// Run the gateway wired to the local console: stdin lines become inbound
/// messages from a `console` contact, replies are printed back.
///
/// The session manager, dispatcher, and upload store are the production
/// pipeline; only the transport is the in-process one.
pub async fn handle_start() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    crate::logging::init_logging(config.log_config())?;

    info!(target: "gateway", upload_dir = %config.upload_dir().display(), "starting pincer gateway");

    let uploads = Arc::new(UploadStore::new(config.upload_dir()).await?);
    let credential_store = Arc::new(FileCredentialStore::new(config.credentials_path()));

    let (transport, controller) = ChannelTransport::pair();
    let (manager, session, events) = SessionManager::new(
        Arc::new(transport),
        credential_store,
        Arc::new(ConsolePairingDisplay),
        config.reconnect.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let session_task = tokio::spawn(manager.run(shutdown_rx));
    let gateway_task = tokio::spawn(Gateway::new(session, uploads).run(events));

    // Print every reply the gateway sends back out.
    let mut outbound = controller
        .take_outbound()
        .ok_or("outbound stream already taken")?;
    let printer_task = tokio::spawn(async move {
        while let Some(record) = outbound.recv().await {
            match record.payload {
                OutboundPayload::Text(text) => {
                    println!("-> {}: {text}", record.recipient_id);
                }
                OutboundPayload::File(attachment) => {
                    println!(
                        "-> {}: [attachment {} from {}]",
                        record.recipient_id,
                        attachment.name,
                        attachment.source_path.display()
                    );
                }
            }
        }
    });

    // Wait for the session loop to open the connection, then mark it
    // authenticated so replies can flow.
    for _ in 0..100 {
        if controller.connect_count() > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    controller.emit(TransportEvent::Connected);

    println!("pincer console: type a command ($, /, £) and press enter; ctrl-c to exit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !line.trim().is_empty() {
                            controller.inject_text("console", &line);
                        }
                    }
                    None => break,
                }
            }
        }
    }

    info!(target: "gateway", "shutting down");
    let _ = shutdown_tx.send(true);
    let _ = session_task.await;
    drop(controller);
    let _ = gateway_task.await;
    let _ = printer_task.await;
    Ok(())
}
