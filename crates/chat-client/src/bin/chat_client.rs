//! Connects with the environment configuration and logs events
//!
//! Run with:
//! ```bash
//! CHAT_TOKEN=... cargo run -p chat-client
//! ```

use anyhow::Context;
use chat_client::{Client, ClientConfig, Event, EventType, Listener, Scope};
use chat_common::{try_init_tracing_with_config, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Client stopped");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("failed to load configuration")?;
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.environment)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }
    info!(env = ?config.environment, shard = config.shard.id, "Configuration loaded");

    let client = Client::builder(config).build()?;
    for event_type in EventType::ALL {
        client.register_listener(event_type, Scope::Global, Listener::sync(log_event));
    }

    client.connect()?;
    tokio::select! {
        result = client.wait() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("Interrupted");
            client.shutdown().await?;
        }
    }
    Ok(())
}

fn log_event(event: &Event) -> anyhow::Result<()> {
    match event {
        Event::Ready { session_id, user, servers } => {
            info!(session_id = %session_id, user = %user.tag(), servers, "Ready");
        }
        Event::MessageCreate { message } => {
            info!(
                channel = %message.channel_id,
                author = %message.author.tag(),
                content = %message.content,
                "Message"
            );
        }
        other => info!(event_type = %other.event_type(), server = ?other.server_id(), "Event"),
    }
    Ok(())
}
