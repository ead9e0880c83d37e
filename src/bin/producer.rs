//! Periodic publisher for trying out a consumer
//!
//! Appends one `{message, type, timestamp}` entry to a stream every
//! interval until interrupted.

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use redstream::stream_log::{RedisConfig, RedisStreamLog, StreamLog};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "redstream-producer")]
#[command(about = "Publish test entries to a stream at a fixed interval", long_about = None)]
struct Cli {
    /// Redis connection url
    #[arg(long, default_value = "redis://:redis123@localhost:6380/0", env = "REDIS_URL")]
    redis_url: String,

    /// Stream to publish to (events, logs, notifications)
    #[arg(long, default_value = "events")]
    stream: String,

    /// Message type
    #[arg(long = "type", default_value = "test")]
    message_type: String,

    /// Milliseconds between messages
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    redstream::telemetry::init("info");

    let cli = Cli::parse();

    let config = RedisConfig::from_url(&cli.redis_url)?;
    let log = RedisStreamLog::new(config.clone()).await?;
    info!(addr = %config.address(), "connected to redis");

    let mut ticker = time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    let mut counter: u64 = 1;

    info!(
        stream = %cli.stream,
        interval_ms = cli.interval_ms,
        "publishing messages, press Ctrl+C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                let mut fields = HashMap::new();
                fields.insert("message".to_string(), format!("Message #{}", counter));
                fields.insert("type".to_string(), cli.message_type.clone());
                fields.insert(
                    "timestamp".to_string(),
                    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                );

                match log.append(&cli.stream, &fields).await {
                    Ok(id) => {
                        info!(entry_id = %id, fields = ?fields, "published message");
                        counter += 1;
                    }
                    Err(e) => warn!(error = %e, "error publishing message"),
                }
            }
        }
    }
}
