use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use redstream::consumer::{handler_fn, Engine, EngineConfig};
use redstream::stream_log::RedisConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};

/// How long shutdown waits for in-flight entries
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "redstream")]
#[command(about = "Consume stream entries through a consumer group", long_about = None)]
struct Cli {
    /// Redis host
    #[arg(long, env = "REDIS_HOST")]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT")]
    redis_port: u16,

    /// ACL username
    #[arg(long, env = "REDIS_USER")]
    redis_user: Option<String>,

    /// Password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    /// Logical database number
    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    redis_db: i64,

    /// Comma-separated streams to consume
    #[arg(long, env = "REDIS_STREAMS", value_delimiter = ',', default_value = "logs")]
    streams: Vec<String>,

    /// Consumer group name
    #[arg(long, env = "CONSUMER_GROUP", default_value = "workers")]
    group: String,

    /// Consumer name prefix
    #[arg(long, env = "CONSUMER_NAME", default_value = "c1")]
    consumer_name: String,

    /// Workers per stream
    #[arg(long, env = "CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Maximum entries per read
    #[arg(long, env = "READ_COUNT", default_value_t = 10)]
    read_count: usize,

    /// Milliseconds a read waits for new entries
    #[arg(long, env = "BLOCK_MS", default_value_t = 5000)]
    block_ms: u64,

    /// Acknowledge entries whose handler succeeded
    #[arg(
        long,
        env = "ACK_ON_SUCCESS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    ack_on_success: bool,

    /// Serve `/healthz` on this port
    #[arg(long, env = "HEALTH_PORT")]
    health_port: Option<u16>,
}

impl Cli {
    fn into_config(self) -> EngineConfig {
        let redis = RedisConfig {
            host: self.redis_host,
            port: self.redis_port,
            user: self.redis_user.filter(|u| !u.is_empty()),
            password: self.redis_password.filter(|p| !p.is_empty()),
            db: self.redis_db,
            ..Default::default()
        };

        let mut config = EngineConfig::new(self.streams, self.group)
            .with_redis(redis)
            .with_consumer_name(self.consumer_name)
            .with_concurrency(self.concurrency)
            .with_read_count(self.read_count)
            .with_block_time(Duration::from_millis(self.block_ms))
            .with_ack_on_success(self.ack_on_success);

        if let Some(port) = self.health_port {
            config = config.with_health_addr(SocketAddr::from(([0, 0, 0, 0], port)));
        }

        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    redstream::telemetry::init("info");

    let config = Cli::parse().into_config();

    let handler = handler_fn(|_ctx, stream, entry| async move {
        info!(stream = %stream, entry_id = %entry.id, data = ?entry.fields, "received entry");
        Ok(())
    });

    let engine = Engine::connect(config, handler).await?;
    engine.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    if let Err(e) = engine.stop(STOP_TIMEOUT).await {
        error!(error = %e, "stop error");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("redstream").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--redis-host", "redis", "--redis-port", "6380"])
            .unwrap()
            .into_config()
            .normalized()
            .unwrap();

        assert_eq!(config.redis.address(), "redis:6380");
        assert_eq!(config.redis.db, 0);
        assert_eq!(config.streams, vec!["logs".to_string()]);
        assert_eq!(config.group, "workers");
        assert_eq!(config.consumer_name, "c1");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.read_count, 10);
        assert_eq!(config.block_time, Duration::from_millis(5000));
        assert!(config.ack_on_success);
        assert!(config.health_addr.is_none());
    }

    #[test]
    fn test_full() {
        let config = parse(&[
            "--redis-host",
            "redis",
            "--redis-port",
            "6379",
            "--redis-password",
            "p@ss/w0rd#1",
            "--redis-db",
            "2",
            "--streams",
            "events,logs,notifications",
            "--concurrency",
            "4",
            "--read-count",
            "25",
            "--block-ms",
            "1500",
            "--ack-on-success",
            "no",
            "--health-port",
            "8082",
        ])
        .unwrap()
        .into_config()
        .normalized()
        .unwrap();

        assert_eq!(config.redis.password, Some("p@ss/w0rd#1".to_string()));
        assert_eq!(config.redis.db, 2);
        assert_eq!(config.streams.len(), 3);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.read_count, 25);
        assert_eq!(config.block_time, Duration::from_millis(1500));
        assert!(!config.ack_on_success);
        assert_eq!(config.health_addr, Some(SocketAddr::from(([0, 0, 0, 0], 8082))));
        assert_eq!(config.total_workers(), 12);
    }

    #[test]
    fn test_invalid_values() {
        let err = parse(&[
            "--redis-host",
            "redis",
            "--redis-port",
            "6379",
            "--concurrency",
            "many",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let err = parse(&[
            "--redis-host",
            "redis",
            "--redis-port",
            "6379",
            "--ack-on-success",
            "sometimes",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
