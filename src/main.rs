use std::time::Duration;

use clap::Parser;
use tandem::config::{
    ChatPolicy, DEFAULT_ALLOWED_ORIGINS, DEFAULT_SIGNALING_PORT, OriginPolicy, ServerConfig,
};
use tandem::signaling::{SignalingError, SignalingServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tandem", about = "WebSocket signaling relay for peer-to-peer calls")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SIGNAL_BIND", default_value_t = format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT))]
    bind: String,

    /// Origins allowed to connect; `*` allows any
    #[arg(
        long = "allow-origin",
        env = "SIGNAL_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string())
    )]
    allowed_origins: Vec<String>,

    /// Let connections chat into rooms they have not joined
    #[arg(long)]
    open_chat: bool,

    #[arg(long, default_value_t = 30)]
    ping_interval_secs: u64,

    #[arg(long, default_value_t = 10)]
    pong_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind_addr: args.bind,
            allowed_origins: OriginPolicy::new(args.allowed_origins),
            ping_interval: Duration::from_secs(args.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(args.pong_timeout_secs.max(1)),
            chat_policy: if args.open_chat {
                ChatPolicy::Open
            } else {
                ChatPolicy::MembersOnly
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), SignalingError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from(Args::parse());

    println!("   Tandem Signaling Server");
    println!("   Binding to {}", config.bind_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::bind(&config).await?;

    tokio::select! {
        _ = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
    }
    Ok(())
}
