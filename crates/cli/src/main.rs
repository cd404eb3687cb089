use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use pbcast::codec::{self, ContentType};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "pbcast")]
#[command(about = "JSON / Protobuf message gateway with WebSocket broadcast", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default configuration file (skipped if one already exists).
    Init {
        /// Config file path (default: PBCAST_CONFIG_PATH or ~/.pbcast/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway (HTTP ingress + WebSocket broadcast on one port).
    Gateway {
        /// Config file path (default: PBCAST_CONFIG_PATH or ~/.pbcast/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP and WebSocket port (default from config or 7070)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long, short)]
        bind: Option<String>,
    },

    /// Subscribe to a running gateway and print each broadcast message as JSON.
    Listen {
        /// Config file path, used to find the gateway when --url is not given
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Subscriber endpoint (default: ws://{bind}:{port}/ws from config)
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Preferred frame codec: json or pb
        #[arg(long, default_value = "json")]
        codec: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("pbcast {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port, bind }) => {
            if let Err(e) = run_gateway(config, port, bind).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Listen { config, url, codec }) => {
            if let Err(e) = run_listen(config, url, codec).await {
                log::error!("listen failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(pbcast::config::default_config_path);
    if pbcast::config::init_config_file(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = pbcast::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    pbcast::gateway::run_gateway(config).await
}

async fn run_listen(
    config_path: Option<std::path::PathBuf>,
    url: Option<String>,
    codec_name: String,
) -> anyhow::Result<()> {
    let preferred = ContentType::from_segment(&codec_name)
        .ok_or_else(|| anyhow::anyhow!("unknown codec '{}', expected json or pb", codec_name))?;
    let base = match url {
        Some(u) => u,
        None => {
            let (config, _) = pbcast::config::load_config(config_path)?;
            format!("ws://{}:{}/ws", config.gateway.bind.trim(), config.gateway.port)
        }
    };
    let sep = if base.contains('?') { '&' } else { '?' };
    let ws_url = format!("{}{}codec={}", base, sep, preferred.segment());

    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await?;
    log::info!("subscribed to {} ({})", ws_url, preferred);

    while let Some(msg) = ws.next().await {
        let decoded = match msg? {
            Message::Text(text) => codec::decode(text.as_bytes(), ContentType::StructuredText),
            Message::Binary(bytes) => codec::decode(&bytes, ContentType::CompactBinary),
            Message::Close(_) => break,
            _ => continue,
        };
        match decoded {
            Ok(message) => println!("{}", serde_json::to_string(&message)?),
            Err(e) => log::warn!("skipping undecodable frame: {}", e),
        }
    }

    Ok(())
}
