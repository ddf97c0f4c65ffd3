use clap::Parser;
use reel_proxy::config::Config;
use reel_proxy::hooks::ModeSetting;
use reel_proxy::proxy::{create_http_client, HyperUpstream, ReelServer, RequestHandler};
use reel_proxy::{logging, RecordMode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "reel", version, about = "HTTP record/replay proxy")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "REEL_CONFIG")]
    config: PathBuf,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the record mode (NEW, OVERWRITE, DISABLED, PROXY)
    #[arg(long)]
    record_mode: Option<RecordMode>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)?;
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    logging::init(&config, args.log_level.as_deref())?;

    let mut options = config.to_options()?;
    if let Some(mode) = args.record_mode {
        options.record_mode = ModeSetting::Fixed(mode);
        options.validate()?;
    }
    info!("Starting {} from {}", options.name, args.config.display());

    let client = create_http_client(&config.connection_pool)?;
    let upstream = Arc::new(HyperUpstream::new(client));
    let handler = Arc::new(RequestHandler::new(Arc::new(options), upstream)?);
    let server = ReelServer::new(Arc::clone(&handler), &config.listen)?;

    tokio::select! {
        result = server.run(&config.listen) => {
            if let Err(e) = &result {
                error!("Server stopped: {}", e);
            }
            handler.close();
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            handler.close();
            Ok(())
        }
    }
}
