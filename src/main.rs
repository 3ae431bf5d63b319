use anyhow::Result;
use clap::Parser;
use tracing::info;

use turnstile::config::Config;
use turnstile::{logging, proxy};

#[derive(Parser)]
#[command(name = "turnstile", version, about = "HMAC request-authenticating reverse proxy")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "config/local.json")]
    config: String,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = AppCli::parse();

    let mut config = if std::path::Path::new(&args.config).is_file() {
        Config::from_file(&args.config)?
    } else {
        info!("config file {} not found, using defaults", args.config);
        Config::with_defaults()
    };

    if let Some(port) = args.port {
        config.listen.port = port;
    }

    proxy::serve(config).await
}
