use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_watch::{
    config::Config,
    database::Database,
    services::Resolver,
    sources::{CallContext, SourceSet},
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "stream-watch")]
#[command(version)]
#[command(about = "Tracks whether a channel is live, starting soon or offline")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Resolve once, print the result as JSON and exit
    Resolve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("stream_watch={},tower_http=trace", cli.log_level)
    } else {
        format!("stream_watch={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stream-watch v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::connect(&config.database).await?;
    database.migrate().await?;
    info!("Cache ready on {}", database.database_type().as_str());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let sources = SourceSet::http(&config, CallContext::Serving)?;
            let resolver = Arc::new(Resolver::new(database.stream_cache(), sources, &config));

            let web_server = WebServer::new(&config, resolver)?;
            info!(
                "Starting web server on {}:{}",
                web_server.host(),
                web_server.port()
            );
            web_server.serve().await?;
        }
        Command::Resolve => {
            let sources = SourceSet::http(&config, CallContext::Background)?;
            let resolver = Resolver::new(database.stream_cache(), sources, &config);
            let resolved = resolver.resolve(None).await;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
    }

    Ok(())
}
