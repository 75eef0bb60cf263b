//! Pricecast command line
//!
//! `pricecast TICKER START END [DAYS]` prints one forecast as JSON.
//! `pricecast serve` runs the HTTP API (requires the `server` feature).

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricecast::config::AppConfig;
use pricecast::service::Services;
use pricecast::types::{ForecastRequest, DEFAULT_HORIZON};

const USAGE: &str = "usage: pricecast TICKER START_DATE END_DATE [DAYS]\n       pricecast serve";

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_request(args: &[String]) -> Result<ForecastRequest> {
    let (ticker, start, end) = match args {
        [ticker, start, end, ..] => (ticker, start, end),
        _ => bail!(USAGE),
    };
    let days = match args.get(3) {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("DAYS must be an integer, got '{}'", raw))?,
        None => DEFAULT_HORIZON as i64,
    };
    Ok(ForecastRequest::new(ticker, days, start, end))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);
    info!("Pricecast starting ({})", config.digest());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let services = Services::from_config(&config);

    if args.first().map(String::as_str) == Some("serve") {
        return serve(services, &config).await;
    }

    let request = parse_request(&args)?;
    let result = services.forecast.forecast(&request).await?;
    println!("{}", serde_json::to_string_pretty(result.as_ref())?);
    Ok(())
}

#[cfg(feature = "server")]
async fn serve(services: Services, config: &AppConfig) -> Result<()> {
    pricecast::server::start_server(
        std::sync::Arc::new(services),
        &config.server.host,
        config.server.port,
    )
    .await
}

#[cfg(not(feature = "server"))]
async fn serve(_services: Services, _config: &AppConfig) -> Result<()> {
    bail!("pricecast was built without the `server` feature")
}
