use clap::Parser;
use dotenv::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_cli::{execute, Cli};
use shared_config::AppConfig;
use shared_database::connect;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url.clone() {
        config.database.url = url;
    }

    let pool = connect(&config.database).await?;
    let mut stdout = std::io::stdout().lock();
    execute(cli.command, &pool, &mut stdout).await
}
