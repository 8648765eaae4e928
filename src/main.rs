use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::load()?;
    tracing::info!(?config, "config loaded");

    let db = db::Db::open(&config.store.path, config.store.seed_default_room)?;

    app::run(config, db).await
}

mod app;
mod config;
mod db;
mod protocol;
mod rtc;
#[cfg(test)]
mod test_helpers;
mod util;
