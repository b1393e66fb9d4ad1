//! ライブ計測サーバ
//!
//! TCP接続ごとに1セッション（トラッカーとスロットルを個別に持つ）。

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movement_analyzer::config::Config;
use movement_analyzer::protocol::serve;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load_or_default(CONFIG_PATH);
    info!("Live Server ({})", env!("GIT_VERSION"));
    info!(
        joint = %config.live.tracked_joint,
        down = config.live.down_angle,
        up = config.live.up_angle,
        "tracking"
    );

    let listener = TcpListener::bind(&config.live.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.live.listen_addr))?;
    info!("Listening on {}", config.live.listen_addr);

    serve(listener, config.live).await;
    Ok(())
}
