use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use gateway::build_router;
use gateway::config::GatewayAppConfig;
use gateway::state::AppState;
use mq::{MqConfig, init_mq};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = GatewayAppConfig::load().context("Failed to load config")?;

    let mq_config = MqConfig::from_app(&config.mq).context("Invalid MQ config")?;
    let bus = Arc::new(
        init_mq(mq_config)
            .await
            .context("Failed to initialize MQ")?,
    );
    info!(queue = %config.mq.prepare_prompt_queue, "MQ connected");

    let state = AppState::new(bus, &config.mq, config.gateway.send_buffer);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .context("Invalid gateway address")?;
    info!("Gateway running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
