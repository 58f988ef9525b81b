use std::sync::Arc;

use anyhow::Context;
use common::PipelineError;
use common::mq::{EventBus, MqError};
use futures::future::{BoxFuture, FutureExt, join_all};
use mq::{MqConfig, init_mq};
use tracing::{error, info};
use worker::context::build_stages;
use worker::{Stage, StageNode, StageRunner, Topology, WorkerAppConfig, WorkerError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = WorkerAppConfig::load().context("Failed to load config")?;
    info!(
        worker_id = %config.worker.id,
        stages = ?config.worker.stages,
        concurrency = config.worker.concurrency,
        "Worker starting"
    );

    let mq_config = MqConfig::from_app(&config.mq).context("Invalid MQ config")?;
    let mq = Arc::new(
        init_mq(mq_config)
            .await
            .context("Failed to initialize MQ")?,
    );
    info!("MQ connected");

    let topology = Arc::new(Topology::new(&config.mq));
    let stages = build_stages(&config)
        .await
        .context("Failed to build stages")?;

    let concurrency = Some(config.worker.concurrency);
    let mut consumers = Vec::new();
    if let Some(stage) = stages.enrich {
        consumers.push(consume(&mq, stage, &topology, concurrency)?);
    }
    if let Some(stage) = stages.generate {
        consumers.push(consume(&mq, stage, &topology, concurrency)?);
    }
    if let Some(stage) = stages.upload {
        consumers.push(consume(&mq, stage, &topology, concurrency)?);
    }
    if consumers.is_empty() {
        anyhow::bail!("No stages enabled in worker.stages");
    }

    for (node, result) in join_all(consumers).await {
        if let Err(e) = result {
            error!(stage = %node, error = %e, "Consumer stopped unexpectedly");
        }
    }

    Ok(())
}

/// Consume a stage's inbound queue until the bus connection ends.
fn consume<S: Stage + 'static>(
    mq: &Arc<mq::Mq>,
    stage: S,
    topology: &Arc<Topology>,
    concurrency: Option<usize>,
) -> worker::Result<BoxFuture<'static, (StageNode, Result<(), MqError>)>> {
    let node = stage.node();
    let bus: Arc<dyn EventBus> = mq.clone();
    let runner = StageRunner::new(Arc::new(stage), Arc::clone(topology), bus);
    let queue = runner
        .inbound_queue()
        .ok_or_else(|| {
            WorkerError::Pipeline(PipelineError::Configuration(format!(
                "no inbound edge for stage {node}"
            )))
        })?
        .to_string();

    info!(stage = %node, queue = %queue, "Consumer registered");

    let mq = Arc::clone(mq);
    Ok(async move {
        let result = mq
            .consume(&queue, concurrency, move |envelope| {
                let runner = runner.clone();
                async move { runner.run(envelope).await }
            })
            .await;
        (node, result)
    }
    .boxed())
}
