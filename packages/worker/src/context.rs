//! Process-wide collaborators, built once at startup and handed to stages.

use std::path::PathBuf;
use std::sync::Arc;

use common::PipelineError;
use common::config::{StorageBackend, StorageConfig};
use common::storage::ObjectStore;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::s3::S3ObjectStore;
use tracing::{info, warn};

use crate::clients::{
    GatewayPusher, HttpImageFetcher, HttpTextAnalyzer, InlineModelGenerator, RemoteHttpGenerator,
    build_http_client,
};
use crate::config::WorkerAppConfig;
use crate::pipeline::StageNode;
use crate::stages::{
    Deliverer, EnrichStage, Finisher, GenerateStage, Generators, Persister, UploadStage,
};

/// Stages this process runs. A stage is `None` when it is not enabled.
pub struct Stages {
    pub enrich: Option<EnrichStage>,
    pub generate: Option<GenerateStage>,
    pub upload: Option<UploadStage>,
}

pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, PipelineError> {
    match config.backend {
        StorageBackend::S3 => {
            let target = config.target()?;
            let store =
                S3ObjectStore::new(&target.bucket, &target.region, config.endpoint.as_deref())?;
            info!(bucket = %target.bucket, region = %target.region, "Using S3 object store");
            Ok(Arc::new(store))
        }
        StorageBackend::Filesystem => {
            let store =
                FilesystemObjectStore::new(PathBuf::from(&config.root), config.max_object_size)
                    .await?;
            info!(root = %config.root, "Using filesystem object store");
            Ok(Arc::new(store))
        }
    }
}

/// Build every enabled stage. Missing settings a stage cannot run without
/// fail here rather than on the first message.
pub async fn build_stages(config: &WorkerAppConfig) -> Result<Stages, PipelineError> {
    let http = build_http_client(&config.http)?;
    let runs = |node: StageNode| config.worker.runs(node);

    let enrich = if runs(StageNode::Enrich) {
        let endpoint = config.analysis.require_endpoint()?;
        Some(EnrichStage::new(Arc::new(HttpTextAnalyzer::new(
            http.clone(),
            endpoint,
            &config.analysis.language_code,
        ))))
    } else {
        None
    };

    let finisher = if runs(StageNode::Generate) || runs(StageNode::Upload) {
        let store = open_store(&config.storage).await?;
        let pusher = GatewayPusher::new(http.clone(), config.gateway.clone());
        Some(Finisher::new(
            Persister::new(store, config.storage.clone()),
            Deliverer::new(Arc::new(pusher)),
        ))
    } else {
        None
    };

    let generate = match &finisher {
        Some(finisher) if runs(StageNode::Generate) => {
            Some(GenerateStage::new(generators(config, &http)?, finisher.clone()))
        }
        _ => None,
    };

    let upload = match finisher {
        Some(finisher) if runs(StageNode::Upload) => Some(UploadStage::new(
            Arc::new(HttpImageFetcher::new(http.clone())),
            finisher,
        )),
        _ => None,
    };

    Ok(Stages {
        enrich,
        generate,
        upload,
    })
}

/// Generators whose settings are present. Requests for a missing one fail
/// with a configuration error at invocation time.
fn generators(
    config: &WorkerAppConfig,
    http: &reqwest::Client,
) -> Result<Generators, PipelineError> {
    let mut generators = Generators::new();

    match config.model.require_endpoint() {
        Ok(endpoint) => {
            generators = generators.with(Arc::new(InlineModelGenerator::new(
                http.clone(),
                endpoint,
                &config.model,
            )));
        }
        Err(e) => warn!(error = %e, "Inline model generation disabled"),
    }

    match config.provider.require_api_key() {
        Ok(api_key) => {
            generators = generators.with(Arc::new(RemoteHttpGenerator::new(
                http.clone(),
                api_key,
                &config.provider,
            )));
        }
        Err(e) => warn!(error = %e, "Remote provider generation disabled"),
    }

    if generators.is_empty() {
        return Err(PipelineError::Configuration(
            "no image generator configured: set model.endpoint or provider.api_key".into(),
        ));
    }
    Ok(generators)
}
