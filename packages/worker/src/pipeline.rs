//! Stage graph and the runner that binds a stage to its inbound queue.
//!
//! Stages never call each other. A stage consumes one envelope, and may emit
//! one event addressed to a downstream node; the runner resolves the node to
//! the edge's queue and publishes it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use common::config::MqAppConfig;
use common::event::{GENERATE_IMAGE, PREPARE_PROMPT, UPLOAD_IMAGE};
use common::mq::{EventBus, Message, MessageEnvelope};
use common::{GenerationStrategy, PipelineError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Source label stamped on envelopes published by the worker.
pub const WORKER_SOURCE: &str = "worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageNode {
    /// Gateway-side ingestion. Produces events, never consumes them.
    Ingest,
    Enrich,
    Generate,
    Upload,
}

impl StageNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Enrich => "enrich",
            Self::Generate => "generate",
            Self::Upload => "upload",
        }
    }

    /// Nodes a worker process can run a consumer for.
    pub fn consumers() -> [StageNode; 3] {
        [Self::Enrich, Self::Generate, Self::Upload]
    }
}

impl fmt::Display for StageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed edge: events labelled `message_type` travel from `from` to `to`
/// over `queue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: StageNode,
    pub to: StageNode,
    pub message_type: &'static str,
    pub queue: String,
}

#[derive(Debug, Clone)]
pub struct Topology {
    edges: Vec<Edge>,
}

impl Topology {
    pub fn new(mq: &MqAppConfig) -> Self {
        Self {
            edges: vec![
                Edge {
                    from: StageNode::Ingest,
                    to: StageNode::Enrich,
                    message_type: PREPARE_PROMPT,
                    queue: mq.prepare_prompt_queue.clone(),
                },
                Edge {
                    from: StageNode::Enrich,
                    to: StageNode::Generate,
                    message_type: GENERATE_IMAGE,
                    queue: mq.generate_image_queue.clone(),
                },
                Edge {
                    from: StageNode::Generate,
                    to: StageNode::Upload,
                    message_type: UPLOAD_IMAGE,
                    queue: mq.upload_image_queue.clone(),
                },
            ],
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, from: StageNode, to: StageNode) -> Option<&Edge> {
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }

    /// The edge a node consumes from.
    pub fn inbound(&self, node: StageNode) -> Option<&Edge> {
        self.edges.iter().find(|e| e.to == node)
    }

    /// Nodes a request visits for the given strategy.
    pub fn route(strategy: GenerationStrategy) -> Vec<StageNode> {
        let mut nodes = vec![StageNode::Ingest, StageNode::Enrich, StageNode::Generate];
        if !strategy.persists_inline() {
            nodes.push(StageNode::Upload);
        }
        nodes
    }

    /// `route` rendered for logs, e.g. `ingest -> enrich -> generate`.
    pub fn route_label(strategy: GenerationStrategy) -> String {
        Self::route(strategy)
            .iter()
            .map(StageNode::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// An event a stage hands to a downstream node.
#[derive(Debug, Clone)]
pub struct Emit {
    pub to: StageNode,
    pub envelope: MessageEnvelope,
}

impl Emit {
    pub fn event<M: Message>(to: StageNode, message: &M) -> Result<Self, PipelineError> {
        Ok(Self {
            to,
            envelope: MessageEnvelope::from_message(message, Some(WORKER_SOURCE))?,
        })
    }
}

/// One independently invoked, stateless unit of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Message;

    fn node(&self) -> StageNode;

    async fn handle(&self, input: Self::Input) -> Result<Option<Emit>, PipelineError>;
}

/// What a single invocation ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request finished inside this stage.
    Completed,
    /// An event was published on `queue`.
    Forwarded { queue: String },
}

pub struct StageRunner<S: Stage> {
    stage: Arc<S>,
    topology: Arc<Topology>,
    bus: Arc<dyn EventBus>,
}

impl<S: Stage> Clone for StageRunner<S> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
            topology: Arc::clone(&self.topology),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<S: Stage> StageRunner<S> {
    pub fn new(stage: Arc<S>, topology: Arc<Topology>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            stage,
            topology,
            bus,
        }
    }

    /// Queue this runner's stage consumes.
    pub fn inbound_queue(&self) -> Option<&str> {
        self.topology
            .inbound(self.stage.node())
            .map(|e| e.queue.as_str())
    }

    /// Decode, handle and forward one envelope.
    pub async fn dispatch(&self, envelope: MessageEnvelope) -> Result<Outcome, PipelineError> {
        let input: S::Input = envelope.into_message()?;

        let Some(emit) = self.stage.handle(input).await? else {
            return Ok(Outcome::Completed);
        };

        let from = self.stage.node();
        let edge = self.topology.edge(from, emit.to).ok_or_else(|| {
            PipelineError::Configuration(format!("no edge from {from} to {}", emit.to))
        })?;
        if edge.message_type != emit.envelope.message_type {
            return Err(PipelineError::Configuration(format!(
                "edge {from} -> {} carries {}, not {}",
                emit.to, edge.message_type, emit.envelope.message_type
            )));
        }

        self.bus.publish(&edge.queue, &emit.envelope).await?;
        Ok(Outcome::Forwarded {
            queue: edge.queue.clone(),
        })
    }

    /// Dispatch and log the result. Nothing is retried.
    pub async fn run(&self, envelope: MessageEnvelope) {
        let stage = self.stage.node();
        let message_id = envelope.message_id.clone();

        match self.dispatch(envelope).await {
            Ok(Outcome::Completed) => {
                info!(stage = %stage, message_id = %message_id, "Request completed");
            }
            Ok(Outcome::Forwarded { queue }) => {
                info!(stage = %stage, message_id = %message_id, queue = %queue, "Event forwarded");
            }
            Err(e @ PipelineError::Validation(_)) => {
                warn!(stage = %stage, message_id = %message_id, kind = e.kind(), error = %e, "Dropping invalid event");
            }
            Err(e) => {
                error!(stage = %stage, message_id = %message_id, kind = e.kind(), error = %e, "Stage invocation failed");
            }
        }
    }
}
