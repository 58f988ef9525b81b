use std::sync::Arc;

use common::ConnectionId;
use common::config::MqAppConfig;
use common::mq::EventBus;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Live connections, each with the channel feeding its socket writer.
pub type Connections = DashMap<ConnectionId, mpsc::Sender<String>>;

#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<Connections>,
    pub bus: Arc<dyn EventBus>,
    /// Queue ingestion publishes generation requests on.
    pub ingest_queue: String,
    pub send_buffer: usize,
}

impl AppState {
    pub fn new(bus: Arc<dyn EventBus>, mq: &MqAppConfig, send_buffer: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            bus,
            ingest_queue: mq.prepare_prompt_queue.clone(),
            send_buffer,
        }
    }
}
