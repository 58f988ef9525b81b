use std::future::Future;

use async_trait::async_trait;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage, error::BroccoliError, queue::BroccoliQueue,
};
use common::mq::{EventBus, MessageEnvelope, MqError};
use tracing::{debug, info};

use crate::config::MqConfig;
use crate::error::from_broccoli;

/// Event bus backed by `broccoli_queue` on Redis.
pub struct BroccoliBus {
    queue: BroccoliQueue,
}

impl BroccoliBus {
    /// Consume envelopes from `queue`, running up to `concurrency` handlers at
    /// once. Every message is acknowledged once its handler returns; a failed
    /// invocation is not redelivered.
    pub async fn consume<F, Fut>(
        &self,
        queue: &str,
        concurrency: Option<usize>,
        handler: F,
    ) -> Result<(), MqError>
    where
        F: Fn(MessageEnvelope) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(queue = %queue, concurrency = ?concurrency, "Starting consumer");
        self.queue
            .process_messages(
                queue,
                concurrency,
                None,
                move |message: BrokerMessage<MessageEnvelope>| {
                    let handler = handler.clone();
                    async move {
                        handler(message.payload).await;
                        Ok(())
                    }
                },
            )
            .await
            .map_err(from_broccoli)
    }
}

#[async_trait]
impl EventBus for BroccoliBus {
    async fn publish(&self, queue: &str, envelope: &MessageEnvelope) -> Result<(), MqError> {
        self.queue
            .publish(queue, None, envelope, None)
            .await
            .map_err(from_broccoli)?;
        debug!(
            queue = %queue,
            message_type = %envelope.message_type,
            message_id = %envelope.message_id,
            "Published envelope"
        );
        Ok(())
    }
}

pub async fn init_mq(config: MqConfig) -> Result<BroccoliBus, MqError> {
    let queue = BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(from_broccoli)?;
    Ok(BroccoliBus { queue })
}
