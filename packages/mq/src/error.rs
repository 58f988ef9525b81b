use broccoli_queue::error::BroccoliError;
use common::mq::MqError;

/// Translate a broker failure into the bus error seen by stages.
pub(crate) fn from_broccoli(err: BroccoliError) -> MqError {
    match err {
        BroccoliError::Publish(msg) => MqError::Publish(msg),
        other => MqError::Connection(other.to_string()),
    }
}
