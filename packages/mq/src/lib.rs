pub mod config;
pub mod error;
pub mod models;

pub use config::MqConfig;
pub use models::{BroccoliBus, BrokerMessage, BroccoliError, init_mq};

pub type Mq = BroccoliBus;
