pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod stages;

pub use config::{WorkerAppConfig, WorkerConfig};
pub use error::{Result, WorkerError};
pub use pipeline::{Emit, Outcome, Stage, StageNode, StageRunner, Topology};
