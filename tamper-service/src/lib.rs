pub mod analysis;
pub mod api;
pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use analysis::{classify, classify_sharded, ClassificationOutput, Thresholds};
pub use pipeline::{BatchPipeline, Envelope};
