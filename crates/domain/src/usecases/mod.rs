//! Application use cases / business logic

pub mod ingest;
pub mod render;

pub use ingest::{ChannelSink, CycleReport, IngestConfig, IngestError, IngestLoop};
pub use render::Renderer;
