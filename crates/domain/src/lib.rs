//! herald domain crate
//!
//! This crate contains the core announcement-scheduling and deduplication
//! logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `tags`: Tag normalization
//! - `filter`: Filtered-tag exclusion
//! - `scheduler`: Per-channel announce/skip decisions
//! - `ports`: Trait definitions for external collaborators (adapters)
//! - `usecases`: Ingestion loop and message rendering

pub mod filter;
pub mod model;
pub mod ports;
pub mod scheduler;
pub mod tags;
pub mod usecases;

pub use model::*;
pub use ports::*;
pub use scheduler::{ChannelPolicy, Decision, Scheduler, SchedulerConfig, SkipReason};
