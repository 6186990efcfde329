//! # fbuild-brokerage
//!
//! Worker discovery and availability for the fbuild distributed build
//! farm: the mechanism by which clients learn which workers are currently
//! reachable, and by which workers advertise that they will accept jobs.
//!
//! Two interchangeable backends are supported, selected once at
//! construction:
//! - a **coordinator**: a central registry process reached over framed
//!   TCP messages, and
//! - a **filesystem rendezvous**: a shared directory in which each
//!   available worker keeps a sentinel file named after its host
//!   identity.
//!
//! The public surface is [`WorkerBrokerage`]; everything else supports
//! it. The brokerage degrades rather than fails: any backend error
//! surfaces to the calling build as "no workers".

pub mod brokerage;
pub mod config;
pub mod coordinator;
pub mod host_id;
pub mod net;
pub mod rendezvous;

// Re-export the public surface at the crate root
pub use brokerage::WorkerBrokerage;
pub use config::BrokerageConfig;
