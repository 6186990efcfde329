//! # fbuild-proto
//!
//! Protocol types, constants, and error codes for the fbuild distributed
//! build farm.
//!
//! This crate defines the coordinator wire messages, the protocol version
//! that partitions incompatible fleets, and the error types shared by all
//! fbuild components.

pub mod constants;
pub mod defaults;
pub mod error;
pub mod message;

// Re-export commonly used types at the crate root
pub use error::{BrokerageError, BrokerageResult};
pub use message::{CoordinatorRequest, CoordinatorResponse};
