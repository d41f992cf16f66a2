//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry sweep: removes keys whose deadline has passed

mod sweeper;

pub use sweeper::{spawn_expiry_task, ExpiryTask};
