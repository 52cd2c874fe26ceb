//! Plain data types shared across the resolver, renderer, and pusher.

pub mod instance;
pub mod role;
pub mod tuning;

pub use instance::InstanceRecord;
pub use role::NodeRole;
pub use tuning::{Capacities, Policy, Replication, Threads, TuningParams};
