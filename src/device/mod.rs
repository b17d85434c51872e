//! Device stream acquisition

pub mod acquire;

pub use acquire::{acquire, acquire_many, RetryPolicy};
