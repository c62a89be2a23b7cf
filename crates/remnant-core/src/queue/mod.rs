//! Queue module: retry logic and the in-memory task queue.
//!
//! The `TaskQueue` port itself lives in `ports::task_queue`; this module is
//! the implementation used by tests and by the CLI's JSON snapshots.

mod memory;
mod retry;

pub use memory::InMemoryTaskQueue;
pub use retry::RetryPolicy;
