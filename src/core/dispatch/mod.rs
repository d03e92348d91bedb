//! Command dispatch
//! Two queues, two workers and the discovery cache, tied together by the `Dispatcher` facade.

mod cache;
mod command;
mod dispatcher;
mod queue;
mod worker;

pub use cache::DiscoveryCache;
pub use command::{Command, CommandKind, CommandResult, Pending};
pub use dispatcher::Dispatcher;
pub use queue::Lane;
pub use worker::{Worker, WorkerStats};
