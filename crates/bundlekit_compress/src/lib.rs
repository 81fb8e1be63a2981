pub use self::cache_store::*;
pub use self::job::*;
pub use self::scheduler::*;

pub mod backend;
mod cache_store;
mod execution_state;
pub mod format;
mod job;
pub mod overrides;
mod scheduler;
