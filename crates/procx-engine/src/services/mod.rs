//! Service facades over the command executor
//!
//! Each service runs commands as the system by default; `as_user` returns a
//! copy that runs them as an authenticated user instead.

mod history;
mod management;
mod runtime;
mod task;

pub use history::HistoryService;
pub use management::ManagementService;
pub use runtime::RuntimeService;
pub use task::TaskService;
