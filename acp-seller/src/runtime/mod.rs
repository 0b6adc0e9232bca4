//! The concurrent job-processing runtime.
//!
//! Two event sources (the [`socket`] push channel and the [`poll`]
//! reconciler) feed every payload through the single [`dispatcher`]
//! entry point, which deduplicates by job id and routes to the
//! [`stages`] executor. The [`ledger`] provides at-most-one-effect
//! semantics per stage within a process lifetime; the [`supervisor`]
//! owns process lifetime, the PID file, and signal handling.

pub mod alert;
pub mod dispatcher;
pub mod ledger;
pub mod poll;
pub mod socket;
pub mod stages;
pub mod supervisor;

pub use alert::Alerter;
pub use dispatcher::{Dispatcher, Source};
pub use ledger::{StageFlags, StageLedger};
pub use poll::PollReconciler;
pub use socket::{SocketConfig, SocketListener};
pub use stages::StageExecutor;
pub use supervisor::{PidGuard, Supervisor};
