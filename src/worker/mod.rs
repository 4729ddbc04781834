pub mod pending;

pub use pending::{PendingQueue, PendingRun, PendingWorker};
