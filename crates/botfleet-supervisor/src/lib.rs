pub mod error;
pub mod reconcile;
pub mod supervisor;
pub mod worker;

pub use error::SupervisorError;
pub use supervisor::{BotIdentity, Supervisor};
