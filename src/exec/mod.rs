pub mod background;
pub mod connection;
pub mod scope;
pub mod selection;
pub mod selector;
pub mod statement;

pub use background::{liveness, run_while_alive, LivenessGuard, LivenessSignal};
pub use connection::{ConnectionConfig, SslMode};
pub use scope::{DbScope, ScopedTransaction};
pub use selection::SelectionState;
pub use selector::{ResultRows, SqlFactory, TableSelector};
pub use statement::ParameterMap;
