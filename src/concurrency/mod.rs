pub mod arena;
pub mod lock;
pub mod registry;

pub use arena::Arena;
pub use lock::{IndexLock, LockMode, TxnGuard};
pub use registry::{Registry, SharedIndexState};
