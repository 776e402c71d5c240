mod reaper;
mod storage;

pub use reaper::RecordReaper;
pub use storage::{BrokerStats, MemoryBroker};
