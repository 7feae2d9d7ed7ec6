pub mod heap;
pub mod storage;

pub use heap::{PriorityQueue, DEFAULT_INITIAL_CAPACITY};
pub use storage::MemoryBackend;
