//! Store implementations

mod file;
mod log;
mod memory;

pub use file::{FileStore, FileStoreConfig, PATH_PARAM};
pub use log::LogStore;
pub use memory::MemoryStore;
