pub mod config;

pub use config::{FrameId, PageId, Rid, DEFAULT_REPLACER_K, NO_PAGE, PAGE_SIZE};
