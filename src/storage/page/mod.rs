pub mod frame;
pub mod page_guard;

pub use frame::{Frame, PageBuf};
pub use page_guard::{PageHandle, PooledPage};
