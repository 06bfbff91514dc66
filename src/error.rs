//! Crate-wide error type. Every public operation in this crate returns
//! `StorageResult<T>` instead of the reference source's integer return
//! codes; each abstract error kind it documents has a named variant here.

use thiserror::Error;

use crate::common::config::{FrameId, PageId};
use crate::common::Rid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("page file not found: {0}")]
    FileNotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("page {0} is out of range")]
    PageOutOfRange(PageId),

    #[error("page is full")]
    PageFull,

    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    #[error("buffer pool is not initialized")]
    PoolNotInitialized,

    #[error("buffer pool is already initialized")]
    PoolAlreadyInitialized,

    #[error("buffer pool is shutting down")]
    PoolShuttingDown,

    #[error("no evictable frame available to pin page {0}")]
    PinFailed(PageId),

    #[error("cannot flush pool: frame {0} is still pinned")]
    FlushWhilePinned(FrameId),

    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    #[error("invalid rid {0:?}")]
    InvalidRid(Rid),

    #[error("no record found for rid {0:?}")]
    RecordNotFound(Rid),

    #[error("attribute index {0} out of range")]
    AttributeIndexOutOfRange(usize),

    #[error("attribute type mismatch at index {0}")]
    AttributeTypeMismatch(usize),

    #[error("no more tuples")]
    NoMoreTuples,

    #[error("unsupported data type")]
    UnsupportedDataType,
}

pub type StorageResult<T> = Result<T, StorageError>;
