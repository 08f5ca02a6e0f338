#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] meshstore_core::StoreError),

    #[error("failed to allocate the bulk-year buffer")]
    AllocationFailed,

    #[error("no input files were supplied")]
    NoInputFiles,
}

pub type IngestResult<T> = Result<T, IngestError>;
