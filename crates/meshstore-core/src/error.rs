#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is malformed or has an unrecognized magic/version")]
    MalformedFile,

    #[error("row index {index} is out of bounds for T={t}")]
    RowOutOfBounds { index: u64, t: u64 },

    #[error("mesh index {index} is out of bounds for N={n}")]
    MeshOutOfBounds { index: u32, n: u32 },

    #[error("values length {got} does not match selection length {expected}")]
    LengthMismatch { got: usize, expected: usize },

    #[error("extend_time({requested}) is below the current extent ({current})")]
    ShrinkNotAllowed { requested: u64, current: u64 },

    #[error("store was opened read-only")]
    ReadOnly,
}

pub type StoreResult<T> = Result<T, StoreError>;
