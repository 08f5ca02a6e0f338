#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error(transparent)]
    Store(#[from] meshstore_core::StoreError),

    #[error(transparent)]
    Resolver(#[from] meshstore_mesh::ResolverError),

    #[error(transparent)]
    Calendar(#[from] meshstore_time::CalendarError),

    #[error(transparent)]
    Ingest(#[from] meshstore_ingest::IngestError),

    #[error("mesh key {key} is not in the store's universe")]
    MeshNotFound { key: u32 },

    #[error("resolved mesh index {index} is out of bounds for N={n}")]
    IndexOutOfBounds { index: u32, n: u32 },
}

pub type FacadeResult<T> = Result<T, FacadeError>;
