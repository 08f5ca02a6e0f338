#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("universe and cmph_data are inconsistent: key {key} at index {index} does not round-trip (I3 violated)")]
    IntegrityViolation { key: u32, index: u32 },

    #[error("mesh universe is empty")]
    EmptyUniverse,

    #[error("cmph_data blob is malformed or truncated")]
    MalformedBlob,
}

pub type ResolverResult<T> = Result<T, ResolverError>;
