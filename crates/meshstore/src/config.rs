use meshstore_core::ChunkGeometry;

/// Store-creation configuration. Chunk geometry is fixed for the life of
/// the store once created (I1); `growth_factor` and `cache_budget_bytes`
/// only affect runtime behavior and can be tuned after the fact via
/// [`crate::Store::set_cache_budget`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreConfig {
    pub geometry: ChunkGeometry,
    /// Amortized time-axis growth factor (spec: `max(ceil(T * factor), t + 100)`).
    pub growth_factor: f64,
    pub cache_budget_bytes: u64,
}

impl StoreConfig {
    pub const DEFAULT: Self = Self {
        geometry: ChunkGeometry::DEFAULT,
        growth_factor: 1.5,
        cache_budget_bytes: 64 * 1024 * 1024,
    };
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
