/// Aggregated outcome of one ingestion run, in either mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub rows_processed: u64,
    pub unique_timestamps: u64,
    pub errors: u64,
}
