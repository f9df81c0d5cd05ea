/// Scan identifiers are random UUIDs, generated when an analysis succeeds.
pub type ScanId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
