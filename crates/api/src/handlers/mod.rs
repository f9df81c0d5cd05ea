pub mod analysis;
pub mod scans;
