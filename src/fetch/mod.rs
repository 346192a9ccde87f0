pub mod fetcher;
pub mod windows;

pub use fetcher::{FailurePolicy, FetchReport, SensorFetcher, WindowFailure, normalize_record};
pub use windows::{SubWindow, split_range};
