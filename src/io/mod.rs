/// CSV export of finished runs.
pub mod export;
