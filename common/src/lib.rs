pub mod config;
pub mod error;
pub mod group;
pub mod ingest;
pub mod plot;
pub mod report;
pub mod table;
pub mod util;
