pub mod aggregate;
pub mod command;
pub mod coverage;
pub mod dispatch;
pub mod file;
pub mod genbank;
pub mod matcher;
pub mod plotting;
pub mod sample_key;
pub mod system;
pub mod unaligned_stats;
