// src/utils/system.rs: System functions

use sysinfo::System;


/// Determines how many per-sample tasks may run at once.
///
/// # Arguments
///
/// * `requested` - Explicit `--threads` value, if given.
///
/// # Returns
/// The requested count (at least 1), otherwise the number of physical cores.
pub fn detect_worker_count(requested: Option<usize>) -> usize {
    match requested {
        Some(n) => n.max(1),
        None => System::physical_core_count().unwrap_or(1).max(1),
    }
}
