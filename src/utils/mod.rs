pub mod config;
pub mod constants;
pub mod dataset;
pub mod env;
pub mod pipeline_state;
pub mod progress_bars;

/// Resident memory of this process in MB, or 0 when it cannot be read.
pub async fn get_memory_usage() -> u64 {
    use sysinfo::System;
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    sys.refresh_process(pid);
    sys.process(pid)
        .map(|p| p.memory() / (1024 * 1024)) // Convert to MB
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_usage_is_this_process() {
        let used = get_memory_usage().await;
        assert!(used > 0);
        let total = sysinfo::System::new_all().total_memory() / (1024 * 1024);
        assert!(used < total);
    }
}
