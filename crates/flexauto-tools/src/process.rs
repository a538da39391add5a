//! Launching files and programs, killing processes by name.

use std::path::Path;

use async_trait::async_trait;
use sysinfo::System;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::ProcessControl;

/// Process control backed by the OS default handler and `sysinfo`.
#[derive(Debug, Default)]
pub struct SystemProcesses;

#[async_trait]
impl ProcessControl for SystemProcesses {
    async fn open(&self, path: &Path) -> Result<()> {
        open::that_detached(path)
            .map_err(|e| FlexError::Driver(format!("Failed to open {}: {e}", path.display())))?;
        tracing::info!("🚀 Opened {}", path.display());
        Ok(())
    }

    async fn close(&self, name: &str) -> Result<usize> {
        let name = name.to_string();
        let killed = tokio::task::spawn_blocking(move || kill_by_name(&name))
            .await
            .map_err(|e| FlexError::Driver(format!("process scan failed: {e}")))?;
        Ok(killed)
    }
}

fn kill_by_name(name: &str) -> usize {
    let mut sys = System::new();
    sys.refresh_processes();
    let mut killed = 0;
    for process in sys.processes().values() {
        if !name_matches(process.name(), name) {
            continue;
        }
        if process.kill() {
            killed += 1;
        } else {
            tracing::warn!("⚠️ Could not kill {} (pid {})", process.name(), process.pid());
        }
    }
    if killed > 0 {
        tracing::info!("🛑 Killed {killed} '{name}' process(es)");
    }
    killed
}

/// Case-insensitive match that also accepts the `.exe` form of `wanted`.
pub fn name_matches(actual: &str, wanted: &str) -> bool {
    let actual = actual.to_lowercase();
    let wanted = wanted.trim().to_lowercase();
    if wanted.is_empty() {
        return false;
    }
    actual == wanted
        || actual.strip_suffix(".exe") == Some(wanted.as_str())
        || wanted.strip_suffix(".exe") == Some(actual.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matching() {
        assert!(name_matches("notepad.exe", "Notepad"));
        assert!(name_matches("firefox", "firefox.exe"));
        assert!(name_matches("Code", "code"));
        assert!(!name_matches("notepad++.exe", "notepad"));
        assert!(!name_matches("anything", "  "));
    }

    #[tokio::test]
    async fn test_close_unknown_process_kills_nothing() {
        let killed = SystemProcesses
            .close("flexauto-no-such-process-7f3a")
            .await
            .unwrap();
        assert_eq!(killed, 0);
    }
}
