//! Open or close a program.
//!
//! Parameters: `Action` (`Open` or `Close`), `Path` and `ProcessName`.
//! Close uses `ProcessName`, or the file stem of `Path` when it is absent.

use std::path::Path;

use crate::block::{ActionResult, BlockHeader};
use crate::services::Services;

#[derive(Debug)]
pub struct ProcessAction {
    pub header: BlockHeader,
}

impl ProcessAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub async fn execute(&self, services: &Services) -> ActionResult {
        match self.header.param("Action").map(|a| a.trim().to_lowercase()).as_deref() {
            Some("open") => self.open(services).await,
            Some("close") => self.close(services).await,
            Some(other) => ActionResult::failed(format!("Unknown process action '{other}'")),
            None => ActionResult::failed("Process action is not set"),
        }
    }

    async fn open(&self, services: &Services) -> ActionResult {
        let Some(raw) = self.header.param("Path") else {
            return ActionResult::failed("Program path is not set");
        };
        let expanded = shellexpand::tilde(raw.trim()).into_owned();
        let path = Path::new(&expanded);
        if !path.exists() {
            return ActionResult::failed(format!("File not found: {}", path.display()));
        }
        match services.process.open(path).await {
            Ok(()) => {
                tracing::info!("🚀 Opened {}", path.display());
                ActionResult::ok()
            }
            Err(e) => ActionResult::failed(format!("Failed to open {}: {e}", path.display())),
        }
    }

    async fn close(&self, services: &Services) -> ActionResult {
        let name = self
            .header
            .param("ProcessName")
            .map(|n| n.trim().to_string())
            .or_else(|| {
                self.header.param("Path").and_then(|p| {
                    Path::new(p.trim())
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                })
            })
            .filter(|n| !n.is_empty());
        let Some(name) = name else {
            return ActionResult::failed("Process name is not set");
        };

        match services.process.close(&name).await {
            Ok(0) => ActionResult::failed(format!("Process '{name}' is not running")),
            Ok(n) => {
                tracing::info!("🛑 Closed {n} instance(s) of '{name}'");
                ActionResult::ok()
            }
            Err(e) => ActionResult::failed(format!("Failed to close '{name}': {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fakes;

    fn action(params: &[(&str, &str)]) -> ProcessAction {
        let mut header = BlockHeader::new("ProcessAction");
        for (k, v) in params {
            header = header.with_param(k, v);
        }
        ProcessAction::new(header)
    }

    #[tokio::test]
    async fn test_open_existing_file() {
        let fakes = Fakes::new();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().display().to_string();
        let result = action(&[("Action", "Open"), ("Path", &path)])
            .execute(&fakes.services())
            .await;
        assert!(result.is_success());
        assert_eq!(fakes.opened(), vec![file.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let fakes = Fakes::new();
        let result = action(&[("Action", "Open"), ("Path", "/no/such/program")])
            .execute(&fakes.services())
            .await;
        assert!(!result.is_success());
        assert!(fakes.opened().is_empty());
    }

    #[tokio::test]
    async fn test_close_uses_path_stem() {
        let fakes = Fakes::new();
        fakes.set_running("notepad", 2);
        let result = action(&[("Action", "Close"), ("Path", "C:/Windows/notepad.exe")])
            .execute(&fakes.services())
            .await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_close_not_running_fails() {
        let fakes = Fakes::new();
        let result = action(&[("Action", "Close"), ("ProcessName", "ghost")])
            .execute(&fakes.services())
            .await;
        assert_eq!(
            result,
            ActionResult::failed("Process 'ghost' is not running")
        );
    }
}
