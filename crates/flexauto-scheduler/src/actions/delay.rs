use std::time::Duration;

use crate::block::{ActionResult, BlockHeader};

/// Pauses the chain for `Milliseconds`.
#[derive(Debug)]
pub struct DelayAction {
    pub header: BlockHeader,
}

impl DelayAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub async fn execute(&self) -> ActionResult {
        let Some(raw) = self.header.param("Milliseconds") else {
            return ActionResult::failed("Delay duration is not set");
        };
        let Ok(ms) = raw.trim().parse::<u64>() else {
            return ActionResult::failed(format!("Invalid delay duration '{raw}'"));
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;
        ActionResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delay_waits() {
        let action = DelayAction::new(BlockHeader::new("Delay").with_param("Milliseconds", "30"));
        let start = std::time::Instant::now();
        assert_eq!(action.execute().await, ActionResult::ok());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_delay_invalid() {
        let missing = DelayAction::new(BlockHeader::new("Delay"));
        assert!(!missing.execute().await.is_success());
        let bad = DelayAction::new(BlockHeader::new("Delay").with_param("Milliseconds", "-1"));
        assert!(!bad.execute().await.is_success());
    }
}
