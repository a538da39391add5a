use flexauto_core::traits::MouseButton;

use crate::block::{ActionResult, BlockHeader};
use crate::services::Services;

/// Clicks at screen coordinates `X`, `Y` with `Button` (`Left` by default).
#[derive(Debug)]
pub struct MouseClickAction {
    pub header: BlockHeader,
}

impl MouseClickAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    fn coordinate(&self, key: &str) -> Result<i32, String> {
        let raw = self
            .header
            .param(key)
            .ok_or_else(|| format!("Coordinate {key} is not set"))?;
        raw.trim()
            .parse()
            .map_err(|_| format!("Invalid coordinate {key} '{raw}'"))
    }

    pub async fn execute(&self, services: &Services) -> ActionResult {
        let (x, y) = match (self.coordinate("X"), self.coordinate("Y")) {
            (Ok(x), Ok(y)) => (x, y),
            (Err(e), _) | (_, Err(e)) => return ActionResult::failed(e),
        };
        let button = match self.header.param("Button").map(|b| b.trim().to_lowercase()).as_deref() {
            None | Some("left") => MouseButton::Left,
            Some("right") => MouseButton::Right,
            Some(other) => return ActionResult::failed(format!("Unknown mouse button '{other}'")),
        };

        match services.input.click(x, y, button).await {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failed(format!("Mouse click failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fakes, InputCall};

    #[tokio::test]
    async fn test_click() {
        let fakes = Fakes::new();
        let action = MouseClickAction::new(
            BlockHeader::new("MouseClick")
                .with_param("X", "120")
                .with_param("Y", "-5")
                .with_param("Button", "Right"),
        );
        assert!(action.execute(&fakes.services()).await.is_success());
        assert_eq!(
            fakes.input_calls(),
            vec![InputCall::Click(120, -5, MouseButton::Right)]
        );
    }

    #[tokio::test]
    async fn test_bad_coordinates() {
        let fakes = Fakes::new();
        let action = MouseClickAction::new(BlockHeader::new("MouseClick").with_param("X", "1"));
        assert!(!action.execute(&fakes.services()).await.is_success());
        assert!(fakes.input_calls().is_empty());
    }
}
