//! Global key combination trigger.
//!
//! Parameters: `Key` and `Modifiers` (`+`-separated). The scheduler
//! registers the normalized combination and runs matching scenarios as
//! forced runs when the key-down arrives, so the key event itself is the
//! edge. Evaluated by itself the trigger never fires.

use flexauto_core::error::Result;
use flexauto_core::types::KeyCombo;

use crate::block::BlockHeader;

#[derive(Debug)]
pub struct HotkeyTrigger {
    pub header: BlockHeader,
}

impl HotkeyTrigger {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub fn combo(&self) -> Result<KeyCombo> {
        let key = self.header.require("Key")?;
        Ok(KeyCombo::new(key, self.header.param("Modifiers").unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combo_normalized() {
        let t = HotkeyTrigger::new(
            BlockHeader::new("HotkeyTrigger")
                .with_param("Key", "F9")
                .with_param("Modifiers", "Shift + Ctrl"),
        );
        assert_eq!(t.combo().unwrap(), KeyCombo::new("f9", "ctrl+shift"));
    }

    #[test]
    fn test_missing_key() {
        let t = HotkeyTrigger::new(BlockHeader::new("HotkeyTrigger"));
        assert!(t.combo().is_err());
    }
}
