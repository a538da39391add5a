//! Execution context. Per-run store threading block outputs through a chain.

use std::collections::HashMap;

use uuid::Uuid;

use crate::block::BlockValue;

/// Ephemeral per-run value store. Created fresh for every run and dropped
/// when the chain ends.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    values: HashMap<Uuid, BlockValue>,
    last_output: Option<BlockValue>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a block's value. Also becomes the last output.
    pub fn set(&mut self, block_id: Uuid, value: BlockValue) {
        self.last_output = Some(value.clone());
        self.values.insert(block_id, value);
    }

    pub fn get(&self, block_id: &Uuid) -> Option<&BlockValue> {
        self.values.get(block_id)
    }

    pub fn contains(&self, block_id: &Uuid) -> bool {
        self.values.contains_key(block_id)
    }

    pub fn last_output(&self) -> Option<&BlockValue> {
        self.last_output.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_updates_last_output() {
        let mut ctx = ExecutionContext::new();
        assert!(ctx.last_output().is_none());

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        ctx.set(a, "first".into());
        ctx.set(b, vec!["x".to_string()].into());

        assert_eq!(ctx.get(&a), Some(&BlockValue::Text("first".into())));
        assert_eq!(ctx.last_output(), Some(&BlockValue::List(vec!["x".into()])));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_overwrite_same_block() {
        let mut ctx = ExecutionContext::new();
        let id = Uuid::new_v4();
        ctx.set(id, "old".into());
        ctx.set(id, "new".into());
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get(&id), Some(&BlockValue::Text("new".into())));
    }
}
