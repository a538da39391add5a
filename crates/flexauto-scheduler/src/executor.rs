//! Scenario executor. Runs one scenario's chain once.
//!
//! The chain must start with a trigger and continue with actions only. A
//! non-forced run evaluates the trigger first; a forced run skips it (the
//! scheduler already decided to run). Actions execute in order and the run
//! stops at the first failure.

use uuid::Uuid;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::types::Scenario;

use crate::actions::Action;
use crate::block::{ActionResult, Block, BlockValue, parse_chain};
use crate::context::ExecutionContext;
use crate::services::Services;
use crate::triggers::Trigger;

/// Whether the chain ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Executed,
    NotExecuted,
}

impl RunOutcome {
    pub fn is_executed(self) -> bool {
        self == RunOutcome::Executed
    }
}

/// Split a chain into its leading trigger and the following actions.
pub fn split_chain(blocks: Vec<Block>) -> Result<(Trigger, Vec<Action>)> {
    let mut iter = blocks.into_iter();
    let trigger = match iter.next() {
        Some(Block::Trigger(t)) => t,
        Some(other) => {
            return Err(FlexError::Block(format!(
                "chain must start with a trigger, found '{}'",
                other.kind()
            )));
        }
        None => return Err(FlexError::Block("chain is empty".into())),
    };

    let mut actions = Vec::new();
    for (offset, block) in iter.enumerate() {
        match block {
            Block::Action(a) => actions.push(a),
            Block::Trigger(t) => {
                return Err(FlexError::Block(format!(
                    "block {} ('{}') is a trigger; only actions may follow the first block",
                    offset + 2,
                    t.header().kind
                )));
            }
        }
    }
    Ok((trigger, actions))
}

pub struct ScenarioExecutor {
    services: Services,
}

impl ScenarioExecutor {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Parse a scenario and return its validated leading trigger.
    pub fn leading_trigger(&self, scenario: &Scenario) -> Result<Trigger> {
        let blocks = parse_chain(&scenario.blocks_json)?;
        split_chain(blocks).map(|(trigger, _)| trigger)
    }

    /// Run a scenario once. `bindings` are recorded in the context before
    /// the first action, keyed by the block that produced them.
    pub async fn run(
        &self,
        scenario: &Scenario,
        forced: bool,
        bindings: Vec<(Uuid, BlockValue)>,
    ) -> RunOutcome {
        let blocks = match parse_chain(&scenario.blocks_json) {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::error!("❌ Scenario '{}': failed to load blocks: {e}", scenario.name);
                return RunOutcome::NotExecuted;
            }
        };
        if blocks.is_empty() {
            tracing::warn!("⚠️ Scenario '{}' has no blocks", scenario.name);
            return RunOutcome::NotExecuted;
        }
        let (mut trigger, actions) = match split_chain(blocks) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("❌ Scenario '{}': {e}", scenario.name);
                return RunOutcome::NotExecuted;
            }
        };

        if !forced {
            match trigger.should_fire(scenario.last_executed, &self.services).await {
                Ok(true) => {}
                Ok(false) => return RunOutcome::NotExecuted,
                Err(e) => {
                    tracing::warn!("⚠️ Scenario '{}': trigger check failed: {e}", scenario.name);
                    return RunOutcome::NotExecuted;
                }
            }
        }

        tracing::info!("▶️ Running scenario '{}'", scenario.name);
        let mut ctx = ExecutionContext::new();
        for (id, value) in bindings {
            ctx.set(id, value);
        }

        for (index, action) in actions.iter().enumerate() {
            let position = index + 2;
            match action.execute(&ctx, &self.services).await {
                ActionResult::Success(Some(value)) => ctx.set(action.header().id, value),
                ActionResult::Success(None) => {}
                ActionResult::Failure(Some(message)) => {
                    tracing::error!(
                        "❌ Scenario '{}': block {position} ({}) failed: {message}",
                        scenario.name,
                        action.header().kind
                    );
                    return RunOutcome::NotExecuted;
                }
                ActionResult::Failure(None) => {
                    tracing::info!(
                        "⏹️ Scenario '{}' stopped at block {position} ({}): no data",
                        scenario.name,
                        action.header().kind
                    );
                    return RunOutcome::NotExecuted;
                }
            }
        }

        tracing::info!("✅ Scenario '{}' executed", scenario.name);
        RunOutcome::Executed
    }
}
