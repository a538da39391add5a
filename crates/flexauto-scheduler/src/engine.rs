//! Scheduler engine. Owns the active scenario set and drives triggers.
//!
//! Polled triggers (Time, Cyclic, FileChange) get one loop task per
//! scenario. Event-driven triggers (Hotkey, ChatCommand) are registered in
//! dispatch registries and run when a matching event arrives. Every run is
//! forced (the trigger already fired) and tracked so shutdown can wait for
//! in-flight chains.
//!
//! `reload` is serialized: it tears down the current generation (cancel
//! loops, stop watchers, clear registries), waits a bounded time for the
//! old loops, settles, then rebuilds from the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use flexauto_core::config::SchedulerConfig;
use flexauto_core::error::Result;
use flexauto_core::traits::chat::normalize_command;
use flexauto_core::types::{KeyCombo, Scenario, ScenarioExecuted};

use crate::block::BlockValue;
use crate::events::ExecutionNotifier;
use crate::executor::{RunOutcome, ScenarioExecutor};
use crate::registry::{CommandRegistry, HotkeyRegistry, dedupe_menu};
use crate::services::Services;
use crate::triggers::{Trigger, WatchHandle};

/// What a reload registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub generation: u64,
    /// Scenarios with a polling loop.
    pub polling: usize,
    pub hotkeys: usize,
    pub commands: usize,
    /// Active scenarios left inert (bad chain, bad parameters, watch failure).
    pub skipped: usize,
}

/// State shared between the engine, its loops and its runs.
struct Shared {
    executor: ScenarioExecutor,
    notifier: ExecutionNotifier,
    config: SchedulerConfig,
    snapshot: RwLock<HashMap<Uuid, Scenario>>,
    hotkeys: Mutex<HotkeyRegistry>,
    commands: Mutex<CommandRegistry>,
    runs: TaskTracker,
}

impl Shared {
    fn services(&self) -> &Services {
        self.executor.services()
    }

    fn last_executed(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.snapshot
            .read()
            .ok()
            .and_then(|s| s.get(&id).and_then(|sc| sc.last_executed))
    }

    fn scenario(&self, id: Uuid) -> Option<Scenario> {
        self.snapshot.read().ok().and_then(|s| s.get(&id).cloned())
    }

    /// Forced run of a known scenario, recording a successful execution.
    async fn execute(&self, id: Uuid, bindings: Vec<(Uuid, BlockValue)>) -> RunOutcome {
        let Some(scenario) = self.scenario(id) else {
            tracing::debug!("Scenario {id} is no longer active");
            return RunOutcome::NotExecuted;
        };
        self.run_forced(scenario, bindings).await
    }

    async fn run_forced(&self, scenario: Scenario, bindings: Vec<(Uuid, BlockValue)>) -> RunOutcome {
        let outcome = self.executor.run(&scenario, true, bindings).await;
        if outcome.is_executed() {
            self.record_execution(&scenario).await;
        }
        outcome
    }

    async fn record_execution(&self, scenario: &Scenario) {
        let now = Utc::now();
        if let Ok(mut snapshot) = self.snapshot.write() {
            if let Some(entry) = snapshot.get_mut(&scenario.id) {
                entry.last_executed = Some(now);
            }
        }

        if let Err(e) = self.services().store.set_last_executed(scenario.id, now).await {
            tracing::error!("❌ Failed to persist last execution of '{}': {e}", scenario.name);
        }

        self.notifier.publish(ScenarioExecuted {
            scenario_id: scenario.id,
            executed_at: now,
        });
    }
}

fn spawn_run(shared: &Arc<Shared>, id: Uuid, bindings: Vec<(Uuid, BlockValue)>) {
    let shared_for_run = Arc::clone(shared);
    shared.runs.spawn(async move {
        shared_for_run.execute(id, bindings).await;
    });
}

fn dispatch_hotkey(shared: &Arc<Shared>, combo: &KeyCombo) -> usize {
    let ids = match shared.hotkeys.lock() {
        Ok(reg) => reg.lookup(combo),
        Err(_) => return 0,
    };
    if ids.is_empty() {
        tracing::debug!("No scenario bound to {combo}");
    }
    for id in &ids {
        tracing::info!("⌨️ Hotkey {combo} → scenario {id}");
        spawn_run(shared, *id, Vec::new());
    }
    ids.len()
}

fn dispatch_command(shared: &Arc<Shared>, text: &str) -> usize {
    let command = normalize_command(text);
    let ids = match shared.commands.lock() {
        Ok(reg) => reg.lookup(&command),
        Err(_) => return 0,
    };
    if ids.is_empty() {
        tracing::debug!("No scenario bound to /{command}");
    }
    for id in &ids {
        tracing::info!("💬 Command /{command} → scenario {id}");
        spawn_run(shared, *id, Vec::new());
    }
    ids.len()
}

/// Sleep unless cancelled first. Returns true when cancelled.
async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Per-scenario polling loop for Time, Cyclic and FileChange triggers.
async fn scenario_loop(
    shared: Arc<Shared>,
    id: Uuid,
    name: String,
    mut trigger: Trigger,
    token: CancellationToken,
) {
    let jitter = {
        let range = shared.config.start_jitter_range();
        rand::thread_rng().gen_range(range)
    };
    if sleep_or_cancel(&token, Duration::from_millis(jitter)).await {
        return;
    }
    tracing::debug!("🔁 Polling loop started for '{name}'");

    while !token.is_cancelled() {
        let last = shared.last_executed(id);
        let pause = match trigger.should_fire(last, shared.services()).await {
            Ok(true) => {
                tracing::info!("🔔 Trigger fired for '{name}'");
                let bindings = trigger.take_bindings();
                spawn_run(&shared, id, bindings);
                shared.config.poll_interval()
            }
            Ok(false) => shared.config.poll_interval(),
            Err(e) => {
                tracing::error!("⚠️ Trigger check failed for '{name}': {e}");
                shared.config.error_backoff()
            }
        };
        if sleep_or_cancel(&token, pause).await {
            break;
        }
    }
    tracing::debug!("Polling loop for '{name}' stopped");
}

/// One reload generation: its loops, watchers and cancellation token.
struct Generation {
    number: u64,
    token: CancellationToken,
    loops: Vec<JoinHandle<()>>,
    watches: HashMap<Uuid, WatchHandle>,
}

/// The scheduler.
pub struct Scheduler {
    shared: Arc<Shared>,
    generation: tokio::sync::Mutex<Generation>,
    service_token: CancellationToken,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(services: Services, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor: ScenarioExecutor::new(services),
                notifier: ExecutionNotifier::new(),
                config,
                snapshot: RwLock::new(HashMap::new()),
                hotkeys: Mutex::new(HotkeyRegistry::default()),
                commands: Mutex::new(CommandRegistry::default()),
                runs: TaskTracker::new(),
            }),
            generation: tokio::sync::Mutex::new(Generation {
                number: 0,
                token: CancellationToken::new(),
                loops: Vec::new(),
                watches: HashMap::new(),
            }),
            service_token: CancellationToken::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn services(&self) -> &Services {
        self.shared.services()
    }

    /// Connect the chat transport, attach event sources and load scenarios.
    pub async fn start(
        &self,
        key_events: Option<mpsc::UnboundedReceiver<KeyCombo>>,
    ) -> Result<ReloadSummary> {
        tracing::info!("⏰ Scheduler starting");
        self.connect_chat().await;
        self.listen_chat();
        if let Some(rx) = key_events {
            self.listen_keys(rx);
        }
        self.reload().await
    }

    async fn connect_chat(&self) {
        let services = self.services();
        let Some(settings) = services.settings().await else {
            return;
        };
        let Some(token) = settings.active_bot_token() else {
            tracing::info!("💬 Telegram bot disabled or not configured");
            return;
        };
        if let Err(e) = services.chat.initialize(token, settings.telegram_chat_id) {
            tracing::warn!("⚠️ Telegram bot initialization failed: {e}");
            return;
        }
        if let Err(e) = services.chat.start_listening().await {
            tracing::warn!("⚠️ Telegram listener failed to start: {e}");
        }
    }

    fn listen_chat(&self) {
        let mut rx = self.services().chat.subscribe();
        let shared = Arc::clone(&self.shared);
        let token = self.service_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(event) => {
                            dispatch_command(&shared, &event.text);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("⚠️ Dropped {n} chat command(s)");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        self.push_listener(handle);
    }

    fn listen_keys(&self, mut rx: mpsc::UnboundedReceiver<KeyCombo>) {
        let shared = Arc::clone(&self.shared);
        let token = self.service_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    combo = rx.recv() => match combo {
                        Some(combo) => {
                            dispatch_hotkey(&shared, &combo);
                        }
                        None => break,
                    },
                }
            }
        });
        self.push_listener(handle);
    }

    fn push_listener(&self, handle: JoinHandle<()>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(handle);
        }
    }

    /// Rebuild the running state from the store.
    pub async fn reload(&self) -> Result<ReloadSummary> {
        let mut generation = self.generation.lock().await;
        self.teardown(&mut generation).await;
        tokio::time::sleep(self.shared.config.settle_delay()).await;

        let token = CancellationToken::new();
        generation.token = token.clone();
        generation.number += 1;

        let scenarios: Vec<Scenario> = match self.services().store.active_scenarios().await {
            Ok(list) => list.into_iter().filter(|s| s.is_active).collect(),
            Err(e) => {
                if let Ok(mut snapshot) = self.shared.snapshot.write() {
                    snapshot.clear();
                }
                tracing::error!("❌ Failed to load scenarios: {e}");
                return Err(e);
            }
        };
        if let Ok(mut snapshot) = self.shared.snapshot.write() {
            *snapshot = scenarios.iter().map(|s| (s.id, s.clone())).collect();
        }

        let mut summary = ReloadSummary {
            generation: generation.number,
            ..ReloadSummary::default()
        };
        let mut menu = Vec::new();

        for scenario in &scenarios {
            let trigger = match self.shared.executor.leading_trigger(scenario) {
                Ok(trigger) => trigger,
                Err(e) => {
                    tracing::warn!("⚠️ Scenario '{}' skipped: {e}", scenario.name);
                    summary.skipped += 1;
                    continue;
                }
            };

            match trigger {
                Trigger::Hotkey(hotkey) => match hotkey.combo() {
                    Ok(combo) => {
                        tracing::debug!("⌨️ '{}' bound to {combo}", scenario.name);
                        if let Ok(mut reg) = self.shared.hotkeys.lock() {
                            reg.register(combo, scenario.id);
                        }
                        summary.hotkeys += 1;
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Scenario '{}' skipped: {e}", scenario.name);
                        summary.skipped += 1;
                    }
                },
                Trigger::ChatCommand(command) => {
                    match (command.command(), command.menu_entry(&scenario.name)) {
                        (Ok(text), Ok(entry)) => {
                            tracing::debug!("💬 '{}' bound to /{text}", scenario.name);
                            if let Ok(mut reg) = self.shared.commands.lock() {
                                reg.register(text, scenario.id);
                            }
                            menu.push(entry);
                            summary.commands += 1;
                        }
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::warn!("⚠️ Scenario '{}' skipped: {e}", scenario.name);
                            summary.skipped += 1;
                        }
                    }
                }
                mut polled => {
                    if let Trigger::FileChange(watch) = &mut polled {
                        if let Err(e) = watch.start_watching() {
                            tracing::warn!("⚠️ Scenario '{}' inert: {e}", scenario.name);
                            summary.skipped += 1;
                            continue;
                        }
                        generation.watches.insert(scenario.id, watch.handle());
                    }
                    let handle = tokio::spawn(scenario_loop(
                        Arc::clone(&self.shared),
                        scenario.id,
                        scenario.name.clone(),
                        polled,
                        token.clone(),
                    ));
                    generation.loops.push(handle);
                    summary.polling += 1;
                }
            }
        }

        let chat = &self.services().chat;
        if chat.is_configured() {
            if let Err(e) = chat.set_commands(dedupe_menu(menu)).await {
                tracing::warn!("⚠️ Failed to publish command menu: {e}");
            }
        }

        tracing::info!(
            "🔄 Scheduler generation {}: {} polling, {} hotkey, {} command, {} skipped",
            summary.generation,
            summary.polling,
            summary.hotkeys,
            summary.commands,
            summary.skipped
        );
        Ok(summary)
    }

    /// Cancel loops, stop watchers, clear registries, then wait (bounded)
    /// for the loops to exit.
    async fn teardown(&self, generation: &mut Generation) {
        generation.token.cancel();
        for (_, watch) in generation.watches.drain() {
            watch.stop();
        }
        if let Ok(mut reg) = self.shared.hotkeys.lock() {
            reg.clear();
        }
        if let Ok(mut reg) = self.shared.commands.lock() {
            reg.clear();
        }

        let loops = std::mem::take(&mut generation.loops);
        if loops.is_empty() {
            return;
        }
        let drain = self.shared.config.drain_timeout();
        if tokio::time::timeout(drain, futures::future::join_all(loops))
            .await
            .is_err()
        {
            tracing::warn!("⚠️ Polling loops still running after {drain:?}");
        }
    }

    /// Run every scenario bound to the combination.
    pub fn dispatch_hotkey(&self, combo: &KeyCombo) -> usize {
        dispatch_hotkey(&self.shared, combo)
    }

    /// Run every scenario bound to the command text.
    pub fn dispatch_command(&self, text: &str) -> usize {
        dispatch_command(&self.shared, text)
    }

    /// Run a scenario immediately and wait for the outcome. Scenarios not
    /// loaded by a reload (inactive, or before `start`) are read from the store.
    pub async fn run_now(&self, id: Uuid) -> RunOutcome {
        if self.shared.scenario(id).is_some() {
            return self.shared.execute(id, Vec::new()).await;
        }
        match self.services().store.scenario(id).await {
            Ok(Some(scenario)) => self.shared.run_forced(scenario, Vec::new()).await,
            Ok(None) => {
                tracing::warn!("⚠️ Scenario {id} not found");
                RunOutcome::NotExecuted
            }
            Err(e) => {
                tracing::error!("❌ Failed to load scenario {id}: {e}");
                RunOutcome::NotExecuted
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScenarioExecuted> {
        self.shared.notifier.subscribe()
    }

    pub fn history(&self) -> Vec<ScenarioExecuted> {
        self.shared.notifier.history()
    }

    /// Scenarios registered for a key combination.
    pub fn hotkey_bindings(&self, combo: &KeyCombo) -> Vec<Uuid> {
        self.shared
            .hotkeys
            .lock()
            .map(|reg| reg.lookup(combo))
            .unwrap_or_default()
    }

    /// Scenarios registered for a chat command.
    pub fn command_bindings(&self, command: &str) -> Vec<Uuid> {
        self.shared
            .commands
            .lock()
            .map(|reg| reg.lookup(&normalize_command(command)))
            .unwrap_or_default()
    }

    /// Number of in-flight runs.
    pub fn running(&self) -> usize {
        self.shared.runs.len()
    }

    /// Stop everything and wait (bounded) for in-flight runs.
    pub async fn shutdown(&self) {
        tracing::info!("🛑 Scheduler shutting down");
        self.service_token.cancel();
        {
            let mut generation = self.generation.lock().await;
            self.teardown(&mut generation).await;
        }
        let listeners = self
            .listeners
            .lock()
            .map(|mut l| std::mem::take(&mut *l))
            .unwrap_or_default();
        for handle in listeners {
            let _ = handle.await;
        }
        self.services().chat.stop_listening();

        self.shared.runs.close();
        let limit = self.shared.config.shutdown_timeout();
        if tokio::time::timeout(limit, self.shared.runs.wait())
            .await
            .is_err()
        {
            tracing::warn!("⚠️ {} run(s) still active after {limit:?}", self.running());
        }
    }
}
