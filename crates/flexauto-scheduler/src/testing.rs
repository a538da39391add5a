//! In-process fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::chat::normalize_command;
use flexauto_core::traits::{
    CatalogCheck, ChatTransport, InputDriver, MouseButton, ProcessControl, VideoCheck,
};
use flexauto_core::types::{BotCommand, ChatCommandEvent};

use crate::persistence::SqliteStore;
use crate::services::Services;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InputCall {
    Type(String, bool),
    Paste(String),
    Click(i32, i32, MouseButton),
}

#[derive(Default)]
struct FakeInput {
    calls: Mutex<Vec<InputCall>>,
}

#[async_trait]
impl InputDriver for FakeInput {
    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        self.calls.lock().unwrap().push(InputCall::Click(x, y, button));
        Ok(())
    }

    async fn type_text(&self, text: &str, char_by_char: bool) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(InputCall::Type(text.to_string(), char_by_char));
        Ok(())
    }

    async fn paste(&self, text: &str) -> Result<()> {
        self.calls.lock().unwrap().push(InputCall::Paste(text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct FakeProcess {
    opened: Mutex<Vec<PathBuf>>,
    running: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl ProcessControl for FakeProcess {
    async fn open(&self, path: &Path) -> Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self, name: &str) -> Result<usize> {
        Ok(self.running.lock().unwrap().remove(name).unwrap_or(0))
    }
}

#[derive(Default)]
struct FakeChecks {
    videos: Mutex<VecDeque<Option<String>>>,
    titles: Mutex<VecDeque<Option<Vec<String>>>>,
    last_key: Mutex<Option<String>>,
}

#[async_trait]
impl VideoCheck for FakeChecks {
    async fn check_new_video(&self, _channel_id: &str, api_key: &str) -> Result<Option<String>> {
        *self.last_key.lock().unwrap() = Some(api_key.to_string());
        self.videos
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FlexError::Http("no scripted response".into()))
    }
}

#[async_trait]
impl CatalogCheck for FakeChecks {
    async fn check_new_titles(
        &self,
        _genre: &str,
        _period: &str,
        _region: &str,
        api_key: &str,
    ) -> Result<Option<Vec<String>>> {
        *self.last_key.lock().unwrap() = Some(api_key.to_string());
        self.titles
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FlexError::Http("no scripted response".into()))
    }
}

pub(crate) struct FakeChat {
    configured: AtomicBool,
    sent: Mutex<Vec<String>>,
    menus: Mutex<Vec<Vec<BotCommand>>>,
    received: Mutex<Vec<(String, DateTime<Utc>)>>,
    events: broadcast::Sender<ChatCommandEvent>,
}

impl Default for FakeChat {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            configured: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            menus: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            events,
        }
    }
}

impl FakeChat {
    /// Simulate an inbound command from the paired chat.
    pub(crate) fn emit(&self, text: &str) {
        let now = Utc::now();
        self.received
            .lock()
            .unwrap()
            .push((normalize_command(text), now));
        let _ = self.events.send(ChatCommandEvent {
            text: text.to_string(),
            chat_id: 1,
            received_at: now,
        });
    }
}

#[async_trait]
impl ChatTransport for FakeChat {
    fn initialize(&self, _token: &str, _chat_id: Option<i64>) -> Result<()> {
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn start_listening(&self) -> Result<()> {
        Ok(())
    }

    fn stop_listening(&self) {}

    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn set_commands(&self, commands: Vec<BotCommand>) -> Result<()> {
        self.menus.lock().unwrap().push(commands);
        Ok(())
    }

    fn has_command_since(&self, command: &str, since: Option<DateTime<Utc>>) -> bool {
        let since = since.unwrap_or_else(|| Utc::now() - chrono::TimeDelta::seconds(10));
        self.received
            .lock()
            .unwrap()
            .iter()
            .any(|(c, at)| c == command && *at > since)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatCommandEvent> {
        self.events.subscribe()
    }
}

/// A full set of fakes over an in-memory store.
pub(crate) struct Fakes {
    pub store: Arc<SqliteStore>,
    pub chat: Arc<FakeChat>,
    input: Arc<FakeInput>,
    process: Arc<FakeProcess>,
    checks: Arc<FakeChecks>,
}

impl Fakes {
    pub(crate) fn new() -> Self {
        Self {
            store: Arc::new(SqliteStore::open_in_memory().unwrap()),
            chat: Arc::new(FakeChat::default()),
            input: Arc::new(FakeInput::default()),
            process: Arc::new(FakeProcess::default()),
            checks: Arc::new(FakeChecks::default()),
        }
    }

    pub(crate) fn services(&self) -> Services {
        Services::new(self.store.clone())
            .with_chat(self.chat.clone())
            .with_input(self.input.clone())
            .with_process(self.process.clone())
            .with_video(self.checks.clone())
            .with_catalog(self.checks.clone())
    }

    pub(crate) fn input_calls(&self) -> Vec<InputCall> {
        self.input.calls.lock().unwrap().clone()
    }

    pub(crate) fn opened(&self) -> Vec<PathBuf> {
        self.process.opened.lock().unwrap().clone()
    }

    pub(crate) fn set_running(&self, name: &str, count: usize) {
        self.process
            .running
            .lock()
            .unwrap()
            .insert(name.to_string(), count);
    }

    pub(crate) fn push_video(&self, response: Option<String>) {
        self.checks.videos.lock().unwrap().push_back(response);
    }

    pub(crate) fn push_titles(&self, response: Option<Vec<String>>) {
        self.checks.titles.lock().unwrap().push_back(response);
    }

    pub(crate) fn last_video_key(&self) -> Option<String> {
        self.checks.last_key.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.chat.sent.lock().unwrap().clone()
    }

    pub(crate) fn menus(&self) -> Vec<Vec<BotCommand>> {
        self.chat.menus.lock().unwrap().clone()
    }

    pub(crate) fn set_chat_configured(&self, configured: bool) {
        self.chat.configured.store(configured, Ordering::SeqCst);
    }
}
