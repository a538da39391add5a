//! Collaborator bundle handed to every trigger and action.
//!
//! `Services::new` wires offline stand-ins for everything except the store;
//! the host swaps in real transports and drivers with the `with_*` builders.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::{
    CatalogCheck, ChatTransport, InputDriver, MouseButton, ProcessControl, ScenarioStore,
    VideoCheck,
};
use flexauto_core::types::{AppSettings, BotCommand, ChatCommandEvent};

/// Shared handles to the outside world.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn ScenarioStore>,
    pub chat: Arc<dyn ChatTransport>,
    pub video: Arc<dyn VideoCheck>,
    pub catalog: Arc<dyn CatalogCheck>,
    pub input: Arc<dyn InputDriver>,
    pub process: Arc<dyn ProcessControl>,
}

impl Services {
    pub fn new(store: Arc<dyn ScenarioStore>) -> Self {
        Self {
            store,
            chat: Arc::new(OfflineChat::default()),
            video: Arc::new(Offline),
            catalog: Arc::new(Offline),
            input: Arc::new(Offline),
            process: Arc::new(Offline),
        }
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatTransport>) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_video(mut self, video: Arc<dyn VideoCheck>) -> Self {
        self.video = video;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogCheck>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_input(mut self, input: Arc<dyn InputDriver>) -> Self {
        self.input = input;
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = process;
        self
    }

    /// The settings record, treating a read failure as "no settings".
    pub async fn settings(&self) -> Option<AppSettings> {
        match self.store.settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("⚠️ Failed to read settings: {e}");
                None
            }
        }
    }
}

/// Chat transport that is never configured.
pub struct OfflineChat {
    events: broadcast::Sender<ChatCommandEvent>,
}

impl Default for OfflineChat {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

#[async_trait]
impl ChatTransport for OfflineChat {
    fn initialize(&self, _token: &str, _chat_id: Option<i64>) -> Result<()> {
        Err(FlexError::Channel("no chat transport available".into()))
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn start_listening(&self) -> Result<()> {
        Err(FlexError::Channel("no chat transport available".into()))
    }

    fn stop_listening(&self) {}

    async fn send(&self, _text: &str) -> Result<()> {
        Err(FlexError::Channel("no chat transport available".into()))
    }

    async fn set_commands(&self, _commands: Vec<BotCommand>) -> Result<()> {
        Ok(())
    }

    fn has_command_since(&self, _command: &str, _since: Option<DateTime<Utc>>) -> bool {
        false
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatCommandEvent> {
        self.events.subscribe()
    }
}

/// Stand-in for check services and OS drivers on a host without them.
struct Offline;

#[async_trait]
impl VideoCheck for Offline {
    async fn check_new_video(&self, _channel_id: &str, _api_key: &str) -> Result<Option<String>> {
        Err(FlexError::Http("video check service unavailable".into()))
    }
}

#[async_trait]
impl CatalogCheck for Offline {
    async fn check_new_titles(
        &self,
        _genre: &str,
        _period: &str,
        _region: &str,
        _api_key: &str,
    ) -> Result<Option<Vec<String>>> {
        Err(FlexError::Http("catalog check service unavailable".into()))
    }
}

#[async_trait]
impl InputDriver for Offline {
    async fn click(&self, _x: i32, _y: i32, _button: MouseButton) -> Result<()> {
        Err(FlexError::Driver("input simulation unavailable".into()))
    }

    async fn type_text(&self, _text: &str, _char_by_char: bool) -> Result<()> {
        Err(FlexError::Driver("input simulation unavailable".into()))
    }

    async fn paste(&self, _text: &str) -> Result<()> {
        Err(FlexError::Driver("input simulation unavailable".into()))
    }
}

#[async_trait]
impl ProcessControl for Offline {
    async fn open(&self, _path: &Path) -> Result<()> {
        Err(FlexError::Driver("process control unavailable".into()))
    }

    async fn close(&self, _name: &str) -> Result<usize> {
        Err(FlexError::Driver("process control unavailable".into()))
    }
}
