//! Telegram Bot transport: long polling, chat pairing and the command menu.
//!
//! Only the paired chat is listened to. A chat becomes paired either from
//! the stored settings (`initialize`) or by sending `/pair <code>` while a
//! pairing code is active.

use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use flexauto_core::config::TelegramConfig;
use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::ChatTransport;
use flexauto_core::traits::chat::normalize_command;
use flexauto_core::types::{BotCommand, ChatCommandEvent};

const PAIRING_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const RECENT_WINDOW: TimeDelta = TimeDelta::minutes(1);
const DEFAULT_SINCE: TimeDelta = TimeDelta::seconds(10);
const RETRY_DELAY: Duration = Duration::from_secs(5);

static MENU_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-z0-9_]{1,32}$").expect("menu pattern is valid")
});

#[derive(Debug, Clone)]
struct Pairing {
    code: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct BotState {
    token: Option<String>,
    chat_id: Option<i64>,
    pairing: Option<Pairing>,
    all_commands: Vec<BotCommand>,
    menu_commands: Vec<BotCommand>,
}

struct Inner {
    config: TelegramConfig,
    client: reqwest::Client,
    state: Mutex<BotState>,
    recent: Mutex<VecDeque<(String, DateTime<Utc>)>>,
    events: broadcast::Sender<ChatCommandEvent>,
    paired: watch::Sender<Option<i64>>,
    polling: Mutex<Option<CancellationToken>>,
}

/// What the bot did with one inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `/pair <code>` matched; the chat is now bound.
    Paired(i64),
    /// `/commands` answered with the command list.
    CommandList,
    /// Recorded and broadcast as a command.
    Command(String),
    /// From a foreign chat, or no chat is paired yet.
    Ignored,
}

/// Telegram bot client. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TelegramBot {
    inner: Arc<Inner>,
}

impl TelegramBot {
    pub fn new(config: TelegramConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        let (paired, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                client: reqwest::Client::new(),
                state: Mutex::new(BotState::default()),
                recent: Mutex::new(VecDeque::new()),
                events,
                paired,
                polling: Mutex::new(None),
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BotState) -> T) -> Result<T> {
        let mut state = self
            .inner
            .state
            .lock()
            .map_err(|_| FlexError::Channel("Telegram state lock poisoned".into()))?;
        Ok(f(&mut state))
    }

    fn api_url(&self, token: &str, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.inner.config.api_base.trim_end_matches('/'),
            token,
            method
        )
    }

    fn token(&self) -> Result<String> {
        self.with_state(|s| s.token.clone())?
            .ok_or_else(|| FlexError::Channel("Telegram bot is not configured".into()))
    }

    /// Chat currently bound to the bot.
    pub fn paired_chat_id(&self) -> Option<i64> {
        self.with_state(|s| s.chat_id).ok().flatten()
    }

    /// Watch the paired chat id; changes when `/pair` succeeds.
    pub fn pairing_events(&self) -> watch::Receiver<Option<i64>> {
        self.inner.paired.subscribe()
    }

    /// Start pairing mode and return the code the user must send.
    pub fn start_pairing(&self) -> Result<String> {
        let code = generate_pairing_code();
        let expires_at =
            Utc::now() + TimeDelta::seconds(self.inner.config.pairing_timeout_secs as i64);
        self.with_state(|s| {
            s.pairing = Some(Pairing {
                code: code.clone(),
                expires_at,
            })
        })?;
        tracing::info!(
            "🔗 Pairing mode started, code valid for {}s",
            self.inner.config.pairing_timeout_secs
        );
        Ok(code)
    }

    pub fn stop_pairing(&self) {
        let _ = self.with_state(|s| s.pairing = None);
    }

    /// Active pairing code, if it has not expired.
    pub fn pairing_code(&self) -> Option<String> {
        let now = Utc::now();
        self.with_state(|s| {
            s.pairing
                .as_ref()
                .filter(|p| p.expires_at > now)
                .map(|p| p.code.clone())
        })
        .ok()
        .flatten()
    }

    /// Forget token, chat and pairing, and stop polling.
    pub fn disconnect(&self) {
        self.stop_listening();
        let _ = self.with_state(|s| {
            s.token = None;
            s.chat_id = None;
            s.pairing = None;
        });
        self.inner.paired.send_replace(None);
        tracing::info!("🔌 Telegram bot disconnected");
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let token = self.token()?;
        let response = self
            .inner
            .client
            .get(self.api_url(&token, "getMe"))
            .send()
            .await
            .map_err(|e| FlexError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| FlexError::Channel(format!("Invalid getMe response: {e}")))?;
        body.into_result("getMe")
    }

    /// Get updates using long polling.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let token = self.token()?;
        let response = self
            .inner
            .client
            .get(self.api_url(&token, "getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.inner.config.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| FlexError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| FlexError::Channel(format!("Invalid Telegram response: {e}")))?;
        body.into_result("getUpdates")
    }

    /// Send a text message, optionally with a parse mode.
    pub async fn send_message(&self, chat_id: i64, text: &str, parse_mode: Option<&str>) -> Result<()> {
        let token = self.token()?;
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = mode.into();
        }

        let response = self
            .inner
            .client
            .post(self.api_url(&token, "sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| FlexError::Channel(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| FlexError::Channel(format!("Invalid send response: {e}")))?;
        result.into_result("sendMessage").map(|_| ())
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let token = self.token()?;
        let body = serde_json::json!({ "commands": commands });
        let response = self
            .inner
            .client
            .post(self.api_url(&token, "setMyCommands"))
            .json(&body)
            .send()
            .await
            .map_err(|e| FlexError::Channel(format!("setMyCommands failed: {e}")))?;
        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| FlexError::Channel(format!("Invalid setMyCommands response: {e}")))?;
        result.into_result("setMyCommands").map(|_| ())
    }

    /// Route one inbound text from `chat_id`.
    pub async fn handle_text(&self, chat_id: i64, text: &str) -> Inbound {
        let text = text.trim();
        let expected = self.pairing_code().map(|code| format!("/pair {code}"));
        if expected.is_some_and(|e| text.eq_ignore_ascii_case(&e)) {
            let _ = self.with_state(|s| {
                s.chat_id = Some(chat_id);
                s.pairing = None;
            });
            self.inner.paired.send_replace(Some(chat_id));
            tracing::info!("🔗 Telegram paired with chat {chat_id}");
            self.reply(
                chat_id,
                "✅ FlexAuto connected! Commands from this chat are now accepted.",
                None,
            )
            .await;
            return Inbound::Paired(chat_id);
        }

        if self.paired_chat_id() != Some(chat_id) {
            tracing::debug!("Ignoring message from foreign chat {chat_id}");
            return Inbound::Ignored;
        }

        if text.eq_ignore_ascii_case("/commands") {
            let listing = self
                .with_state(|s| command_list_html(&s.all_commands, &s.menu_commands))
                .unwrap_or_default();
            self.reply(chat_id, &listing, Some("HTML")).await;
            return Inbound::CommandList;
        }

        tracing::info!("💬 Telegram command received: {text}");
        let now = Utc::now();
        self.record_command(text, now);
        let _ = self.inner.events.send(ChatCommandEvent {
            text: text.to_string(),
            chat_id,
            received_at: now,
        });
        Inbound::Command(text.to_string())
    }

    async fn reply(&self, chat_id: i64, text: &str, parse_mode: Option<&str>) {
        if let Err(e) = self.send_message(chat_id, text, parse_mode).await {
            tracing::error!("❌ Telegram reply failed: {e}");
        }
    }

    fn record_command(&self, text: &str, at: DateTime<Utc>) {
        if let Ok(mut recent) = self.inner.recent.lock() {
            recent.push_back((normalize_command(text), at));
            let cutoff = Utc::now() - RECENT_WINDOW;
            while recent.front().is_some_and(|(_, t)| *t < cutoff) {
                recent.pop_front();
            }
        }
    }

    async fn poll_loop(self, token: CancellationToken) {
        tracing::info!("📡 Telegram polling loop started");
        let mut offset = 0i64;
        loop {
            let updates = tokio::select! {
                _ = token.cancelled() => break,
                updates = self.get_updates(offset) => updates,
            };
            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        if let Some((chat_id, text)) = update.text() {
                            self.handle_text(chat_id, &text).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("⚠️ Telegram polling error: {e}. Retrying...");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
        tracing::info!("📡 Telegram polling loop stopped");
    }
}

#[async_trait]
impl ChatTransport for TelegramBot {
    fn initialize(&self, token: &str, chat_id: Option<i64>) -> Result<()> {
        if token.trim().is_empty() {
            return Err(FlexError::Channel("Telegram bot token is empty".into()));
        }
        self.with_state(|s| {
            s.token = Some(token.trim().to_string());
            s.chat_id = chat_id;
            s.pairing = None;
        })?;
        self.inner.paired.send_replace(chat_id);
        tracing::info!("🤖 Telegram bot initialized");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.with_state(|s| s.token.is_some()).unwrap_or(false)
    }

    async fn start_listening(&self) -> Result<()> {
        self.token()?;
        let token = CancellationToken::new();
        {
            let mut polling = self
                .inner
                .polling
                .lock()
                .map_err(|_| FlexError::Channel("Telegram polling lock poisoned".into()))?;
            if let Some(previous) = polling.replace(token.clone()) {
                previous.cancel();
            }
        }
        tokio::spawn(self.clone().poll_loop(token));
        Ok(())
    }

    fn stop_listening(&self) {
        if let Ok(mut polling) = self.inner.polling.lock() {
            if let Some(token) = polling.take() {
                token.cancel();
            }
        }
    }

    async fn send(&self, text: &str) -> Result<()> {
        let chat_id = self
            .paired_chat_id()
            .ok_or_else(|| FlexError::Channel("Telegram chat is not paired".into()))?;
        self.send_message(chat_id, text, None).await
    }

    async fn set_commands(&self, commands: Vec<BotCommand>) -> Result<()> {
        let menu = menu_commands(&commands);
        let total = commands.len();
        self.with_state(|s| {
            s.all_commands = commands;
            s.menu_commands = menu.clone();
        })?;
        if !self.is_configured() {
            return Ok(());
        }
        self.set_my_commands(&menu).await?;
        tracing::info!("📋 Telegram menu updated: {} of {total} command(s)", menu.len());
        Ok(())
    }

    fn has_command_since(&self, command: &str, since: Option<DateTime<Utc>>) -> bool {
        let wanted = normalize_command(command);
        let since = since.unwrap_or_else(|| Utc::now() - DEFAULT_SINCE);
        self.inner
            .recent
            .lock()
            .map(|recent| recent.iter().any(|(c, t)| *c == wanted && *t > since))
            .unwrap_or(false)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatCommandEvent> {
        self.inner.events.subscribe()
    }
}

/// Random `XXX-XXX` code from an alphabet without look-alike characters.
pub fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    let mut part = || -> String {
        (0..3)
            .map(|_| PAIRING_ALPHABET[rng.gen_range(0..PAIRING_ALPHABET.len())] as char)
            .collect()
    };
    let first = part();
    let second = part();
    format!("{first}-{second}")
}

/// Commands the native menu accepts.
pub fn menu_commands(commands: &[BotCommand]) -> Vec<BotCommand> {
    commands
        .iter()
        .filter(|c| MENU_COMMAND_RE.is_match(&c.command))
        .cloned()
        .collect()
}

/// HTML listing sent in reply to `/commands`.
pub fn command_list_html(all: &[BotCommand], menu: &[BotCommand]) -> String {
    let mut out = String::from("<b>📋 Active commands:</b>\n\n");
    if all.is_empty() {
        out.push_str("No active scenarios with Telegram triggers.\n");
        return out;
    }
    for cmd in all {
        let prefix = if menu.iter().any(|m| m.command == cmd.command) {
            "🔹"
        } else {
            "🔸"
        };
        out.push_str(&format!(
            "{prefix} <code>/{}</code> — {}\n",
            html_escape(&cmd.command),
            html_escape(&cmd.description)
        ));
    }
    out.push_str("\n<i>🔹 in menu | 🔸 typed only</i>\n");
    out
}

fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if !self.ok {
            return Err(FlexError::Channel(format!(
                "Telegram {method} error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| FlexError::Channel(format!("Telegram {method}: empty result")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl TelegramUpdate {
    /// Chat id and text of a human-sent text message.
    pub fn text(&self) -> Option<(i64, String)> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        if msg.from.as_ref().is_some_and(|f| f.is_bot) {
            return None;
        }
        Some((msg.chat.id, text.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_bot() -> TelegramBot {
        let bot = TelegramBot::new(TelegramConfig {
            api_base: "http://127.0.0.1:9".into(),
            ..TelegramConfig::default()
        });
        bot.initialize("123:abc", None).unwrap();
        bot
    }

    fn cmd(command: &str, description: &str) -> BotCommand {
        BotCommand {
            command: command.into(),
            description: description.into(),
        }
    }

    #[test]
    fn test_pairing_code_format() {
        let code = generate_pairing_code();
        assert_eq!(code.len(), 7);
        assert_eq!(&code[3..4], "-");
        assert!(
            code.chars()
                .filter(|c| *c != '-')
                .all(|c| PAIRING_ALPHABET.contains(&(c as u8)))
        );
    }

    #[tokio::test]
    async fn test_pair_binds_chat_and_notifies() {
        let bot = offline_bot();
        let mut paired = bot.pairing_events();
        let code = bot.start_pairing().unwrap();

        assert_eq!(bot.handle_text(42, "/status").await, Inbound::Ignored);
        let outcome = bot.handle_text(42, &format!("/PAIR {}", code.to_lowercase())).await;
        assert_eq!(outcome, Inbound::Paired(42));
        assert_eq!(bot.paired_chat_id(), Some(42));
        assert!(bot.pairing_code().is_none());

        paired.changed().await.unwrap();
        assert_eq!(*paired.borrow(), Some(42));
    }

    #[tokio::test]
    async fn test_expired_pairing_is_ignored() {
        let bot = TelegramBot::new(TelegramConfig {
            api_base: "http://127.0.0.1:9".into(),
            pairing_timeout_secs: 0,
            ..TelegramConfig::default()
        });
        bot.initialize("123:abc", None).unwrap();
        let code = bot.start_pairing().unwrap();
        assert_eq!(bot.handle_text(7, &format!("/pair {code}")).await, Inbound::Ignored);
        assert!(bot.paired_chat_id().is_none());
    }

    #[tokio::test]
    async fn test_commands_from_paired_chat_only() {
        let bot = offline_bot();
        bot.initialize("123:abc", Some(5)).unwrap();
        let mut rx = bot.subscribe();

        assert_eq!(bot.handle_text(6, "/status").await, Inbound::Ignored);
        assert_eq!(
            bot.handle_text(5, " /Status ").await,
            Inbound::Command("/Status".into())
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.text, "/Status");
        assert_eq!(event.chat_id, 5);
        assert!(rx.try_recv().is_err());

        assert!(bot.has_command_since("status", None));
        assert!(bot.has_command_since("/STATUS", Some(Utc::now() - TimeDelta::seconds(30))));
        assert!(!bot.has_command_since("status", Some(Utc::now() + TimeDelta::seconds(1))));
        assert!(!bot.has_command_since("report", None));
    }

    #[tokio::test]
    async fn test_commands_listing_is_not_broadcast() {
        let bot = offline_bot();
        bot.initialize("123:abc", Some(5)).unwrap();
        let mut rx = bot.subscribe();
        assert_eq!(bot.handle_text(5, "/commands").await, Inbound::CommandList);
        assert!(rx.try_recv().is_err());
        assert!(!bot.has_command_since("commands", None));
    }

    #[test]
    fn test_recent_buffer_prunes_old_entries() {
        let bot = offline_bot();
        bot.record_command("/old", Utc::now() - TimeDelta::minutes(5));
        bot.record_command("/new", Utc::now());
        let recent = bot.inner.recent.lock().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].0, "new");
    }

    #[test]
    fn test_menu_filter_and_listing() {
        let all = vec![
            cmd("status", "Show <status>"),
            cmd("Report-Daily", "Daily & weekly"),
        ];
        let menu = menu_commands(&all);
        assert_eq!(menu, vec![cmd("status", "Show <status>")]);

        let html = command_list_html(&all, &menu);
        assert!(html.contains("🔹 <code>/status</code> — Show &lt;status&gt;"));
        assert!(html.contains("🔸 <code>/Report-Daily</code> — Daily &amp; weekly"));
        assert!(command_list_html(&[], &[]).contains("No active scenarios"));
    }

    #[tokio::test]
    async fn test_set_commands_without_token_keeps_lists() {
        let bot = TelegramBot::new(TelegramConfig::default());
        bot.set_commands(vec![cmd("a_1", "x"), cmd("b c", "y")])
            .await
            .unwrap();
        let (all, menu) = bot
            .with_state(|s| (s.all_commands.len(), s.menu_commands.len()))
            .unwrap();
        assert_eq!((all, menu), (2, 1));
    }

    #[tokio::test]
    async fn test_send_requires_pairing() {
        let bot = offline_bot();
        assert!(bot.send("hi").await.is_err());
        assert!(!TelegramBot::new(TelegramConfig::default()).is_configured());
        assert!(bot.initialize("  ", None).is_err());
    }

    #[test]
    fn test_update_skips_bots_and_non_text() {
        let raw = serde_json::json!([
            {"update_id": 1, "message": {"message_id": 1, "date": 0,
                "chat": {"id": 9, "type": "private"},
                "from": {"id": 9, "is_bot": false, "first_name": "A"},
                "text": "/go"}},
            {"update_id": 2, "message": {"message_id": 2, "date": 0,
                "chat": {"id": 9, "type": "private"},
                "from": {"id": 10, "is_bot": true, "first_name": "B"},
                "text": "/go"}},
            {"update_id": 3, "message": {"message_id": 3, "date": 0,
                "chat": {"id": 9, "type": "private"}}}
        ]);
        let updates: Vec<TelegramUpdate> = serde_json::from_value(raw).unwrap();
        let texts: Vec<_> = updates.iter().filter_map(|u| u.text()).collect();
        assert_eq!(texts, vec![(9, "/go".to_string())]);
    }
}
