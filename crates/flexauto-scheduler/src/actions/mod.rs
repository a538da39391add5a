//! Action variants. The steps of a scenario chain.
//!
//! Every action parses its own parameters when it runs, so a malformed
//! parameter fails the step that owns it instead of the whole chain load.

pub mod catalog;
pub mod chat_send;
pub mod delay;
pub mod keyboard;
pub mod mouse;
pub mod process;
pub mod video;

pub use catalog::CatalogCheckAction;
pub use chat_send::ChatSendAction;
pub use delay::DelayAction;
pub use keyboard::KeyboardInputAction;
pub use mouse::MouseClickAction;
pub use process::ProcessAction;
pub use video::VideoCheckAction;

use crate::block::{ActionResult, BlockHeader};
use crate::context::ExecutionContext;
use crate::services::Services;

#[derive(Debug)]
pub enum Action {
    Delay(DelayAction),
    KeyboardInput(KeyboardInputAction),
    MouseClick(MouseClickAction),
    Process(ProcessAction),
    VideoCheck(VideoCheckAction),
    CatalogCheck(CatalogCheckAction),
    ChatSend(ChatSendAction),
}

impl Action {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Action::Delay(a) => &a.header,
            Action::KeyboardInput(a) => &a.header,
            Action::MouseClick(a) => &a.header,
            Action::Process(a) => &a.header,
            Action::VideoCheck(a) => &a.header,
            Action::CatalogCheck(a) => &a.header,
            Action::ChatSend(a) => &a.header,
        }
    }

    pub async fn execute(&self, ctx: &ExecutionContext, services: &Services) -> ActionResult {
        match self {
            Action::Delay(a) => a.execute().await,
            Action::KeyboardInput(a) => a.execute(ctx, services).await,
            Action::MouseClick(a) => a.execute(services).await,
            Action::Process(a) => a.execute(services).await,
            Action::VideoCheck(a) => a.execute(services).await,
            Action::CatalogCheck(a) => a.execute(services).await,
            Action::ChatSend(a) => a.execute(ctx, services).await,
        }
    }
}

/// Explicit `ApiKey` parameter, or the key stored in settings.
pub(crate) fn resolve_api_key(
    header: &BlockHeader,
    stored: Option<String>,
) -> Option<String> {
    header
        .param("ApiKey")
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(|| stored.filter(|k| !k.trim().is_empty()))
}
