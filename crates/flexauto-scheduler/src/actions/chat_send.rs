use crate::block::{ActionResult, BlockHeader};
use crate::context::ExecutionContext;
use crate::services::Services;
use crate::template::{self, ListFormat, Rendered};

/// Sends `Message` (template, `ListFormat` default `NewLine`) to the paired
/// chat.
#[derive(Debug)]
pub struct ChatSendAction {
    pub header: BlockHeader,
}

impl ChatSendAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub async fn execute(&self, ctx: &ExecutionContext, services: &Services) -> ActionResult {
        let Some(template) = self.header.param("Message") else {
            return ActionResult::failed("Message is not set");
        };
        let format = ListFormat::parse(self.header.param("ListFormat"), ListFormat::NewLine);
        let text = match template::render(template, ctx, format) {
            Rendered::Text(text) => text,
            Rendered::MissingData => {
                tracing::debug!("Nothing to send: no previous result");
                return ActionResult::ok();
            }
        };
        if text.trim().is_empty() {
            return ActionResult::ok();
        }
        if !services.chat.is_configured() {
            return ActionResult::failed("Telegram bot is not configured");
        }

        match services.chat.send(&text).await {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failed(format!("Failed to send message: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fakes;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sends_rendered_list() {
        let fakes = Fakes::new();
        let mut ctx = ExecutionContext::new();
        ctx.set(Uuid::new_v4(), vec!["one".to_string(), "two".to_string()].into());

        let action = ChatSendAction::new(
            BlockHeader::new("TelegramSend").with_param("Message", "New:\n{LastResult}"),
        );
        assert!(action.execute(&ctx, &fakes.services()).await.is_success());
        assert_eq!(fakes.sent(), vec!["New:\none\ntwo".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_without_data() {
        let fakes = Fakes::new();
        let action = ChatSendAction::new(
            BlockHeader::new("TelegramSend").with_param("Message", "{LastResult}"),
        );
        assert_eq!(
            action.execute(&ExecutionContext::new(), &fakes.services()).await,
            ActionResult::ok()
        );
        assert!(fakes.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_chat_fails() {
        let fakes = Fakes::new();
        fakes.set_chat_configured(false);
        let action = ChatSendAction::new(BlockHeader::new("TelegramSend").with_param("Message", "hi"));
        assert!(!action.execute(&ExecutionContext::new(), &fakes.services()).await.is_success());
    }
}
