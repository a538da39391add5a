//! Keyboard input action.
//!
//! Parameters: `Text` (template), `ListFormat` (default `Space`),
//! `InputMethod` (`Type` or `Paste`), `InputMode` (`CharByChar` or any
//! other value for a single burst) and `EscapeBackslashes` (typed text only,
//! doubles every backslash).

use crate::block::{ActionResult, BlockHeader};
use crate::context::ExecutionContext;
use crate::services::Services;
use crate::template::{self, ListFormat, Rendered};

#[derive(Debug)]
pub struct KeyboardInputAction {
    pub header: BlockHeader,
}

impl KeyboardInputAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub async fn execute(&self, ctx: &ExecutionContext, services: &Services) -> ActionResult {
        let Some(template) = self.header.param("Text") else {
            return ActionResult::failed("Text to type is not set");
        };
        let format = ListFormat::parse(self.header.param("ListFormat"), ListFormat::Space);
        let text = match template::render(template, ctx, format) {
            Rendered::Text(text) if !text.is_empty() => text,
            _ => {
                tracing::debug!("Keyboard input skipped: nothing to type");
                return ActionResult::ok();
            }
        };

        let paste = self
            .header
            .param("InputMethod")
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("paste"));
        let result = if paste {
            services.input.paste(&text).await
        } else {
            let text = if self.header.flag("EscapeBackslashes") {
                text.replace('\\', "\\\\")
            } else {
                text
            };
            let char_by_char = self
                .header
                .param("InputMode")
                .is_none_or(|m| m.trim().eq_ignore_ascii_case("charbychar"));
            services.input.type_text(&text, char_by_char).await
        };

        match result {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failed(format!("Keyboard input failed: {e}")),
        }
    }
}
