//! Template substitution for free-text parameters.
//!
//! Two marker forms are resolved against the execution context:
//! - `{LastResult}`: the most recently recorded value;
//! - `{<block uuid>}`: the value recorded by a specific earlier block.
//!
//! A missing last output means there is nothing to send: the caller treats
//! it as a successful no-op. An unknown block id resolves to an empty
//! string, and a marker whose id does not parse as a UUID is left verbatim.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::block::BlockValue;
use crate::context::ExecutionContext;

pub const LAST_RESULT_MARKER: &str = "{LastResult}";

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-fA-F0-9\-]{36})\}").expect("variable pattern is valid")
});

/// How list values are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    NewLine,
    Comma,
    Space,
}

impl ListFormat {
    /// Parse a `ListFormat` parameter, falling back to `default`.
    pub fn parse(raw: Option<&str>, default: ListFormat) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("newline") => ListFormat::NewLine,
            Some("comma") => ListFormat::Comma,
            Some("space") => ListFormat::Space,
            _ => default,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            ListFormat::NewLine => "\n",
            ListFormat::Comma => ", ",
            ListFormat::Space => " ",
        }
    }
}

/// Render a single value with the given list format.
pub fn format_value(value: &BlockValue, format: ListFormat) -> String {
    match value {
        BlockValue::Text(s) => s.clone(),
        BlockValue::List(items) => items.join(format.separator()),
    }
}

/// Result of resolving a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(String),
    /// The template asked for the last output and there is none.
    MissingData,
}

/// Resolve both marker forms in `template`.
pub fn render(template: &str, ctx: &ExecutionContext, format: ListFormat) -> Rendered {
    let mut text = template.to_string();

    if text.contains(LAST_RESULT_MARKER) {
        let Some(last) = ctx.last_output() else {
            return Rendered::MissingData;
        };
        text = text.replace(LAST_RESULT_MARKER, &format_value(last, format));
    }

    let resolved = VARIABLE_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        match Uuid::parse_str(&caps[1]) {
            Ok(id) => ctx
                .get(&id)
                .map(|v| format_value(v, format))
                .unwrap_or_default(),
            Err(_) => caps[0].to_string(),
        }
    });

    Rendered::Text(resolved.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_last(value: BlockValue) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set(Uuid::new_v4(), value);
        ctx
    }

    #[test]
    fn test_last_result_list_formats() {
        let ctx = ctx_with_last(vec!["a".to_string(), "b".to_string()].into());
        assert_eq!(
            render("{LastResult}", &ctx, ListFormat::Comma),
            Rendered::Text("a, b".into())
        );
        assert_eq!(
            render("{LastResult}", &ctx, ListFormat::NewLine),
            Rendered::Text("a\nb".into())
        );
        assert_eq!(
            render("items: {LastResult}", &ctx, ListFormat::Space),
            Rendered::Text("items: a b".into())
        );
    }

    #[test]
    fn test_missing_last_result() {
        let ctx = ExecutionContext::new();
        assert_eq!(
            render("New: {LastResult}", &ctx, ListFormat::Space),
            Rendered::MissingData
        );
    }

    #[test]
    fn test_block_reference() {
        let mut ctx = ExecutionContext::new();
        let id = Uuid::new_v4();
        ctx.set(id, "C:/data/report.txt".into());
        let template = format!("File: {{{id}}}");
        assert_eq!(
            render(&template, &ctx, ListFormat::Space),
            Rendered::Text("File: C:/data/report.txt".into())
        );
    }

    #[test]
    fn test_unknown_reference_becomes_empty() {
        let ctx = ExecutionContext::new();
        let template = format!("[{{{}}}]", Uuid::new_v4());
        assert_eq!(
            render(&template, &ctx, ListFormat::Space),
            Rendered::Text("[]".into())
        );
    }

    #[test]
    fn test_invalid_uuid_left_verbatim() {
        let ctx = ExecutionContext::new();
        let template = "keep {------------------------------------} as is";
        assert_eq!(
            render(template, &ctx, ListFormat::Space),
            Rendered::Text(template.into())
        );
    }

    #[test]
    fn test_list_format_parse() {
        assert_eq!(ListFormat::parse(Some("Comma"), ListFormat::Space), ListFormat::Comma);
        assert_eq!(ListFormat::parse(Some("NEWLINE"), ListFormat::Space), ListFormat::NewLine);
        assert_eq!(ListFormat::parse(Some("bogus"), ListFormat::NewLine), ListFormat::NewLine);
        assert_eq!(ListFormat::parse(None, ListFormat::Space), ListFormat::Space);
    }
}
