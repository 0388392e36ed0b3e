//! Inline image stripping.
//!
//! Markdown images carrying a base64 data URI would otherwise dominate the
//! token count of a message. They are replaced with a short placeholder
//! before budgeting; attachment lists on [`Message`] are left alone.

use std::borrow::Cow;
use std::sync::LazyLock;

use ctxkeeper_core::Message;
use regex_lite::Regex;

pub const IMAGE_PLACEHOLDER: &str = "[Image]";

static INLINE_IMAGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\(data:image/.*?;base64,.*?\)").ok());

/// Replace every `![alt](data:image/...;base64,...)` with `[Image]`.
pub fn strip_inline_images(text: &str) -> Cow<'_, str> {
    match INLINE_IMAGE.as_ref() {
        Some(re) => re.replace_all(text, IMAGE_PLACEHOLDER),
        None => Cow::Borrowed(text),
    }
}

/// Copy of `messages` with inline images stripped from each content.
pub fn strip_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| match strip_inline_images(&m.content) {
            Cow::Borrowed(_) => m.clone(),
            Cow::Owned(stripped) => Message {
                content: stripped,
                ..m.clone()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_data_uri_image() {
        let text = "Look: ![chart](data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==) done";
        assert_eq!(strip_inline_images(text), "Look: [Image] done");
    }

    #[test]
    fn replaces_multiple_images() {
        let text = "![a](data:image/jpeg;base64,AAA) and ![b](data:image/gif;base64,BBB)";
        assert_eq!(strip_inline_images(text), "[Image] and [Image]");
    }

    #[test]
    fn leaves_regular_links_and_urls() {
        let text = "See ![logo](https://example.com/logo.png) and [docs](data:text/plain;base64,AA)";
        assert!(matches!(strip_inline_images(text), Cow::Borrowed(_)));
    }

    #[test]
    fn history_strip_keeps_other_fields() {
        let msg = Message::user("x ![i](data:image/png;base64,Zm9v) y")
            .with_images(vec!["Zm9v".into()]);
        let out = strip_history(std::slice::from_ref(&msg));
        assert_eq!(out[0].content, "x [Image] y");
        assert_eq!(out[0].images, msg.images);
        assert_eq!(out[0].id, msg.id);
        assert_eq!(out[0].timestamp, msg.timestamp);
    }
}
