//! Conversation rendering
//!
//! Pure functions from conversation state to displayed markup. Message text
//! is HTML-escaped before any formatting is applied, so model output can
//! never inject markup of its own.

use crate::state_machine::{Author, ChatMessage, ChatState, MessageBody};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Label shown on a fenced block without a language line
const DEFAULT_CODE_LABEL: &str = "code";

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```(.*?)```").expect("fence pattern is valid"))
}

fn bold_pattern() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"))
}

fn italic_pattern() -> &'static Regex {
    static ITALIC: OnceLock<Regex> = OnceLock::new();
    ITALIC.get_or_init(|| Regex::new(r"\*(.*?)\*").expect("italic pattern is valid"))
}

/// A segment of message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(String),
    Code {
        /// First line of the fence, trimmed; empty when absent
        language: String,
        body: String,
    },
}

/// Split text on non-greedy triple-backtick pairs.
///
/// An unterminated fence is left in the surrounding text.
pub fn split_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut last = 0;

    for captures in fence_pattern().captures_iter(text) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let before = text.get(last..whole.start()).unwrap_or_default();
        if !before.is_empty() {
            blocks.push(Block::Text(before.to_string()));
        }

        let (first_line, rest) = inner.as_str().split_once('\n').unwrap_or((inner.as_str(), ""));
        blocks.push(Block::Code {
            language: first_line.trim().to_string(),
            body: rest.trim().to_string(),
        });
        last = whole.end();
    }

    let tail = text.get(last..).unwrap_or_default();
    if !tail.is_empty() {
        blocks.push(Block::Text(tail.to_string()));
    }
    blocks
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Bold, italic and line breaks on an already-escaped text segment
fn format_inline(escaped: &str) -> String {
    let bold = bold_pattern().replace_all(escaped, "<strong>$1</strong>");
    let italic = italic_pattern().replace_all(&bold, "<em>$1</em>");
    italic.replace('\n', "<br />")
}

/// Render message text to HTML
pub fn render_markdown(text: &str) -> String {
    let mut html = String::new();
    for block in split_blocks(text) {
        match block {
            Block::Text(segment) => {
                html.push_str("<span>");
                html.push_str(&format_inline(&escape_html(&segment)));
                html.push_str("</span>");
            }
            Block::Code { language, body } => {
                let label = if language.is_empty() {
                    DEFAULT_CODE_LABEL
                } else {
                    language.as_str()
                };
                html.push_str("<div class=\"code-block\"><div class=\"code-lang\">");
                html.push_str(&escape_html(label));
                html.push_str("</div><pre><code>");
                html.push_str(&escape_html(&body));
                html.push_str("</code></pre></div>");
            }
        }
    }
    html
}

/// One rendered message bubble
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BubbleView {
    pub index: usize,
    pub author: Author,
    pub failed: bool,
    pub html: String,
}

/// Render a message as a bubble.
///
/// Model messages with blank text render nothing: the placeholder stays
/// invisible until its first fragment and the typing indicator covers it.
pub fn render_bubble(index: usize, message: &ChatMessage) -> Option<BubbleView> {
    let text = message.text();
    if message.author == Author::Model && text.trim().is_empty() {
        return None;
    }

    Some(BubbleView {
        index,
        author: message.author,
        failed: matches!(message.body, MessageBody::Failed { .. }),
        html: render_markdown(text),
    })
}

/// Everything a client needs to draw the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatView {
    pub bubbles: Vec<BubbleView>,
    /// Show the typing indicator
    pub typing: bool,
    /// Banner text
    pub error: Option<String>,
    pub in_flight: bool,
    /// False once session initialization failed; sends are disabled
    pub available: bool,
    pub phase: &'static str,
}

impl ChatView {
    pub fn from_state(state: &ChatState) -> Self {
        let bubbles = state
            .messages
            .iter()
            .enumerate()
            .filter_map(|(index, message)| render_bubble(index, message))
            .collect();

        Self {
            bubbles,
            typing: state.is_typing(),
            error: state.error.clone(),
            in_flight: state.is_in_flight(),
            available: state.phase != crate::state_machine::ChatPhase::Unavailable,
            phase: state.phase.name(),
        }
    }
}
