// Block/inline markup parser for assistant replies
//
// Same loop shape as the code tokenizer: ordered matchers at the cursor, then
// a fallback that jumps to the next place a matcher could start. Matcher
// priority is fenced code, header, list item, inline code, bold.

use regex::{Captures, Regex};
use serde::Serialize;
use std::ops::Range;
use std::sync::OnceLock;

use super::code::{self, Token, TokenKind};

/// Language assumed for fenced blocks without a tag
pub const DEFAULT_LANGUAGE: &str = "python";

/// A display node of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkupNode {
    Header {
        /// 1 to 3
        level: u8,
        text: String,
    },
    ListItem {
        text: String,
    },
    CodeBlock {
        language: String,
        code: String,
        tokens: Vec<Token>,
    },
    InlineCode {
        text: String,
    },
    Bold {
        text: String,
    },
    PlainText {
        text: String,
    },
}

impl MarkupNode {
    pub fn header(level: u8, text: impl Into<String>) -> Self {
        MarkupNode::Header {
            level,
            text: text.into(),
        }
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        MarkupNode::ListItem { text: text.into() }
    }

    pub fn inline_code(text: impl Into<String>) -> Self {
        MarkupNode::InlineCode { text: text.into() }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        MarkupNode::Bold { text: text.into() }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        MarkupNode::PlainText { text: text.into() }
    }
}

/// A node together with the byte range of the message it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub span: Range<usize>,
    pub node: MarkupNode,
}

/// Consumed length and node, or no match
type Matcher = fn(&str, usize) -> Option<(usize, MarkupNode)>;

/// Priority order of the matchers. First match wins.
const MATCHERS: &[Matcher] = &[
    match_fence,
    match_header,
    match_list_item,
    match_inline_code,
    match_bold,
];

macro_rules! anchored {
    ($name:ident, $pattern:expr) => {{
        static $name: OnceLock<Regex> = OnceLock::new();
        $name.get_or_init(|| {
            Regex::new(concat!("^(?:", $pattern, ")")).expect("markup regex should compile")
        })
    }};
}

/// Parse a message body into display nodes
pub fn parse(text: &str) -> Vec<MarkupNode> {
    parse_spanned(text).into_iter().map(|s| s.node).collect()
}

/// Parse a message body, keeping the source span of every node
///
/// Spans are contiguous and cover the whole input, so every byte belongs to
/// exactly one node.
pub fn parse_spanned(text: &str) -> Vec<Spanned> {
    let mut nodes: Vec<Spanned> = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let hit = MATCHERS.iter().find_map(|matcher| matcher(text, cursor));

        match hit {
            Some((len, node)) => {
                push_node(&mut nodes, cursor..cursor + len, node);
                cursor += len;
            }
            None => {
                let end = next_marker(text, cursor).unwrap_or(text.len());
                push_node(&mut nodes, cursor..end, MarkupNode::plain(&text[cursor..end]));
                cursor = end;
            }
        }
    }

    nodes
}

fn push_node(nodes: &mut Vec<Spanned>, span: Range<usize>, node: MarkupNode) {
    if let MarkupNode::PlainText { text: addition } = &node {
        if let Some(Spanned {
            span: last_span,
            node: MarkupNode::PlainText { text },
        }) = nodes.last_mut()
        {
            text.push_str(addition);
            last_span.end = span.end;
            return;
        }
    }
    nodes.push(Spanned { span, node });
}

fn at_line_start(text: &str, pos: usize) -> bool {
    pos == 0 || text.as_bytes()[pos - 1] == b'\n'
}

fn is_language_default(tag: &str) -> bool {
    tag.is_empty() || tag.eq_ignore_ascii_case("py") || tag.eq_ignore_ascii_case(DEFAULT_LANGUAGE)
}

fn match_fence(text: &str, cursor: usize) -> Option<(usize, MarkupNode)> {
    let rest = &text[cursor..];
    if !rest.starts_with("```") {
        return None;
    }

    let re = anchored!(FENCE, r"```([A-Za-z0-9_]*)\n?((?s:.)*?)```");
    let Some(caps) = re.captures(rest) else {
        // No closing fence: the remainder is shown as written
        return Some((rest.len(), MarkupNode::plain(rest)));
    };

    let tag = group(&caps, 1);
    let code = group(&caps, 2).trim().to_string();
    let (language, tokens) = if is_language_default(tag) {
        (DEFAULT_LANGUAGE.to_string(), code::tokenize(&code))
    } else if code.is_empty() {
        (tag.to_string(), Vec::new())
    } else {
        (tag.to_string(), vec![Token::new(TokenKind::Other, code.clone())])
    };

    Some((
        caps[0].len(),
        MarkupNode::CodeBlock {
            language,
            code,
            tokens,
        },
    ))
}

fn match_header(text: &str, cursor: usize) -> Option<(usize, MarkupNode)> {
    if !at_line_start(text, cursor) {
        return None;
    }
    let caps = anchored!(HEADER, r"(#{1,3})[ \t]+([^\n]+)(?:\n|$)").captures(&text[cursor..])?;
    let level = caps[1].len() as u8;
    Some((caps[0].len(), MarkupNode::header(level, caps[2].trim())))
}

fn match_list_item(text: &str, cursor: usize) -> Option<(usize, MarkupNode)> {
    if !at_line_start(text, cursor) {
        return None;
    }
    let caps = anchored!(LIST_ITEM, r"[ \t]*[-*][ \t]+([^\n]+)(?:\n|$)").captures(&text[cursor..])?;
    Some((caps[0].len(), MarkupNode::list_item(caps[1].trim_end())))
}

fn match_inline_code(text: &str, cursor: usize) -> Option<(usize, MarkupNode)> {
    let caps = anchored!(INLINE_CODE, r"`([^`]+)`").captures(&text[cursor..])?;
    Some((caps[0].len(), MarkupNode::inline_code(&caps[1])))
}

fn match_bold(text: &str, cursor: usize) -> Option<(usize, MarkupNode)> {
    let rest = &text[cursor..];
    let caps = anchored!(BOLD_STARS, r"\*\*([^*]+)\*\*")
        .captures(rest)
        .or_else(|| anchored!(BOLD_UNDERSCORES, r"__([^_]+)__").captures(rest))?;
    Some((caps[0].len(), MarkupNode::bold(&caps[1])))
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Next position after `cursor` where some matcher could start
fn next_marker(text: &str, cursor: usize) -> Option<usize> {
    text[cursor..]
        .char_indices()
        .skip(1)
        .map(|(offset, _)| cursor + offset)
        .find(|&pos| is_marker(text, pos))
}

fn is_marker(text: &str, pos: usize) -> bool {
    let rest = &text[pos..];
    if rest.starts_with('`') || rest.starts_with("**") || rest.starts_with("__") {
        return true;
    }
    at_line_start(text, pos)
        && anchored!(LINE_MARKER, r"#{1,3}[ \t]|[ \t]*[-*][ \t]").is_match(rest)
}
