//! Chat message markup
//!
//! This module turns assistant replies into display nodes:
//! - `message`: block/inline markup (headers, list items, fenced code, inline code, bold)
//! - `code`: token-level highlighting for fenced Python code
//! - `render`: plain or ANSI terminal rendering of the nodes

pub mod code;
pub mod message;
pub mod render;

pub use code::{tokenize, Token, TokenKind};
pub use message::{parse, parse_spanned, MarkupNode, Spanned, DEFAULT_LANGUAGE};
pub use render::TerminalRenderer;
