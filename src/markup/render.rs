use super::code::{Token, TokenKind};
use super::message::MarkupNode;

/// Renders markup nodes as terminal text
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalRenderer {
    /// Emit ANSI colors for code tokens, bold spans and headers
    pub color: bool,
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

impl TerminalRenderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn render(&self, nodes: &[MarkupNode]) -> String {
        let mut out = String::new();
        for node in nodes {
            self.render_node(node, &mut out);
        }
        out
    }

    fn render_node(&self, node: &MarkupNode, out: &mut String) {
        match node {
            MarkupNode::Header { level, text } => {
                self.styled(BOLD, text, out);
                out.push('\n');
                let rule = match level {
                    1 => Some('='),
                    2 => Some('-'),
                    _ => None,
                };
                if let Some(rule) = rule {
                    out.extend(std::iter::repeat(rule).take(text.chars().count()));
                    out.push('\n');
                }
            }
            MarkupNode::ListItem { text } => {
                out.push_str("  • ");
                out.push_str(text);
                out.push('\n');
            }
            MarkupNode::CodeBlock {
                language, tokens, ..
            } => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("  ┌─ {language}\n"));
                let body = self.render_tokens(tokens);
                for line in body.lines() {
                    out.push_str("  │ ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push_str("  └─\n");
            }
            MarkupNode::InlineCode { text } => {
                out.push('`');
                out.push_str(text);
                out.push('`');
            }
            MarkupNode::Bold { text } => self.styled(BOLD, text, out),
            MarkupNode::PlainText { text } => out.push_str(text),
        }
    }

    fn render_tokens(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for token in tokens {
            match token_color(token.kind).filter(|_| self.color) {
                // Colors are closed on every line so the gutter stays uncolored
                Some(code) => {
                    let mut lines = token.text.split('\n').peekable();
                    while let Some(line) = lines.next() {
                        if !line.is_empty() {
                            out.push_str(code);
                            out.push_str(line);
                            out.push_str(RESET);
                        }
                        if lines.peek().is_some() {
                            out.push('\n');
                        }
                    }
                }
                None => out.push_str(&token.text),
            }
        }
        out
    }

    fn styled(&self, code: &str, text: &str, out: &mut String) {
        if self.color {
            out.push_str(code);
            out.push_str(text);
            out.push_str(RESET);
        } else {
            out.push_str(text);
        }
    }
}

fn token_color(kind: TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::Comment => Some("\x1b[2;3m"),
        TokenKind::String => Some("\x1b[31m"),
        TokenKind::Decorator | TokenKind::Number => Some("\x1b[33m"),
        TokenKind::Keyword => Some("\x1b[1;35m"),
        TokenKind::Builtin => Some("\x1b[36m"),
        TokenKind::Function => Some("\x1b[34m"),
        TokenKind::Operator | TokenKind::Punctuation => Some("\x1b[90m"),
        TokenKind::Identifier | TokenKind::Whitespace | TokenKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse;

    #[test]
    fn test_plain_rendering() {
        let nodes = parse("# Summary\n- rows: `120`\n**done**");
        let text = TerminalRenderer::new(false).render(&nodes);
        assert_eq!(text, "Summary\n=======\n  • rows: `120`\ndone");
    }

    #[test]
    fn test_code_block_gutter() {
        let nodes = parse("```\nx = 1\ny = 2\n```");
        let text = TerminalRenderer::new(false).render(&nodes);
        assert_eq!(text, "  ┌─ python\n  │ x = 1\n  │ y = 2\n  └─\n");
    }

    #[test]
    fn test_colored_rendering_resets() {
        let nodes = parse("```\ndef f():\n    pass\n```");
        let text = TerminalRenderer::new(true).render(&nodes);
        assert!(text.contains("\x1b[1;35mdef\x1b[0m"));
        assert!(text.contains("\x1b[1;35mpass\x1b[0m"));
    }
}
