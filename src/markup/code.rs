// Token-level highlighter for Python snippets embedded in assistant replies
//
// The tokenizer walks the input once. At every cursor position it tries a
// fixed, priority-ordered list of matchers against the unconsumed rest and
// takes the first hit. The order matters: comments and strings must be tried
// before anything that could match inside them, keywords and builtins before
// the generic identifier rules, and `function` before `identifier`.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Classification of a code token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Comment,
    String,
    Decorator,
    Keyword,
    Builtin,
    /// Identifier immediately followed by `(`
    Function,
    Number,
    Operator,
    Punctuation,
    Identifier,
    Whitespace,
    /// Anything no other rule claims (one character at a time)
    Other,
}

impl TokenKind {
    pub fn label(self) -> &'static str {
        match self {
            TokenKind::Comment => "comment",
            TokenKind::String => "string",
            TokenKind::Decorator => "decorator",
            TokenKind::Keyword => "keyword",
            TokenKind::Builtin => "builtin",
            TokenKind::Function => "function",
            TokenKind::Number => "number",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Identifier => "identifier",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Other => "other",
        }
    }
}

/// A typed slice of the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "try", "except", "finally", "with",
    "return", "yield", "import", "from", "as", "in", "is", "not", "and", "or", "True", "False",
    "None", "lambda", "pass", "break", "continue", "raise", "assert", "global", "nonlocal",
    "async", "await",
];

pub const BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "list", "dict", "set", "tuple", "bool",
    "type", "isinstance", "hasattr", "getattr", "setattr", "open", "input", "sum", "min", "max",
    "abs", "round", "sorted", "reversed", "enumerate", "zip", "map", "filter", "any", "all",
    "format",
];

/// Returns the byte length of the match at the start of `rest`
type Matcher = fn(&str) -> Option<usize>;

/// Priority order of the matchers. First match wins.
const MATCHERS: &[(TokenKind, Matcher)] = &[
    (TokenKind::Comment, match_comment),
    (TokenKind::String, match_string),
    (TokenKind::Decorator, match_decorator),
    (TokenKind::Keyword, match_keyword),
    (TokenKind::Builtin, match_builtin),
    (TokenKind::Function, match_function),
    (TokenKind::Number, match_number),
    (TokenKind::Operator, match_operator),
    (TokenKind::Punctuation, match_punctuation),
    (TokenKind::Identifier, match_identifier),
    (TokenKind::Whitespace, match_whitespace),
];

macro_rules! anchored {
    ($name:ident, $pattern:expr) => {{
        static $name: OnceLock<Regex> = OnceLock::new();
        $name.get_or_init(|| {
            Regex::new(concat!("^(?:", $pattern, ")")).expect("code token regex should compile")
        })
    }};
}

/// Split `code` into an exhaustive, ordered token sequence
///
/// Concatenating the token texts gives back `code` exactly.
pub fn tokenize(code: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while cursor < code.len() {
        let rest = &code[cursor..];
        let hit = MATCHERS
            .iter()
            .find_map(|(kind, matcher)| matcher(rest).map(|len| (*kind, len)));

        let (kind, len) = match hit {
            Some(hit) => hit,
            None => {
                // Advance by one whole character so multi-byte input stays intact
                let width = rest.chars().next().map_or(1, char::len_utf8);
                (TokenKind::Other, width)
            }
        };

        tokens.push(Token::new(kind, &rest[..len]));
        cursor += len;
    }

    tokens
}

fn non_empty(m: Option<regex::Match<'_>>) -> Option<usize> {
    m.map(|m| m.end()).filter(|&len| len > 0)
}

fn match_comment(rest: &str) -> Option<usize> {
    non_empty(anchored!(COMMENT, r"#[^\n]*").find(rest))
}

fn match_string(rest: &str) -> Option<usize> {
    let re = anchored!(
        STRING,
        r#"'''(?s:.)*?'''|"""(?s:.)*?"""|'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#
    );
    non_empty(re.find(rest))
}

fn match_decorator(rest: &str) -> Option<usize> {
    non_empty(anchored!(DECORATOR, r"@[A-Za-z0-9_]+").find(rest))
}

fn leading_word(rest: &str) -> Option<&str> {
    anchored!(WORD, r"[A-Za-z_][A-Za-z0-9_]*")
        .find(rest)
        .map(|m| m.as_str())
}

fn match_keyword(rest: &str) -> Option<usize> {
    leading_word(rest)
        .filter(|word| KEYWORDS.contains(word))
        .map(str::len)
}

fn match_builtin(rest: &str) -> Option<usize> {
    leading_word(rest)
        .filter(|word| BUILTINS.contains(word))
        .map(str::len)
}

fn match_function(rest: &str) -> Option<usize> {
    let call = anchored!(CALLEE, r"[A-Za-z_][A-Za-z0-9_]*\s*").find(rest)?;
    rest[call.end()..].starts_with('(').then_some(call.end())
}

fn match_number(rest: &str) -> Option<usize> {
    let re = anchored!(
        NUMBER,
        r"[0-9]+\.?[0-9]*(?:[eE][+-]?[0-9]+)?|\.[0-9]+(?:[eE][+-]?[0-9]+)?"
    );
    non_empty(re.find(rest))
}

fn match_operator(rest: &str) -> Option<usize> {
    // Two-character operators are listed first so `**` never splits into `*` `*`
    let re = anchored!(
        OPERATOR,
        r"\*\*|//|==|!=|<=|>=|<<|>>|\+=|-=|\*=|/=|[<>+\-*/%=&|^~]"
    );
    non_empty(re.find(rest))
}

fn match_punctuation(rest: &str) -> Option<usize> {
    non_empty(anchored!(PUNCTUATION, r"[()\[\]{},.:;]").find(rest))
}

fn match_identifier(rest: &str) -> Option<usize> {
    leading_word(rest).map(str::len)
}

fn match_whitespace(rest: &str) -> Option<usize> {
    non_empty(anchored!(WHITESPACE, r"\s+").find(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<(TokenKind, String)> {
        tokenize(code)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn rebuild(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_function_definition_with_comment() {
        let code = "def f(x):\n    return x + 1  # add";
        let tokens = tokenize(code);

        assert_eq!(rebuild(&tokens), code);
        assert!(tokens.contains(&Token::new(TokenKind::Keyword, "def")));
        assert!(tokens.contains(&Token::new(TokenKind::Function, "f")));
        assert!(tokens.contains(&Token::new(TokenKind::Operator, "+")));
        assert!(tokens.contains(&Token::new(TokenKind::Comment, "# add")));
        assert!(tokens.contains(&Token::new(TokenKind::Keyword, "return")));
        assert!(tokens.contains(&Token::new(TokenKind::Number, "1")));
    }

    #[test]
    fn test_keyword_prefix_is_not_keyword() {
        let tokens = kinds("define is_ok isinstance");
        assert_eq!(tokens[0], (TokenKind::Identifier, "define".to_string()));
        assert_eq!(tokens[2], (TokenKind::Identifier, "is_ok".to_string()));
        assert_eq!(tokens[4], (TokenKind::Builtin, "isinstance".to_string()));
    }

    #[test]
    fn test_builtin_wins_over_function() {
        let tokens = kinds("print(len(df))");
        assert_eq!(tokens[0], (TokenKind::Builtin, "print".to_string()));
        assert_eq!(tokens[2], (TokenKind::Builtin, "len".to_string()));
        assert_eq!(tokens[4], (TokenKind::Identifier, "df".to_string()));
    }

    #[test]
    fn test_function_token_keeps_trailing_space() {
        let tokens = kinds("df.head (5)");
        assert_eq!(tokens[2], (TokenKind::Function, "head ".to_string()));
        assert_eq!(tokens[3], (TokenKind::Punctuation, "(".to_string()));
    }

    #[test]
    fn test_strings_before_comments() {
        let tokens = kinds("s = '# not a comment'");
        assert_eq!(tokens.last().unwrap().0, TokenKind::String);

        let tokens = kinds("x = \"esc \\\" quote\"");
        assert_eq!(
            tokens.last().unwrap(),
            &(TokenKind::String, "\"esc \\\" quote\"".to_string())
        );
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let code = "'''first\nsecond'''";
        assert_eq!(kinds(code), vec![(TokenKind::String, code.to_string())]);
    }

    #[test]
    fn test_longest_operator_first() {
        let tokens = kinds("a ** b // c == d");
        let ops: Vec<_> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Operator)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(ops, vec!["**", "//", "=="]);

        let tokens = kinds("total += 1");
        assert!(tokens.contains(&(TokenKind::Operator, "+=".to_string())));
    }

    #[test]
    fn test_number_forms() {
        for literal in ["42", "3.14", "1.", ".5", "1e10", "2.5E-3"] {
            assert_eq!(
                kinds(literal),
                vec![(TokenKind::Number, literal.to_string())],
                "literal {literal}"
            );
        }
    }

    #[test]
    fn test_decorator() {
        let tokens = kinds("@dataclass\nclass Row:");
        assert_eq!(tokens[0], (TokenKind::Decorator, "@dataclass".to_string()));
        assert_eq!(tokens[2], (TokenKind::Keyword, "class".to_string()));
    }

    #[test]
    fn test_malformed_input_falls_back_to_other() {
        let code = "x = 'unterminated $ é";
        let tokens = tokenize(code);
        assert_eq!(rebuild(&tokens), code);
        assert!(tokens.contains(&Token::new(TokenKind::Other, "'")));
        assert!(tokens.contains(&Token::new(TokenKind::Other, "$")));
        assert!(tokens.contains(&Token::new(TokenKind::Other, "é")));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_retokenizing_is_idempotent() {
        let code = "import pandas as pd\n@cache\ndef load(path='a.csv'):\n    return pd.read_csv(path)[::2] ** 0.5";
        let first = tokenize(code);
        let second = tokenize(&rebuild(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn test_lossless_on_pathological_input() {
        for code in ["''''", "\"\"\"", "###", "((((", "\t\n \r", "@@@", "..5e", "'\\"] {
            assert_eq!(rebuild(&tokenize(code)), code, "input {code:?}");
        }
    }
}
