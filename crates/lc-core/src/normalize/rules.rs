//! The ordered rewrite chain behind [`MessageNormalizer`].

use super::Template;
use regex::Regex;
use std::borrow::Cow;

// Whitespace is ASCII only, so non-breaking and other Unicode spaces survive
// as message text. Bodies end at any line terminator. Trimming strips only
// control characters and space.

/// One whitespace character.
const WS: &str = r"[ \t\n\x0B\f\r]";
/// One non-whitespace character.
const NON_WS: &str = r"[^ \t\n\x0B\f\r]";
/// Any run of characters up to the end of the line.
const REST_OF_LINE: &str = r"[^\n\r\x{85}\x{2028}\x{2029}]*";

/// Characters removed by trimming.
fn is_trimmed(c: char) -> bool {
    c <= ' '
}

fn trim_edges(text: &str) -> &str {
    text.trim_matches(is_trimmed)
}

/// One step of the chain.
#[derive(Debug, Clone)]
enum Rewrite {
    /// Replace every match of `regex` (replacement may use `${n}` groups).
    Pattern {
        regex: Regex,
        replacement: &'static str,
    },
    /// Replace the whole message if it starts with `prefix`.
    CollapsePrefix {
        prefix: &'static str,
        collapsed: &'static str,
    },
    /// Plain substring replacement.
    Literal {
        from: &'static str,
        to: &'static str,
    },
    /// Trim surrounding whitespace.
    Trim,
}

impl Rewrite {
    fn pattern(pattern: &str, replacement: &'static str) -> Self {
        Rewrite::Pattern {
            regex: compile(pattern),
            replacement,
        }
    }

    fn apply(&self, text: String) -> String {
        match self {
            Rewrite::Pattern { regex, replacement } => {
                let replaced = match regex.replace_all(&text, *replacement) {
                    Cow::Owned(s) => Some(s),
                    Cow::Borrowed(_) => None,
                };
                replaced.unwrap_or(text)
            }
            Rewrite::CollapsePrefix { prefix, collapsed } => {
                if text.starts_with(prefix) {
                    (*collapsed).to_string()
                } else {
                    text
                }
            }
            Rewrite::Literal { from, to } => {
                if text.contains(from) {
                    text.replace(from, to)
                } else {
                    text
                }
            }
            Rewrite::Trim => {
                let trimmed = trim_edges(&text);
                if trimmed.len() == text.len() {
                    text
                } else {
                    trimmed.to_string()
                }
            }
        }
    }
}

fn compile(pattern: &str) -> Regex {
    // Built-in patterns are constants; failing here is a programming error.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

/// Normalizer for nginx-style error log lines.
///
/// Holds two prefix extractors and the ordered rewrite chain. It is
/// immutable after construction and shared by reference across workers.
#[derive(Debug, Clone)]
pub struct MessageNormalizer {
    /// `<pid>#<tid>: *<conn> <body>`, the connection tag being optional.
    tagged_prefix: Regex,
    /// `<pid>#<tid>: <body>`.
    plain_prefix: Regex,
    chain: Vec<Rewrite>,
}

impl Default for MessageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageNormalizer {
    /// Create a normalizer with the built-in chain.
    pub fn new() -> Self {
        let chain = vec![
            // Keep the tag name, drop whatever value follows.
            Rewrite::pattern(
                &format!("(Setting tag {NON_WS}+ with value{WS}+){REST_OF_LINE}"),
                "${1}<VALUE>",
            ),
            // Header values nest quotes arbitrarily deep.
            Rewrite::CollapsePrefix {
                prefix: "http proxy header:",
                collapsed: "http proxy header: <STR>",
            },
            // Quoted strings; no escape handling.
            Rewrite::pattern(r"'[^']*'", "'<STR>'"),
            Rewrite::pattern(r#""[^"]*""#, "\"<STR>\""),
            // Hex literals, then long bare hex runs.
            Rewrite::pattern(r"\b0x[0-9A-Fa-f]+\b", "<HEX>"),
            Rewrite::pattern(r"\b[0-9A-Fa-f]{12,}\b", "<HEX>"),
            // Ids and timestamps first, then any remaining number.
            Rewrite::pattern(r"\b[0-9]{6,}\b", "<NUM>"),
            Rewrite::pattern(r"\b[0-9]+\b", "<N>"),
            Rewrite::Literal {
                from: "-<N>",
                to: "<N>",
            },
            // Runs after numeric collapsing, so it rarely finds raw digits left.
            Rewrite::pattern(r"\b[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+\b", "<IP>"),
            Rewrite::pattern(&format!("{WS}+"), " "),
            Rewrite::Trim,
            Rewrite::pattern(&format!(r"(<N>{WS}*[:\-,]{WS}*)+"), "<N>:"),
            Rewrite::pattern(&format!("(<HEX>{WS}*)+"), "<HEX> "),
        ];

        Self {
            tagged_prefix: compile(&format!(
                r"[0-9]+#[0-9]+:{WS}+\*?[0-9]*{WS}+({REST_OF_LINE})"
            )),
            plain_prefix: compile(&format!(r"[0-9]+#[0-9]+:{WS}+({REST_OF_LINE})")),
            chain,
        }
    }

    /// Number of rewrite steps applied after body extraction.
    pub fn steps(&self) -> usize {
        self.chain.len()
    }

    /// Extract the message body following the worker prefix.
    pub fn extract_body<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.tagged_prefix
            .captures(line)
            .or_else(|| self.plain_prefix.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Normalize one raw line, or `None` if the line carries no template.
    pub fn normalize(&self, line: &str) -> Option<Template> {
        if line.trim_start_matches(is_trimmed).starts_with('{') {
            return None;
        }

        let body = trim_edges(self.extract_body(line)?);
        if body.is_empty() {
            return None;
        }

        let message = self
            .chain
            .iter()
            .fold(body.to_string(), |text, step| step.apply(text));
        Some(Template::from(message))
    }
}
