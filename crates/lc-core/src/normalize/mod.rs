//! Line-to-template normalization.
//!
//! A raw log line is reduced to a canonical *template* by extracting the
//! message body after the `<pid>#<tid>:` worker prefix and then running an
//! ordered chain of rewrites that strip variable content:
//!
//! ```text
//! Raw:      2024/05/01 10:00:00 [error] 812#812: *4411 open() "/srv/a.html" failed (2: No such file or directory)
//! Template: open() "<STR>" failed (<N>:No such file or directory)
//!
//! Raw:      812#812: *7 free: 0x7f3a2b1c00 chunk deadbeefcafe01
//! Template: "free: <HEX> chunk <HEX> "   (the hex collapse leaves a trailing space)
//! ```
//!
//! The order of the chain is part of the contract: later rewrites depend on
//! earlier ones having already collapsed structure, so two runs only produce
//! comparable templates if the chain is applied identically.
//!
//! Lines that carry no worker prefix, have an empty body, or look like JSON
//! produce no template and are dropped by callers without being counted.

mod rules;

pub use rules::MessageNormalizer;

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;

/// Placeholder tokens a template may contain.
pub const PLACEHOLDERS: [&str; 6] = ["<N>", "<NUM>", "<STR>", "<HEX>", "<IP>", "<VALUE>"];

/// A normalized, placeholder-bearing log message shape.
///
/// Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Template {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Template {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Template {
    fn from(s: String) -> Self {
        Template(s)
    }
}

impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Template(s.to_string())
    }
}

/// Anything that can turn one log line into a template.
///
/// The aggregator is generic over this so workers share one immutable
/// normalizer by reference.
pub trait LineNormalizer: Sync {
    fn normalize(&self, line: &str) -> Option<Template>;
}

impl LineNormalizer for MessageNormalizer {
    fn normalize(&self, line: &str) -> Option<Template> {
        MessageNormalizer::normalize(self, line)
    }
}

impl<F> LineNormalizer for F
where
    F: Fn(&str) -> Option<Template> + Sync,
{
    fn normalize(&self, line: &str) -> Option<Template> {
        self(line)
    }
}

/// Process-wide normalizer with the built-in rewrite chain.
pub fn default_normalizer() -> &'static MessageNormalizer {
    static DEFAULT: OnceLock<MessageNormalizer> = OnceLock::new();
    DEFAULT.get_or_init(MessageNormalizer::new)
}

/// Normalize one raw line with the built-in rewrite chain.
pub fn normalize(line: &str) -> Option<Template> {
    default_normalizer().normalize(line)
}
