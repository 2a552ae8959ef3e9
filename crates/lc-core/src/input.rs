//! Reading a log file as an ordered sequence of lines.

use std::path::Path;
use tracing::debug;

/// Read every line of `path` in order.
///
/// Invalid UTF-8 is replaced rather than rejected so one corrupt byte does not
/// abort a whole log.
pub fn read_lines(path: &Path) -> lc_common::Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|source| lc_common::Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    let lines = split_lines(&String::from_utf8_lossy(&bytes));
    debug!(path = %path.display(), lines = lines.len(), "read log file");
    Ok(lines)
}

/// Split on `\n`, `\r\n`, or a lone `\r`. A final terminator does not start
/// an extra empty line.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(end) = rest.find(|c: char| c == '\n' || c == '\r') {
        lines.push(rest[..end].to_owned());
        let terminator = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[end + terminator..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_owned());
    }
    lines
}
