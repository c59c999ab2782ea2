//! Glob patterns compiled to anchored regexes.
//!
//! Supported syntax: `*` and `?` within one path segment, `[...]` classes
//! (`[!...]` negates), and `**` as a whole segment for any number of
//! directories. Matching is done on `/`-separated relative paths.

use regex::Regex;

use super::ToolError;

/// Pattern used when the caller gives none.
pub const MATCH_ALL: &str = "**/*";

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    regex: Regex,
}

impl Glob {
    /// Compile a relative glob pattern.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::InvalidPattern` for absolute patterns, patterns with
    /// `..` segments, and malformed character classes.
    pub fn new(pattern: &str) -> Result<Self, ToolError> {
        let pattern = pattern.trim();
        let pattern = if pattern.is_empty() { MATCH_ALL } else { pattern };

        if pattern.starts_with('/') || pattern.starts_with('\\') {
            return Err(ToolError::InvalidPattern(format!(
                "non-relative patterns are unsupported: {}",
                pattern
            )));
        }

        let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "..") {
            return Err(ToolError::InvalidPattern(format!(
                "parent segments are not allowed: {}",
                pattern
            )));
        }

        let mut re = String::from("^");
        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.iter().enumerate() {
            if *segment == "**" {
                if i == last {
                    re.push_str(".*");
                } else {
                    re.push_str("(?:[^/]+/)*");
                }
                continue;
            }
            translate_segment(segment, &mut re)?;
            if i != last {
                re.push('/');
            }
        }
        re.push('$');

        let regex = Regex::new(&re)
            .map_err(|e| ToolError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { regex })
    }

    /// Whether a `/`-separated relative path matches.
    pub fn is_match(&self, relative_path: &str) -> bool {
        self.regex.is_match(relative_path)
    }
}

fn translate_segment(segment: &str, re: &mut String) -> Result<(), ToolError> {
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // `**` inside a segment behaves like `*`
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                re.push_str("[^/]*");
            }
            '?' => re.push_str("[^/]"),
            '[' => {
                let mut class = String::from("[");
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                let mut first = true;
                while let Some(c) = chars.next() {
                    if c == ']' && !first {
                        closed = true;
                        break;
                    }
                    first = false;
                    if matches!(c, '\\' | '[' | ']' | '&' | '~') {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if !closed {
                    return Err(ToolError::InvalidPattern(format!(
                        "unterminated character class in '{}'",
                        segment
                    )));
                }
                class.push(']');
                re.push_str(&class);
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    Ok(())
}
