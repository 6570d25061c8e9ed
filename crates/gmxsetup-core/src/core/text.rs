use regex::{NoExpand, Regex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Replaces `search` with `replace` on every line matching `line_pattern`.
#[derive(Debug, Clone)]
pub struct Substitution {
    line_pattern: Regex,
    search: Regex,
    replace: String,
}

impl Substitution {
    pub fn new(line_pattern: &str, search: &str, replace: impl Into<String>) -> Result<Self, TextError> {
        Ok(Self {
            line_pattern: compile(line_pattern)?,
            search: compile(search)?,
            replace: replace.into(),
        })
    }

    /// Matches lines starting with the literal `prefix` and replaces the literal `search`.
    pub fn line_prefix(prefix: &str, search: &str, replace: impl Into<String>) -> Result<Self, TextError> {
        Self::new(
            &format!("^{}", regex::escape(prefix)),
            &regex::escape(search),
            replace,
        )
    }

    fn apply(&self, line: &str) -> Option<String> {
        if self.line_pattern.is_match(line) {
            Some(
                self.search
                    .replace_all(line, NoExpand(&self.replace))
                    .into_owned(),
            )
        } else {
            None
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, TextError> {
    Regex::new(pattern).map_err(|source| TextError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Applies `substitutions` line by line; the first substitution whose line pattern
/// matches wins.
pub fn edit_text(template: &str, substitutions: &[Substitution]) -> String {
    let mut out = String::with_capacity(template.len());
    for line in template.lines() {
        match substitutions.iter().find_map(|s| s.apply(line)) {
            Some(new_line) => out.push_str(&new_line),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}
