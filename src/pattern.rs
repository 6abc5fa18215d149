//! Route template compiler.
//!
//! A template is a `/`-delimited path whose segments are either literals or
//! `:identifier` placeholders:
//!
//! ```text
//! /users/:name/posts/:post_id
//! ```
//!
//! Each template is compiled once, at registration, into an anchored regular
//! expression with one named capture per placeholder. Request-time matching is
//! a single regex execution; the template is never parsed again.

use regex::Regex;
use thiserror::Error;

use crate::params::Params;

/// Why a route template was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("route template must start with `/`")]
    MissingLeadingSlash,

    #[error("empty parameter name in segment {segment}")]
    EmptyIdentifier { segment: usize },

    #[error("invalid parameter name `{name}`")]
    InvalidIdentifier { name: String },

    #[error("parameter `{name}` is declared more than once")]
    DuplicateIdentifier { name: String },

    #[error("regex: {0}")]
    Regex(String),
}

/// Strips exactly one trailing `/`. The root path `/` is left untouched so it
/// keeps matching only itself.
pub fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    names: Vec<String>,
}

impl Pattern {
    /// Compiles a route template.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let template = normalize(template);
        if !template.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let mut source = String::with_capacity(template.len() + 16);
        let mut names: Vec<String> = Vec::new();
        source.push('^');

        if template == "/" {
            source.push('/');
        } else {
            for (index, segment) in template.split('/').enumerate().skip(1) {
                source.push('/');
                match segment.strip_prefix(':') {
                    Some(name) => {
                        validate_identifier(name, index)?;
                        if names.iter().any(|n| n == name) {
                            return Err(PatternError::DuplicateIdentifier { name: name.to_owned() });
                        }
                        source.push_str("(?P<");
                        source.push_str(name);
                        source.push_str(">[^/]+)");
                        names.push(name.to_owned());
                    }
                    None => source.push_str(&regex::escape(segment)),
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| PatternError::Regex(e.to_string()))?;
        Ok(Self { regex, names })
    }

    /// Compiles a prefix pattern matching `prefix` itself and every path below
    /// it. Used for static-file delegation.
    pub fn prefix(prefix: &str) -> Result<Self, PatternError> {
        let prefix = normalize(prefix);
        if !prefix.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let source = if prefix == "/" {
            "^/.*$".to_owned()
        } else {
            format!("^{}(?:/.*)?$", regex::escape(prefix))
        };

        let regex = Regex::new(&source).map_err(|e| PatternError::Regex(e.to_string()))?;
        Ok(Self { regex, names: Vec::new() })
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Matches an already decoded and normalized path. Returns the captured
    /// parameters on success; the map is empty for templates without
    /// placeholders.
    pub fn matches(&self, path: &str) -> Option<Params> {
        if self.names.is_empty() {
            return self.regex.is_match(path).then(Params::new);
        }

        let captures = self.regex.captures(path)?;
        let mut params = Params::new();
        for name in &self.names {
            if let Some(value) = captures.name(name) {
                params.insert(name.as_str(), value.as_str());
            }
        }
        Some(params)
    }
}

fn validate_identifier(name: &str, segment: usize) -> Result<(), PatternError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(PatternError::EmptyIdentifier { segment });
    };

    let valid = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(PatternError::InvalidIdentifier { name: name.to_owned() })
    }
}
