//! HTML templates with atomic hot reload.
//!
//! Every `*.html` file in a directory is parsed into a [`TemplateSet`], an
//! immutable snapshot tagged with a version. [`Templates`] holds the current
//! snapshot behind an atomic pointer: a reload builds a complete new set and
//! swaps it in, so a render always sees one whole snapshot, old or new, never
//! a half-built one. A reload that fails keeps the previous snapshot.
//!
//! # Syntax
//!
//! Templates are plain HTML with `{{ path }}` placeholders that look up a
//! dotted path in the data passed to [`Templates::render`]. A leading dot is
//! optional and `{{ . }}` prints the data itself. Output is HTML-escaped;
//! `{{{ path }}}` inserts it raw.
//!
//! ```text
//! <h1>Hello, {{ user.name }}!</h1>
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::response::Response;
use crate::watch::Watch;

/// Template loading and rendering failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("templates not loaded")]
    NotLoaded,

    #[error("no *.html templates in {dir}")]
    Empty { dir: String },

    #[error("reading {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("{template}: unclosed placeholder at byte {offset}")]
    Unclosed { template: String, offset: usize },

    #[error("{template}: empty placeholder at byte {offset}")]
    EmptyPlaceholder { template: String, offset: usize },

    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("{template}: no value for `{path}`")]
    MissingValue { template: String, path: String },

    #[error("serializing template data: {0}")]
    Data(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Value { path: Vec<String>, raw: bool },
}

/// One parsed template file.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, TemplateError> {
        let name = name.into();
        let mut nodes = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                nodes.push(Node::Text(rest[..start].to_owned()));
            }

            let raw = rest[start..].starts_with("{{{");
            let (open, close) = if raw { ("{{{", "}}}") } else { ("{{", "}}") };
            let inner_start = start + open.len();
            let Some(len) = rest[inner_start..].find(close) else {
                return Err(TemplateError::Unclosed { template: name, offset: offset + start });
            };

            let expr = rest[inner_start..inner_start + len].trim();
            if expr.is_empty() {
                return Err(TemplateError::EmptyPlaceholder { template: name, offset: offset + start });
            }
            nodes.push(Node::Value { path: parse_path(expr), raw });

            let consumed = inner_start + len + close.len();
            rest = &rest[consumed..];
            offset += consumed;
        }

        if !rest.is_empty() {
            nodes.push(Node::Text(rest.to_owned()));
        }

        Ok(Self { name, nodes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, data: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Value { path, raw } => {
                    let value = lookup(data, path).ok_or_else(|| TemplateError::MissingValue {
                        template: self.name.clone(),
                        path: path.join("."),
                    })?;
                    let text = display(value);
                    if *raw {
                        out.push_str(&text);
                    } else {
                        escape_into(&mut out, &text);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// `.` → empty path (the data itself); `.a.b` and `a.b` → `["a", "b"]`.
fn parse_path(expr: &str) -> Vec<String> {
    expr.trim_start_matches('.')
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn lookup<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(data, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

/// An immutable snapshot of every template in a directory.
#[derive(Debug)]
pub struct TemplateSet {
    version: u64,
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// Parses every `*.html` file directly inside `dir`, keyed by file name
    /// (`index.html`).
    pub fn parse_dir(dir: &Path, version: u64) -> Result<Self, TemplateError> {
        let read_err = |path: &Path, source| TemplateError::Read { path: path.display().to_string(), source };

        let mut templates = HashMap::new();
        for entry in fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
            let path = entry.map_err(|e| read_err(dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let source = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
            templates.insert(name.to_owned(), Template::parse(name, &source)?);
        }

        if templates.is_empty() {
            return Err(TemplateError::Empty { dir: dir.display().to_string() });
        }
        Ok(Self { version, templates })
    }

    pub fn version(&self) -> u64 { self.version }
    pub fn len(&self) -> usize { self.templates.len() }
    pub fn is_empty(&self) -> bool { self.templates.is_empty() }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError> {
        self.get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_owned()))?
            .render(data)
    }
}

#[derive(Default)]
struct Shared {
    current: ArcSwapOption<TemplateSet>,
    versions: AtomicU64,
}

/// The template cache. Cheap to clone; clones share the same snapshot.
#[derive(Clone, Default)]
pub struct Templates {
    shared: Arc<Shared>,
}

impl Templates {
    /// An empty cache. Renders fail with [`TemplateError::NotLoaded`] until a
    /// successful [`reload`](Templates::reload).
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every template in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let templates = Self::new();
        templates.reload(dir)?;
        Ok(templates)
    }

    /// Parses `dir` into a fresh snapshot and swaps it in. On failure the
    /// current snapshot stays in place. Returns the new snapshot's version.
    pub fn reload(&self, dir: impl AsRef<Path>) -> Result<u64, TemplateError> {
        let dir = dir.as_ref();
        let mut set = TemplateSet::parse_dir(dir, 0)?;
        let version = self.shared.versions.fetch_add(1, Ordering::Relaxed) + 1;
        set.version = version;
        let count = set.len();
        self.shared.current.store(Some(Arc::new(set)));
        info!(dir = %dir.display(), version, templates = count, "templates loaded");
        Ok(version)
    }

    /// The current snapshot, if any. Holding it keeps that snapshot alive
    /// across later reloads.
    pub fn snapshot(&self) -> Option<Arc<TemplateSet>> {
        self.shared.current.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.current.load().is_some()
    }

    /// Renders `name` against `data` from the current snapshot.
    pub fn render<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String, TemplateError> {
        let set = self.shared.current.load();
        let set = set.as_ref().ok_or(TemplateError::NotLoaded)?;
        let data = serde_json::to_value(data)?;
        set.render(name, &data)
    }

    /// Renders `name` into a `text/html` response. Any failure is logged and
    /// answered with a bare `500 Internal Server Error`.
    pub fn render_html<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Response {
        match self.render(name, data) {
            Ok(html) => Response::html(html),
            Err(e) => {
                error!(template = name, "rendering template: {e}");
                Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    /// Reloads from `dir` whenever a file in it is created or modified.
    /// Failed reloads are logged and keep the previous snapshot.
    pub fn watch(&self, dir: impl AsRef<Path>) -> Result<Watch, crate::Error> {
        let templates = self.clone();
        let root = dir.as_ref().to_path_buf();

        Watch::spawn(
            dir.as_ref(),
            |kind| kind.is_create() || kind.is_modify(),
            move |path| {
                info!(path = %path.display(), "template change detected");
                if let Err(e) = templates.reload(&root) {
                    warn!("template reload failed, keeping current templates: {e}");
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;

    #[test]
    fn parses_text_and_placeholders() {
        let t = Template::parse("t.html", "<p>{{ name }}</p>{{{raw}}}").unwrap();
        assert_eq!(
            t.nodes,
            [
                Node::Text("<p>".into()),
                Node::Value { path: vec!["name".into()], raw: false },
                Node::Text("</p>".into()),
                Node::Value { path: vec!["raw".into()], raw: true },
            ]
        );
    }

    #[test]
    fn rejects_unclosed_and_empty_placeholders() {
        assert!(matches!(
            Template::parse("t.html", "<p>{{ name </p>"),
            Err(TemplateError::Unclosed { offset: 3, .. })
        ));
        assert!(matches!(
            Template::parse("t.html", "a{{  }}"),
            Err(TemplateError::EmptyPlaceholder { offset: 1, .. })
        ));
    }

    #[test]
    fn renders_nested_values_escaped() {
        let t = Template::parse("t.html", "<h1>{{ .user.name }}</h1><p>{{ user.tags.1 }} {{{ html }}}</p>").unwrap();
        let out = t
            .render(&json!({ "user": { "name": "<Sam>", "tags": ["a", "b&c"] }, "html": "<b>x</b>" }))
            .unwrap();
        assert_eq!(out, "<h1>&lt;Sam&gt;</h1><p>b&amp;c <b>x</b></p>");
    }

    #[test]
    fn dot_prints_the_data() {
        let t = Template::parse("t.html", "{{ . }}").unwrap();
        assert_eq!(t.render(&json!(42)).unwrap(), "42");
    }

    #[test]
    fn missing_value_is_an_error() {
        let t = Template::parse("t.html", "{{ missing }}").unwrap();
        assert!(matches!(t.render(&json!({})), Err(TemplateError::MissingValue { .. })));
    }

    #[test]
    fn render_before_load_is_500() {
        let templates = Templates::new();
        assert!(matches!(templates.render("index.html", &()), Err(TemplateError::NotLoaded)));

        let res = templates.render_html("index.html", &());
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), b"Internal Server Error\n");
    }

    #[test]
    fn loads_html_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "Hello, {{ name }}!").unwrap();
        fs::write(dir.path().join("notes.txt"), "{{ ignored").unwrap();

        let templates = Templates::load(dir.path()).unwrap();
        let set = templates.snapshot().unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), ["index.html"]);

        let res = templates.render_html("index.html", &json!({ "name": "Sam" }));
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"Hello, Sam!");
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));

        let res = templates.render_html("other.html", &json!({}));
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_directory_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Templates::load(dir.path()), Err(TemplateError::Empty { .. })));
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "v1").unwrap();
        let templates = Templates::load(dir.path()).unwrap();

        fs::write(dir.path().join("index.html"), "{{ broken").unwrap();
        assert!(templates.reload(dir.path()).is_err());

        assert_eq!(templates.snapshot().unwrap().version(), 1);
        assert_eq!(templates.render("index.html", &()).unwrap(), "v1");

        fs::write(dir.path().join("index.html"), "v2").unwrap();
        assert_eq!(templates.reload(dir.path()).unwrap(), 2);
        assert_eq!(templates.render("index.html", &()).unwrap(), "v2");
    }

    #[test]
    fn readers_see_whole_snapshots_during_reloads() {
        let old = tempfile::tempdir().unwrap();
        let new = tempfile::tempdir().unwrap();
        for (dir, tag) in [(&old, "old"), (&new, "new")] {
            for name in ["a.html", "b.html", "c.html"] {
                fs::write(dir.path().join(name), tag).unwrap();
            }
        }

        let templates = Templates::load(old.path()).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let templates = templates.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let set = templates.snapshot().unwrap();
                        assert_eq!(set.len(), 3);
                        let a = set.render("a.html", &Value::Null).unwrap();
                        let b = set.render("b.html", &Value::Null).unwrap();
                        let c = set.render("c.html", &Value::Null).unwrap();
                        assert!(a == b && b == c, "mixed snapshot: {a} {b} {c}");
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let dir = if i % 2 == 0 { new.path() } else { old.path() };
            templates.reload(dir).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(templates.snapshot().unwrap().version(), 51);
    }
}
