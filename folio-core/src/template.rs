use std::collections::HashMap;
use std::error::Error as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera, Value};
use thiserror::Error;

use crate::planner::TagPages;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load templates from {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },
    #[error("failed to render `{template}`: {message}")]
    Render { template: String, message: String },
    #[error("context for `{template}` is not a map: {message}")]
    Context { template: String, message: String },
}

/// Flatten a tera error and its causes into one line. Tera keeps the
/// interesting part (which variable was missing) in the source chain.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// The template engine for one build.
///
/// Created once at build start, loaded with every theme template, and
/// handed by reference to whatever renders pages. Values set with
/// [`Renderer::set_global`] are visible to every template.
pub struct Renderer {
    tera: Tera,
    globals: Context,
}

impl Renderer {
    /// Load every `*.html` template below `theme_dir`.
    pub fn new(theme_dir: &Path) -> Result<Self, TemplateError> {
        if !theme_dir.is_dir() {
            return Err(TemplateError::Load {
                path: theme_dir.to_path_buf(),
                message: "not a directory".into(),
            });
        }

        let pattern = format!("{}/**/*.html", theme_dir.display());
        let tera = Tera::new(&pattern).map_err(|e| TemplateError::Load {
            path: theme_dir.to_path_buf(),
            message: describe(&e),
        })?;

        Ok(Self::with_tera(tera))
    }

    /// Build a renderer from in-memory `(name, source)` templates.
    pub fn from_templates(templates: &[(&str, &str)]) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())
            .map_err(|e| TemplateError::Load {
                path: PathBuf::from("<memory>"),
                message: describe(&e),
            })?;

        Ok(Self::with_tera(tera))
    }

    fn with_tera(tera: Tera) -> Self {
        let mut renderer = Self {
            tera,
            globals: Context::new(),
        };
        renderer.set_tag_pages(TagPages::default());
        renderer
    }

    /// Make `{{ tag | tag_url }}` point at the pages in `pages`.
    pub fn set_tag_pages(&mut self, pages: TagPages) {
        self.tera.register_filter(
            "tag_url",
            move |value: &Value, _: &HashMap<String, Value>| match value {
                Value::String(tag) => Ok(Value::String(pages.url(tag))),
                _ => Err(tera::Error::msg("tag_url filter requires a string")),
            },
        );
    }

    /// Add a value every template can see
    pub fn set_global<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.globals.insert(key, value);
    }

    /// Render `template` with `context` layered over the globals.
    pub fn render<C: Serialize>(&self, template: &str, context: &C) -> Result<String, TemplateError> {
        let page = Context::from_serialize(context).map_err(|e| TemplateError::Context {
            template: template.to_string(),
            message: describe(&e),
        })?;

        let mut context = self.globals.clone();
        context.extend(page);

        self.tera
            .render(template, &context)
            .map_err(|e| TemplateError::Render {
                template: template.to_string(),
                message: describe(&e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_with_globals() {
        let mut renderer = Renderer::from_templates(&[(
            "hello.html",
            "{{ site.title }}: {{ name }}",
        )])
        .unwrap();
        renderer.set_global("site", &json!({ "title": "Folio" }));

        let html = renderer.render("hello.html", &json!({ "name": "<b>" })).unwrap();
        assert_eq!(html, "Folio: &lt;b&gt;");
    }

    #[test]
    fn test_page_context_overrides_globals() {
        let mut renderer = Renderer::from_templates(&[("t.html", "{{ name }}")]).unwrap();
        renderer.set_global("name", "global");

        assert_eq!(renderer.render("t.html", &json!({ "name": "page" })).unwrap(), "page");
    }

    #[test]
    fn test_missing_template() {
        let renderer = Renderer::from_templates(&[]).unwrap();
        let err = renderer.render("nope.html", &json!({})).unwrap_err();

        match err {
            TemplateError::Render { template, .. } => assert_eq!(template, "nope.html"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_variable_is_named() {
        let renderer = Renderer::from_templates(&[("t.html", "{{ document.title }}")]).unwrap();
        let err = renderer.render("t.html", &json!({})).unwrap_err();

        assert!(err.to_string().contains("document.title"), "{err}");
    }

    #[test]
    fn test_tag_url_filter() {
        let renderer = Renderer::from_templates(&[(
            "t.html",
            "{% for t in tags %}{{ t | tag_url | safe }} {% endfor %}",
        )])
        .unwrap();

        let html = renderer
            .render("t.html", &json!({ "tags": ["math", "linear algebra"] }))
            .unwrap();
        assert_eq!(html, "/tags/math.html /tags/linear-algebra.html ");
    }

    #[test]
    fn test_tag_url_filter_follows_assigned_pages() {
        use crate::document::{CollectionKind, tests::sample};
        use crate::graph::ContentGraph;

        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let graph = ContentGraph::from_documents(vec![sample(
            CollectionKind::Blog,
            "a",
            day,
            &["index", "Rust", "rust"],
            false,
        )])
        .unwrap();

        let mut renderer = Renderer::from_templates(&[(
            "t.html",
            "{% for t in tags %}{{ t | tag_url | safe }} {% endfor %}",
        )])
        .unwrap();
        renderer.set_tag_pages(TagPages::new(graph.tags()));

        let html = renderer
            .render("t.html", &json!({ "tags": ["index", "Rust", "rust"] }))
            .unwrap();
        assert_eq!(html, "/tags/index-2.html /tags/rust.html /tags/rust-2.html ");
    }

    #[test]
    fn test_context_must_be_a_map() {
        let renderer = Renderer::from_templates(&[("t.html", "x")]).unwrap();
        assert!(matches!(
            renderer.render("t.html", &json!([1, 2])),
            Err(TemplateError::Context { .. })
        ));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("page.html"), "{% include \"partials/foot.html\" %}").unwrap();
        std::fs::write(dir.path().join("partials/foot.html"), "foot").unwrap();

        let renderer = Renderer::new(dir.path()).unwrap();
        assert_eq!(renderer.render("page.html", &json!({})).unwrap(), "foot");
    }

    #[test]
    fn test_missing_theme_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Renderer::new(&dir.path().join("nope")),
            Err(TemplateError::Load { .. })
        ));
    }
}
