use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::frontmatter::{self, HeaderError};
use crate::markdown::{self, TocEntry};
use crate::math;

pub const DEFAULT_TITLE: &str = "Untitled";

/// File stem of a listing page (`blog/index.html`, `tags/index.html`).
/// No document or tag page may use it.
pub const INDEX_STEM: &str = "index";

/// Which content directory a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Blog,
    Notes,
}

impl CollectionKind {
    /// Every kind, in the order pages and listings are produced.
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Blog, CollectionKind::Notes];

    /// Content subdirectory, and output prefix.
    pub fn dir_name(self) -> &'static str {
        match self {
            CollectionKind::Blog => "blog",
            CollectionKind::Notes => "notes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CollectionKind::Blog => "Blog",
            CollectionKind::Notes => "Notes",
        }
    }

    pub fn index_template(self) -> &'static str {
        match self {
            CollectionKind::Blog => "blog_index.html",
            CollectionKind::Notes => "notes_index.html",
        }
    }

    pub fn url(self) -> String {
        format!("/{}/", self.dir_name())
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid UTF-8", .path.display())]
    Encoding { path: PathBuf },
    #[error("bad metadata header in {}: {message}", .path.display())]
    Header { path: PathBuf, message: String },
    #[error("bad `{field}` date in {}: {value:?}", .path.display())]
    InvalidDate {
        path: PathBuf,
        field: &'static str,
        value: String,
    },
    #[error("cannot derive a slug from {}", .path.display())]
    InvalidSlug { path: PathBuf },
}

impl ParseError {
    pub fn path(&self) -> &Path {
        match self {
            ParseError::Io { path, .. }
            | ParseError::Encoding { path }
            | ParseError::Header { path, .. }
            | ParseError::InvalidDate { path, .. }
            | ParseError::InvalidSlug { path } => path,
        }
    }

    fn from_header(path: &Path, err: HeaderError) -> Self {
        let path = path.to_path_buf();
        match err {
            HeaderError::Unterminated => ParseError::Header {
                path,
                message: "opening `---` has no closing `---`".into(),
            },
            HeaderError::Yaml(message) => ParseError::Header { path, message },
            HeaderError::Date { field, value } => ParseError::InvalidDate { path, field, value },
        }
    }
}

/// One parsed content file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub publish_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub draft: bool,
    pub featured: bool,
    pub hero_image: Option<String>,
    pub body_html: String,
    pub toc: Vec<TocEntry>,
    pub collection: CollectionKind,
    pub url: String,
    #[serde(skip)]
    pub source_path: PathBuf,
}

impl Document {
    /// Path of the rendered page, relative to the output root.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.collection.dir_name()).join(format!("{}.html", self.slug))
    }
}

/// Turns source files into [`Document`]s.
///
/// `build_time` stands in for a missing `pubDate`. It is fixed when the
/// parser is created so every undated document of one build gets the same
/// timestamp.
#[derive(Debug, Clone)]
pub struct DocumentParser {
    build_time: NaiveDateTime,
}

impl DocumentParser {
    pub fn new(build_time: NaiveDateTime) -> Self {
        Self { build_time }
    }

    pub fn parse_file(&self, path: &Path, collection: CollectionKind) -> Result<Document, ParseError> {
        let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = String::from_utf8(bytes).map_err(|_| ParseError::Encoding {
            path: path.to_path_buf(),
        })?;

        let slug = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ParseError::InvalidSlug {
                path: path.to_path_buf(),
            })?;

        self.parse_str(&source, &slug, collection, path)
    }

    /// Parse an in-memory source. `path` is only used for error messages
    /// and [`Document::source_path`].
    pub fn parse_str(
        &self,
        source: &str,
        slug: &str,
        collection: CollectionKind,
        path: &Path,
    ) -> Result<Document, ParseError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        let (raw_header, body) =
            frontmatter::split(source).map_err(|e| ParseError::from_header(path, e))?;
        let header = match raw_header {
            Some(raw) => frontmatter::parse_header(raw).map_err(|e| ParseError::from_header(path, e))?,
            None => Default::default(),
        };

        let publish_date = match header.pub_date.as_deref() {
            Some(value) => frontmatter::parse_date("pubDate", value)
                .map_err(|e| ParseError::from_header(path, e))?,
            None => self.build_time,
        };
        let updated_date = header
            .updated_date
            .as_deref()
            .map(|value| frontmatter::parse_date("updatedDate", value))
            .transpose()
            .map_err(|e| ParseError::from_header(path, e))?;

        let isolated = math::isolate(body);
        let rendered = markdown::render(&isolated.text, &isolated.spans);

        Ok(Document {
            slug: slug.to_string(),
            title: header.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: header.description.unwrap_or_default(),
            publish_date,
            updated_date,
            author: header.author,
            tags: header.tags.map(|t| t.normalized()).unwrap_or_default(),
            draft: header.draft,
            featured: header.featured,
            hero_image: header.hero_image,
            body_html: rendered.html,
            toc: rendered.toc,
            collection,
            url: format!("/{}/{}.html", collection.dir_name(), slug),
            source_path: path.to_path_buf(),
        })
    }
}
