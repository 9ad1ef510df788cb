use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, SubsecRound};
use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::document::{CollectionKind, DocumentParser, ParseError};
use crate::graph::build_graph;
use crate::output::{OutputError, OutputWriter};
use crate::planner::{TagPages, plan};
use crate::template::{Renderer, TemplateError};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("content directory {} does not exist", .0.display())]
    MissingContentDir(PathBuf),
    #[error("failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(
        "duplicate slug `{slug}` in {collection}: {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateSlug {
        collection: CollectionKind,
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error(
        "{} would overwrite the {collection} index page; rename it",
        .path.display()
    )]
    ReservedSlug {
        collection: CollectionKind,
        path: PathBuf,
    },
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("output error: {0}")]
    Output(#[from] OutputError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub pages: usize,
    pub tags: usize,
    pub static_files: usize,
}

pub struct SiteBuilder {
    content_dir: PathBuf,
    output_dir: PathBuf,
    theme_dir: PathBuf,
    static_dir: Option<PathBuf>,
    config: Config,
    globals: Vec<(String, serde_json::Value)>,
    build_time: Option<NaiveDateTime>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            content_dir: PathBuf::from("./content"),
            output_dir: PathBuf::from("./output"),
            theme_dir: PathBuf::from("./theme"),
            static_dir: None,
            config: Config::default(),
            globals: Vec::new(),
            build_time: None,
        }
    }

    pub fn content_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.content_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn theme_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.theme_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn static_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.static_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    // Custom template globals
    pub fn global<T: Serialize>(mut self, key: &str, value: T) -> Result<Self, BuildError> {
        let json_value = serde_json::to_value(value)?;
        self.globals.push((key.to_string(), json_value));
        Ok(self)
    }

    /// Pin the timestamp used for undated documents and `now`. Defaults
    /// to the local time when [`SiteBuilder::build`] starts.
    pub fn build_time(mut self, time: NaiveDateTime) -> Self {
        self.build_time = Some(time);
        self
    }

    /// Run one full build.
    ///
    /// Every page is rendered in memory before the output directory is
    /// touched, so a parse or template error leaves the previous site as
    /// it was.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        // Whole seconds, so `now` and undated documents pass through the
        // `date` filter like any frontmatter date.
        let build_time = self
            .build_time
            .unwrap_or_else(|| Local::now().naive_local().trunc_subsecs(0));
        info!("Building {} into {}", self.content_dir.display(), self.output_dir.display());

        let parser = DocumentParser::new(build_time);
        let graph = build_graph(&self.content_dir, &parser)?;

        let mut renderer = Renderer::new(&self.theme_dir)?;
        renderer.set_global("site", &self.config.site);
        renderer.set_global("now", &build_time);
        renderer.set_tag_pages(TagPages::new(graph.tags()));
        for (key, value) in &self.globals {
            renderer.set_global(key, value);
        }

        let instructions = plan(&graph, &self.config.plan_options());
        let mut pages = Vec::with_capacity(instructions.len());
        for instruction in &instructions {
            let html = renderer.render(instruction.template, &instruction.context)?;
            pages.push((instruction.output_path.as_path(), html));
        }

        let writer = OutputWriter::new(&self.output_dir);
        writer.reset()?;
        for (path, html) in &pages {
            writer.write_page(path, html)?;
        }
        let static_files = match &self.static_dir {
            Some(dir) => writer.copy_static(dir)?,
            None => 0,
        };
        writer.touch_marker()?;

        let report = BuildReport {
            documents: graph.len(),
            pages: pages.len(),
            tags: graph.tags().len(),
            static_files,
        };
        info!(
            "Wrote {} pages ({} documents, {} tags, {} static files)",
            report.pages, report.documents, report.tags, report.static_files
        );

        Ok(report)
    }
}

/// Build a site from `config` with the usual directory layout.
pub fn build_site(
    config: &Config,
    content_dir: &Path,
    output_dir: &Path,
    theme_dir: &Path,
    static_dir: &Path,
) -> Result<BuildReport, BuildError> {
    SiteBuilder::new()
        .content_dir(content_dir)
        .output_dir(output_dir)
        .theme_dir(theme_dir)
        .static_dir(static_dir)
        .config(config.clone())
        .build()
}
