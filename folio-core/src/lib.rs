pub mod builder;
pub mod config;
pub mod document;
pub mod frontmatter;
pub mod graph;
pub mod markdown;
pub mod math;
pub mod output;
pub mod planner;
pub mod scanner;
pub mod template;

// Re-export main types
pub use builder::{BuildError, BuildReport, SiteBuilder, build_site};
pub use document::{CollectionKind, Document, DocumentParser, ParseError};
pub use graph::{ContentGraph, TagIndex};
pub use planner::{PageContext, PageInstruction, PlanOptions, TagPages, plan};
pub use template::{Renderer, TemplateError};
