//! Decides which pages a site has.
//!
//! [`plan`] is a pure function of the [`ContentGraph`]: it does no I/O and
//! returns the same instructions, in the same order, every time.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::document::{CollectionKind, Document, INDEX_STEM};
use crate::graph::{ContentGraph, TagIndex};

pub const POST_TEMPLATE: &str = "post.html";
pub const HOME_TEMPLATE: &str = "index.html";
pub const TAGS_TEMPLATE: &str = "tags.html";
pub const TAG_TEMPLATE: &str = "tag.html";

pub const TAGS_DIR: &str = "tags";

/// How many of the newest documents per collection the home page lists.
pub const DEFAULT_HOME_RECENT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    pub home_recent: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            home_recent: DEFAULT_HOME_RECENT,
        }
    }
}

/// One page to render: which template, where it goes, and what it sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInstruction<'g> {
    pub template: &'static str,
    pub output_path: PathBuf,
    pub context: PageContext<'g>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionListing<'g> {
    pub collection: CollectionKind,
    pub label: &'static str,
    pub url: String,
    pub documents: &'g [Document],
}

impl<'g> CollectionListing<'g> {
    fn new(collection: CollectionKind, documents: &'g [Document]) -> Self {
        Self {
            collection,
            label: collection.label(),
            url: collection.url(),
            documents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSummary<'g> {
    pub tag: &'g str,
    pub count: usize,
    pub url: String,
}

/// Template variables for a page. Each variant serializes to a flat map,
/// so a variant's fields are the names its template uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PageContext<'g> {
    Document {
        document: &'g Document,
    },
    Home {
        collections: Vec<CollectionListing<'g>>,
        featured: Vec<&'g Document>,
    },
    Collection(CollectionListing<'g>),
    TagOverview {
        tags: Vec<TagSummary<'g>>,
    },
    Tag {
        tag: &'g str,
        documents: Vec<&'g Document>,
    },
}

/// Base file stem for a tag page: lowercase, whitespace runs become a
/// single `-`, and anything but letters, digits, `_` and `-` is dropped.
/// An empty result becomes `tag`.
pub fn tag_file_stem(tag: &str) -> String {
    let mut stem = String::with_capacity(tag.len());
    for c in tag.trim().chars() {
        if c.is_whitespace() || c == '-' {
            if !stem.ends_with('-') {
                stem.push('-');
            }
        } else if c.is_alphanumeric() || c == '_' {
            stem.extend(c.to_lowercase());
        }
    }

    if stem.is_empty() {
        "tag".to_string()
    } else {
        stem
    }
}

/// Where each tag's page goes.
///
/// Stems are handed out in label order. `index` belongs to the tag
/// overview, and a stem that is already taken gets `-2`, `-3`, ... so
/// no two tags share a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPages {
    stems: BTreeMap<String, String>,
}

impl TagPages {
    pub fn new(tags: &TagIndex) -> Self {
        let mut taken: HashSet<String> = HashSet::from([INDEX_STEM.to_string()]);
        let mut stems = BTreeMap::new();

        for (tag, _) in tags.iter() {
            let base = tag_file_stem(tag);
            let mut stem = base.clone();
            let mut n = 1;
            while taken.contains(&stem) {
                n += 1;
                stem = format!("{base}-{n}");
            }
            taken.insert(stem.clone());
            stems.insert(tag.to_string(), stem);
        }

        Self { stems }
    }

    /// Stem assigned to `tag`. Tags without a page get their base stem.
    pub fn stem(&self, tag: &str) -> String {
        match self.stems.get(tag) {
            Some(stem) => stem.clone(),
            None => tag_file_stem(tag),
        }
    }

    pub fn output_path(&self, tag: &str) -> PathBuf {
        PathBuf::from(TAGS_DIR).join(format!("{}.html", self.stem(tag)))
    }

    pub fn url(&self, tag: &str) -> String {
        format!("/{TAGS_DIR}/{}.html", self.stem(tag))
    }
}

/// Every page of the site, in a fixed order: document pages, the home
/// page, collection indexes, the tag overview, then one page per tag.
pub fn plan<'g>(graph: &'g ContentGraph, options: &PlanOptions) -> Vec<PageInstruction<'g>> {
    let mut pages = Vec::new();

    for kind in CollectionKind::ALL {
        for document in graph.collection(kind) {
            pages.push(PageInstruction {
                template: POST_TEMPLATE,
                output_path: document.output_path(),
                context: PageContext::Document { document },
            });
        }
    }

    pages.push(home_page(graph, options));

    for kind in CollectionKind::ALL {
        pages.push(PageInstruction {
            template: kind.index_template(),
            output_path: PathBuf::from(kind.dir_name()).join(format!("{INDEX_STEM}.html")),
            context: PageContext::Collection(CollectionListing::new(kind, graph.collection(kind))),
        });
    }

    let tag_pages = TagPages::new(graph.tags());
    let tags = graph
        .tag_counts()
        .into_iter()
        .map(|(tag, count)| TagSummary {
            tag,
            count,
            url: tag_pages.url(tag),
        })
        .collect();
    pages.push(PageInstruction {
        template: TAGS_TEMPLATE,
        output_path: PathBuf::from(TAGS_DIR).join(format!("{INDEX_STEM}.html")),
        context: PageContext::TagOverview { tags },
    });

    for (tag, _) in graph.tags().iter() {
        pages.push(PageInstruction {
            template: TAG_TEMPLATE,
            output_path: tag_pages.output_path(tag),
            context: PageContext::Tag {
                tag,
                documents: graph.tagged(tag),
            },
        });
    }

    pages
}

fn home_page<'g>(graph: &'g ContentGraph, options: &PlanOptions) -> PageInstruction<'g> {
    let collections = CollectionKind::ALL
        .iter()
        .map(|kind| {
            let documents = graph.collection(*kind);
            let recent = &documents[..documents.len().min(options.home_recent)];
            CollectionListing::new(*kind, recent)
        })
        .collect();

    let featured = CollectionKind::ALL
        .iter()
        .flat_map(|kind| graph.collection(*kind))
        .filter(|d| d.featured)
        .collect();

    PageInstruction {
        template: HOME_TEMPLATE,
        output_path: PathBuf::from("index.html"),
        context: PageContext::Home {
            collections,
            featured,
        },
    }
}
