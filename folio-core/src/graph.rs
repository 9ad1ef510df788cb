//! The in-memory content graph: sorted collections plus the tag index.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};

use crate::builder::BuildError;
use crate::document::{CollectionKind, Document, DocumentParser, INDEX_STEM};
use crate::scanner::collection_files;

/// Points at one document inside a [`ContentGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub collection: CollectionKind,
    pub index: usize,
}

/// Tag label to the documents carrying it, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagIndex {
    entries: BTreeMap<String, Vec<DocumentRef>>,
}

impl TagIndex {
    pub fn get(&self, tag: &str) -> Option<&[DocumentRef]> {
        self.entries.get(tag).map(Vec::as_slice)
    }

    /// Tags in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DocumentRef])> {
        self.entries.iter().map(|(tag, refs)| (tag.as_str(), refs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentGraph {
    collections: BTreeMap<CollectionKind, Vec<Document>>,
    tags: TagIndex,
}

/// Newest first; equal dates fall back to slug, then collection order.
fn chronological(a: &Document, b: &Document) -> Ordering {
    b.publish_date
        .cmp(&a.publish_date)
        .then_with(|| a.slug.cmp(&b.slug))
        .then_with(|| a.collection.cmp(&b.collection))
}

impl ContentGraph {
    /// Assemble a graph from parsed documents. Drafts are dropped here.
    pub fn from_documents<I>(documents: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut collections: BTreeMap<CollectionKind, Vec<Document>> =
            CollectionKind::ALL.iter().map(|kind| (*kind, Vec::new())).collect();

        for document in documents {
            if document.draft {
                debug!("Skipping draft {}", document.source_path.display());
                continue;
            }

            if document.slug == INDEX_STEM {
                return Err(BuildError::ReservedSlug {
                    collection: document.collection,
                    path: document.source_path,
                });
            }

            let docs = collections.entry(document.collection).or_default();
            if let Some(existing) = docs.iter().find(|d| d.slug == document.slug) {
                return Err(BuildError::DuplicateSlug {
                    collection: document.collection,
                    slug: document.slug,
                    first: existing.source_path.clone(),
                    second: document.source_path,
                });
            }
            docs.push(document);
        }

        for docs in collections.values_mut() {
            docs.sort_by(chronological);
        }

        let mut entries: BTreeMap<String, Vec<DocumentRef>> = BTreeMap::new();
        for (collection, docs) in &collections {
            for (index, document) in docs.iter().enumerate() {
                for tag in &document.tags {
                    let doc_ref = DocumentRef {
                        collection: *collection,
                        index,
                    };
                    entries.entry(tag.clone()).or_default().push(doc_ref);
                }
            }
        }

        for refs in entries.values_mut() {
            refs.sort_by(|a, b| {
                chronological(
                    &collections[&a.collection][a.index],
                    &collections[&b.collection][b.index],
                )
            });
        }

        Ok(Self {
            collections,
            tags: TagIndex { entries },
        })
    }

    /// Documents of one collection, newest first.
    pub fn collection(&self, kind: CollectionKind) -> &[Document] {
        self.collections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All documents, collection by collection.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.collections.values().flatten()
    }

    pub fn resolve(&self, doc_ref: DocumentRef) -> Option<&Document> {
        self.collections.get(&doc_ref.collection)?.get(doc_ref.index)
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    /// Documents carrying `tag`, newest first. Unknown tags give nothing.
    pub fn tagged(&self, tag: &str) -> Vec<&Document> {
        self.tags
            .get(tag)
            .unwrap_or(&[])
            .iter()
            .filter_map(|r| self.resolve(*r))
            .collect()
    }

    /// Every tag with its document count, most used first, then by label.
    pub fn tag_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> =
            self.tags.iter().map(|(tag, refs)| (tag, refs.len())).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        counts
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse every collection below `content_dir` and assemble the graph.
///
/// The first document that fails to parse aborts the whole build.
pub fn build_graph(content_dir: &Path, parser: &DocumentParser) -> Result<ContentGraph, BuildError> {
    if !content_dir.is_dir() {
        return Err(BuildError::MissingContentDir(content_dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    for kind in CollectionKind::ALL {
        let dir = content_dir.join(kind.dir_name());
        let files = collection_files(&dir).map_err(|source| BuildError::Scan {
            path: dir.clone(),
            source,
        })?;
        debug!("{}: {} source files", dir.display(), files.len());

        for path in files {
            documents.push(parser.parse_file(&path, kind)?);
        }
    }

    let graph = ContentGraph::from_documents(documents)?;
    info!(
        "Loaded {} documents ({}), {} tags",
        graph.len(),
        CollectionKind::ALL
            .iter()
            .map(|kind| format!("{} {}", graph.collection(*kind).len(), kind))
            .collect::<Vec<_>>()
            .join(", "),
        graph.tags().len()
    );

    Ok(graph)
}
