//! Knowledge-base lookup.
//!
//! Second answer tier after the scripted rules: a query against indexed
//! support content, returning the answer text plus where it came from.
//! The retrieval backend is deliberately opaque to the rest of the
//! pipeline; this in-memory table is the reference implementation and
//! the seam where a real search index plugs in.

/// An answer with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Identifier of the document or collection the answer came from.
    pub source: String,
}

#[derive(Debug, Clone)]
struct KnowledgeEntry {
    keywords: Vec<String>,
    text: String,
    source: String,
}

/// In-memory keyword-indexed knowledge base.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry reachable through any of `keywords`.
    pub fn add_entry(
        &mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
        text: impl Into<String>,
        source: impl Into<String>,
    ) {
        self.entries.push(KnowledgeEntry {
            keywords: keywords.into_iter().map(Into::into).collect(),
            text: text.into(),
            source: source.into(),
        });
    }

    /// Returns the best match for `query`, if any keyword hits.
    pub fn search(&self, query: &str) -> Option<Answer> {
        let lowered = query.to_lowercase();
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .keywords
                    .iter()
                    .any(|k| lowered.contains(&k.to_lowercase()))
            })
            .map(|entry| Answer {
                text: entry.text.clone(),
                source: entry.source.clone(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
