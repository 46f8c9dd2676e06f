//! Human-readable message descriptions for schema introspection.

use std::collections::HashMap;
use std::path::Path;

/// Maps a table (message) name to an optional description. Must not touch
/// store state.
pub trait DescriptionLookup: Send + Sync {
    fn describe(&self, table: &str) -> Option<String>;
}

/// Lookup that never has a description.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDescriptions;

impl DescriptionLookup for NoDescriptions {
    fn describe(&self, _table: &str) -> Option<String> {
        None
    }
}

/// Descriptions parsed from a markdown knowledge base where each message is
/// introduced by a `### NAME` heading and described until the next `###`.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    sections: HashMap<String, String>,
}

impl KnowledgeBase {
    pub fn parse(content: &str) -> Self {
        let mut sections = HashMap::new();
        for section in content.split("###").skip(1) {
            let section = section.trim_start_matches(' ');
            let name_end = section
                .find(char::is_whitespace)
                .unwrap_or(section.len());
            let name = &section[..name_end];
            if name.is_empty() {
                continue;
            }
            let body = section[name_end..].trim();
            sections
                .entry(name.to_string())
                .or_insert_with(|| body.to_string());
        }
        Self { sections }
    }

    /// Load from `path`. A missing or unreadable file yields an empty
    /// knowledge base.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let kb = Self::parse(&content);
                tracing::debug!(
                    "loaded {} message descriptions from {}",
                    kb.len(),
                    path.display()
                );
                kb
            }
            Err(e) => {
                tracing::warn!("knowledge base file {} not readable: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl DescriptionLookup for KnowledgeBase {
    fn describe(&self, table: &str) -> Option<String> {
        let found = self.sections.get(table).cloned();
        if found.is_none() {
            tracing::debug!("no description found for message {table}");
        }
        found
    }
}
