//! crates/document_browser_core/src/registry.rs
//!
//! Read-only lookup over the document catalog. Built once at startup; nothing
//! mutates it afterwards.

use std::collections::BTreeSet;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::domain::Document;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Document not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    documents: Vec<Document>,
}

impl DocumentRegistry {
    /// Builds the registry, ordering documents by name and then newest date first.
    /// A repeated `(name, date)` keeps its first entry.
    pub fn new(documents: Vec<Document>) -> Self {
        let mut seen = HashSet::new();
        let mut documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| {
                let fresh = seen.insert((doc.name.clone(), doc.date.clone()));
                if !fresh {
                    warn!(name = %doc.name, date = %doc.date, "Duplicate catalog entry ignored");
                }
                fresh
            })
            .collect();
        documents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| b.date.cmp(&a.date)));
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn list_documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, name: &str, date: &str) -> Result<&Document, RegistryError> {
        self.documents
            .iter()
            .find(|doc| doc.name == name && doc.date == date)
            .ok_or_else(|| RegistryError::NotFound(format!("{name} ({date})")))
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<&Document, RegistryError> {
        self.documents
            .iter()
            .find(|doc| doc.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Distinct document names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self.documents.iter().map(|doc| doc.name.as_str()).collect();
        names.into_iter().collect()
    }

    /// Distinct dates, newest first, optionally restricted to one document name.
    pub fn dates(&self, name: Option<&str>) -> Vec<&str> {
        let dates: BTreeSet<&str> = self
            .documents
            .iter()
            .filter(|doc| name.map_or(true, |n| doc.name == n))
            .map(|doc| doc.date.as_str())
            .collect();
        dates.into_iter().rev().collect()
    }

    pub fn filter(&self, name: Option<&str>, date: Option<&str>) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|doc| name.map_or(true, |n| doc.name == n))
            .filter(|doc| date.map_or(true, |d| doc.date == d))
            .collect()
    }
}
