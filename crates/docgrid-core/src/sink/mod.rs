//! Destinations for normalized tables.
//!
//! A [`Sink`] is configured once per run with zero or more destinations.
//! Every document is handed to each destination in turn.

pub mod pg;
pub mod relational;
pub mod sql;
pub mod sqlite;
pub mod xlsx;

use serde::Serialize;

use crate::error::DocgridError;
use crate::normalize::NormalizedDocument;

/// A row the database refused because its primary key already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub table: String,
    pub key: String,
}

/// Result of writing one table of one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub inserted: usize,
    pub duplicates: Vec<DuplicateKey>,
    /// Set when the table was skipped, e.g. on a schema mismatch.
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn new(table: &str) -> Self {
        TableOutcome {
            table: table.to_string(),
            ..Default::default()
        }
    }
}

/// What one destination did with one document.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub destination: String,
    pub tables: Vec<TableOutcome>,
}

pub trait Destination {
    fn name(&self) -> &str;

    fn write_document(&mut self, doc: &NormalizedDocument) -> Result<Vec<TableOutcome>, DocgridError>;

    /// Undo the most recent `write_document` when a later destination failed
    /// the same document. Destinations that commit immediately keep their rows.
    fn discard_last(&mut self) {}

    /// Called once after the last document.
    fn finish(&mut self) -> Result<(), DocgridError>;
}

#[derive(Default)]
pub struct Sink {
    destinations: Vec<Box<dyn Destination>>,
}

impl Sink {
    pub fn none() -> Self {
        Sink::default()
    }

    pub fn push(&mut self, destination: Box<dyn Destination>) {
        self.destinations.push(destination);
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn destination_names(&self) -> Vec<String> {
        self.destinations.iter().map(|d| d.name().to_string()).collect()
    }

    /// Hand `doc` to every destination. On the first error the destinations
    /// that already accepted the document discard it and the error is returned.
    pub fn write(&mut self, doc: &NormalizedDocument) -> Result<Vec<WriteReport>, DocgridError> {
        let mut reports = Vec::with_capacity(self.destinations.len());
        for i in 0..self.destinations.len() {
            match self.destinations[i].write_document(doc) {
                Ok(tables) => reports.push(WriteReport {
                    destination: self.destinations[i].name().to_string(),
                    tables,
                }),
                Err(e) => {
                    for dest in &mut self.destinations[..i] {
                        dest.discard_last();
                    }
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }

    pub fn finish(&mut self) -> Result<(), DocgridError> {
        for dest in &mut self.destinations {
            dest.finish()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("destinations", &self.destination_names())
            .finish()
    }
}
