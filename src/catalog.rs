//! Catalog tree built from the flat customer/part/revision/trial join.
//!
//! Rows arrive ordered by customer, part, revision, trial, process run type
//! and file uuid. Folding them into [`Directory`] keeps that order because
//! every level is an [`IndexMap`].

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

/// Bucket key used for trial files whose process run has no type.
pub const UNTYPED_PROCESS_RUN: &str = "null";

/// One row of the catalog join. Everything right of the revision may be
/// missing because of the outer joins.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct CatalogRow {
    pub customer_name: String,
    pub part_name: String,
    pub revision_name: String,
    pub revision_uuid: Option<String>,
    pub cad_file_uuid: Option<String>,
    pub cad_file_type: Option<String>,
    pub cad_file_location: Option<String>,
    pub trial_uuid: Option<String>,
    pub process_run_type: Option<String>,
    pub file_uuid: Option<String>,
    pub file_type: Option<String>,
    pub file_location: Option<String>,
}

/// File reference as it appears in the catalog output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub uuid: String,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub location: Option<String>,
    /// Last `/`-separated segment of `location`.
    pub name: Option<String>,
}

impl FileDescriptor {
    pub fn new(uuid: &str, file_type: Option<&str>, location: Option<&str>) -> Self {
        Self {
            uuid: uuid.to_string(),
            file_type: file_type.map(str::to_string),
            location: location.map(str::to_string),
            name: location.map(|loc| file_name(loc).to_string()),
        }
    }
}

/// Final path segment of a stored file location.
pub fn file_name(location: &str) -> &str {
    location
        .rsplit_once('/')
        .map_or(location, |(_, name)| name)
}

/// Top level of the catalog: customers keyed by name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Directory {
    pub customers: IndexMap<String, Customer>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Customer {
    pub parts: IndexMap<String, Part>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Part {
    pub revisions: IndexMap<String, Revision>,
}

/// A part revision with its CAD files and trial artifacts.
///
/// `cad` is `None` when no row for the revision carried a CAD uuid, which
/// serializes as `null` and is distinct from an empty list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Revision {
    #[serde(rename = "CAD")]
    pub cad: Option<Vec<FileDescriptor>>,
    /// Trial files grouped by process run type.
    #[serde(rename = "Trials")]
    pub trials: IndexMap<String, Vec<FileDescriptor>>,
    #[serde(skip)]
    uuid: Option<String>,
}

impl Revision {
    fn add_cad(&mut self, file: FileDescriptor) {
        push_unique(self.cad.get_or_insert_with(Vec::new), file);
    }

    fn add_trial_file(&mut self, process_run_type: &str, file: FileDescriptor) {
        let bucket = self
            .trials
            .entry(process_run_type.to_string())
            .or_insert_with(Vec::new);
        push_unique(bucket, file);
    }
}

impl Directory {
    /// Fold ordered join rows into the nested catalog.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        let mut directory = Self::default();
        let mut row_count = 0usize;
        for row in rows {
            directory.insert(&row);
            row_count += 1;
        }
        debug!(
            "Folded {} rows into {} customers",
            row_count,
            directory.customers.len()
        );
        directory
    }

    /// Merge a single row into the tree.
    pub fn insert(&mut self, row: &CatalogRow) {
        let revision = self
            .customers
            .entry(row.customer_name.clone())
            .or_default()
            .parts
            .entry(row.part_name.clone())
            .or_default()
            .revisions
            .entry(row.revision_name.clone())
            .or_default();

        // Grouping is by name; two revisions sharing a name are merged.
        if let Some(uuid) = present(&row.revision_uuid) {
            let seen = revision.uuid.get_or_insert_with(|| uuid.to_string());
            if seen.as_str() != uuid {
                warn!(
                    "Revision name '{}' under {}/{} maps to multiple uuids ({} and {}); merging",
                    row.revision_name, row.customer_name, row.part_name, seen, uuid
                );
            }
        }

        if let Some(cad_uuid) = present(&row.cad_file_uuid) {
            revision.add_cad(FileDescriptor::new(
                cad_uuid,
                row.cad_file_type.as_deref(),
                row.cad_file_location.as_deref(),
            ));
        }

        if let (Some(_), Some(file_uuid)) = (present(&row.trial_uuid), present(&row.file_uuid)) {
            let process_run_type = row
                .process_run_type
                .as_deref()
                .unwrap_or(UNTYPED_PROCESS_RUN);
            revision.add_trial_file(
                process_run_type,
                FileDescriptor::new(
                    file_uuid,
                    row.file_type.as_deref(),
                    row.file_location.as_deref(),
                ),
            );
        }
    }

    #[cfg(test)]
    pub fn revision(&self, customer: &str, part: &str, revision: &str) -> Option<&Revision> {
        self.customers
            .get(customer)?
            .parts
            .get(part)?
            .revisions
            .get(revision)
    }
}

/// Empty strings count as missing, matching how the rows are produced.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// Buckets hold a handful of files; a linear scan is enough.
fn push_unique(bucket: &mut Vec<FileDescriptor>, file: FileDescriptor) {
    if !bucket.contains(&file) {
        bucket.push(file);
    }
}
