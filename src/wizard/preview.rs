//! Extraction preview stage
//!
//! Holds the candidate rows fetched for a job and applies user
//! corrections locally. Nothing here calls the server per edit; the
//! edited rows travel with the commit.

use crate::api::ImportApi;
use crate::error::{AppError, Result};
use crate::models::{CandidateRow, Category, RowStatus, TxnKind};
use tracing::debug;

/// A partial correction to one candidate row
#[derive(Debug, Clone, Default)]
pub struct RowEdit {
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub kind: Option<TxnKind>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Live counts derived from the row set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewCounts {
    pub total: u32,
    pub valid: u32,
    pub duplicate: u32,
    pub error: u32,
}

/// Preview stage state for one job
pub struct PreviewState {
    job_id: i64,
    rows: Vec<CandidateRow>,
    categories: Vec<Category>,
    skip_duplicates: bool,
}

impl PreviewState {
    /// Fetch the rows and category catalog for a job
    pub async fn load(
        api: &dyn ImportApi,
        job_id: i64,
        skip_duplicates_default: bool,
    ) -> Result<Self> {
        let rows = api.get_rows(job_id).await?;
        let categories = api.list_categories().await?;
        debug!("Loaded {} candidate rows for job {}", rows.len(), job_id);

        Ok(Self {
            job_id,
            rows,
            categories,
            skip_duplicates: skip_duplicates_default,
        })
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn rows(&self) -> &[CandidateRow] {
        &self.rows
    }

    pub fn skip_duplicates(&self) -> bool {
        self.skip_duplicates
    }

    pub fn set_skip_duplicates(&mut self, skip: bool) {
        self.skip_duplicates = skip;
    }

    pub fn counts(&self) -> PreviewCounts {
        let mut counts = PreviewCounts {
            total: self.rows.len() as u32,
            valid: 0,
            duplicate: 0,
            error: 0,
        };
        for row in &self.rows {
            match row.status {
                RowStatus::Valid => counts.valid += 1,
                RowStatus::Duplicate => counts.duplicate += 1,
                RowStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Rows that will actually be imported under the current
    /// duplicate-skip toggle. Error rows are never importable.
    pub fn import_count(&self) -> u32 {
        let counts = self.counts();
        if self.skip_duplicates {
            counts.valid
        } else {
            counts.valid + counts.duplicate
        }
    }

    /// Apply an inline correction to one row and re-validate it.
    ///
    /// A fixed Error row becomes Valid; a broken Valid row becomes
    /// Error. Duplicate detection is server-owned, so a Duplicate row
    /// keeps its flag whatever the edit.
    pub fn edit_row(&mut self, row_number: u32, edit: RowEdit) -> Result<&CandidateRow> {
        let index = Self::index_of(&self.rows, row_number)?;
        let row = &mut self.rows[index];

        if let Some(date) = edit.date {
            row.date = date;
        }
        if let Some(amount) = edit.amount {
            row.amount = amount;
        }
        if let Some(kind) = edit.kind {
            row.kind = Some(kind);
        }
        if let Some(description) = edit.description {
            row.description = description;
        }
        if let Some(notes) = edit.notes {
            row.notes = Some(notes);
        }
        if let Some(tags) = edit.tags {
            row.tags = tags;
        }

        match (row.status, row.fields_valid()) {
            (RowStatus::Error, true) => row.status = RowStatus::Valid,
            (RowStatus::Valid, false) => row.status = RowStatus::Error,
            _ => {}
        }

        Ok(&self.rows[index])
    }

    /// Change a row's category label, keeping the matched category id
    /// consistent: it points at the category whose name equals the new
    /// label, or is cleared when no such category exists. A manual
    /// category choice also clears the rule-applied flag.
    pub fn set_category(&mut self, row_number: u32, label: Option<String>) -> Result<()> {
        let matched_id = label
            .as_deref()
            .and_then(|name| self.categories.iter().find(|c| c.name == name))
            .map(|c| c.id);

        let row = self.row_mut(row_number)?;
        row.category_label = label;
        row.matched_category_id = matched_id;
        row.rule_applied = false;
        Ok(())
    }

    fn index_of(rows: &[CandidateRow], row_number: u32) -> Result<usize> {
        rows.iter()
            .position(|r| r.row_number == row_number)
            .ok_or_else(|| AppError::NotFound(format!("Row {} not in preview", row_number)))
    }

    fn row_mut(&mut self, row_number: u32) -> Result<&mut CandidateRow> {
        let index = Self::index_of(&self.rows, row_number)?;
        Ok(&mut self.rows[index])
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        job_id: i64,
        rows: Vec<CandidateRow>,
        categories: Vec<Category>,
        skip_duplicates: bool,
    ) -> Self {
        Self {
            job_id,
            rows,
            categories,
            skip_duplicates,
        }
    }
}
