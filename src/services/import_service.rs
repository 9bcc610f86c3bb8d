use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::db::Store;
use crate::db::repository::{self, IdAllocator};
use crate::error::{AppError, ScheduleError};
use crate::import::reconcile::{self, Decisions, ImportPreview, ImportSummary};
use crate::import::rows::{self, ImportKind};

/// Runs one import pass against the store.
///
/// Preview and commit are independent calls: commit classifies the rows
/// again against the current collections, so abandoning a preview leaves
/// nothing behind.
pub struct ImportService {
    store: Arc<dyn Store>,
}

impl ImportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn preview(&self, kind: ImportKind, csv: &str) -> Result<ImportPreview, AppError> {
        let table = rows::split_csv(csv)?;
        self.preview_rows(kind, &table).await
    }

    pub async fn preview_rows(
        &self,
        kind: ImportKind,
        table: &[Vec<String>],
    ) -> Result<ImportPreview, AppError> {
        let data = repository::load_dataset(self.store.as_ref()).await?;
        Ok(reconcile::classify(kind, table, &data))
    }

    pub async fn commit(
        &self,
        kind: ImportKind,
        csv: &str,
        decisions: &Decisions,
    ) -> Result<ImportSummary, AppError> {
        let table = rows::split_csv(csv)?;
        self.commit_rows(kind, &table, decisions).await
    }

    pub async fn commit_rows(
        &self,
        kind: ImportKind,
        table: &[Vec<String>],
        decisions: &Decisions,
    ) -> Result<ImportSummary, AppError> {
        info!("Starting {:?} import of {} row(s)", kind, table.len());

        info!("Step 1: Classifying against stored collections");
        let before = repository::load_dataset(self.store.as_ref()).await?;
        let preview = reconcile::classify(kind, table, &before);

        let unresolved = preview.unresolved(&decisions.resolutions);
        if !unresolved.is_empty() {
            info!("Import blocked: {} duplicate(s) unresolved", unresolved.len());
            return Err(ScheduleError::ResolutionIncomplete { unresolved }.into());
        }

        info!("Step 2: Applying decisions");
        let mut after = before.clone();
        let mut ids = IdAllocator::for_dataset(&before);
        let summary = reconcile::apply(&preview, decisions, &mut after, &mut ids, Utc::now())?;

        info!("Step 3: Saving collections");
        let written = repository::save_changes(self.store.as_ref(), &before, &after).await?;

        info!("Import completed ({} collection(s) written): {:?}", written, summary);
        Ok(summary)
    }
}
