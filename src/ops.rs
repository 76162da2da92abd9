//! Row mutations.
//!
//! Mutations go straight to the store and leave the snapshot alone; the
//! resulting change event is what updates the view.

use tracing::{info, warn};

use crate::model::{RecordId, RowPatch};
use crate::store::{Store, StoreError};

/// Saves the editable fields of a row.
pub fn edit_row(store: &dyn Store, id: &RecordId, patch: &RowPatch) -> Result<(), StoreError> {
    store.merge(id, &patch.to_fields())?;
    info!(%id, "row updated");
    Ok(())
}

pub fn delete_row(store: &dyn Store, id: &RecordId) -> Result<(), StoreError> {
    store.delete(id)?;
    info!(%id, "row deleted");
    Ok(())
}

/// Outcome of [`delete_rows`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchOutcome {
    pub deleted: Vec<RecordId>,
    pub failed: Vec<(RecordId, StoreError)>,
}

impl BatchOutcome {
    /// True when every requested delete succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes every id, continuing past failures.
pub fn delete_rows(store: &dyn Store, ids: &[RecordId]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for id in ids {
        match store.delete(id) {
            Ok(()) => outcome.deleted.push(id.clone()),
            Err(e) => {
                warn!(%id, error = %e, "delete failed");
                outcome.failed.push((id.clone(), e));
            }
        }
    }
    info!(
        deleted = outcome.deleted.len(),
        failed = outcome.failed.len(),
        "batch delete finished"
    );
    outcome
}
