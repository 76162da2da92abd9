//! Selection state of the table list and the rows table.

use std::collections::HashSet;

use ratatui::widgets::{ListState, TableState as RatatuiTableState};

use crate::model::RecordId;
use crate::tui::navigable::NavigableTable;

/// Left pane: the tables of the database.
#[derive(Debug, Default)]
pub struct TablesState {
    pub items: Vec<String>,
    /// Cursor in the list.
    pub selected: usize,
    /// Table currently shown in the rows pane.
    pub active: Option<String>,
    pub list_state: ListState,
}

impl TablesState {
    pub fn set_items(&mut self, items: Vec<String>) {
        self.items = items;
        self.selected = 0;
        self.active = None;
    }

    /// Name under the cursor.
    pub fn highlighted(&self) -> Option<&str> {
        self.items.get(self.selected).map(String::as_str)
    }

    pub fn resolve_selection(&mut self) {
        if self.items.is_empty() {
            self.selected = 0;
            self.list_state.select(None);
        } else {
            self.selected = self.selected.min(self.items.len() - 1);
            self.list_state.select(Some(self.selected));
        }
    }
}

impl NavigableTable for TablesState {
    fn selected(&self) -> usize {
        self.selected
    }

    fn selected_mut(&mut self) -> &mut usize {
        &mut self.selected
    }

    fn clear_tracked(&mut self) {}
}

/// Right pane: rows of the active table.
#[derive(Debug, Default)]
pub struct RowsState {
    pub selected: usize,
    /// Row the cursor follows across live changes.
    pub tracked_id: Option<RecordId>,
    pub filter: Option<String>,
    /// Rows marked for batch delete.
    pub marked: HashSet<RecordId>,
    /// Ids of the rows on screen, in display order. Set by the renderer.
    pub visible: Vec<RecordId>,
    pub ratatui_state: RatatuiTableState,
}

impl RowsState {
    /// Forgets selection, marks and filter (new table).
    pub fn reset(&mut self) {
        *self = RowsState::default();
    }

    /// Re-anchors the cursor on the tracked row after the rows changed.
    pub fn resolve_selection(&mut self, row_ids: &[RecordId]) {
        if let Some(tracked) = &self.tracked_id {
            if let Some(idx) = row_ids.iter().position(|id| id == tracked) {
                self.selected = idx;
            } else {
                self.tracked_id = None;
            }
        }

        if !row_ids.is_empty() {
            self.selected = self.selected.min(row_ids.len() - 1);
            self.tracked_id = Some(row_ids[self.selected].clone());
        } else {
            self.selected = 0;
            self.tracked_id = None;
        }

        self.visible = row_ids.to_vec();
        self.ratatui_state.select(Some(self.selected));
    }

    pub fn selected_id(&self) -> Option<&RecordId> {
        self.tracked_id.as_ref()
    }

    /// Marks or unmarks the row under the cursor.
    pub fn toggle_mark(&mut self) {
        if let Some(id) = self.tracked_id.clone()
            && !self.marked.remove(&id)
        {
            self.marked.insert(id);
        }
    }

    /// Marks every visible row, or clears all marks when they already are.
    pub fn toggle_mark_all(&mut self) {
        let all_marked =
            !self.visible.is_empty() && self.visible.iter().all(|id| self.marked.contains(id));
        if all_marked {
            self.marked.clear();
        } else {
            self.marked.extend(self.visible.iter().cloned());
        }
    }

    /// Marked ids in display order, then any marked rows not on screen.
    pub fn marked_ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .visible
            .iter()
            .filter(|id| self.marked.contains(*id))
            .cloned()
            .collect();
        let mut hidden: Vec<RecordId> = self
            .marked
            .iter()
            .filter(|id| !self.visible.contains(id))
            .cloned()
            .collect();
        hidden.sort();
        ids.extend(hidden);
        ids
    }
}

impl NavigableTable for RowsState {
    fn selected(&self) -> usize {
        self.selected
    }

    fn selected_mut(&mut self) -> &mut usize {
        &mut self.selected
    }

    fn clear_tracked(&mut self) {
        self.tracked_id = None;
    }
}
