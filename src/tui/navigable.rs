//! Shared navigation for panes with a selectable row.

/// Navigation over a list whose selection may follow a tracked entity.
///
/// Every movement clears the tracked entity so the next
/// `resolve_selection` uses the position. Clamping to the list bounds is
/// left to `resolve_selection`.
pub trait NavigableTable {
    fn selected(&self) -> usize;
    fn selected_mut(&mut self) -> &mut usize;
    fn clear_tracked(&mut self);

    fn select_up(&mut self) {
        *self.selected_mut() = self.selected().saturating_sub(1);
        self.clear_tracked();
    }

    fn select_down(&mut self) {
        *self.selected_mut() = self.selected().saturating_add(1);
        self.clear_tracked();
    }

    fn page_up(&mut self, n: usize) {
        *self.selected_mut() = self.selected().saturating_sub(n);
        self.clear_tracked();
    }

    fn page_down(&mut self, n: usize) {
        *self.selected_mut() = self.selected().saturating_add(n);
        self.clear_tracked();
    }

    fn home(&mut self) {
        *self.selected_mut() = 0;
        self.clear_tracked();
    }

    fn end(&mut self) {
        *self.selected_mut() = usize::MAX;
        self.clear_tracked();
    }
}
