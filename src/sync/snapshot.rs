//! Local copy of one table's rows.

use std::collections::HashSet;

use crate::model::{ChangeAction, ChangeEvent, RecordId, Row};

/// Ordered rows of a single table.
///
/// No two rows share a [`RecordId`]. Every mutation goes through [`apply`],
/// [`load`] or the connection helpers, all of which keep that invariant.
///
/// [`apply`]: Snapshot::apply
/// [`load`]: Snapshot::load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    rows: Vec<Row>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Row> {
        self.rows.iter().find(|r| &r.id == id)
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.rows.iter().position(|r| &r.id == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Folds one change event into the snapshot.
    ///
    /// Returns whether the rows changed. Events without a row and `Close`
    /// events leave the rows untouched.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        let Some(row) = &event.row else {
            return false;
        };
        match event.action {
            ChangeAction::Create => {
                if self.contains(&row.id) {
                    return false;
                }
                self.rows.push(row.clone());
                true
            }
            ChangeAction::Update => match self.position(&row.id) {
                Some(idx) => {
                    self.rows[idx] = row.clone();
                    true
                }
                None => false,
            },
            ChangeAction::Delete => match self.position(&row.id) {
                Some(idx) => {
                    self.rows.remove(idx);
                    true
                }
                None => false,
            },
            ChangeAction::Close(_) => false,
        }
    }

    /// Merges a bulk-fetch result.
    ///
    /// Fetched rows come first in fetch order. A row already present (created
    /// by an event that arrived earlier) keeps its current value and is not
    /// duplicated; rows only known from events follow. Within the fetch the
    /// first occurrence of an id wins.
    pub fn load(&mut self, fetched: Vec<Row>) {
        let current = std::mem::take(&mut self.rows);
        let mut taken = vec![false; current.len()];
        let mut seen = HashSet::with_capacity(fetched.len());
        let mut rows = Vec::with_capacity(fetched.len() + current.len());

        for row in fetched {
            if !seen.insert(row.id.clone()) {
                continue;
            }
            match current.iter().position(|r| r.id == row.id) {
                Some(idx) => {
                    taken[idx] = true;
                    rows.push(current[idx].clone());
                }
                None => rows.push(row),
            }
        }
        rows.extend(
            current
                .into_iter()
                .zip(taken)
                .filter(|(_, taken)| !taken)
                .map(|(row, _)| row),
        );
        self.rows = rows;
    }

    /// Sets the `connected` flag of a row already present.
    ///
    /// Returns `false` when the row is absent.
    pub fn set_connected(&mut self, id: &RecordId, connected: bool) -> bool {
        match self.rows.iter_mut().find(|r| &r.id == id) {
            Some(row) => {
                row.connected = connected;
                true
            }
            None => false,
        }
    }

    /// Ids of every row flagged as connected, in snapshot order.
    pub fn connected_ids(&self) -> Vec<RecordId> {
        self.rows
            .iter()
            .filter(|r| r.connected)
            .map(|r| r.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CloseReason;
    use serde_json::json;

    fn row(key: u32, name: &str) -> Row {
        Row::from_json("t", json!({"id": key, "name": name})).unwrap()
    }

    fn names(s: &Snapshot) -> Vec<(String, String)> {
        s.rows()
            .iter()
            .map(|r| {
                (
                    r.id.key().to_string(),
                    r.field("name").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default(),
                )
            })
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_create_update_delete_sequence() {
        let mut s = Snapshot::new();
        s.load(vec![row(1, "a")]);

        s.apply(&ChangeEvent::create(row(2, "b")));
        assert_eq!(names(&s), pairs(&[("1", "a"), ("2", "b")]));

        s.apply(&ChangeEvent::update(row(1, "a2")));
        assert_eq!(names(&s), pairs(&[("1", "a2"), ("2", "b")]));

        s.apply(&ChangeEvent::delete(row(1, "")));
        assert_eq!(names(&s), pairs(&[("2", "b")]));
    }

    #[test]
    fn test_duplicate_create_is_ignored() {
        let mut s = Snapshot::new();
        assert!(s.apply(&ChangeEvent::create(row(1, "a"))));
        assert!(!s.apply(&ChangeEvent::create(row(1, "other"))));
        assert_eq!(names(&s), pairs(&[("1", "a")]));
    }

    #[test]
    fn test_update_and_delete_of_missing_row_are_noops() {
        let mut s = Snapshot::new();
        s.load(vec![row(1, "a")]);
        let before = s.clone();

        assert!(!s.apply(&ChangeEvent::update(row(9, "x"))));
        assert!(!s.apply(&ChangeEvent::delete(row(9, "x"))));
        assert_eq!(s, before);
    }

    #[test]
    fn test_close_and_rowless_events_do_not_mutate() {
        let mut s = Snapshot::new();
        s.load(vec![row(1, "a")]);
        let before = s.clone();

        assert!(!s.apply(&ChangeEvent::close(CloseReason::Killed)));
        assert!(!s.apply(&ChangeEvent {
            action: ChangeAction::Update,
            row: None,
        }));
        assert_eq!(s, before);
    }

    #[test]
    fn test_load_keeps_keys_that_look_qualified() {
        let fetched = vec![
            Row::from_record("t", json!({"id": "x"})).unwrap(),
            Row::from_record("t", json!({"id": "t:x"})).unwrap(),
            Row::from_record("t", json!({"id": "3C:22:FB:10:00:01"})).unwrap(),
        ];
        let mut s = Snapshot::new();
        s.load(fetched);
        assert_eq!(s.len(), 3);
        assert!(s.contains(&RecordId::new("t", "t:x")));
        assert!(s.contains(&RecordId::new("t", "3C:22:FB:10:00:01")));
    }

    #[test]
    fn test_create_then_fetch_yields_one_row() {
        let mut s = Snapshot::new();
        s.apply(&ChangeEvent::create(row(2, "live")));
        s.load(vec![row(1, "a"), row(2, "fetched")]);
        assert_eq!(names(&s), pairs(&[("1", "a"), ("2", "live")]));
    }

    #[test]
    fn test_fetch_then_create_yields_one_row() {
        let mut s = Snapshot::new();
        s.load(vec![row(1, "a"), row(2, "fetched")]);
        s.apply(&ChangeEvent::create(row(2, "live")));
        assert_eq!(names(&s), pairs(&[("1", "a"), ("2", "fetched")]));
    }

    #[test]
    fn test_load_keeps_event_only_rows_in_arrival_order() {
        let mut s = Snapshot::new();
        s.apply(&ChangeEvent::create(row(5, "e")));
        s.apply(&ChangeEvent::create(row(1, "a")));
        s.apply(&ChangeEvent::create(row(6, "f")));
        s.apply(&ChangeEvent::create(row(7, "g")));
        s.load(vec![row(1, "a1")]);
        assert_eq!(
            names(&s),
            pairs(&[("1", "a"), ("5", "e"), ("6", "f"), ("7", "g")])
        );
    }

    #[test]
    fn test_load_dedups_within_fetch() {
        let mut s = Snapshot::new();
        s.load(vec![row(1, "first"), row(2, "b"), row(1, "second")]);
        assert_eq!(names(&s), pairs(&[("1", "first"), ("2", "b")]));
    }

    #[test]
    fn test_connected_helpers() {
        let mut s = Snapshot::new();
        s.load(vec![row(1, "a"), row(2, "b")]);
        assert!(s.set_connected(&RecordId::new("t", "2"), true));
        assert!(!s.set_connected(&RecordId::new("t", "9"), true));
        assert_eq!(s.connected_ids(), vec![RecordId::new("t", "2")]);
    }

    /// Pseudo-random event sequences never produce duplicate ids.
    #[test]
    fn test_ids_stay_unique_under_random_events() {
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..50 {
            let mut s = Snapshot::new();
            for step in 0..200 {
                let key = (next() % 8) as u32;
                let r = row(key, &format!("v{}", step));
                match next() % 5 {
                    0 | 1 => s.apply(&ChangeEvent::create(r)),
                    2 => s.apply(&ChangeEvent::update(r)),
                    3 => s.apply(&ChangeEvent::delete(r)),
                    _ => {
                        s.load(vec![r.clone(), r]);
                        true
                    }
                };
                let mut ids = HashSet::new();
                assert!(s.rows().iter().all(|r| ids.insert(r.id.clone())));
            }
        }
    }
}
