//! Login and edit form state.

use crate::model::{RecordId, Row, RowPatch};
use crate::store::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
    /// Why the last attempt failed.
    pub error: Option<String>,
}

impl LoginForm {
    pub fn next_field(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn input(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        }
    }

    /// Clears the password after an attempt, keeping the username.
    pub fn reset_password(&mut self) {
        self.password.clear();
        self.field = LoginField::Password;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditField {
    #[default]
    Valid,
    Features,
    Mark,
}

impl EditField {
    fn next(self) -> EditField {
        match self {
            EditField::Valid => EditField::Features,
            EditField::Features => EditField::Mark,
            EditField::Mark => EditField::Valid,
        }
    }

    fn prev(self) -> EditField {
        match self {
            EditField::Valid => EditField::Mark,
            EditField::Features => EditField::Valid,
            EditField::Mark => EditField::Features,
        }
    }
}

/// Edit popup for the editable fields of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub id: RecordId,
    pub title: String,
    pub patch: RowPatch,
    pub field: EditField,
    /// Selectable features: the configured options plus any the row already has.
    pub options: Vec<String>,
    pub feature_cursor: usize,
}

impl EditForm {
    pub fn new(row: &Row, feature_options: &[String]) -> Self {
        let mut options = feature_options.to_vec();
        for f in &row.features {
            if !options.contains(f) {
                options.push(f.clone());
            }
        }
        let title = row
            .hostname
            .clone()
            .unwrap_or_else(|| row.id.key().to_string());
        Self {
            id: row.id.clone(),
            title,
            patch: RowPatch::from_row(row),
            field: EditField::Valid,
            options,
            feature_cursor: 0,
        }
    }

    pub fn next_field(&mut self) {
        self.field = self.field.next();
    }

    pub fn prev_field(&mut self) {
        self.field = self.field.prev();
    }

    pub fn cursor_left(&mut self) {
        self.feature_cursor = self.feature_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        if self.feature_cursor + 1 < self.options.len() {
            self.feature_cursor += 1;
        }
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.patch.features.iter().any(|f| f == feature)
    }

    /// Space: flips `valid`, or the feature under the cursor.
    pub fn toggle(&mut self) {
        match self.field {
            EditField::Valid => self.patch.valid = !self.patch.valid,
            EditField::Features => {
                let Some(option) = self.options.get(self.feature_cursor).cloned() else {
                    return;
                };
                if let Some(pos) = self.patch.features.iter().position(|f| *f == option) {
                    self.patch.features.remove(pos);
                } else {
                    self.patch.features.push(option);
                }
            }
            EditField::Mark => self.patch.mark.push(' '),
        }
    }

    /// Typed characters go to the mark field.
    pub fn input(&mut self, c: char) {
        if self.field == EditField::Mark {
            self.patch.mark.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.field == EditField::Mark {
            self.patch.mark.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> Vec<String> {
        vec!["QQMusic".into(), "Tidal".into(), "USB".into()]
    }

    #[test]
    fn test_login_fields() {
        let mut form = LoginForm::default();
        for c in "admin".chars() {
            form.input(c);
        }
        assert!(!form.is_complete());
        form.next_field();
        form.input('x');
        form.backspace();
        form.input('p');
        assert!(form.is_complete());
        assert_eq!(form.credentials().username, "admin");
        assert_eq!(form.credentials().password, "p");
        form.reset_password();
        assert!(form.password.is_empty());
        assert_eq!(form.username, "admin");
    }

    #[test]
    fn test_edit_form_prefills_and_keeps_unknown_features() {
        let row = Row::from_json(
            "devices",
            json!({"id": "d1", "hostname": "box", "valid": true, "features": ["Roon"], "mark": "m"}),
        )
        .unwrap();
        let form = EditForm::new(&row, &options());
        assert_eq!(form.title, "box");
        assert!(form.patch.valid);
        assert_eq!(form.patch.mark, "m");
        assert_eq!(form.options, vec!["QQMusic", "Tidal", "USB", "Roon"]);
        assert!(form.has_feature("Roon"));
    }

    #[test]
    fn test_edit_form_toggles() {
        let row = Row::from_json("devices", json!({"id": "d1"})).unwrap();
        let mut form = EditForm::new(&row, &options());

        form.toggle();
        assert!(form.patch.valid);

        form.next_field();
        form.cursor_right();
        form.toggle();
        assert_eq!(form.patch.features, vec!["Tidal"]);
        form.toggle();
        assert!(form.patch.features.is_empty());

        form.input('x');
        assert!(form.patch.mark.is_empty());
        form.next_field();
        form.input('o');
        form.input('k');
        form.backspace();
        assert_eq!(form.patch.mark, "o");

        form.next_field();
        assert_eq!(form.field, EditField::Valid);
        form.prev_field();
        assert_eq!(form.field, EditField::Mark);
    }
}
