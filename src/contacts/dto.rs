use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::contacts::repo::Contact;

pub const MIN_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub search: Option<String>,
}

fn default_limit() -> i64 {
    MIN_PAGE_SIZE
}

impl ListParams {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Date,
    pub note: Option<String>,
}

/// Merge-patch body: absent fields leave the stored value untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birthday: Option<Date>,
    pub note: Option<String>,
}

impl ContactPatch {
    pub fn apply_to(&self, contact: &mut Contact) {
        if let Some(v) = &self.first_name {
            contact.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            contact.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            contact.email = v.clone();
        }
        if let Some(v) = &self.phone_number {
            contact.phone_number = v.clone();
        }
        if let Some(v) = self.birthday {
            contact.birthday = v;
        }
        if let Some(v) = &self.note {
            contact.note = Some(v.clone());
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Date,
    pub note: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone_number: c.phone_number,
            birthday: c.birthday,
            note: c.note,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn sample_contact() -> Contact {
        Contact {
            id: 1,
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@example.com".into(),
            phone_number: "555-0100".into(),
            birthday: date!(1990 - 01 - 01),
            note: Some("college friend".into()),
            user_id: Some(1),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn patch_with_single_field_leaves_rest_untouched() {
        let mut contact = sample_contact();
        let patch: ContactPatch =
            serde_json::from_str(r#"{ "first_name": "X" }"#).unwrap();
        patch.apply_to(&mut contact);
        assert_eq!(contact.first_name, "X");
        assert_eq!(contact.last_name, "Doe");
        assert_eq!(contact.email, "jane@example.com");
        assert_eq!(contact.phone_number, "555-0100");
        assert_eq!(contact.birthday, date!(1990 - 01 - 01));
        assert_eq!(contact.note.as_deref(), Some("college friend"));
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut contact = sample_contact();
        let patch: ContactPatch = serde_json::from_str("{}").unwrap();
        patch.apply_to(&mut contact);
        assert_eq!(contact.first_name, "Jane");
        assert_eq!(contact.birthday, date!(1990 - 01 - 01));
    }

    #[test]
    fn patch_can_replace_birthday_and_note() {
        let mut contact = sample_contact();
        let patch: ContactPatch =
            serde_json::from_str(r#"{ "birthday": "1985-06-19", "note": "moved" }"#).unwrap();
        patch.apply_to(&mut contact);
        assert_eq!(contact.birthday, date!(1985 - 06 - 19));
        assert_eq!(contact.note.as_deref(), Some("moved"));
    }

    #[test]
    fn limit_is_clamped_to_contract_bounds() {
        let p: ListParams = serde_json::from_str(r#"{ "limit": 3 }"#).unwrap();
        assert_eq!(p.limit(), MIN_PAGE_SIZE);
        let p: ListParams = serde_json::from_str(r#"{ "limit": 10000 }"#).unwrap();
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
        let p: ListParams = serde_json::from_str(r#"{ "limit": 42 }"#).unwrap();
        assert_eq!(p.limit(), 42);
        let p: ListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(p.limit(), MIN_PAGE_SIZE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn negative_offset_is_floored() {
        let p: ListParams = serde_json::from_str(r#"{ "offset": -5 }"#).unwrap();
        assert_eq!(p.offset(), 0);
    }
}
