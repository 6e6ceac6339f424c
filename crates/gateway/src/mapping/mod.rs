//! Entity-to-contract projection. Mappers never touch the store; they read
//! the entity they are given and consult the visibility view per field.

use arena_contracts::Lookup;
use arena_policy::FieldVisibility;
use arena_store::{LookupValue, NOT_FOUND_ID, sentinel_date};
use chrono::NaiveDate;

pub mod event;
pub mod group;
pub mod oauth;
pub mod person;
pub mod profile;

/// Builds absolute links and blob URLs from the configured public base URL.
#[derive(Debug, Clone, Copy)]
pub struct Links<'a> {
    base: &'a str,
}

impl<'a> Links<'a> {
    pub fn new(base: &'a str) -> Self {
        Self { base }
    }

    pub fn person(&self, person_id: i32) -> String {
        format!("{}/person/{}", self.base, person_id)
    }

    pub fn profile(&self, profile_id: i32) -> String {
        format!("{}/profile/{}", self.base, profile_id)
    }

    pub fn group(&self, group_id: i32) -> String {
        format!("{}/group/{}", self.base, group_id)
    }

    pub fn cluster(&self, cluster_id: i32) -> String {
        format!("{}/cluster/{}", self.base, cluster_id)
    }

    pub fn event(&self, event_id: i32) -> String {
        format!("{}/event/{}", self.base, event_id)
    }

    pub fn authorizations(&self) -> String {
        format!("{}/oauth/authorizations", self.base)
    }

    pub fn blob(&self, blob_id: i32) -> Option<String> {
        id(blob_id).map(|blob_id| format!("{}/blob/{}", self.base, blob_id))
    }
}

pub fn id(value: i32) -> Option<i32> {
    (value != NOT_FOUND_ID).then_some(value)
}

pub fn date(value: NaiveDate) -> Option<NaiveDate> {
    (value != sentinel_date()).then_some(value)
}

pub fn text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn lookup(value: &LookupValue) -> Option<Lookup> {
    id(value.lookup_id).map(|lookup_id| Lookup {
        id: lookup_id,
        value: value.value.clone(),
    })
}

/// Reads the value only when the field is visible.
pub fn pick<T>(vis: &FieldVisibility<'_>, field: &str, value: impl FnOnce() -> Option<T>) -> Option<T> {
    if vis.includes(field) { value() } else { None }
}
