//! Entity shapes as the Arena data layer hands them out. Missing values use
//! the data layer's in-band sentinels: `-1` for ids and `1900-01-01` for dates.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const NOT_FOUND_ID: i32 = -1;

pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn not_found_id() -> i32 {
    NOT_FOUND_ID
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupValue {
    #[serde(default = "not_found_id")]
    pub lookup_id: i32,
    #[serde(default)]
    pub value: String,
}

impl Default for LookupValue {
    fn default() -> Self {
        Self {
            lookup_id: NOT_FOUND_ID,
            value: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub person_id: i32,
    pub family_id: i32,
    pub organization_id: i32,
    pub first_name: String,
    pub nick_name: String,
    pub last_name: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub marital_status: LookupValue,
    pub member_status: LookupValue,
    pub campus_id: i32,
    pub blob_id: i32,
    pub phones: Vec<PersonPhone>,
    pub addresses: Vec<PersonAddress>,
    pub attributes: Vec<PersonAttributeValue>,
    pub record_status: String,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            person_id: NOT_FOUND_ID,
            family_id: NOT_FOUND_ID,
            organization_id: NOT_FOUND_ID,
            first_name: String::new(),
            nick_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            birth_date: sentinel_date(),
            gender: String::new(),
            marital_status: LookupValue::default(),
            member_status: LookupValue::default(),
            campus_id: NOT_FOUND_ID,
            blob_id: NOT_FOUND_ID,
            phones: Vec::new(),
            addresses: Vec::new(),
            attributes: Vec::new(),
            record_status: "Active".to_string(),
        }
    }
}

impl Person {
    /// Nick name when present, else first name, followed by the last name.
    pub fn full_name(&self) -> String {
        let first = if self.nick_name.trim().is_empty() {
            self.first_name.trim()
        } else {
            self.nick_name.trim()
        };
        format!("{} {}", first, self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPhone {
    pub number: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub phone_type: LookupValue,
    #[serde(default)]
    pub unlisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub address_type: LookupValue,
    pub primary: bool,
}

impl Default for PersonAddress {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            address_type: LookupValue::default(),
            primary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonAttributeValue {
    pub attribute_id: i32,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileType {
    Personal,
    Ministry,
    Serving,
    Event,
}

impl ProfileType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileType::Personal => "Personal",
            ProfileType::Ministry => "Ministry",
            ProfileType::Serving => "Serving",
            ProfileType::Event => "Event",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "personal" | "1" => Some(ProfileType::Personal),
            "ministry" | "2" => Some(ProfileType::Ministry),
            "serving" | "3" => Some(ProfileType::Serving),
            "event" | "4" => Some(ProfileType::Event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: i32,
    #[serde(default = "not_found_id")]
    pub organization_id: i32,
    pub name: String,
    pub profile_type: ProfileType,
    #[serde(default = "not_found_id")]
    pub owner_id: i32,
    #[serde(default = "not_found_id")]
    pub parent_profile_id: i32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub event: Option<EventDetails>,
}

impl Profile {
    pub fn not_found() -> Self {
        Self {
            profile_id: NOT_FOUND_ID,
            organization_id: NOT_FOUND_ID,
            name: String::new(),
            profile_type: ProfileType::Personal,
            owner_id: NOT_FOUND_ID,
            parent_profile_id: NOT_FOUND_ID,
            active: false,
            summary: String::new(),
            event: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMembership {
    pub profile_id: i32,
    pub person_id: i32,
    #[serde(default)]
    pub status: LookupValue,
    #[serde(default = "sentinel_date")]
    pub date_added: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmallGroup {
    pub group_id: i32,
    #[serde(default = "not_found_id")]
    pub cluster_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "not_found_id")]
    pub leader_id: i32,
    #[serde(default)]
    pub meeting_day: LookupValue,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "not_found_id")]
    pub blob_id: i32,
}

impl SmallGroup {
    pub fn not_found() -> Self {
        Self {
            group_id: NOT_FOUND_ID,
            cluster_id: NOT_FOUND_ID,
            name: String::new(),
            description: String::new(),
            leader_id: NOT_FOUND_ID,
            meeting_day: LookupValue::default(),
            notes: String::new(),
            blob_id: NOT_FOUND_ID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: i32,
    pub person_id: i32,
    #[serde(default)]
    pub role: LookupValue,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default = "sentinel_date")]
    pub date_joined: NaiveDate,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCluster {
    pub cluster_id: i32,
    pub name: String,
    #[serde(default = "not_found_id")]
    pub parent_cluster_id: i32,
    #[serde(default = "not_found_id")]
    pub leader_id: i32,
    #[serde(default = "not_found_id")]
    pub admin_id: i32,
}

impl GroupCluster {
    pub fn not_found() -> Self {
        Self {
            cluster_id: NOT_FOUND_ID,
            name: String::new(),
            parent_cluster_id: NOT_FOUND_ID,
            leader_id: NOT_FOUND_ID,
            admin_id: NOT_FOUND_ID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: i32,
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub callback_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAuthorization {
    pub client_id: i32,
    pub login_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub date_granted: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub blob_id: i32,
    pub mime_type: String,
    /// Hex-encoded content.
    pub data_hex: String,
}

impl Blob {
    pub fn bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.data_hex.trim())
    }
}

/// The record a blob is the image of.
#[derive(Debug, Clone, PartialEq)]
pub enum BlobOwner {
    Person(Person),
    Group(SmallGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: i32,
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantSubject {
    Person { person_id: i32 },
    Role { role_id: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantSecurable {
    ObjectField { key: String },
    Profile { profile_id: i32 },
    Cluster { cluster_id: i32 },
    Attribute { attribute_id: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantOperation {
    View,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub subject: GrantSubject,
    pub securable: GrantSecurable,
    pub operation: GrantOperation,
}

/// Fields accepted when registering a new person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub organization_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub campus_id: Option<i32>,
}

/// Everything `MemoryStore` serves, as loaded from a JSON snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub people: Vec<Person>,
    pub attributes: Vec<Attribute>,
    pub profiles: Vec<Profile>,
    pub profile_members: Vec<ProfileMembership>,
    pub groups: Vec<SmallGroup>,
    pub group_members: Vec<GroupMembership>,
    pub clusters: Vec<GroupCluster>,
    pub clients: Vec<OAuthClient>,
    pub authorizations: Vec<ClientAuthorization>,
    pub blobs: Vec<Blob>,
    pub roles: Vec<Role>,
    pub grants: Vec<PermissionGrant>,
}
