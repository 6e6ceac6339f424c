use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub mod digest;
pub mod list;
pub mod modify;

pub use list::{GenericListResult, Page};
pub use modify::{ModifyResult, ModifyValidationResult};

/// A wire contract with a fixed root element name for XML output.
pub trait Contract: Serialize {
    const ROOT: &'static str;
}

macro_rules! contract_root {
    ($($ty:ty => $root:literal),* $(,)?) => {
        $(impl Contract for $ty {
            const ROOT: &'static str = $root;
        })*
    };
}

/// Lookup values (statuses, types, roles) travel as an id/label pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    #[serde(rename = "ID")]
    pub id: i32,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    #[serde(rename = "PersonID")]
    pub person_id: i32,
    #[serde(rename = "FamilyID", default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<Lookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_status: Option<Lookup>,
    #[serde(rename = "CampusID", default, skip_serializing_if = "Option::is_none")]
    pub campus_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<Phone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<PersonAttribute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Phone {
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<Lookup>,
    pub unlisted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<Lookup>,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonAttribute {
    #[serde(rename = "AttributeID")]
    pub attribute_id: i32,
    pub attribute_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    #[serde(rename = "ProfileID")]
    pub profile_id: i32,
    pub name: String,
    pub profile_type: String,
    #[serde(rename = "OwnerID", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i32>,
    #[serde(rename = "ParentProfileID", default, skip_serializing_if = "Option::is_none")]
    pub parent_profile_id: Option<i32>,
    pub active: bool,
    pub member_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileReference {
    #[serde(rename = "ProfileID")]
    pub profile_id: i32,
    pub name: String,
    pub profile_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileMember {
    #[serde(rename = "ProfileID")]
    pub profile_id: i32,
    #[serde(rename = "PersonID")]
    pub person_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Lookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmallGroup {
    #[serde(rename = "GroupID")]
    pub group_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "LeaderID", default, skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_name: Option<String>,
    #[serde(rename = "ClusterID", default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_day: Option<Lookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmallGroupReference {
    #[serde(rename = "GroupID")]
    pub group_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Lookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupMember {
    #[serde(rename = "GroupID")]
    pub group_id: i32,
    #[serde(rename = "PersonID")]
    pub person_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Lookup>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_joined: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupCluster {
    #[serde(rename = "ClusterID")]
    pub cluster_id: i32,
    pub name: String,
    #[serde(rename = "ParentClusterID", default, skip_serializing_if = "Option::is_none")]
    pub parent_cluster_id: Option<i32>,
    #[serde(rename = "LeaderID", default, skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<i32>,
    #[serde(rename = "AdminID", default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<i32>,
    pub group_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(rename = "EventID")]
    pub event_id: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Client {
    #[serde(rename = "ClientID")]
    pub client_id: i32,
    pub name: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, rename = "Scope")]
    pub scopes: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Authorization {
    #[serde(rename = "ClientID")]
    pub client_id: i32,
    pub client_name: String,
    pub api_key: String,
    #[serde(rename = "LoginID")]
    pub login_id: String,
    #[serde(default, rename = "Scope")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_granted: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Body of `POST /person/imin`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PersonImIn {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "CampusID")]
    pub campus_id: Option<i32>,
}

/// Body of `POST /person/{id}/attribute/update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeUpdate {
    #[serde(default, rename = "Attribute")]
    pub attributes: Vec<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeValue {
    #[serde(rename = "AttributeID")]
    pub attribute_id: i32,
    #[serde(default)]
    pub value: Option<String>,
}

contract_root! {
    Person => "Person",
    Profile => "Profile",
    ProfileReference => "ProfileReference",
    ProfileMember => "ProfileMember",
    SmallGroup => "SmallGroup",
    SmallGroupReference => "SmallGroupReference",
    GroupMember => "GroupMember",
    GroupCluster => "GroupCluster",
    Event => "Event",
    Client => "Client",
    Authorization => "Authorization",
    ErrorResponse => "Error",
}
