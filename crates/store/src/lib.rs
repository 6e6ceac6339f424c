pub mod memory;
pub mod model;

pub use memory::MemoryStore;
pub use model::*;

#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Snapshot(String),
    Conflict(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Snapshot(msg) => write!(f, "invalid snapshot: {}", msg),
            StoreError::Conflict(msg) => write!(f, "store conflict: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Data-layer lookups. Single-entity lookups mirror the ORM: a missing
/// record comes back with its id set to [`NOT_FOUND_ID`].
pub trait ArenaStore: Send + Sync {
    fn ping(&self) -> Result<(), StoreError>;

    fn person(&self, person_id: i32) -> Result<Person, StoreError>;
    fn family_members(&self, family_id: i32) -> Result<Vec<Person>, StoreError>;
    fn person_groups(&self, person_id: i32)
    -> Result<Vec<(SmallGroup, GroupMembership)>, StoreError>;
    fn person_profiles(
        &self,
        person_id: i32,
        organization_id: i32,
    ) -> Result<Vec<(Profile, ProfileMembership)>, StoreError>;
    fn attributes(&self) -> Result<Vec<Attribute>, StoreError>;
    fn role_ids_for(&self, person_id: i32) -> Result<Vec<i32>, StoreError>;

    fn profile(&self, profile_id: i32) -> Result<Profile, StoreError>;
    fn profile_members(&self, profile_id: i32) -> Result<Vec<ProfileMembership>, StoreError>;

    fn group(&self, group_id: i32) -> Result<SmallGroup, StoreError>;
    fn group_members(&self, group_id: i32) -> Result<Vec<GroupMembership>, StoreError>;
    fn cluster(&self, cluster_id: i32) -> Result<GroupCluster, StoreError>;
    fn cluster_group_count(&self, cluster_id: i32) -> Result<i32, StoreError>;

    fn blob(&self, blob_id: i32) -> Result<Option<Blob>, StoreError>;
    /// The person or group whose image the blob is, if any.
    fn blob_owner(&self, blob_id: i32) -> Result<Option<BlobOwner>, StoreError>;

    fn client_by_api_key(&self, api_key: &str) -> Result<Option<OAuthClient>, StoreError>;
    fn client_by_id(&self, client_id: i32) -> Result<Option<OAuthClient>, StoreError>;
    fn authorizations_for_login(
        &self,
        login_id: &str,
    ) -> Result<Vec<ClientAuthorization>, StoreError>;

    fn create_person(&self, person: NewPerson) -> Result<i32, StoreError>;
    fn save_person_attributes(
        &self,
        person_id: i32,
        values: &[PersonAttributeValue],
    ) -> Result<(), StoreError>;
    /// Returns `false` when there was nothing to revoke.
    fn revoke_authorization(&self, login_id: &str, client_id: i32) -> Result<bool, StoreError>;
}
