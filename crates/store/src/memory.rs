use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arena_policy::{
    ClusterNode, GroupGraph, GroupNode, Operation, PermissionOracle, Securable, Subject,
};

use crate::model::*;
use crate::{ArenaStore, StoreError};

/// Snapshot-backed store. Reads share a lock; the few write operations
/// mutate the snapshot in place.
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| StoreError::Snapshot(format!("{}: {}", path.display(), err)))?;
        let store = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), "store.snapshot_loaded");
        Ok(store)
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot =
            serde_json::from_str(raw).map_err(|err| StoreError::Snapshot(err.to_string()))?;
        validate(&snapshot)?;
        Ok(Self::new(snapshot))
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn validate(snapshot: &Snapshot) -> Result<(), StoreError> {
    let mut ids = snapshot.people.iter().map(|p| p.person_id).collect::<Vec<_>>();
    ids.sort_unstable();
    if ids.windows(2).any(|w| w[0] == w[1]) {
        return Err(StoreError::Snapshot("duplicate person_id".to_string()));
    }
    if ids.iter().any(|id| *id <= 0) {
        return Err(StoreError::Snapshot("person_id must be positive".to_string()));
    }

    let mut keys = snapshot
        .clients
        .iter()
        .map(|c| c.api_key.as_str())
        .collect::<Vec<_>>();
    keys.sort_unstable();
    if keys.windows(2).any(|w| w[0] == w[1]) {
        return Err(StoreError::Snapshot("duplicate client api_key".to_string()));
    }

    for blob in &snapshot.blobs {
        blob.bytes().map_err(|err| {
            StoreError::Snapshot(format!("blob {} is not valid hex: {}", blob.blob_id, err))
        })?;
    }

    Ok(())
}

impl ArenaStore for MemoryStore {
    fn ping(&self) -> Result<(), StoreError> {
        let _guard = self.read();
        Ok(())
    }

    fn person(&self, person_id: i32) -> Result<Person, StoreError> {
        Ok(self
            .read()
            .people
            .iter()
            .find(|p| p.person_id == person_id)
            .cloned()
            .unwrap_or_default())
    }

    fn family_members(&self, family_id: i32) -> Result<Vec<Person>, StoreError> {
        if family_id == NOT_FOUND_ID {
            return Ok(Vec::new());
        }
        Ok(self
            .read()
            .people
            .iter()
            .filter(|p| p.family_id == family_id)
            .cloned()
            .collect())
    }

    fn person_groups(
        &self,
        person_id: i32,
    ) -> Result<Vec<(SmallGroup, GroupMembership)>, StoreError> {
        let snapshot = self.read();
        Ok(snapshot
            .group_members
            .iter()
            .filter(|m| m.person_id == person_id)
            .filter_map(|m| {
                snapshot
                    .groups
                    .iter()
                    .find(|g| g.group_id == m.group_id)
                    .map(|g| (g.clone(), m.clone()))
            })
            .collect())
    }

    fn person_profiles(
        &self,
        person_id: i32,
        organization_id: i32,
    ) -> Result<Vec<(Profile, ProfileMembership)>, StoreError> {
        let snapshot = self.read();
        Ok(snapshot
            .profile_members
            .iter()
            .filter(|m| m.person_id == person_id)
            .filter_map(|m| {
                snapshot
                    .profiles
                    .iter()
                    .find(|p| p.profile_id == m.profile_id && p.organization_id == organization_id)
                    .map(|p| (p.clone(), m.clone()))
            })
            .collect())
    }

    fn attributes(&self) -> Result<Vec<Attribute>, StoreError> {
        Ok(self.read().attributes.clone())
    }

    fn role_ids_for(&self, person_id: i32) -> Result<Vec<i32>, StoreError> {
        Ok(self
            .read()
            .roles
            .iter()
            .filter(|r| r.member_ids.contains(&person_id))
            .map(|r| r.role_id)
            .collect())
    }

    fn profile(&self, profile_id: i32) -> Result<Profile, StoreError> {
        Ok(self
            .read()
            .profiles
            .iter()
            .find(|p| p.profile_id == profile_id)
            .cloned()
            .unwrap_or_else(Profile::not_found))
    }

    fn profile_members(&self, profile_id: i32) -> Result<Vec<ProfileMembership>, StoreError> {
        Ok(self
            .read()
            .profile_members
            .iter()
            .filter(|m| m.profile_id == profile_id)
            .cloned()
            .collect())
    }

    fn group(&self, group_id: i32) -> Result<SmallGroup, StoreError> {
        Ok(self
            .read()
            .groups
            .iter()
            .find(|g| g.group_id == group_id)
            .cloned()
            .unwrap_or_else(SmallGroup::not_found))
    }

    fn group_members(&self, group_id: i32) -> Result<Vec<GroupMembership>, StoreError> {
        Ok(self
            .read()
            .group_members
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }

    fn cluster(&self, cluster_id: i32) -> Result<GroupCluster, StoreError> {
        Ok(self
            .read()
            .clusters
            .iter()
            .find(|c| c.cluster_id == cluster_id)
            .cloned()
            .unwrap_or_else(GroupCluster::not_found))
    }

    fn cluster_group_count(&self, cluster_id: i32) -> Result<i32, StoreError> {
        let count = self
            .read()
            .groups
            .iter()
            .filter(|g| g.cluster_id == cluster_id)
            .count();
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    fn blob(&self, blob_id: i32) -> Result<Option<Blob>, StoreError> {
        Ok(self
            .read()
            .blobs
            .iter()
            .find(|b| b.blob_id == blob_id)
            .cloned())
    }

    fn blob_owner(&self, blob_id: i32) -> Result<Option<BlobOwner>, StoreError> {
        if blob_id == NOT_FOUND_ID {
            return Ok(None);
        }
        let snapshot = self.read();
        if let Some(person) = snapshot.people.iter().find(|p| p.blob_id == blob_id) {
            return Ok(Some(BlobOwner::Person(person.clone())));
        }
        Ok(snapshot
            .groups
            .iter()
            .find(|g| g.blob_id == blob_id)
            .map(|g| BlobOwner::Group(g.clone())))
    }

    fn client_by_api_key(&self, api_key: &str) -> Result<Option<OAuthClient>, StoreError> {
        Ok(self
            .read()
            .clients
            .iter()
            .find(|c| c.api_key == api_key)
            .cloned())
    }

    fn client_by_id(&self, client_id: i32) -> Result<Option<OAuthClient>, StoreError> {
        Ok(self
            .read()
            .clients
            .iter()
            .find(|c| c.client_id == client_id)
            .cloned())
    }

    fn authorizations_for_login(
        &self,
        login_id: &str,
    ) -> Result<Vec<ClientAuthorization>, StoreError> {
        Ok(self
            .read()
            .authorizations
            .iter()
            .filter(|a| a.login_id == login_id)
            .cloned()
            .collect())
    }

    fn create_person(&self, person: NewPerson) -> Result<i32, StoreError> {
        let mut snapshot = self.write();
        let person_id = snapshot
            .people
            .iter()
            .map(|p| p.person_id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| StoreError::Conflict("person id space exhausted".to_string()))?;

        let phones = person
            .phone
            .filter(|phone| !phone.trim().is_empty())
            .map(|number| PersonPhone {
                number,
                extension: String::new(),
                phone_type: LookupValue::default(),
                unlisted: false,
            })
            .into_iter()
            .collect();

        snapshot.people.push(Person {
            person_id,
            organization_id: person.organization_id,
            first_name: person.first_name,
            last_name: person.last_name,
            email: person.email,
            birth_date: person.birth_date.unwrap_or_else(sentinel_date),
            campus_id: person.campus_id.unwrap_or(NOT_FOUND_ID),
            phones,
            ..Person::default()
        });

        tracing::info!(person_id, "store.person_created");
        Ok(person_id)
    }

    fn save_person_attributes(
        &self,
        person_id: i32,
        values: &[PersonAttributeValue],
    ) -> Result<(), StoreError> {
        let mut snapshot = self.write();
        let Some(person) = snapshot
            .people
            .iter_mut()
            .find(|p| p.person_id == person_id)
        else {
            return Err(StoreError::Conflict(format!(
                "person {} does not exist",
                person_id
            )));
        };

        for value in values {
            match person
                .attributes
                .iter_mut()
                .find(|a| a.attribute_id == value.attribute_id)
            {
                Some(existing) => existing.value = value.value.clone(),
                None => person.attributes.push(value.clone()),
            }
        }

        Ok(())
    }

    fn revoke_authorization(&self, login_id: &str, client_id: i32) -> Result<bool, StoreError> {
        let mut snapshot = self.write();
        let before = snapshot.authorizations.len();
        snapshot
            .authorizations
            .retain(|a| !(a.login_id == login_id && a.client_id == client_id));
        Ok(snapshot.authorizations.len() != before)
    }
}

/// Grants match the subject's person id or any of its roles. An `Edit`
/// grant also satisfies `View`.
impl PermissionOracle for MemoryStore {
    fn allows(&self, subject: &Subject, securable: Securable, operation: Operation) -> bool {
        self.read().grants.iter().any(|grant| {
            let subject_matches = match grant.subject {
                GrantSubject::Person { person_id } => person_id == subject.person_id,
                GrantSubject::Role { role_id } => subject.role_ids.contains(&role_id),
            };
            let securable_matches = match (&grant.securable, securable) {
                (GrantSecurable::ObjectField { key }, Securable::ObjectField(wanted)) => {
                    key.eq_ignore_ascii_case(wanted.as_str())
                }
                (GrantSecurable::Profile { profile_id }, Securable::Profile(wanted)) => {
                    *profile_id == wanted
                }
                (GrantSecurable::Cluster { cluster_id }, Securable::Cluster(wanted)) => {
                    *cluster_id == wanted
                }
                (GrantSecurable::Attribute { attribute_id }, Securable::Attribute(wanted)) => {
                    *attribute_id == wanted
                }
                _ => false,
            };
            let operation_matches = match (grant.operation, operation) {
                (GrantOperation::Edit, _) => true,
                (GrantOperation::View, Operation::View) => true,
                (GrantOperation::View, Operation::Edit) => false,
            };
            subject_matches && securable_matches && operation_matches
        })
    }
}

fn known(id: i32) -> Option<i32> {
    (id != NOT_FOUND_ID).then_some(id)
}

impl GroupGraph for MemoryStore {
    fn groups_with_member(&self, person_id: i32) -> Vec<GroupNode> {
        let snapshot = self.read();
        snapshot
            .group_members
            .iter()
            .filter(|m| m.person_id == person_id && m.active)
            .filter_map(|m| snapshot.groups.iter().find(|g| g.group_id == m.group_id))
            .map(|g| GroupNode {
                group_id: g.group_id,
                leader_id: known(g.leader_id),
                cluster_id: known(g.cluster_id),
            })
            .collect()
    }

    fn cluster(&self, cluster_id: i32) -> Option<ClusterNode> {
        self.read()
            .clusters
            .iter()
            .find(|c| c.cluster_id == cluster_id)
            .map(|c| ClusterNode {
                cluster_id: c.cluster_id,
                parent_id: known(c.parent_cluster_id),
                leader_id: known(c.leader_id),
                admin_id: known(c.admin_id),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::from_json(
            r#"{
                "people": [
                    {"person_id": 1, "family_id": 7, "first_name": "Ann", "last_name": "Lee"},
                    {"person_id": 2, "family_id": 7, "first_name": "Ben", "last_name": "Lee"}
                ],
                "roles": [{"role_id": 3, "name": "Staff", "member_ids": [2]}],
                "grants": [
                    {"subject": {"kind": "role", "role_id": 3},
                     "securable": {"kind": "object_field", "key": "person.email"},
                     "operation": "View"},
                    {"subject": {"kind": "person", "person_id": 1},
                     "securable": {"kind": "cluster", "cluster_id": 9},
                     "operation": "Edit"}
                ]
            }"#,
        )
        .expect("snapshot should parse")
    }

    #[test]
    fn missing_person_returns_sentinel() {
        let person = store().person(404).expect("lookup");
        assert_eq!(person.person_id, NOT_FOUND_ID);
    }

    #[test]
    fn grants_match_roles_and_edit_implies_view() {
        let store = store();
        let staff = Subject {
            person_id: 2,
            role_ids: store.role_ids_for(2).expect("roles"),
        };
        let email = Securable::ObjectField(arena_policy::PermissionKey("person.email"));
        assert!(store.allows(&staff, email, Operation::View));
        assert!(!store.allows(&staff, email, Operation::Edit));

        let ann = Subject {
            person_id: 1,
            role_ids: Vec::new(),
        };
        assert!(store.allows(&ann, Securable::Cluster(9), Operation::View));
        assert!(!store.allows(&ann, email, Operation::View));
    }

    #[test]
    fn create_person_assigns_next_id() {
        let store = store();
        let id = store
            .create_person(NewPerson {
                organization_id: 1,
                first_name: "Cy".to_string(),
                last_name: "Lee".to_string(),
                email: "cy@example.org".to_string(),
                phone: Some("555-0100".to_string()),
                birth_date: None,
                campus_id: None,
            })
            .expect("create");
        assert_eq!(id, 3);
        let created = store.person(3).expect("lookup");
        assert_eq!(created.phones.len(), 1);
        assert_eq!(created.birth_date, sentinel_date());
    }

    #[test]
    fn blob_owner_finds_person_then_group() {
        let store = MemoryStore::from_json(
            r#"{
                "people": [{"person_id": 1, "blob_id": 40}],
                "groups": [{"group_id": 5, "name": "Youth", "blob_id": 41}]
            }"#,
        )
        .expect("snapshot should parse");

        match store.blob_owner(40).expect("lookup") {
            Some(BlobOwner::Person(person)) => assert_eq!(person.person_id, 1),
            other => panic!("expected person owner, got {:?}", other),
        }
        match store.blob_owner(41).expect("lookup") {
            Some(BlobOwner::Group(group)) => assert_eq!(group.group_id, 5),
            other => panic!("expected group owner, got {:?}", other),
        }
        assert_eq!(store.blob_owner(42).expect("lookup"), None);
        assert_eq!(store.blob_owner(NOT_FOUND_ID).expect("lookup"), None);
    }

    #[test]
    fn duplicate_person_ids_are_rejected() {
        let err = MemoryStore::from_json(r#"{"people": [{"person_id": 1}, {"person_id": 1}]}"#)
            .err()
            .expect("duplicate ids should fail");
        assert!(matches!(err, StoreError::Snapshot(_)));
    }
}
