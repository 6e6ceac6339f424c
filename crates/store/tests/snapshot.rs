use std::path::PathBuf;

use arena_policy::{CallerContext, GroupGraph, Relation, Subject, Target};
use arena_store::{ArenaStore, MemoryStore, NOT_FOUND_ID, ProfileType};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/arena_snapshot.json")
}

fn load() -> MemoryStore {
    MemoryStore::load(&fixture_path()).expect("fixture snapshot should load")
}

#[test]
fn fixture_loads_and_answers_lookups() {
    let store = load();
    store.ping().expect("ping");

    let ann = store.person(1).expect("person");
    assert_eq!(ann.full_name(), "Ann Lee");
    assert_eq!(ann.family_id, 10);

    let family = store.family_members(ann.family_id).expect("family");
    assert_eq!(family.len(), 2);

    assert_eq!(store.profile(42).expect("profile").profile_id, NOT_FOUND_ID);
    assert_eq!(store.group(9999).expect("group").group_id, NOT_FOUND_ID);
    assert!(store.blob(9999).expect("blob").is_none());
}

#[test]
fn person_profiles_are_scoped_to_organization() {
    let store = load();
    let org_one = store.person_profiles(1, 1).expect("profiles");
    let ids = org_one.iter().map(|(p, _)| p.profile_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![10, 11, 12]);

    let event = store.profile(12).expect("profile");
    assert_eq!(event.profile_type, ProfileType::Event);
    assert!(event.event.is_some());
}

#[test]
fn inactive_memberships_do_not_feed_the_group_graph() {
    let store = load();
    assert_eq!(store.groups_with_member(1).len(), 1);
    assert!(store.groups_with_member(2).is_empty());
    assert_eq!(store.person_groups(2).expect("groups").len(), 1);
}

#[test]
fn cluster_admin_of_root_resolves_through_fixture_hierarchy() {
    let store = load();
    let dan = Subject {
        person_id: 4,
        role_ids: store.role_ids_for(4).expect("roles"),
    };
    let ctx = CallerContext::resolve(dan, Some(30), &Target::person(1, Some(10)), &store, &store);
    assert_eq!(ctx.bypass(), Some(Relation::ClusterAdmin));

    let carla = Subject {
        person_id: 3,
        role_ids: Vec::new(),
    };
    let ctx = CallerContext::resolve(carla, Some(20), &Target::person(1, Some(10)), &store, &store);
    assert_eq!(ctx.bypass(), Some(Relation::GroupLeader));
}

#[test]
fn revoke_removes_only_the_matching_authorization() {
    let store = load();
    assert!(store.revoke_authorization("ann", 1).expect("revoke"));
    assert!(!store.revoke_authorization("ann", 1).expect("second revoke"));
    assert_eq!(store.authorizations_for_login("ann").expect("list").len(), 1);
    assert_eq!(store.authorizations_for_login("ben").expect("list").len(), 1);
}

#[test]
fn attribute_save_upserts_values() {
    let store = load();
    store
        .save_person_attributes(
            1,
            &[
                arena_store::PersonAttributeValue {
                    attribute_id: 8,
                    value: "L".to_string(),
                },
                arena_store::PersonAttributeValue {
                    attribute_id: 9,
                    value: "yes".to_string(),
                },
            ],
        )
        .expect("save");
    let ann = store.person(1).expect("person");
    assert_eq!(ann.attributes.len(), 3);
    assert!(
        ann.attributes
            .iter()
            .any(|a| a.attribute_id == 8 && a.value == "L")
    );
    assert!(store.save_person_attributes(404, &[]).is_err());
}
