use std::sync::OnceLock;

use arena_contracts as contract;
use arena_policy::{FieldVisibility, PermissionKey, VisibilityPolicy};
use arena_store::{GroupCluster, GroupMembership, SmallGroup};

use super::{Links, date, id, lookup, pick, text};

static POLICY: OnceLock<VisibilityPolicy> = OnceLock::new();

pub fn policy() -> &'static VisibilityPolicy {
    POLICY.get_or_init(|| {
        VisibilityPolicy::new(
            "group",
            &[
                ("Name", PermissionKey("group.name")),
                ("Description", PermissionKey("group.description")),
                ("LeaderID", PermissionKey("group.leader")),
                ("LeaderName", PermissionKey("group.leader")),
                ("ClusterID", PermissionKey("group.cluster")),
                ("MeetingDay", PermissionKey("group.meeting_day")),
                ("Notes", PermissionKey("group.notes")),
                ("MemberCount", PermissionKey("group.member_count")),
                ("ImageUrl", PermissionKey("group.image")),
            ],
        )
    })
}

/// `leader_name` arrives already gated on `LeaderName`; the caller decides
/// that field before loading the leader record.
pub fn map_group(
    group: &SmallGroup,
    leader_name: Option<String>,
    member_count: i32,
    vis: &FieldVisibility<'_>,
    links: Links<'_>,
) -> contract::SmallGroup {
    contract::SmallGroup {
        group_id: group.group_id,
        name: pick(vis, "Name", || text(&group.name)),
        description: pick(vis, "Description", || text(&group.description)),
        leader_id: pick(vis, "LeaderID", || id(group.leader_id)),
        leader_name,
        cluster_id: pick(vis, "ClusterID", || id(group.cluster_id)),
        meeting_day: pick(vis, "MeetingDay", || lookup(&group.meeting_day)),
        notes: pick(vis, "Notes", || text(&group.notes)),
        member_count: pick(vis, "MemberCount", || Some(member_count)),
        image_url: pick(vis, "ImageUrl", || links.blob(group.blob_id)),
        link: Some(links.group(group.group_id)),
    }
}

pub fn map_group_reference(
    group: &SmallGroup,
    membership: &GroupMembership,
    vis: &FieldVisibility<'_>,
    links: Links<'_>,
) -> contract::SmallGroupReference {
    contract::SmallGroupReference {
        group_id: group.group_id,
        name: pick(vis, "Name", || text(&group.name)),
        role: lookup(&membership.role),
        link: Some(links.group(group.group_id)),
    }
}

/// `full_name` and `email` arrive already filtered through the member's own
/// person visibility.
pub fn map_group_member(
    membership: &GroupMembership,
    full_name: Option<String>,
    email: Option<String>,
    links: Links<'_>,
) -> contract::GroupMember {
    contract::GroupMember {
        group_id: membership.group_id,
        person_id: membership.person_id,
        full_name,
        email,
        role: lookup(&membership.role),
        active: membership.active,
        date_joined: date(membership.date_joined),
        link: Some(links.person(membership.person_id)),
    }
}

pub fn map_cluster(
    cluster: &GroupCluster,
    group_count: i32,
    links: Links<'_>,
) -> contract::GroupCluster {
    contract::GroupCluster {
        cluster_id: cluster.cluster_id,
        name: cluster.name.clone(),
        parent_cluster_id: id(cluster.parent_cluster_id),
        leader_id: id(cluster.leader_id),
        admin_id: id(cluster.admin_id),
        group_count,
        link: Some(links.cluster(cluster.cluster_id)),
    }
}
