use std::collections::HashSet;

use crate::oracle::{Operation, PermissionOracle, Securable, Subject};

/// A small group as seen by the leadership walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub group_id: i32,
    pub leader_id: Option<i32>,
    pub cluster_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub cluster_id: i32,
    pub parent_id: Option<i32>,
    pub leader_id: Option<i32>,
    pub admin_id: Option<i32>,
}

/// Group membership and cluster hierarchy lookups.
pub trait GroupGraph: Send + Sync {
    fn groups_with_member(&self, person_id: i32) -> Vec<GroupNode>;
    fn cluster(&self, cluster_id: i32) -> Option<ClusterNode>;
}

/// The entity being projected, reduced to what the short-circuit rules need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target {
    pub owner_id: Option<i32>,
    pub family_id: Option<i32>,
    /// Person whose group memberships feed the leadership walk.
    pub member_id: Option<i32>,
    /// Cluster that directly contains the target, for group targets.
    pub cluster_id: Option<i32>,
}

impl Target {
    pub fn person(person_id: i32, family_id: Option<i32>) -> Self {
        Self {
            owner_id: Some(person_id),
            family_id,
            member_id: Some(person_id),
            cluster_id: None,
        }
    }

    pub fn group(leader_id: Option<i32>, cluster_id: Option<i32>) -> Self {
        Self {
            owner_id: leader_id,
            family_id: None,
            member_id: None,
            cluster_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relations {
    pub is_self: bool,
    pub is_family_member: bool,
    pub leads_group_of_target: bool,
    pub administers_cluster_of_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Owner,
    Family,
    GroupLeader,
    ClusterAdmin,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Owner => "owner",
            Relation::Family => "family",
            Relation::GroupLeader => "group_leader",
            Relation::ClusterAdmin => "cluster_admin",
        }
    }
}

/// Per-request relationship between the caller and one target entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub subject: Subject,
    pub family_id: Option<i32>,
    pub relations: Relations,
}

impl CallerContext {
    /// A context with no relations; only the permission table applies.
    pub fn detached(subject: Subject, family_id: Option<i32>) -> Self {
        Self {
            subject,
            family_id,
            relations: Relations::default(),
        }
    }

    /// The leadership walk only runs when the cheaper owner/family checks
    /// did not already grant access.
    pub fn resolve(
        subject: Subject,
        family_id: Option<i32>,
        target: &Target,
        graph: &dyn GroupGraph,
        oracle: &dyn PermissionOracle,
    ) -> Self {
        let mut relations = Relations {
            is_self: target.owner_id == Some(subject.person_id),
            is_family_member: family_id.is_some() && target.family_id == family_id,
            ..Relations::default()
        };

        if !relations.is_self && !relations.is_family_member {
            let mut clusters = Vec::new();
            if let Some(cluster_id) = target.cluster_id {
                clusters.push(cluster_id);
            }

            if let Some(member_id) = target.member_id {
                for group in graph.groups_with_member(member_id) {
                    if group.leader_id == Some(subject.person_id) {
                        relations.leads_group_of_target = true;
                        break;
                    }
                    if let Some(cluster_id) = group.cluster_id {
                        clusters.push(cluster_id);
                    }
                }
            }

            if !relations.leads_group_of_target {
                relations.administers_cluster_of_target =
                    administers_any_cluster(&subject, &clusters, graph, oracle);
            }
        }

        Self {
            subject,
            family_id,
            relations,
        }
    }

    /// First relation that bypasses the field permission table, in
    /// precedence order.
    pub fn bypass(&self) -> Option<Relation> {
        if self.relations.is_self {
            Some(Relation::Owner)
        } else if self.relations.is_family_member {
            Some(Relation::Family)
        } else if self.relations.leads_group_of_target {
            Some(Relation::GroupLeader)
        } else if self.relations.administers_cluster_of_target {
            Some(Relation::ClusterAdmin)
        } else {
            None
        }
    }
}

/// Walks each starting cluster up to its root. A per-chain visited set stops
/// the walk on malformed data where parents form a cycle.
fn administers_any_cluster(
    subject: &Subject,
    starts: &[i32],
    graph: &dyn GroupGraph,
    oracle: &dyn PermissionOracle,
) -> bool {
    let mut checked = HashSet::new();

    for &start in starts {
        let mut chain = HashSet::new();
        let mut next = Some(start);
        while let Some(cluster_id) = next {
            if !chain.insert(cluster_id) {
                tracing::warn!(cluster_id, "policy.cluster_cycle_detected");
                break;
            }
            // Shared ancestors were already examined from an earlier start.
            if !checked.insert(cluster_id) {
                break;
            }

            let Some(node) = graph.cluster(cluster_id) else {
                break;
            };

            if node.leader_id == Some(subject.person_id)
                || node.admin_id == Some(subject.person_id)
                || oracle.allows(subject, Securable::Cluster(cluster_id), Operation::Edit)
            {
                return true;
            }

            next = node.parent_id;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct FakeGraph {
        memberships: HashMap<i32, Vec<GroupNode>>,
        clusters: HashMap<i32, ClusterNode>,
    }

    impl GroupGraph for FakeGraph {
        fn groups_with_member(&self, person_id: i32) -> Vec<GroupNode> {
            self.memberships.get(&person_id).cloned().unwrap_or_default()
        }

        fn cluster(&self, cluster_id: i32) -> Option<ClusterNode> {
            self.clusters.get(&cluster_id).cloned()
        }
    }

    struct DenyAll;

    impl PermissionOracle for DenyAll {
        fn allows(&self, _: &Subject, _: Securable, _: Operation) -> bool {
            false
        }
    }

    struct EditCluster(i32);

    impl PermissionOracle for EditCluster {
        fn allows(&self, _: &Subject, securable: Securable, operation: Operation) -> bool {
            securable == Securable::Cluster(self.0) && operation == Operation::Edit
        }
    }

    fn subject(person_id: i32) -> Subject {
        Subject {
            person_id,
            role_ids: Vec::new(),
        }
    }

    fn cluster(cluster_id: i32, parent_id: Option<i32>, admin_id: Option<i32>) -> ClusterNode {
        ClusterNode {
            cluster_id,
            parent_id,
            leader_id: None,
            admin_id,
        }
    }

    fn graph_with_member_in(cluster_id: i32, leader_id: i32) -> FakeGraph {
        let mut graph = FakeGraph::default();
        graph.memberships.insert(
            10,
            vec![GroupNode {
                group_id: 100,
                leader_id: Some(leader_id),
                cluster_id: Some(cluster_id),
            }],
        );
        graph
    }

    #[test]
    fn owner_and_family_are_detected_without_walking() {
        let graph = FakeGraph::default();
        let ctx = CallerContext::resolve(
            subject(10),
            Some(5),
            &Target::person(10, Some(5)),
            &graph,
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), Some(Relation::Owner));

        let ctx = CallerContext::resolve(
            subject(11),
            Some(5),
            &Target::person(10, Some(5)),
            &graph,
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), Some(Relation::Family));
    }

    #[test]
    fn callers_without_a_family_never_match_on_family() {
        let ctx = CallerContext::resolve(
            subject(11),
            None,
            &Target::person(10, None),
            &FakeGraph::default(),
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), None);
    }

    #[test]
    fn group_leader_of_target_bypasses() {
        let graph = graph_with_member_in(1, 42);
        let ctx = CallerContext::resolve(
            subject(42),
            None,
            &Target::person(10, Some(5)),
            &graph,
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), Some(Relation::GroupLeader));
    }

    #[test]
    fn admin_of_ancestor_cluster_bypasses() {
        let mut graph = graph_with_member_in(3, 42);
        graph.clusters.insert(3, cluster(3, Some(2), None));
        graph.clusters.insert(2, cluster(2, Some(1), None));
        graph.clusters.insert(1, cluster(1, None, Some(77)));

        let ctx = CallerContext::resolve(
            subject(77),
            None,
            &Target::person(10, None),
            &graph,
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), Some(Relation::ClusterAdmin));
    }

    #[test]
    fn edit_permission_on_cluster_counts_as_admin() {
        let mut graph = graph_with_member_in(3, 42);
        graph.clusters.insert(3, cluster(3, None, None));

        let ctx = CallerContext::resolve(
            subject(99),
            None,
            &Target::person(10, None),
            &graph,
            &EditCluster(3),
        );
        assert!(ctx.relations.administers_cluster_of_target);
    }

    #[test]
    fn cyclic_cluster_parents_terminate() {
        let mut graph = graph_with_member_in(1, 42);
        graph.clusters.insert(1, cluster(1, Some(2), None));
        graph.clusters.insert(2, cluster(2, Some(3), None));
        graph.clusters.insert(3, cluster(3, Some(1), None));

        let ctx = CallerContext::resolve(
            subject(99),
            None,
            &Target::person(10, None),
            &graph,
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), None);
    }

    #[test]
    fn group_target_walks_its_own_cluster() {
        let mut graph = FakeGraph::default();
        graph.clusters.insert(8, cluster(8, None, Some(5)));

        let ctx = CallerContext::resolve(
            subject(5),
            None,
            &Target::group(Some(1), Some(8)),
            &graph,
            &DenyAll,
        );
        assert_eq!(ctx.bypass(), Some(Relation::ClusterAdmin));

        let leader = CallerContext::resolve(
            subject(1),
            None,
            &Target::group(Some(1), Some(8)),
            &graph,
            &DenyAll,
        );
        assert_eq!(leader.bypass(), Some(Relation::Owner));
    }
}
