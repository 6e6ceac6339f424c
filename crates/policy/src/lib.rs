use std::cell::Cell;

pub mod caller;
pub mod include;
pub mod oracle;

pub use caller::{CallerContext, ClusterNode, GroupGraph, GroupNode, Relation, Relations, Target};
pub use include::{IncludeFieldSpec, parse_include_fields};
pub use oracle::{Operation, PermissionKey, PermissionOracle, Securable, Subject};

/// Static per-entity table of field name to the permission key guarding it.
#[derive(Debug, Clone)]
pub struct VisibilityPolicy {
    entity: &'static str,
    fields: Vec<(String, PermissionKey)>,
}

impl VisibilityPolicy {
    pub fn new(entity: &'static str, entries: &[(&'static str, PermissionKey)]) -> Self {
        let mut fields = entries
            .iter()
            .map(|(name, key)| (name.to_ascii_uppercase(), *key))
            .collect::<Vec<_>>();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields.dedup_by(|a, b| a.0 == b.0);

        Self { entity, fields }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn permission_key(&self, field: &str) -> Option<PermissionKey> {
        let upper = field.to_ascii_uppercase();
        self.fields
            .binary_search_by(|(name, _)| name.as_str().cmp(upper.as_str()))
            .ok()
            .map(|idx| self.fields[idx].1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Bypass(Relation),
    Unmapped,
    Denied,
    Filtered,
    Included,
}

impl Decision {
    pub fn includes(self) -> bool {
        matches!(self, Decision::Bypass(_) | Decision::Included)
    }
}

/// Decides whether one field of one target is projected for the caller.
/// Owner, family, and leadership relations win over the permission table
/// and over the requested-field filter.
pub fn decide(
    caller: &CallerContext,
    policy: &VisibilityPolicy,
    oracle: &dyn PermissionOracle,
    field: &str,
    requested: Option<&IncludeFieldSpec>,
) -> Decision {
    if let Some(relation) = caller.bypass() {
        return Decision::Bypass(relation);
    }

    let Some(key) = policy.permission_key(field) else {
        return Decision::Unmapped;
    };

    if !oracle.allows(
        &caller.subject,
        Securable::ObjectField(key),
        Operation::View,
    ) {
        return Decision::Denied;
    }

    match requested {
        None => Decision::Included,
        Some(spec) if spec.keeps_field(field) => Decision::Included,
        Some(_) => Decision::Filtered,
    }
}

pub fn should_include(
    caller: &CallerContext,
    policy: &VisibilityPolicy,
    oracle: &dyn PermissionOracle,
    field: &str,
    requested: Option<&IncludeFieldSpec>,
) -> bool {
    decide(caller, policy, oracle, field, requested).includes()
}

/// Request-scoped visibility view used by mappers. Counts hidden fields so
/// the caller can report them.
pub struct FieldVisibility<'a> {
    policy: &'a VisibilityPolicy,
    oracle: &'a dyn PermissionOracle,
    caller: &'a CallerContext,
    requested: Option<&'a IncludeFieldSpec>,
    hidden: Cell<u32>,
}

impl<'a> FieldVisibility<'a> {
    pub fn new(
        policy: &'a VisibilityPolicy,
        oracle: &'a dyn PermissionOracle,
        caller: &'a CallerContext,
        requested: Option<&'a IncludeFieldSpec>,
    ) -> Self {
        Self {
            policy,
            oracle,
            caller,
            requested,
            hidden: Cell::new(0),
        }
    }

    pub fn includes(&self, field: &str) -> bool {
        let decision = decide(self.caller, self.policy, self.oracle, field, self.requested);
        if !decision.includes() {
            self.hidden.set(self.hidden.get() + 1);
            tracing::trace!(
                entity = self.policy.entity(),
                field,
                decision = ?decision,
                "policy.field_hidden"
            );
        }
        decision.includes()
    }

    pub fn entity(&self) -> &'static str {
        self.policy.entity()
    }

    pub fn hidden_count(&self) -> u32 {
        self.hidden.get()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct GrantedKeys(HashSet<&'static str>);

    impl PermissionOracle for GrantedKeys {
        fn allows(&self, _: &Subject, securable: Securable, operation: Operation) -> bool {
            match securable {
                Securable::ObjectField(key) => {
                    operation == Operation::View && self.0.contains(key.as_str())
                }
                _ => false,
            }
        }
    }

    const FIRST_NAME: PermissionKey = PermissionKey("person.first_name");
    const EMAIL: PermissionKey = PermissionKey("person.email");
    const PHONES: PermissionKey = PermissionKey("person.phones");

    fn policy() -> VisibilityPolicy {
        VisibilityPolicy::new(
            "person",
            &[("FirstName", FIRST_NAME), ("Email", EMAIL), ("Phones", PHONES)],
        )
    }

    fn oracle() -> GrantedKeys {
        GrantedKeys(HashSet::from(["person.first_name", "person.email"]))
    }

    fn stranger() -> CallerContext {
        CallerContext::detached(
            Subject {
                person_id: 2,
                role_ids: vec![9],
            },
            None,
        )
    }

    fn owner() -> CallerContext {
        let mut ctx = stranger();
        ctx.relations.is_self = true;
        ctx
    }

    #[test]
    fn owner_sees_every_field_regardless_of_table_and_filter() {
        let requested = parse_include_fields(Some("FirstName"));
        for field in ["FirstName", "Email", "Phones", "NotInTheTable"] {
            assert!(should_include(
                &owner(),
                &policy(),
                &oracle(),
                field,
                requested.as_ref()
            ));
        }
    }

    #[test]
    fn unmapped_fields_are_hidden_from_strangers() {
        let decision = decide(&stranger(), &policy(), &oracle(), "Ssn", None);
        assert_eq!(decision, Decision::Unmapped);
        assert!(!decision.includes());
    }

    #[test]
    fn denied_view_permission_hides_field() {
        assert_eq!(
            decide(&stranger(), &policy(), &oracle(), "Phones", None),
            Decision::Denied
        );
    }

    #[test]
    fn star_minus_email_excludes_only_email() {
        let requested = parse_include_fields(Some("*,-EMAIL"));
        assert!(!should_include(
            &stranger(),
            &policy(),
            &oracle(),
            "Email",
            requested.as_ref()
        ));
        assert!(should_include(
            &stranger(),
            &policy(),
            &oracle(),
            "FirstName",
            requested.as_ref()
        ));
    }

    #[test]
    fn no_filter_and_star_filter_agree() {
        let star = parse_include_fields(Some("*"));
        for field in ["FirstName", "Email", "Phones", "Unknown"] {
            assert_eq!(
                should_include(&stranger(), &policy(), &oracle(), field, None),
                should_include(&stranger(), &policy(), &oracle(), field, star.as_ref()),
                "field {} disagrees",
                field
            );
        }
    }

    #[test]
    fn permission_lookup_is_case_insensitive() {
        assert_eq!(policy().permission_key("email"), Some(EMAIL));
        assert_eq!(policy().permission_key("EMAIL"), Some(EMAIL));
        assert_eq!(policy().permission_key("mail"), None);
    }

    #[test]
    fn field_visibility_counts_hidden_fields() {
        let caller = stranger();
        let policy = policy();
        let oracle = oracle();
        let requested = parse_include_fields(Some("FirstName"));
        let vis = FieldVisibility::new(&policy, &oracle, &caller, requested.as_ref());

        assert!(vis.includes("FirstName"));
        assert!(!vis.includes("Email"));
        assert!(!vis.includes("Phones"));
        assert_eq!(vis.hidden_count(), 2);
        assert_eq!(vis.entity(), "person");
    }
}
