/// Opaque identifier of a securable object field, e.g. `person.email`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey(pub &'static str);

impl PermissionKey {
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

/// The requesting person together with the roles they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub person_id: i32,
    pub role_ids: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Securable {
    ObjectField(PermissionKey),
    Profile(i32),
    Cluster(i32),
    Attribute(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    View,
    Edit,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::View => "View",
            Operation::Edit => "Edit",
        }
    }
}

/// Answers whether a subject may perform an operation on a securable.
/// Implementations are pure queries.
pub trait PermissionOracle: Send + Sync {
    fn allows(&self, subject: &Subject, securable: Securable, operation: Operation) -> bool;
}
