/// Caller-requested field filter, parsed from a `fields=` list such as
/// `FirstName,Email` or `*,-Email`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeFieldSpec {
    all: bool,
    listed: Vec<String>,
    excluded: Vec<String>,
}

impl IncludeFieldSpec {
    pub fn all() -> Self {
        Self {
            all: true,
            listed: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub fn includes_all(&self) -> bool {
        self.all
    }

    /// Exclusions only count under `*`; without it only listed fields pass.
    pub fn keeps_field(&self, field: &str) -> bool {
        let upper = field.to_ascii_uppercase();
        if self.all {
            self.excluded
                .binary_search_by(|f| f.as_str().cmp(upper.as_str()))
                .is_err()
        } else {
            self.listed
                .binary_search_by(|f| f.as_str().cmp(upper.as_str()))
                .is_ok()
        }
    }
}

/// Returns `None` when the caller supplied no usable tokens, which means
/// "every permitted field".
pub fn parse_include_fields(raw: Option<&str>) -> Option<IncludeFieldSpec> {
    let raw = raw?;

    let mut all = false;
    let mut listed = Vec::new();
    let mut excluded = Vec::new();

    for token in raw.split(',').map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if token == "*" {
            all = true;
        } else if let Some(name) = token.strip_prefix('-') {
            let name = name.trim();
            if !name.is_empty() {
                excluded.push(name.to_ascii_uppercase());
            }
        } else {
            listed.push(token.to_ascii_uppercase());
        }
    }

    if !all && listed.is_empty() && excluded.is_empty() {
        return None;
    }

    listed.sort();
    listed.dedup();
    excluded.sort();
    excluded.dedup();

    Some(IncludeFieldSpec {
        all,
        listed,
        excluded,
    })
}
