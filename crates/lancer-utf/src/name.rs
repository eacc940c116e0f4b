//! Node name comparison
//!
//! Names in a UTF container are matched without regard to case. Every lookup
//! in the workspace goes through [`normalize`] or [`name_eq`] so the rule is
//! applied identically everywhere.

/// Lowercase a node name for use as a map key or in a `match`.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Compare two node names case-insensitively.
pub fn name_eq(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
