//! Ingredient identity.
//!
//! The pantry index and the shopping list deliberately disagree on what makes two
//! ingredient names "the same": the pantry keys on the trimmed name as written, the
//! shopping list also folds case. Both policies live here so the divergence is a
//! named choice rather than two unrelated string manipulations.

/// How raw ingredient names (and units) are turned into grouping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Trim surrounding whitespace only. "Garlic" and "garlic" stay distinct.
    Exact,
    /// Trim, then lower-case.
    CaseInsensitive,
}

/// Identity used by the pantry index.
pub const PANTRY_IDENTITY: IdentityPolicy = IdentityPolicy::Exact;

/// Identity used when grouping shopping quantities, for both names and units.
pub const SHOPPING_IDENTITY: IdentityPolicy = IdentityPolicy::CaseInsensitive;

impl IdentityPolicy {
    /// Canonical key for `raw`. Depends on nothing but the string itself.
    pub fn key(self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self {
            IdentityPolicy::Exact => trimmed.to_string(),
            IdentityPolicy::CaseInsensitive => trimmed.to_lowercase(),
        }
    }

    pub fn same(self, a: &str, b: &str) -> bool {
        self.key(a) == self.key(b)
    }
}

/// Canonical ingredient name as stored in the pantry index.
pub fn canonical_name(raw: &str) -> String {
    PANTRY_IDENTITY.key(raw)
}
