//! Diff exclusion policy.

use std::collections::{BTreeMap, BTreeSet};

use super::record::eq_ignore_case;

/// Fields the diff engine must not treat as changes.
///
/// `excluded` fields are ignored unconditionally. `exempt` fields are ignored
/// only while the *existing* remote value is one of the listed values, which
/// is how one-way fields ("never downgrade from X") are expressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPolicy {
    excluded: BTreeSet<String>,
    exempt: BTreeMap<String, Vec<String>>,
}

impl DiffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always ignore `field`.
    #[must_use]
    pub fn exclude(mut self, field: impl AsRef<str>) -> Self {
        self.excluded.insert(field.as_ref().to_lowercase());
        self
    }

    /// Ignore `field` whenever its existing value is one of `values`.
    #[must_use]
    pub fn exempt<I, V>(mut self, field: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.exempt
            .entry(field.as_ref().to_lowercase())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.excluded.contains(&field.to_lowercase())
    }

    /// Whether `existing` is an exempt value for `field`.
    pub fn is_exempt(&self, field: &str, existing: &str) -> bool {
        self.exempt
            .get(&field.to_lowercase())
            .is_some_and(|values| values.iter().any(|value| eq_ignore_case(value, existing)))
    }

    pub fn excluded_fields(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }
}
