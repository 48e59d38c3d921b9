//! Entity descriptors: where a record type lives remotely and how it is keyed.

use crate::constants::{ID, ODATA_ETAG, SYSTEM_ID};

use super::policy::DiffPolicy;

/// Static description of one remote entity collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Label used in logs and event-sink context
    pub name: String,
    /// Collection path relative to the API (or company) root
    pub collection: String,
    /// Natural-key field used for lookups before `systemId` is known
    pub key_field: String,
    pub diff_policy: DiffPolicy,
    /// Fields legitimate on create but never sent on update
    pub update_excluded_fields: Vec<String>,
}

impl EntityDescriptor {
    /// A descriptor whose diff policy already ignores server-managed fields
    /// (`@odata.etag`, `systemId`, `id`).
    pub fn new(
        name: impl Into<String>,
        collection: impl Into<String>,
        key_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            key_field: key_field.into(),
            diff_policy: server_managed_policy(),
            update_excluded_fields: Vec::new(),
        }
    }

    /// Replace the diff policy. Server-managed and update-excluded fields
    /// stay excluded.
    #[must_use]
    pub fn with_diff_policy(mut self, policy: DiffPolicy) -> Self {
        let policy = policy.exclude(ODATA_ETAG).exclude(SYSTEM_ID).exclude(ID);
        self.diff_policy =
            self.update_excluded_fields.iter().fold(policy, |policy, field| policy.exclude(field));
        self
    }

    /// Fields sent on create but scrubbed from every PATCH. A field that is
    /// never written on update cannot converge, so it is also left out of
    /// the diff.
    #[must_use]
    pub fn with_update_excluded_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.update_excluded_fields = fields.into_iter().map(Into::into).collect();
        for field in &self.update_excluded_fields {
            self.diff_policy = std::mem::take(&mut self.diff_policy).exclude(field);
        }
        self
    }

    pub fn items() -> Self {
        Self::new("item", "items", "number")
    }

    pub fn customers() -> Self {
        Self::new("customer", "customers", "number")
    }

    pub fn vendors() -> Self {
        Self::new("vendor", "vendors", "number")
    }

    pub fn sales_orders() -> Self {
        Self::new("salesOrder", "salesOrders", "number")
    }

    pub fn sales_invoices() -> Self {
        Self::new("salesInvoice", "salesInvoices", "number")
    }
}

fn server_managed_policy() -> DiffPolicy {
    DiffPolicy::new().exclude(ODATA_ETAG).exclude(SYSTEM_ID).exclude(ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_managed_fields_survive_policy_replacement() {
        let entity = EntityDescriptor::items()
            .with_diff_policy(DiffPolicy::new().exclude("unitCost"))
            .with_update_excluded_fields(["skipDuplicateCheck"]);

        assert!(entity.diff_policy.is_excluded("@odata.etag"));
        assert!(entity.diff_policy.is_excluded("systemId"));
        assert!(entity.diff_policy.is_excluded("unitCost"));
        assert_eq!(entity.update_excluded_fields, vec!["skipDuplicateCheck".to_string()]);
        assert!(entity.diff_policy.is_excluded("skipduplicatecheck"));
    }

    #[test]
    fn update_excluded_fields_survive_policy_replacement() {
        let entity = EntityDescriptor::customers()
            .with_update_excluded_fields(["skipDuplicateCheck"])
            .with_diff_policy(DiffPolicy::new());

        assert!(entity.diff_policy.is_excluded("skipDuplicateCheck"));
        assert!(entity.diff_policy.is_excluded("id"));
    }

    #[test]
    fn stock_descriptors_are_keyed_by_number() {
        for entity in [
            EntityDescriptor::items(),
            EntityDescriptor::customers(),
            EntityDescriptor::vendors(),
            EntityDescriptor::sales_orders(),
            EntityDescriptor::sales_invoices(),
        ] {
            assert_eq!(entity.key_field, "number");
        }
    }
}
