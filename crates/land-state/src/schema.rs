// SPDX-License-Identifier: Apache-2.0
//! Static field metadata, declared once per Land type at registration
//! time and used to build the optional [`land_wire::PathTable`] for
//! path-hash compression, without walking a live instance.

use crate::SyncPolicy;

/// One declared field or container in a Land type's state schema.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    /// The field's absolute path, as it will appear in recorded patches.
    pub path: String,
    /// The field's declared visibility.
    pub policy: SyncPolicy,
}

impl FieldMeta {
    /// Declare a field at `path` with the given visibility.
    pub fn new(path: impl Into<String>, policy: SyncPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }
}

/// The full set of fields a Land type declares, used at `Realm::register`
/// time to build that type's [`land_wire::PathTable`].
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: Vec<FieldMeta>,
}

impl StateSchema {
    /// Start an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field, returning `self` for chained construction.
    #[must_use]
    pub fn field(mut self, path: impl Into<String>, policy: SyncPolicy) -> Self {
        self.fields.push(FieldMeta::new(path, policy));
        self
    }

    /// The declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Every declared path that is not `Internal` (the only ones worth a
    /// wire-level path-hash entry, since `Internal` fields never reach the
    /// wire).
    #[must_use]
    pub fn externally_visible_paths(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !matches!(f.policy, SyncPolicy::Internal))
            .map(|f| f.path.clone())
            .collect()
    }
}
