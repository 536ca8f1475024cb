//! User-confirmed workflow metadata that every projection treats as an
//! opaque input: which tier a status belongs to, whether it plays a
//! terminal role, and whether arriving there counts as "delivered". None of
//! this is inferred by the crate — see the module-level non-goals in
//! [`crate::projections`].

use std::collections::{HashMap, HashSet};

/// Where a status sits in the flow a consumer has confirmed for its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Demand,
    Upstream,
    Downstream,
    Finished,
}

/// One status's confirmed classification. `role` and `outcome` are free-form
/// consumer vocabulary (e.g. `role: "terminal"`, `outcome: "delivered"`)
/// rather than closed enums, since the core does not interpret process
/// semantics itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusMapping {
    pub tier: Option<Tier>,
    pub role: Option<String>,
    pub outcome: Option<String>,
}

impl StatusMapping {
    pub fn new(tier: Tier) -> Self {
        Self { tier: Some(tier), role: None, outcome: None }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn is_terminal_role(&self) -> bool {
        self.role.as_deref().map(|r| r.eq_ignore_ascii_case("terminal")).unwrap_or(false)
    }

    pub fn is_delivered_outcome(&self) -> bool {
        self.outcome.as_deref().map(|o| o.eq_ignore_ascii_case("delivered")).unwrap_or(false)
    }
}

/// Status name -> [`StatusMapping`], keyed case-insensitively since the
/// backend is not consistent about status-name casing between snapshot and
/// history fields.
#[derive(Debug, Clone, Default)]
pub struct StatusMappings {
    by_name: HashMap<String, StatusMapping>,
}

impl StatusMappings {
    pub fn new(entries: impl IntoIterator<Item = (String, StatusMapping)>) -> Self {
        Self {
            by_name: entries.into_iter().map(|(name, mapping)| (name.to_lowercase(), mapping)).collect(),
        }
    }

    pub fn get(&self, status_name: &str) -> Option<&StatusMapping> {
        self.by_name.get(&status_name.to_lowercase())
    }

    /// Unknown statuses fall into [`Tier::Demand`]: a status a consumer
    /// hasn't confirmed yet is treated as not-yet-started rather than
    /// silently excluded from scope views.
    pub fn tier_of(&self, status_name: &str) -> Tier {
        self.get(status_name).and_then(|m| m.tier).unwrap_or(Tier::Demand)
    }
}

/// The set of status names/ids a consumer has confirmed are "finished" for
/// the purposes of [`crate::projections::reconstruct::reconstruct`]'s
/// resolution-guard logic. Independent from [`StatusMappings`] since
/// reconstruction only needs a finished/not-finished boolean, not a full
/// tier breakdown.
#[derive(Debug, Clone, Default)]
pub struct FinishedStatuses {
    names: HashSet<String>,
    ids: HashSet<String>,
}

impl FinishedStatuses {
    pub fn new(names: impl IntoIterator<Item = String>, ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().map(|n| n.to_lowercase()).collect(),
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, status_name: Option<&str>, status_id: Option<&str>) -> bool {
        status_name.map(|n| self.names.contains(&n.to_lowercase())).unwrap_or(false)
            || status_id.map(|id| self.ids.contains(id)).unwrap_or(false)
    }
}
