//! Set differences between observed and desired resources.
//!
//! The same two functions serve every resource class (VRF names,
//! subinterface names); callers only choose which sets to pass.

use std::collections::BTreeSet;

use crate::types::ResourceSet;

/// Elements present now but not desired — to be removed.
pub fn obsolete(now: &ResourceSet, desired: &ResourceSet) -> ResourceSet {
    now.difference(desired).cloned().collect()
}

/// Elements desired but not present now — to be created.
pub fn missing(now: &ResourceSet, desired: &ResourceSet) -> ResourceSet {
    desired.difference(now).cloned().collect()
}

/// Both differences plus the untouched intersection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceDiff {
    pub obsolete: ResourceSet,
    pub missing: ResourceSet,
    pub retained: ResourceSet,
}

impl ResourceDiff {
    pub fn compute(now: &ResourceSet, desired: &ResourceSet) -> Self {
        Self {
            obsolete: obsolete(now, desired),
            missing: missing(now, desired),
            retained: now.intersection(desired).cloned().collect(),
        }
    }

    /// `true` when applying the diff would change nothing.
    pub fn is_converged(&self) -> bool {
        self.obsolete.is_empty() && self.missing.is_empty()
    }
}

/// Build a [`ResourceSet`] from anything yielding string-likes.
pub fn resource_set<I, S>(items: I) -> ResourceSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect::<BTreeSet<String>>()
}
