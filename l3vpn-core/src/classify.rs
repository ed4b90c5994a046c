//! Subinterface classification.
//!
//! Only names matching the subinterface pattern are ever considered for
//! cleanup. Physical and aggregated interfaces are filtered out up front,
//! whatever their IP status.

use regex::Regex;

use crate::diff;
use crate::error::InventoryError;
use crate::types::ResourceSet;

/// Default subinterface shape: one base token, one dot, one positive integer.
pub const DEFAULT_SUBINTERFACE_PATTERN: &str = r"^GigabitEthernet[0-9]+\.[1-9][0-9]*$";

/// Compiled subinterface name matcher.
#[derive(Debug, Clone)]
pub struct SubinterfaceClassifier {
    pattern: Regex,
}

impl Default for SubinterfaceClassifier {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_SUBINTERFACE_PATTERN)
                .expect("default subinterface pattern is valid"),
        }
    }
}

impl SubinterfaceClassifier {
    pub fn new(pattern: &str) -> Result<Self, InventoryError> {
        let pattern = Regex::new(pattern).map_err(|source| InventoryError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern })
    }

    pub fn is_subinterface(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// Subinterfaces from `names`, everything else dropped.
    pub fn subinterfaces<'a, I>(&self, names: I) -> ResourceSet
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|n| self.is_subinterface(n))
            .cloned()
            .collect()
    }

    /// Subinterfaces in `all` that carry no IP according to `with_ip`.
    ///
    /// The result is a deletion candidate set; operational status is not
    /// looked at here.
    pub fn subinterfaces_without_ip(&self, all: &ResourceSet, with_ip: &ResourceSet) -> ResourceSet {
        let subinterfaces = self.subinterfaces(all);
        let subinterfaces_with_ip = self.subinterfaces(with_ip);
        diff::obsolete(&subinterfaces, &subinterfaces_with_ip)
    }
}
