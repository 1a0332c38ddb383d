//! Site identity: name normalisation, regulatory codes, and priority ranks.
//!
//! Free-text site names arrive from caller tables. They are resolved once,
//! at ingestion, into a [`Site`] whose composite `"NAME (CODE)"` key is the
//! join key for every downstream table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SettlementError};

/// Code placeholder used for sites admitted under [`UnmappedPolicy::Tag`].
pub const UNMAPPED_CODE: &str = "UNMAPPED";

/// Grid tariff tier a site is billed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffTier {
    High,
    #[default]
    Low,
}

/// What to do with a site name that has no registered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Abort the run with [`SettlementError::UnmappedSite`].
    #[default]
    Fail,
    /// Admit the site as `"NAME (UNMAPPED)"` on the low tariff tier.
    Tag,
}

/// A resolved consumption site.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Canonical upper-case name.
    pub name: String,
    /// Regulatory code, `None` for tagged unmapped sites.
    pub code: Option<String>,
    /// Composite `"NAME (CODE)"` join key.
    pub key: String,
    /// Position in the priority list, if the site is a priority site.
    pub priority: Option<usize>,
    pub tariff: TariffTier,
}

impl Site {
    pub fn is_priority(&self) -> bool {
        self.priority.is_some()
    }
}

/// Normalises a free-text site name: trims, collapses whitespace, upper-cases.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Returns the index of the first priority entry contained in `key`
/// (case-insensitive).
pub fn priority_rank(key: &str, priority: &[String]) -> Option<usize> {
    let key = key.to_uppercase();
    priority
        .iter()
        .position(|entry| key.contains(&normalize_name(entry)))
}

/// Registry of known sites keyed by canonical name and composite key.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<Site>,
    by_name: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
    priority: Vec<String>,
    unmapped: UnmappedPolicy,
}

impl SiteRegistry {
    /// Builds a registry from `(name, code, tier)` triples.
    ///
    /// # Arguments
    ///
    /// * `sites` - Registered sites with their regulatory codes and tariff tiers
    /// * `priority` - Ordered priority name fragments
    /// * `unmapped` - Policy for names missing from `sites`
    pub fn new<'a>(
        sites: impl IntoIterator<Item = (&'a str, &'a str, TariffTier)>,
        priority: &[String],
        unmapped: UnmappedPolicy,
    ) -> Self {
        let mut registry = Self {
            sites: Vec::new(),
            by_name: HashMap::new(),
            by_key: HashMap::new(),
            priority: priority.to_vec(),
            unmapped,
        };
        for (name, code, tariff) in sites {
            registry.insert(normalize_name(name), Some(code.trim().to_string()), tariff);
        }
        registry
    }

    fn insert(&mut self, name: String, code: Option<String>, tariff: TariffTier) -> usize {
        let key = format!("{name} ({})", code.as_deref().unwrap_or(UNMAPPED_CODE));
        let site = Site {
            priority: priority_rank(&key, &self.priority),
            name: name.clone(),
            code,
            key: key.clone(),
            tariff,
        };
        let idx = self.sites.len();
        self.sites.push(site);
        self.by_name.insert(name, idx);
        self.by_key.insert(key.to_uppercase(), idx);
        idx
    }

    /// Resolves a free-text name (or an already composite key) to a site.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::UnmappedSite`] when the name is unknown and
    /// the policy is [`UnmappedPolicy::Fail`].
    pub fn resolve(&mut self, raw: &str, context: &str) -> Result<&Site> {
        let name = normalize_name(raw);
        if let Some(&idx) = self.by_name.get(&name).or_else(|| self.by_key.get(&name)) {
            return Ok(&self.sites[idx]);
        }
        match self.unmapped {
            UnmappedPolicy::Fail => Err(SettlementError::UnmappedSite {
                name: raw.to_string(),
                context: context.to_string(),
            }),
            UnmappedPolicy::Tag => {
                warn!(site = %raw, %context, "site has no registered code, tagging as unmapped");
                let idx = self.insert(name, None, TariffTier::Low);
                Ok(&self.sites[idx])
            }
        }
    }

    /// Looks up a site by its composite key.
    pub fn get(&self, key: &str) -> Option<&Site> {
        self.by_key
            .get(&key.to_uppercase())
            .map(|&idx| &self.sites[idx])
    }

    /// Looks up a site by composite key, failing loudly when absent.
    pub fn require(&self, key: &str, context: &str) -> Result<&Site> {
        self.get(key).ok_or_else(|| SettlementError::UnmappedSite {
            name: key.to_string(),
            context: context.to_string(),
        })
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(policy: UnmappedPolicy) -> SiteRegistry {
        SiteRegistry::new(
            [
                ("Malleswaram", "C2HT-136", TariffTier::High),
                ("HRBR Unit", "E8HT-203", TariffTier::High),
                ("Whitefield", "E4HT-355", TariffTier::Low),
                ("Bellandur Corp. Office", "S11BHT 406", TariffTier::Low),
            ],
            &["MALLESWARAM".to_string(), "HRBR UNIT".to_string()],
            policy,
        )
    }

    #[test]
    fn resolves_case_and_whitespace_insensitively() {
        let mut reg = registry(UnmappedPolicy::Fail);
        let site = reg.resolve("  hrbr   unit ", "test").expect("resolve");
        assert_eq!(site.key, "HRBR UNIT (E8HT-203)");
        assert_eq!(site.priority, Some(1));
    }

    #[test]
    fn resolves_composite_key() {
        let mut reg = registry(UnmappedPolicy::Fail);
        let site = reg
            .resolve("Bellandur Corp. Office (S11BHT 406)", "test")
            .expect("resolve");
        assert_eq!(site.name, "BELLANDUR CORP. OFFICE");
        assert!(!site.is_priority());
    }

    #[test]
    fn unknown_site_fails_by_default() {
        let mut reg = registry(UnmappedPolicy::Fail);
        let err = reg.resolve("Kanakapura", "site_totals");
        assert!(matches!(err, Err(SettlementError::UnmappedSite { .. })));
    }

    #[test]
    fn unknown_site_tagged_under_tag_policy() {
        let mut reg = registry(UnmappedPolicy::Tag);
        let key = reg
            .resolve("Kanakapura", "site_totals")
            .map(|s| s.key.clone())
            .expect("tagged");
        assert_eq!(key, "KANAKAPURA (UNMAPPED)");
        assert!(reg.get(&key).is_some());
        assert_eq!(reg.sites().len(), 5);
    }

    #[test]
    fn priority_rank_uses_substring_containment() {
        let priority = vec!["old airport road".to_string(), "HRBR".to_string()];
        assert_eq!(priority_rank("HRBR UNIT (E8HT-203)", &priority), Some(1));
        assert_eq!(priority_rank("OLD AIRPORT ROAD (E6HT209)", &priority), Some(0));
        assert_eq!(priority_rank("WHITEFIELD (E4HT-355)", &priority), None);
    }

    #[test]
    fn get_is_case_insensitive() {
        let reg = registry(UnmappedPolicy::Fail);
        assert!(reg.get("whitefield (e4ht-355)").is_some());
        assert!(reg.require("nowhere (X)", "test").is_err());
    }
}
