//! CWE allow-set gate
//!
//! A record passes when any of its classification codes carries a `CWE-<n>`
//! tag whose number is in the allow-set. Codes are matched by pattern, not
//! by equality, because anchor texts carry annotations such as
//! `CWE-798 (Use of Hard-coded Credentials)`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

static CWE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"CWE-(\d+)").expect("valid CWE regex"));

/// Default allow-set: cryptography, randomness, key and credential
/// management, certificates, cleartext handling and password hashing
pub const DEFAULT_ALLOWED_CWES: &[u32] = &[
    // crypto algorithms and negotiation
    326, 327, 328, 347, 329, 1204, 1240, 780, 757,
    // randomness and entropy
    330, 331, 332, 334, 335, 336, 337, 338, 339, 1241,
    // keys and credentials
    321, 322, 323, 324, 798,
    // certificates and PKI
    295, 296, 297, 298, 299, 370, 599,
    // cleartext transmission and storage
    319, 523, 1428, 614, 1004, 311, 312, 313, 315, 316, 317, 318,
    // password hashing
    759, 760, 916,
];

/// Predicate over a record's classification codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyFilter {
    allowed: BTreeSet<u32>,
}

impl TaxonomyFilter {
    /// Filter accepting exactly `ids`
    pub fn from_ids<I: IntoIterator<Item = u32>>(ids: I) -> Self {
        Self {
            allowed: ids.into_iter().collect(),
        }
    }

    /// Allowed CWE numbers
    pub fn allowed(&self) -> &BTreeSet<u32> {
        &self.allowed
    }

    /// Whether any code mentions an allowed CWE number
    pub fn passes<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        codes.iter().any(|code| {
            CWE_TAG
                .captures_iter(code.as_ref())
                .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
                .any(|id| self.allowed.contains(&id))
        })
    }
}

impl Default for TaxonomyFilter {
    fn default() -> Self {
        Self::from_ids(DEFAULT_ALLOWED_CWES.iter().copied())
    }
}

impl fmt::Display for TaxonomyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.allowed.iter().map(u32::to_string).collect();
        write!(f, "{}", ids.join(","))
    }
}

impl FromStr for TaxonomyFilter {
    type Err = String;

    /// Parses a comma-separated list such as `79,798` or `CWE-79, CWE-798`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ids = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let digits = part
                .strip_prefix("CWE-")
                .or_else(|| part.strip_prefix("cwe-"))
                .unwrap_or(part);
            let id = digits
                .parse::<u32>()
                .map_err(|_| format!("Invalid CWE id '{part}'"))?;
            ids.insert(id);
        }
        if ids.is_empty() {
            return Err("CWE allow-set must not be empty".to_string());
        }
        Ok(Self { allowed: ids })
    }
}
