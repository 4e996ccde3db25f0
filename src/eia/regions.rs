use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// EIA respondent code of a balancing authority
pub type RegionCode = String;

/// Represents a US balancing authority reporting hourly data to EIA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancingAuthority {
    pub code: RegionCode,
    pub name: String,
}

impl BalancingAuthority {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Balancing authorities offered when no catalogue is configured
pub static DEFAULT_AUTHORITIES: Lazy<Vec<BalancingAuthority>> = Lazy::new(|| {
    vec![
        BalancingAuthority::new("CISO", "California ISO"),
        BalancingAuthority::new("ERCO", "ERCOT (Texas)"),
        BalancingAuthority::new("ISNE", "ISO New England"),
        BalancingAuthority::new("MISO", "Midcontinent ISO"),
        BalancingAuthority::new("NYIS", "NYISO"),
        BalancingAuthority::new("PJM", "PJM Interconnection"),
        BalancingAuthority::new("SPP", "Southwest Power Pool"),
        BalancingAuthority::new("BPAT", "Bonneville Power"),
        BalancingAuthority::new("PACW", "PacifiCorp West"),
        BalancingAuthority::new("SEPA", "Southeast Power Admin"),
    ]
});

/// The set of balancing authorities a client is allowed to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCatalog {
    authorities: Vec<BalancingAuthority>,
}

impl RegionCatalog {
    pub fn new(authorities: Vec<BalancingAuthority>) -> Self {
        Self { authorities }
    }

    /// Look up an authority by its respondent code (case-insensitive)
    pub fn get(&self, code: &str) -> Option<&BalancingAuthority> {
        self.authorities
            .iter()
            .find(|ba| ba.code.eq_ignore_ascii_case(code))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BalancingAuthority> {
        self.authorities.iter()
    }

    /// List all codes, sorted
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<_> = self.authorities.iter().map(|ba| ba.code.as_str()).collect();
        codes.sort();
        codes
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHORITIES.clone())
    }
}

impl std::fmt::Display for BalancingAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = RegionCatalog::default();
        assert_eq!(catalog.get("ciso").unwrap().name, "California ISO");
        assert!(catalog.contains("PJM"));
        assert!(!catalog.contains("XXXX"));
    }

    #[test]
    fn codes_are_sorted() {
        let catalog = RegionCatalog::new(vec![
            BalancingAuthority::new("SPP", "Southwest Power Pool"),
            BalancingAuthority::new("CISO", "California ISO"),
        ]);
        assert_eq!(catalog.codes(), vec!["CISO", "SPP"]);
    }

    #[test]
    fn display_includes_code() {
        let ba = BalancingAuthority::new("ERCO", "ERCOT (Texas)");
        assert_eq!(ba.to_string(), "ERCOT (Texas) (ERCO)");
    }
}
