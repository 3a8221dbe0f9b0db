//! Scoped multiplicative adjustments.
//!
//! A multiplier nudges site valuations up or down without touching the base
//! $/MW settings: `factor` 1.0 is neutral, and every active multiplier whose
//! scope matches a site compounds into that site's total.

use serde::{Deserialize, Serialize};

use super::site::SiteFacts;

/// What a multiplier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierScope {
    /// Every site.
    Global,
    /// Sites whose state matches `scope_value` exactly (case-sensitive).
    State,
    /// Sites owned by the company whose id is `scope_value`.
    Company,
    /// The single site whose id is `scope_value`.
    Site,
}

impl MultiplierScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Self::Global),
            "state" => Some(Self::State),
            "company" => Some(Self::Company),
            "site" => Some(Self::Site),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::State => "state",
            Self::Company => "company",
            Self::Site => "site",
        }
    }
}

impl std::fmt::Display for MultiplierScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A configurable, independently toggleable valuation adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multiplier {
    pub id: i64,
    pub name: String,
    /// Multiplicative factor; 1.0 is neutral.
    pub factor: f64,
    pub scope: MultiplierScope,
    /// Interpreted per scope: state code, company id, or site id.
    pub scope_value: Option<String>,
    pub active: bool,
    pub description: Option<String>,
}

impl Multiplier {
    /// Whether this multiplier applies to the given site.
    ///
    /// Inactive multipliers never match. State comparison is exact and
    /// case-sensitive; company and site scopes compare numeric ids parsed
    /// from `scope_value`.
    pub fn matches(&self, site: &SiteFacts) -> bool {
        if !self.active {
            return false;
        }
        match self.scope {
            MultiplierScope::Global => true,
            MultiplierScope::State => match (&self.scope_value, &site.state) {
                (Some(scope), Some(state)) => scope == state,
                _ => false,
            },
            MultiplierScope::Company => self.scope_id() == Some(site.company_id),
            MultiplierScope::Site => self.scope_id() == Some(site.site_id),
        }
    }

    fn scope_id(&self) -> Option<i64> {
        self.scope_value.as_deref().and_then(|v| v.parse().ok())
    }
}
