//! Area-code routing rules.
//!
//! Area codes are read at a fixed offset from North American numbers
//! (`+1XXXYYYZZZZ`). Numbers with any other country code have no area code
//! in this scheme and never match the allow-list.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

static NANP_AREA_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+1(\d{3})").expect("area code pattern is valid"));

/// Where a visible-number requester should be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Verified,
    Unverified,
}

/// Extract the 3-digit area code from a `+1` number.
pub fn area_code(number: &str) -> Option<&str> {
    NANP_AREA_CODE
        .captures(number)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Area-code allow-list.
#[derive(Debug, Clone)]
pub struct AreaCodeRules {
    allowed: HashSet<String>,
}

impl AreaCodeRules {
    pub fn new(allowed: HashSet<String>) -> Self {
        Self { allowed }
    }

    /// Decide routing for a visible phone number.
    pub fn route(&self, number: &str) -> Routing {
        let Some(code) = area_code(number) else {
            warn!(
                number,
                "No North American area code; routing to unverified group for manual review"
            );
            return Routing::Unverified;
        };

        if self.allowed.contains(code) {
            debug!(area_code = code, "Authorized area code");
            Routing::Verified
        } else {
            debug!(area_code = code, "Unauthorized area code");
            Routing::Unverified
        }
    }
}
