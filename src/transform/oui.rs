//! MAC normalization and the OUI mobile-hotspot policy.
//!
//! The OUI (first three octets of a MAC) identifies the interface vendor;
//! a blacklist of tethering-prone OUIs catches phones advertising as
//! infrastructure. The policy decides per observation: keep, keep-flagged,
//! or drop.

use std::collections::HashSet;

use crate::config::{HotspotAction, MobileHotspotConfig};

/// Normalize a MAC to lowercase colon-separated `aa:bb:cc:dd:ee:ff`.
///
/// Accepts colon, dash, or dot separators as well as bare hex. Returns
/// `None` unless exactly twelve hex digits remain.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let lower = hex.to_ascii_lowercase();
    let mut out = String::with_capacity(17);
    for (i, chunk) in lower.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push(chunk[0] as char);
        out.push(chunk[1] as char);
    }
    Some(out)
}

/// OUI prefix (`aa:bb:cc`) of a normalized MAC.
pub fn oui_prefix(normalized_mac: &str) -> Option<&str> {
    if normalized_mac.len() >= 8 {
        Some(&normalized_mac[..8])
    } else {
        None
    }
}

/// Whether a string is a well-formed lowercase `aa:bb:cc` OUI.
pub fn is_valid_oui(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split(':').collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            p.len() == 2
                && p.chars()
                    .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        })
}

/// Outcome of the hotspot policy for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotDecision {
    /// Not blacklisted (or policy disabled): keep unchanged.
    Keep,
    /// Blacklisted, action FLAG: keep with the hotspot flag set.
    KeepFlagged,
    /// Blacklisted, action LOG_ONLY: keep unchanged, count the sighting.
    KeepLogged,
    /// Blacklisted, action EXCLUDE: drop the observation.
    Drop,
}

/// Compiled hotspot policy.
#[derive(Debug, Clone)]
pub struct HotspotPolicy {
    enabled: bool,
    action: HotspotAction,
    blacklist: HashSet<String>,
}

impl HotspotPolicy {
    pub fn new(config: &MobileHotspotConfig) -> Self {
        Self {
            enabled: config.enabled,
            action: config.action,
            blacklist: config
                .oui_blacklist
                .iter()
                .map(|oui| oui.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Decide what happens to an observation of `normalized_mac`.
    pub fn evaluate(&self, normalized_mac: &str) -> HotspotDecision {
        if !self.enabled || self.blacklist.is_empty() {
            return HotspotDecision::Keep;
        }
        let Some(prefix) = oui_prefix(normalized_mac) else {
            return HotspotDecision::Keep;
        };
        if !self.blacklist.contains(prefix) {
            return HotspotDecision::Keep;
        }
        match self.action {
            HotspotAction::Flag => HotspotDecision::KeepFlagged,
            HotspotAction::LogOnly => HotspotDecision::KeepLogged,
            HotspotAction::Exclude => HotspotDecision::Drop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separator_variants() {
        for raw in [
            "00:11:22:AA:BB:CC",
            "00-11-22-aa-bb-cc",
            "0011.22aa.bbcc",
            "001122AABBCC",
        ] {
            assert_eq!(normalize_mac(raw).as_deref(), Some("00:11:22:aa:bb:cc"), "{raw}");
        }
    }

    #[test]
    fn rejects_malformed_macs() {
        for raw in ["", "00:11:22:aa:bb", "00:11:22:aa:bb:cc:dd", "zz:11:22:aa:bb:cc"] {
            assert_eq!(normalize_mac(raw), None, "{raw}");
        }
    }

    #[test]
    fn oui_prefix_is_first_three_octets() {
        assert_eq!(oui_prefix("00:11:22:aa:bb:cc"), Some("00:11:22"));
    }

    #[test]
    fn policy_actions_map_to_decisions() {
        let mut config = MobileHotspotConfig {
            enabled: true,
            oui_blacklist: vec!["da:a1:19".to_string()],
            action: HotspotAction::Flag,
        };
        let policy = HotspotPolicy::new(&config);
        assert_eq!(policy.evaluate("da:a1:19:01:02:03"), HotspotDecision::KeepFlagged);
        assert_eq!(policy.evaluate("00:11:22:01:02:03"), HotspotDecision::Keep);

        config.action = HotspotAction::Exclude;
        assert_eq!(
            HotspotPolicy::new(&config).evaluate("da:a1:19:01:02:03"),
            HotspotDecision::Drop
        );

        config.action = HotspotAction::LogOnly;
        assert_eq!(
            HotspotPolicy::new(&config).evaluate("da:a1:19:01:02:03"),
            HotspotDecision::KeepLogged
        );

        config.enabled = false;
        assert_eq!(
            HotspotPolicy::new(&config).evaluate("da:a1:19:01:02:03"),
            HotspotDecision::Keep
        );
    }
}
