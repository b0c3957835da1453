//! Matching scan results against known meters.
//!
//! Meters advertise under vendor-specific names and address prefixes. A
//! match on both is preferred; platforms that hide real addresses (macOS
//! reports peripheral UUIDs) fall back to the name alone.

use std::collections::HashSet;

use tracing::info;

use crate::traits::Advertisement;

/// A meter the auto-detect path knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDevice {
    /// Address prefix, e.g. `"FC:58:FA:"`.
    pub prefix: &'static str,
    /// Advertised name; a trailing `*` matches any suffix.
    pub name: &'static str,
    /// Canonical model name.
    pub model: &'static str,
}

const fn known(prefix: &'static str, name: &'static str, model: &'static str) -> KnownDevice {
    KnownDevice {
        prefix,
        name,
        model,
    }
}

/// Meters recognised by auto-detect.
pub const KNOWN_DEVICES: &[KnownDevice] = &[
    known("98:7B:F3:", "bde spp dev", "TS04"),
    known("01:B4:05:", "FS9721-LP3", "HP90EPD"),
    known("FC:58:FA:", "Bluetooth DMM", "AN9002"),
    known("20:91:48:", "UT383BT", "UT383BT"),
    known("E8:D0:3C:", "UT383BT", "UT383BT"),
    known("7C:01:0A:", "LuxMeter", "WT81B"),
    known("48:7E:48:", "TP357 (*", "TP357"),
    known("86:28:A9:", "ToolSmart-AngleFinder", "TS02"),
    known("BB:DD:55:", "Gotobake*", "K1705"),
    known("01:BC:EC:", "980F", "BT980D"),
    known("01:BC:EC:", "AiLink_*", "BT7200_APP"),
    known("07:B4:EC:", "SWAN", "BT985C_APP"),
];

/// A scan result paired with the model it was recognised as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterMatch {
    pub advertisement: Advertisement,
    pub model: &'static str,
}

/// Whether an advertised name matches a table entry.
pub fn name_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

fn matches_address(known: &KnownDevice, address: &str) -> bool {
    address
        .get(..known.prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(known.prefix))
}

/// Recognise meters among scan results.
///
/// The first pass requires both address prefix and name. The second pass
/// accepts a name alone for devices the first pass left unmatched. Each
/// advertisement is matched at most once, in scan order.
pub fn match_meters(advertisements: &[Advertisement]) -> Vec<MeterMatch> {
    let mut matched = HashSet::new();
    let mut meters = Vec::new();

    for by_address in [true, false] {
        for (index, adv) in advertisements.iter().enumerate() {
            if matched.contains(&index) {
                continue;
            }
            let Some(name) = adv.name.as_deref() else {
                continue;
            };
            let found = KNOWN_DEVICES.iter().find(|known| {
                name_matches(known.name, name)
                    && (!by_address || matches_address(known, &adv.address))
            });
            if let Some(known) = found {
                if by_address {
                    info!("Found {} at {} ({})", known.model, adv.address, name);
                } else {
                    info!("Found {} at {} ({}, by name only)", known.model, adv.address, name);
                }
                matched.insert(index);
                meters.push(MeterMatch {
                    advertisement: adv.clone(),
                    model: known.model,
                });
            }
        }
    }
    meters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_wildcard() {
        assert!(name_matches("Gotobake*", "Gotobake-42"));
        assert!(name_matches("TP357 (*", "TP357 (1A2B)"));
        assert!(!name_matches("TP357 (*", "TP357"));
        assert!(name_matches("SWAN", "SWAN"));
        assert!(!name_matches("SWAN", "SWAN2"));
    }

    #[test]
    fn test_prefix_and_name() {
        let ads = vec![
            Advertisement::new("fc:58:fa:12:34:56", "Bluetooth DMM"),
            Advertisement::new("11:22:33:44:55:66", "Headphones"),
        ];
        let meters = match_meters(&ads);
        assert_eq!(meters.len(), 1);
        assert_eq!(meters[0].model, "AN9002");
        assert_eq!(meters[0].advertisement.address, "fc:58:fa:12:34:56");
    }

    #[test]
    fn test_shared_prefix_uses_name() {
        let ads = vec![
            Advertisement::new("01:BC:EC:00:00:01", "AiLink_BT7200"),
            Advertisement::new("01:BC:EC:00:00:02", "980F"),
        ];
        let meters = match_meters(&ads);
        assert_eq!(meters.len(), 2);
        assert_eq!(meters[0].model, "BT7200_APP");
        assert_eq!(meters[1].model, "BT980D");
    }

    #[test]
    fn test_name_only_fallback() {
        let ads = vec![
            Advertisement::new("3F2504E0-4F89-11D3-9A0C-0305E82C3301", "LuxMeter"),
            Advertisement::new("7C:01:0A:00:00:09", "LuxMeter"),
        ];
        let meters = match_meters(&ads);
        assert_eq!(meters.len(), 2);
        // address matches come first
        assert_eq!(meters[0].advertisement.address, "7C:01:0A:00:00:09");
        assert_eq!(meters[1].model, "WT81B");
    }

    #[test]
    fn test_unnamed_advertisements_are_skipped() {
        let ads = vec![Advertisement {
            address: "98:7B:F3:00:00:01".into(),
            name: None,
            rssi: Some(-60),
        }];
        assert!(match_meters(&ads).is_empty());
    }
}
