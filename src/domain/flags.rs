//! Host and host group flag codec
//!
//! The array reports per-host flags as two comma-joined token lists, one for
//! flags explicitly enabled and one for flags explicitly disabled. A flag
//! named in either list is overridden; a flag named in neither keeps the
//! array default. The structured form keeps one `{enabled, override}` pair
//! per flag.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Flag
// =============================================================================

/// A single host flag setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Flag {
    /// Flag value when overridden
    #[serde(default)]
    pub enabled: bool,
    /// Whether the host overrides the port-level default
    #[serde(default)]
    pub r#override: bool,
}

impl Flag {
    /// An overridden flag with the given value
    pub const fn overridden(enabled: bool) -> Self {
        Self {
            enabled,
            r#override: true,
        }
    }
}

// =============================================================================
// Flag Identity
// =============================================================================

/// The eight host flags the array exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostFlag {
    VolumeSetAddressing,
    DisableQResetOnUa,
    EnvironSet,
    AvoidResetBroadcast,
    Openvms,
    Scsi3,
    Spc2ProtocolVersion,
    ScsiSupport1,
}

impl HostFlag {
    /// Every flag, in array order
    pub const ALL: [HostFlag; 8] = [
        HostFlag::VolumeSetAddressing,
        HostFlag::DisableQResetOnUa,
        HostFlag::EnvironSet,
        HostFlag::AvoidResetBroadcast,
        HostFlag::Openvms,
        HostFlag::Scsi3,
        HostFlag::Spc2ProtocolVersion,
        HostFlag::ScsiSupport1,
    ];

    /// Token used by the array in the enabled/disabled lists
    pub const fn token(self) -> &'static str {
        match self {
            HostFlag::VolumeSetAddressing => "Volume_Set_Addressing(V)",
            HostFlag::DisableQResetOnUa => "Disable_Q_Reset_on_UA(D)",
            HostFlag::EnvironSet => "Environ_Set(E)",
            HostFlag::AvoidResetBroadcast => "Avoid_Reset_Broadcast(ARB)",
            HostFlag::Openvms => "OpenVMS(OVMS)",
            HostFlag::Scsi3 => "SCSI_3(SC3)",
            HostFlag::Spc2ProtocolVersion => "SPC2_Protocol_Version(SPC2)",
            HostFlag::ScsiSupport1 => "SCSI_Support1(OS2007)",
        }
    }

    /// Look a flag up by its array token
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.token() == token)
    }
}

impl std::fmt::Display for HostFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostFlag::VolumeSetAddressing => write!(f, "volume_set_addressing"),
            HostFlag::DisableQResetOnUa => write!(f, "disable_q_reset_on_ua"),
            HostFlag::EnvironSet => write!(f, "environ_set"),
            HostFlag::AvoidResetBroadcast => write!(f, "avoid_reset_broadcast"),
            HostFlag::Openvms => write!(f, "openvms"),
            HostFlag::Scsi3 => write!(f, "scsi_3"),
            HostFlag::Spc2ProtocolVersion => write!(f, "spc2_protocol_version"),
            HostFlag::ScsiSupport1 => write!(f, "scsi_support1"),
        }
    }
}

// =============================================================================
// Flag Set
// =============================================================================

/// Full flag set of a host or host group.
///
/// Compared structurally: the array only accepts the whole set in one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HostFlags {
    pub volume_set_addressing: Flag,
    pub disable_q_reset_on_ua: Flag,
    pub environ_set: Flag,
    pub avoid_reset_broadcast: Flag,
    pub openvms: Flag,
    pub scsi_3: Flag,
    pub spc2_protocol_version: Flag,
    pub scsi_support1: Flag,
}

impl HostFlags {
    /// Decode the array's token lists into a flag set
    pub fn decode(enabled_csv: &str, disabled_csv: &str) -> Self {
        apply_overrides(HostFlags::default(), enabled_csv, disabled_csv)
    }

    /// Setting of one flag
    pub const fn get(&self, flag: HostFlag) -> Flag {
        match flag {
            HostFlag::VolumeSetAddressing => self.volume_set_addressing,
            HostFlag::DisableQResetOnUa => self.disable_q_reset_on_ua,
            HostFlag::EnvironSet => self.environ_set,
            HostFlag::AvoidResetBroadcast => self.avoid_reset_broadcast,
            HostFlag::Openvms => self.openvms,
            HostFlag::Scsi3 => self.scsi_3,
            HostFlag::Spc2ProtocolVersion => self.spc2_protocol_version,
            HostFlag::ScsiSupport1 => self.scsi_support1,
        }
    }

    /// Copy of this set with one flag replaced
    pub fn with(mut self, flag: HostFlag, value: Flag) -> Self {
        match flag {
            HostFlag::VolumeSetAddressing => self.volume_set_addressing = value,
            HostFlag::DisableQResetOnUa => self.disable_q_reset_on_ua = value,
            HostFlag::EnvironSet => self.environ_set = value,
            HostFlag::AvoidResetBroadcast => self.avoid_reset_broadcast = value,
            HostFlag::Openvms => self.openvms = value,
            HostFlag::Scsi3 => self.scsi_3 = value,
            HostFlag::Spc2ProtocolVersion => self.spc2_protocol_version = value,
            HostFlag::ScsiSupport1 => self.scsi_support1 = value,
        }
        self
    }

    /// Encode into the array's `(enabled, disabled)` token lists.
    ///
    /// Flags that are not overridden appear in neither list.
    pub fn encode(&self) -> (String, String) {
        let mut enabled = Vec::new();
        let mut disabled = Vec::new();
        for flag in HostFlag::ALL {
            let setting = self.get(flag);
            if !setting.r#override {
                continue;
            }
            if setting.enabled {
                enabled.push(flag.token());
            } else {
                disabled.push(flag.token());
            }
        }
        (enabled.join(","), disabled.join(","))
    }

    /// Number of overridden flags
    pub fn overridden_count(&self) -> usize {
        HostFlag::ALL
            .into_iter()
            .filter(|flag| self.get(*flag).r#override)
            .count()
    }
}

/// Overlay the array's token lists on a flag set.
///
/// Every recognised token marks its flag overridden; the value is `true` for
/// the enabled list and `false` for the disabled list. The disabled list is
/// applied second. Unrecognised tokens are skipped.
pub fn apply_overrides(flags: HostFlags, enabled_csv: &str, disabled_csv: &str) -> HostFlags {
    let enabled = tokens(enabled_csv).map(|flag| (flag, true));
    let disabled = tokens(disabled_csv).map(|flag| (flag, false));
    enabled
        .chain(disabled)
        .fold(flags, |acc, (flag, value)| acc.with(flag, Flag::overridden(value)))
}

fn tokens(csv: &str) -> impl Iterator<Item = HostFlag> + '_ {
    csv.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(HostFlag::from_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scsi3_is_idempotent() {
        let first = HostFlags::decode("SCSI_3(SC3)", "");
        let second = HostFlags::decode("SCSI_3(SC3)", "");
        assert_eq!(first, second);
        assert_eq!(first.scsi_3, Flag::overridden(true));
        for flag in HostFlag::ALL {
            if flag != HostFlag::Scsi3 {
                assert_eq!(first.get(flag), Flag::default(), "{flag} should be default");
            }
        }
    }

    #[test]
    fn test_decode_disabled_list() {
        let flags = HostFlags::decode(
            "Volume_Set_Addressing(V)",
            "OpenVMS(OVMS), SCSI_Support1(OS2007)",
        );
        assert_eq!(flags.volume_set_addressing, Flag::overridden(true));
        assert_eq!(flags.openvms, Flag::overridden(false));
        assert_eq!(flags.scsi_support1, Flag::overridden(false));
        assert_eq!(flags.environ_set, Flag::default());
        assert_eq!(flags.overridden_count(), 3);
    }

    #[test]
    fn test_unknown_tokens_are_ignored() {
        let flags = HostFlags::decode("Future_Flag(FF),SCSI_3(SC3),", ",,Bogus");
        assert_eq!(flags.scsi_3, Flag::overridden(true));
        assert_eq!(flags.overridden_count(), 1);
    }

    #[test]
    fn test_apply_overrides_starts_from_given_set() {
        let base = HostFlags::default().with(HostFlag::EnvironSet, Flag::overridden(true));
        let flags = apply_overrides(base, "", "Environ_Set(E)");
        assert_eq!(flags.environ_set, Flag::overridden(false));
    }

    #[test]
    fn test_encode_then_decode() {
        let flags = HostFlags::default()
            .with(HostFlag::Scsi3, Flag::overridden(true))
            .with(HostFlag::Spc2ProtocolVersion, Flag::overridden(false))
            .with(HostFlag::Openvms, Flag { enabled: true, r#override: false });
        let (enabled, disabled) = flags.encode();
        assert_eq!(enabled, "SCSI_3(SC3)");
        assert_eq!(disabled, "SPC2_Protocol_Version(SPC2)");

        // Non-overridden values are not representable on the array
        let decoded = HostFlags::decode(&enabled, &disabled);
        assert_eq!(decoded.openvms, Flag::default());
        assert_eq!(decoded.scsi_3, flags.scsi_3);
    }

    #[test]
    fn test_flag_serializes_override_keyword() {
        let json = serde_json::to_value(Flag::overridden(true)).unwrap();
        assert_eq!(json, serde_json::json!({"enabled": true, "override": true}));
    }
}
