//! Common charger interface
//!
//! Every vendor adapter exposes the same capability set through the
//! [`Charger`] trait. Optional operations have default implementations that
//! fail with a "not supported" error, so a single adapter type can serve
//! devices with very different register maps; callers that want to know up
//! front ask [`Charger::capabilities`].

use crate::error::{AstrapeError, Result};
use serde::Serialize;

/// IEC 61851-1 derived charge status vocabulary
///
/// The letters are shared across all vendors even though the raw register
/// encodings differ wildly. A failed status read is NOT `A`: only a
/// successful read reporting `A` means "no vehicle connected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChargeStatus {
    /// No vehicle connected / socket idle
    A,
    /// Vehicle connected, not drawing current (preparing, suspended, paused)
    B,
    /// Vehicle connected and actively charging
    C,
    /// Charging with ventilation requirement
    D,
    /// Fault condition
    E,
    /// Fault condition (hardware-level)
    F,
}

impl ChargeStatus {
    /// Map a bare status letter as reported by text-status vendors
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(ChargeStatus::A),
            'B' => Some(ChargeStatus::B),
            'C' => Some(ChargeStatus::C),
            'D' => Some(ChargeStatus::D),
            'E' => Some(ChargeStatus::E),
            'F' => Some(ChargeStatus::F),
            _ => None,
        }
    }

    /// Whether a vehicle is connected (B, C or D)
    pub fn is_connected(self) -> bool {
        matches!(self, ChargeStatus::B | ChargeStatus::C | ChargeStatus::D)
    }

    /// Whether current is flowing (C or D)
    pub fn is_charging(self) -> bool {
        matches!(self, ChargeStatus::C | ChargeStatus::D)
    }

    /// Whether the charger reports a fault (E or F)
    pub fn is_fault(self) -> bool {
        matches!(self, ChargeStatus::E | ChargeStatus::F)
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            ChargeStatus::A => "A",
            ChargeStatus::B => "B",
            ChargeStatus::C => "C",
            ChargeStatus::D => "D",
            ChargeStatus::E => "E",
            ChargeStatus::F => "F",
        };
        write!(f, "{}", letter)
    }
}

/// Per-phase measurement triple (L1, L2, L3)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PhaseValues {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl PhaseValues {
    pub fn new(l1: f64, l2: f64, l3: f64) -> Self {
        Self { l1, l2, l3 }
    }

    /// The three values in phase order
    pub fn to_array(self) -> [f64; 3] {
        [self.l1, self.l2, self.l3]
    }
}

/// Capability set resolved once at adapter construction
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Capabilities {
    /// Sub-ampere current resolution (`set_max_current_millis`)
    pub milliamps: bool,
    /// Instantaneous power metering
    pub power: bool,
    /// Lifetime energy metering
    pub total_energy: bool,
    /// Session energy metering
    pub session_energy: bool,
    /// Per-phase current metering
    pub currents: bool,
    /// Per-phase voltage metering
    pub voltages: bool,
    /// RFID/station identifier readout
    pub identify: bool,
    /// 1-phase/3-phase switching
    pub phase_switching: bool,
}

/// Optional collaborator reporting how many phases the loadpoint currently
/// offers the vehicle; consulted by vendors whose limit register takes watts
/// rather than amperes
pub trait ActivePhases: Send + Sync {
    /// Active phase count (1 or 3), or `None` when unknown
    fn active_phases(&self) -> Option<u8>;
}

/// The common charger capability set
///
/// `status`, `enabled`, `enable` and `set_max_current` are the mandatory
/// core. Everything else is optional per vendor and defaults to a
/// "not supported" failure.
#[async_trait::async_trait]
pub trait Charger: Send + Sync {
    /// Current charge status
    async fn status(&self) -> Result<ChargeStatus>;

    /// Whether the charger is currently permitted to draw current
    async fn enabled(&self) -> Result<bool>;

    /// Allow or pause charging
    async fn enable(&self, on: bool) -> Result<()>;

    /// Set the charge current limit in whole amperes
    async fn set_max_current(&self, amps: u16) -> Result<()>;

    /// Set the charge current limit with sub-ampere resolution
    async fn set_max_current_millis(&self, amps: f64) -> Result<()> {
        let _ = amps;
        Err(AstrapeError::not_supported("set_max_current_millis"))
    }

    /// Instantaneous charge power in watts
    async fn current_power(&self) -> Result<f64> {
        Err(AstrapeError::not_supported("current_power"))
    }

    /// Lifetime delivered energy in kWh
    async fn total_energy(&self) -> Result<f64> {
        Err(AstrapeError::not_supported("total_energy"))
    }

    /// Energy delivered during the running session in kWh
    async fn charged_energy(&self) -> Result<f64> {
        Err(AstrapeError::not_supported("charged_energy"))
    }

    /// Per-phase currents in amperes
    async fn currents(&self) -> Result<PhaseValues> {
        Err(AstrapeError::not_supported("currents"))
    }

    /// Per-phase voltages in volts
    async fn voltages(&self) -> Result<PhaseValues> {
        Err(AstrapeError::not_supported("voltages"))
    }

    /// RFID tag or station identifier of the running session
    async fn identify(&self) -> Result<String> {
        Err(AstrapeError::not_supported("identify"))
    }

    /// Switch between single-phase and three-phase supply
    async fn set_phases(&self, phases: u8) -> Result<()> {
        let _ = phases;
        Err(AstrapeError::not_supported("set_phases"))
    }

    /// Currently configured phase count
    async fn phases(&self) -> Result<u8> {
        Err(AstrapeError::not_supported("phases"))
    }

    /// Best-effort dump of raw diagnostic registers for operators
    ///
    /// Read failures are logged and skipped; the result is never used by
    /// control logic.
    async fn diagnose(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Capabilities resolved at construction
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

impl std::fmt::Debug for dyn Charger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Charger").finish_non_exhaustive()
    }
}
