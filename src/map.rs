//! Register map model
//!
//! A vendor adapter is data, not code: [`VendorSpec`] describes where each
//! value lives, how it is encoded and which quirks apply. The engine in
//! [`crate::engine`] interprets the map; vendor modules only build one.
//!
//! Decode strategies that cannot be expressed as plain data (vendor status
//! code tables, free-text status words) are carried as function pointers so
//! the map stays `Clone` and cheap to copy per connector.

use crate::charger::ChargeStatus;
use crate::decode;
use crate::error::{AstrapeError, Result};

/// Which register bank an address lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Holding,
    Input,
}

/// Wire encoding of a numeric register value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegEncoding {
    /// Single register, big-endian (the Modbus default)
    U16,
    /// Single register with swapped bytes
    U16Le,
    /// Two registers, high word first
    U32Be,
    /// Two registers, fully byte-swapped
    U32Le,
    /// Two registers, low word first (word-swapped)
    U32Swapped,
    /// IEEE 754 single, high word first
    F32Be,
    /// IEEE 754 single, low word first
    F32Swapped,
    /// IEEE 754 double, high word first
    F64Be,
}

impl RegEncoding {
    /// Number of 16-bit registers this encoding occupies
    pub fn words(self) -> u16 {
        match self {
            RegEncoding::U16 | RegEncoding::U16Le => 1,
            RegEncoding::U32Be
            | RegEncoding::U32Le
            | RegEncoding::U32Swapped
            | RegEncoding::F32Be
            | RegEncoding::F32Swapped => 2,
            RegEncoding::F64Be => 4,
        }
    }
}

/// A single numeric value on the wire
///
/// `scale` is a power-of-ten exponent applied after decoding: a register
/// holding deciamps carries `scale: -1`, one holding milliwatt-hours
/// `scale: -6` for a kWh result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueReg {
    pub address: u16,
    pub bank: Bank,
    pub encoding: RegEncoding,
    pub scale: i8,
}

impl ValueReg {
    pub fn holding(address: u16, encoding: RegEncoding) -> Self {
        Self {
            address,
            bank: Bank::Holding,
            encoding,
            scale: 0,
        }
    }

    pub fn input(address: u16, encoding: RegEncoding) -> Self {
        Self {
            address,
            bank: Bank::Input,
            encoding,
            scale: 0,
        }
    }

    pub fn scaled(mut self, scale: i8) -> Self {
        self.scale = scale;
        self
    }

    /// Decode raw register words into an engineering value
    pub fn decode(&self, words: &[u16]) -> Result<f64> {
        let raw = match self.encoding {
            RegEncoding::U16 => decode::u16_be(words)? as f64,
            RegEncoding::U16Le => decode::u16_le(words)? as f64,
            RegEncoding::U32Be => decode::u32_be(words)? as f64,
            RegEncoding::U32Le => decode::u32_le(words)? as f64,
            RegEncoding::U32Swapped => decode::u32_swapped(words)? as f64,
            RegEncoding::F32Be => decode::f32_be(words)? as f64,
            RegEncoding::F32Swapped => decode::f32_swapped(words)? as f64,
            RegEncoding::F64Be => decode::f64_be(words)?,
        };
        Ok(decode::scaled(raw, self.scale))
    }

    fn offset(mut self, by: u16) -> Self {
        self.address += by;
        self
    }
}

/// How the raw status read maps onto [`ChargeStatus`]
#[derive(Debug, Clone, Copy)]
pub enum StatusDecode {
    /// Vendor-specific numeric code table
    Code(fn(u16) -> Option<ChargeStatus>),
    /// Single register holding the ASCII code of the status letter
    AsciiLetter,
    /// ASCII text block mapped through a vendor table
    Text {
        count: u16,
        map: fn(&str) -> Option<ChargeStatus>,
    },
}

/// Where and how the charge status is read
#[derive(Debug, Clone, Copy)]
pub struct StatusSpec {
    pub address: u16,
    pub bank: Bank,
    pub decode: StatusDecode,
}

impl StatusSpec {
    /// Registers to read for one status sample
    pub fn words(&self) -> u16 {
        match self.decode {
            StatusDecode::Code(_) | StatusDecode::AsciiLetter => 1,
            StatusDecode::Text { count, .. } => count,
        }
    }

    /// Interpret a raw status read
    pub fn interpret(&self, words: &[u16]) -> Result<ChargeStatus> {
        match self.decode {
            StatusDecode::Code(map) => {
                let raw = decode::u16_be(words)?;
                map(raw).ok_or_else(|| AstrapeError::invalid_status(raw))
            }
            StatusDecode::AsciiLetter => {
                let raw = decode::u16_be(words)?;
                u8::try_from(raw)
                    .ok()
                    .and_then(|b| ChargeStatus::from_letter(b as char))
                    .ok_or_else(|| AstrapeError::invalid_status(raw))
            }
            StatusDecode::Text { map, .. } => {
                let text = decode::ascii(words)?;
                map(text.trim()).ok_or_else(|| AstrapeError::invalid_status(text.trim()))
            }
        }
    }

    fn offset(mut self, by: u16) -> Self {
        self.address += by;
        self
    }
}

/// Register words produced by encoding a current limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteWords {
    One(u16),
    Two([u16; 2]),
}

/// How the current limit register expects its value
#[derive(Debug, Clone, Copy)]
pub enum CurrentWrite {
    /// `amps * multiplier`, rounded, as a single register
    ScaledU16 { multiplier: u16 },
    /// IEEE 754 single across two registers
    F32Be,
    /// Power setpoint in watts: `amps * voltage * active_phases`
    Power { voltage: f64 },
}

/// The writable current limit register
#[derive(Debug, Clone, Copy)]
pub struct CurrentLimitSpec {
    pub address: u16,
    pub write: CurrentWrite,
}

impl CurrentLimitSpec {
    /// Registers occupied by the limit value
    pub fn words(&self) -> u16 {
        match self.write {
            CurrentWrite::ScaledU16 { .. } | CurrentWrite::Power { .. } => 1,
            CurrentWrite::F32Be => 2,
        }
    }

    /// Decode a readback of the limit register into amperes
    ///
    /// Used for register-authoritative enabled queries and for reconciling
    /// cached state against the device after a restart.
    pub fn decode_amps(&self, words: &[u16], phases: u8) -> Result<f64> {
        match self.write {
            CurrentWrite::ScaledU16 { multiplier } => {
                Ok(decode::u16_be(words)? as f64 / multiplier as f64)
            }
            CurrentWrite::F32Be => Ok(decode::f32_be(words)? as f64),
            CurrentWrite::Power { voltage } => {
                Ok(decode::u16_be(words)? as f64 / (voltage * phases.max(1) as f64))
            }
        }
    }

    /// Encode an ampere value for the wire
    ///
    /// `phases` only matters for power-setpoint vendors; it is the active
    /// phase count the loadpoint currently offers.
    pub fn encode(&self, amps: f64, phases: u8) -> WriteWords {
        match self.write {
            CurrentWrite::ScaledU16 { multiplier } => {
                WriteWords::One((amps * multiplier as f64).round() as u16)
            }
            CurrentWrite::F32Be => WriteWords::Two(decode::encode_f32_be(amps as f32)),
            CurrentWrite::Power { voltage } => {
                WriteWords::One((amps * voltage * phases as f64).round() as u16)
            }
        }
    }

    /// Whether this limit register accepts fractional amperes
    pub fn supports_millis(&self) -> bool {
        match self.write {
            CurrentWrite::ScaledU16 { multiplier } => multiplier > 1,
            CurrentWrite::F32Be => true,
            CurrentWrite::Power { .. } => false,
        }
    }

    fn offset(mut self, by: u16) -> Self {
        self.address += by;
        self
    }
}

/// Explicit start/stop command register used by vendors that gate charging
/// on a session command rather than just the current limit
#[derive(Debug, Clone, Copy)]
pub struct SessionCommand {
    pub address: u16,
    pub start_value: u16,
    pub stop_value: u16,
    /// When set, the start command is only issued if the gate register
    /// currently holds an accepted value (e.g. "session stopped"). Stop is
    /// never gated.
    pub start_gate: Option<CommandGate>,
}

/// Read-before-command gate on a session command
#[derive(Debug, Clone, Copy)]
pub struct CommandGate {
    pub address: u16,
    pub bank: Bank,
    pub accepts: fn(u16) -> bool,
}

impl SessionCommand {
    fn offset(mut self, by: u16) -> Self {
        self.address += by;
        self.start_gate = self.start_gate.map(|mut g| {
            g.address += by;
            g
        });
        self
    }
}

/// How enable and disable reach the device
#[derive(Debug, Clone, Copy)]
pub struct EnableSpec {
    /// Write the cached current limit on enable and the disable value on
    /// disable
    pub write_current: bool,
    /// Enable coil toggled alongside (or instead of) the current write
    pub coil: Option<u16>,
    /// Session start/stop command written after the current write
    pub command: Option<SessionCommand>,
    /// Raw register value meaning "disabled" when plain zero is not it
    pub disable_raw: Option<u16>,
}

impl EnableSpec {
    fn offset(mut self, by: u16) -> Self {
        self.coil = self.coil.map(|a| a + by);
        self.command = self.command.map(|c| c.offset(by));
        self
    }
}

/// Where the enabled state is read back from
#[derive(Debug, Clone, Copy)]
pub enum EnabledSource {
    /// A nonzero current limit register means enabled (register-authoritative)
    CurrentLimit,
    /// A dedicated coil reports the state
    Coil { address: u16 },
    /// No readable state on the device; the adapter tracks its own writes.
    /// Out of sync after external writes or device restarts, so only used
    /// where the hardware offers nothing better.
    Local,
}

impl EnabledSource {
    fn offset(self, by: u16) -> Self {
        match self {
            EnabledSource::Coil { address } => EnabledSource::Coil {
                address: address + by,
            },
            other => other,
        }
    }
}

/// What the keep-alive tick writes
#[derive(Debug, Clone, Copy)]
pub enum HeartbeatAction {
    /// Rewrite the current limit register with the cached value
    RewriteCurrent,
    /// Write 1 to a dedicated life-bit register
    LifeBit { address: u16 },
}

/// Failsafe keep-alive description
///
/// `timeout` is read once at construction; a value of zero means the
/// failsafe is disabled on the device and no keep-alive runs. The scale on
/// the timeout register must yield seconds.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSpec {
    pub timeout: ValueReg,
    pub action: HeartbeatAction,
}

impl HeartbeatSpec {
    fn offset(mut self, by: u16) -> Self {
        self.timeout = self.timeout.offset(by);
        self.action = match self.action {
            HeartbeatAction::LifeBit { address } => HeartbeatAction::LifeBit {
                address: address + by,
            },
            other => other,
        };
        self
    }
}

/// Metering registers, all optional
#[derive(Debug, Clone, Copy, Default)]
pub struct MeterSpec {
    /// Instantaneous power, scaled to watts
    pub power: Option<ValueReg>,
    /// Lifetime energy, scaled to kWh
    pub total_energy: Option<ValueReg>,
    /// Session energy, scaled to kWh
    pub session_energy: Option<ValueReg>,
    /// Per-phase currents, scaled to amperes
    pub currents: Option<[ValueReg; 3]>,
    /// Per-phase voltages, scaled to volts
    pub voltages: Option<[ValueReg; 3]>,
}

impl MeterSpec {
    fn offset(mut self, by: u16) -> Self {
        self.power = self.power.map(|r| r.offset(by));
        self.total_energy = self.total_energy.map(|r| r.offset(by));
        self.session_energy = self.session_energy.map(|r| r.offset(by));
        self.currents = self.currents.map(|rs| rs.map(|r| r.offset(by)));
        self.voltages = self.voltages.map(|rs| rs.map(|r| r.offset(by)));
        self
    }
}

/// Character encoding of a string register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ascii,
    Utf16Be,
    Utf16Le,
}

/// A string value on the wire (RFID tags, serial numbers)
#[derive(Debug, Clone, Copy)]
pub struct StringReg {
    pub address: u16,
    pub bank: Bank,
    pub count: u16,
    pub encoding: StringEncoding,
}

impl StringReg {
    /// Decode raw words into a trimmed string
    pub fn decode(&self, words: &[u16]) -> Result<String> {
        match self.encoding {
            StringEncoding::Ascii => decode::ascii(words),
            StringEncoding::Utf16Be => decode::utf16_be(words),
            StringEncoding::Utf16Le => decode::utf16_le(words),
        }
    }

    fn offset(mut self, by: u16) -> Self {
        self.address += by;
        self
    }
}

/// 1-phase/3-phase switch register
///
/// Readback is rarely offered by hardware; when absent the adapter tracks
/// the last written value.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSwitchSpec {
    pub address: u16,
    pub one_value: u16,
    pub three_value: u16,
    pub readback: Option<ValueReg>,
}

impl PhaseSwitchSpec {
    fn offset(mut self, by: u16) -> Self {
        self.address += by;
        self.readback = self.readback.map(|r| r.offset(by));
        self
    }
}

/// One labelled raw value in the diagnostic dump
#[derive(Debug, Clone)]
pub struct DiagReg {
    pub label: &'static str,
    pub item: DiagItem,
}

#[derive(Debug, Clone, Copy)]
pub enum DiagItem {
    Value(ValueReg),
    Text(StringReg),
}

impl DiagReg {
    pub fn value(label: &'static str, reg: ValueReg) -> Self {
        Self {
            label,
            item: DiagItem::Value(reg),
        }
    }

    pub fn text(label: &'static str, reg: StringReg) -> Self {
        Self {
            label,
            item: DiagItem::Text(reg),
        }
    }

    fn offset(mut self, by: u16) -> Self {
        self.item = match self.item {
            DiagItem::Value(r) => DiagItem::Value(r.offset(by)),
            DiagItem::Text(r) => DiagItem::Text(r.offset(by)),
        };
        self
    }
}

/// Complete register map and quirk description for one vendor
#[derive(Debug, Clone)]
pub struct VendorSpec {
    pub name: &'static str,
    /// Minimum settable current in whole amperes
    pub floor_amps: u16,
    /// Maximum rated current, when known up front
    pub max_amps: Option<u16>,
    /// Address stride between connectors on multi-connector devices
    pub connector_block: u16,
    /// Highest supported connector number
    pub connectors: u16,
    pub status: StatusSpec,
    pub current_limit: CurrentLimitSpec,
    pub enable: EnableSpec,
    pub enabled_source: EnabledSource,
    pub heartbeat: Option<HeartbeatSpec>,
    pub meter: MeterSpec,
    pub identify: Option<StringReg>,
    pub phase_switch: Option<PhaseSwitchSpec>,
    pub diag: Vec<DiagReg>,
}

impl VendorSpec {
    /// Rebase every address for the given 1-based connector
    ///
    /// Connector 1 is the identity. Higher connectors shift each address by
    /// `(connector - 1) * connector_block`.
    pub fn for_connector(mut self, connector: u16) -> Result<Self> {
        if connector == 0 || connector > self.connectors {
            return Err(AstrapeError::config(format!(
                "{}: connector {} out of range (1..={})",
                self.name, connector, self.connectors
            )));
        }
        let by = (connector - 1) * self.connector_block;
        if by == 0 {
            return Ok(self);
        }
        self.status = self.status.offset(by);
        self.current_limit = self.current_limit.offset(by);
        self.enable = self.enable.offset(by);
        self.enabled_source = self.enabled_source.offset(by);
        self.heartbeat = self.heartbeat.map(|h| h.offset(by));
        self.meter = self.meter.offset(by);
        self.identify = self.identify.map(|r| r.offset(by));
        self.phase_switch = self.phase_switch.map(|p| p.offset(by));
        let diag = std::mem::take(&mut self.diag);
        self.diag = diag.into_iter().map(|d| d.offset(by)).collect();
        Ok(self)
    }
}
