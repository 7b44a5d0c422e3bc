//! Bender CC612/CC613 (Modbus TCP)
//!
//! Charge controller with a firmware-dependent current resolution: firmware
//! 0.12 and later combined with the milliamp bit in the config bitfield
//! switch the limit register from whole amperes to centiamps. The probe
//! runs once at construction and fixes the scale for the adapter lifetime.
//!
//! Liveness is signalled through a dedicated life-bit register instead of
//! current rewrites, and session start commands are gated on the session
//! state so an already-running session never receives a conflicting start.

use crate::charger::ChargeStatus;
use crate::decode;
use crate::engine::RegisterCharger;
use crate::error::Result;
use crate::map::{
    Bank, CommandGate, CurrentLimitSpec, CurrentWrite, DiagReg, EnableSpec, EnabledSource,
    HeartbeatAction, HeartbeatSpec, MeterSpec, RegEncoding, SessionCommand, StatusDecode,
    StatusSpec, StringEncoding, StringReg, ValueReg, VendorSpec,
};
use crate::modbus::ModbusConnection;

pub const DEFAULT_SLAVE: u8 = 1;

const REG_CONFIG: u16 = 1000;
const REG_FIRMWARE: u16 = 1002;
const REG_AMPS_CONFIG: u16 = 1004;
const REG_RATED_MAX: u16 = 1006;
const REG_FAILSAFE_TIMEOUT: u16 = 1010;
const REG_LIFE_BIT: u16 = 1012;
const REG_SESSION_COMMAND: u16 = 1014;

const REG_STATUS: u16 = 104;
const REG_SESSION_STATE: u16 = 106;
const REG_POWER: u16 = 200;
const REG_TOTAL_ENERGY: u16 = 202;
const REG_SESSION_ENERGY: u16 = 204;
const REG_CURRENTS: u16 = 210;
const REG_VOLTAGES: u16 = 214;
const REG_RFID: u16 = 300;

/// Firmware at or above this understands centiamp limits
const MILLIAMP_MIN_FIRMWARE: u16 = 0x0012;
/// Config bitfield flag enabling centiamp resolution
const MILLIAMP_CONFIG_BIT: u16 = 0x0080;

const SESSION_START: u16 = 1;
const SESSION_STOP: u16 = 2;
/// Session state value meaning "no session running"
const SESSION_STOPPED: u16 = 0;

fn status_code(raw: u16) -> Option<ChargeStatus> {
    match raw {
        1 => Some(ChargeStatus::A),
        2 => Some(ChargeStatus::B),
        3 => Some(ChargeStatus::C),
        4 => Some(ChargeStatus::D),
        5 => Some(ChargeStatus::E),
        6 => Some(ChargeStatus::F),
        _ => None,
    }
}

/// Whether this firmware/config pair supports centiamp current limits
fn supports_milliamps(firmware: u16, config: u16) -> bool {
    firmware >= MILLIAMP_MIN_FIRMWARE && config & MILLIAMP_CONFIG_BIT != 0
}

pub fn spec(milliamp: bool, max_amps: Option<u16>) -> VendorSpec {
    VendorSpec {
        name: "bender",
        floor_amps: 6,
        max_amps,
        connector_block: 0,
        connectors: 1,
        status: StatusSpec {
            address: REG_STATUS,
            bank: Bank::Input,
            decode: StatusDecode::Code(status_code),
        },
        current_limit: CurrentLimitSpec {
            address: REG_AMPS_CONFIG,
            write: CurrentWrite::ScaledU16 {
                multiplier: if milliamp { 100 } else { 1 },
            },
        },
        enable: EnableSpec {
            write_current: true,
            coil: None,
            command: Some(SessionCommand {
                address: REG_SESSION_COMMAND,
                start_value: SESSION_START,
                stop_value: SESSION_STOP,
                start_gate: Some(CommandGate {
                    address: REG_SESSION_STATE,
                    bank: Bank::Input,
                    accepts: |raw| raw == SESSION_STOPPED,
                }),
            }),
            disable_raw: None,
        },
        enabled_source: EnabledSource::CurrentLimit,
        heartbeat: Some(HeartbeatSpec {
            timeout: ValueReg::holding(REG_FAILSAFE_TIMEOUT, RegEncoding::U16),
            action: HeartbeatAction::LifeBit {
                address: REG_LIFE_BIT,
            },
        }),
        meter: MeterSpec {
            power: Some(ValueReg::input(REG_POWER, RegEncoding::U32Be)),
            total_energy: Some(ValueReg::input(REG_TOTAL_ENERGY, RegEncoding::U32Be).scaled(-1)),
            session_energy: Some(
                ValueReg::input(REG_SESSION_ENERGY, RegEncoding::U32Be).scaled(-3),
            ),
            currents: Some([
                ValueReg::input(REG_CURRENTS, RegEncoding::U16).scaled(-3),
                ValueReg::input(REG_CURRENTS + 1, RegEncoding::U16).scaled(-3),
                ValueReg::input(REG_CURRENTS + 2, RegEncoding::U16).scaled(-3),
            ]),
            voltages: Some([
                ValueReg::input(REG_VOLTAGES, RegEncoding::U16).scaled(-1),
                ValueReg::input(REG_VOLTAGES + 1, RegEncoding::U16).scaled(-1),
                ValueReg::input(REG_VOLTAGES + 2, RegEncoding::U16).scaled(-1),
            ]),
        },
        identify: Some(StringReg {
            address: REG_RFID,
            bank: Bank::Input,
            count: 8,
            encoding: StringEncoding::Ascii,
        }),
        phase_switch: None,
        diag: vec![
            DiagReg::value("firmware", ValueReg::holding(REG_FIRMWARE, RegEncoding::U16)),
            DiagReg::value("config", ValueReg::holding(REG_CONFIG, RegEncoding::U16)),
            DiagReg::value(
                "session_state",
                ValueReg::input(REG_SESSION_STATE, RegEncoding::U16),
            ),
            DiagReg::value(
                "rated_max_a",
                ValueReg::holding(REG_RATED_MAX, RegEncoding::U16),
            ),
        ],
    }
}

/// Connect to a Bender charge controller
///
/// Probes firmware and config registers to resolve the current resolution,
/// and the rated-maximum register to bound limit commands.
pub async fn new<C: ModbusConnection + 'static>(mut conn: C) -> Result<RegisterCharger<C>> {
    let words = conn.read_holding_registers(REG_FIRMWARE, 1).await?;
    let firmware = decode::u16_be(&words)?;
    let words = conn.read_holding_registers(REG_CONFIG, 1).await?;
    let config = decode::u16_be(&words)?;
    let milliamp = supports_milliamps(firmware, config);

    let words = conn.read_holding_registers(REG_RATED_MAX, 1).await?;
    let rated = decode::u16_be(&words)?;
    let max_amps = if rated > 0 { Some(rated) } else { None };

    RegisterCharger::new(conn, spec(milliamp, max_amps), 1).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_total_over_documented_range() {
        assert_eq!(status_code(1), Some(ChargeStatus::A));
        assert_eq!(status_code(2), Some(ChargeStatus::B));
        assert_eq!(status_code(3), Some(ChargeStatus::C));
        assert_eq!(status_code(4), Some(ChargeStatus::D));
        assert_eq!(status_code(5), Some(ChargeStatus::E));
        assert_eq!(status_code(6), Some(ChargeStatus::F));
        assert_eq!(status_code(0), None);
        assert_eq!(status_code(99), None);
    }

    #[test]
    fn milliamp_probe_needs_both_firmware_and_config_bit() {
        assert!(supports_milliamps(0x0012, 0x0092));
        assert!(supports_milliamps(0x0013, 0x0080));
        // firmware too old
        assert!(!supports_milliamps(0x0010, 0x0092));
        // config bit clear
        assert!(!supports_milliamps(0x0012, 0x0012));
    }

    #[test]
    fn centiamp_scale_when_capable() {
        let s = spec(true, None);
        assert!(s.current_limit.supports_millis());
        assert_eq!(
            s.current_limit.encode(12.34, 3),
            crate::map::WriteWords::One(1234)
        );

        let s = spec(false, None);
        assert!(!s.current_limit.supports_millis());
        assert_eq!(
            s.current_limit.encode(12.0, 3),
            crate::map::WriteWords::One(12)
        );
    }

    #[test]
    fn start_command_gated_on_stopped_session() {
        let gate = spec(true, None)
            .enable
            .command
            .unwrap()
            .start_gate
            .unwrap();
        assert!((gate.accepts)(SESSION_STOPPED));
        assert!(!(gate.accepts)(1));
    }
}
