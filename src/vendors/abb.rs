//! ABB Terra AC (Modbus TCP)
//!
//! Multi-connector wallbox: every per-connector register repeats at a
//! 0x100 stride, so one map serves both sockets. Current limits are in
//! milliamps, power is a word-swapped float and the charge-point
//! identifier is UTF-16LE.

use crate::charger::ChargeStatus;
use crate::engine::RegisterCharger;
use crate::error::Result;
use crate::map::{
    Bank, CurrentLimitSpec, CurrentWrite, DiagReg, EnableSpec, EnabledSource, HeartbeatAction,
    HeartbeatSpec, MeterSpec, RegEncoding, StatusDecode, StatusSpec, StringEncoding, StringReg,
    ValueReg, VendorSpec,
};
use crate::modbus::ModbusConnection;

pub const DEFAULT_SLAVE: u8 = 1;

const CONNECTOR_BLOCK: u16 = 0x100;

const REG_STATUS: u16 = 0x04;
const REG_FAILSAFE_TIMEOUT: u16 = 0x08;
const REG_POWER: u16 = 0x10;
const REG_ENERGY: u16 = 0x12;
const REG_CURRENTS: u16 = 0x16;
const REG_VOLTAGES: u16 = 0x1A;
const REG_AMPS_CONFIG: u16 = 0x20;
const REG_IDENTIFIER: u16 = 0x30;

fn status_code(raw: u16) -> Option<ChargeStatus> {
    match raw {
        0 => Some(ChargeStatus::A),
        1 => Some(ChargeStatus::B),
        2 => Some(ChargeStatus::C),
        3 => Some(ChargeStatus::D),
        4 => Some(ChargeStatus::E),
        _ => None,
    }
}

pub fn spec() -> VendorSpec {
    VendorSpec {
        name: "abb",
        floor_amps: 6,
        max_amps: None,
        connector_block: CONNECTOR_BLOCK,
        connectors: 2,
        status: StatusSpec {
            address: REG_STATUS,
            bank: Bank::Input,
            decode: StatusDecode::Code(status_code),
        },
        current_limit: CurrentLimitSpec {
            address: REG_AMPS_CONFIG,
            write: CurrentWrite::ScaledU16 { multiplier: 1000 },
        },
        enable: EnableSpec {
            write_current: true,
            coil: None,
            command: None,
            disable_raw: None,
        },
        enabled_source: EnabledSource::CurrentLimit,
        heartbeat: Some(HeartbeatSpec {
            timeout: ValueReg::input(REG_FAILSAFE_TIMEOUT, RegEncoding::U16),
            action: HeartbeatAction::RewriteCurrent,
        }),
        meter: MeterSpec {
            power: Some(ValueReg::input(REG_POWER, RegEncoding::F32Swapped)),
            total_energy: Some(ValueReg::input(REG_ENERGY, RegEncoding::U32Swapped).scaled(-2)),
            session_energy: None,
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
            address: REG_IDENTIFIER,
            bank: Bank::Input,
            count: 8,
            encoding: StringEncoding::Utf16Le,
        }),
        phase_switch: None,
        diag: vec![
            DiagReg::value("status_raw", ValueReg::input(REG_STATUS, RegEncoding::U16)),
            DiagReg::value(
                "failsafe_timeout_s",
                ValueReg::input(REG_FAILSAFE_TIMEOUT, RegEncoding::U16),
            ),
            DiagReg::value(
                "current_limit_ma",
                ValueReg::holding(REG_AMPS_CONFIG, RegEncoding::U16),
            ),
        ],
    }
}

/// Connect to one connector of an ABB Terra AC (1-based)
pub async fn new<C: ModbusConnection + 'static>(
    conn: C,
    connector: u16,
) -> Result<RegisterCharger<C>> {
    RegisterCharger::new(conn, spec(), connector).await
}
