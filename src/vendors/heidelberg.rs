//! Heidelberg Energy Control (Modbus RTU)
//!
//! Wallbox with a register-authoritative current limit in deciamps and a
//! watchdog configured in milliseconds. The device drops into a standby
//! state when no vehicle is connected; standby is disabled once at
//! construction so register reads keep working between sessions.

use crate::charger::ChargeStatus;
use crate::engine::RegisterCharger;
use crate::error::Result;
use crate::map::{
    Bank, CurrentLimitSpec, CurrentWrite, DiagReg, EnableSpec, EnabledSource, HeartbeatAction,
    HeartbeatSpec, MeterSpec, RegEncoding, StatusDecode, StatusSpec, ValueReg, VendorSpec,
};
use crate::modbus::ModbusConnection;

pub const DEFAULT_SLAVE: u8 = 1;

const REG_STATUS: u16 = 5;
const REG_CURRENTS: u16 = 6;
const REG_VOLTAGES: u16 = 10;
const REG_POWER: u16 = 14;
const REG_ENERGY: u16 = 17;
const REG_WATCHDOG_MS: u16 = 257;
const REG_STANDBY: u16 = 258;
const REG_AMPS_CONFIG: u16 = 261;

const STANDBY_DISABLED: u16 = 4;

/// Status codes 2..10; pairs report the same letter with and without an
/// active charging request, 8 is derating (still delivering current).
fn status_code(raw: u16) -> Option<ChargeStatus> {
    match raw {
        2 | 3 => Some(ChargeStatus::A),
        4 | 5 => Some(ChargeStatus::B),
        6 | 7 | 8 => Some(ChargeStatus::C),
        9 => Some(ChargeStatus::E),
        10 => Some(ChargeStatus::F),
        _ => None,
    }
}

pub fn spec() -> VendorSpec {
    VendorSpec {
        name: "heidelberg",
        floor_amps: 6,
        max_amps: None,
        connector_block: 0,
        connectors: 1,
        status: StatusSpec {
            address: REG_STATUS,
            bank: Bank::Input,
            decode: StatusDecode::Code(status_code),
        },
        current_limit: CurrentLimitSpec {
            address: REG_AMPS_CONFIG,
            write: CurrentWrite::ScaledU16 { multiplier: 10 },
        },
        enable: EnableSpec {
            write_current: true,
            coil: None,
            command: None,
            disable_raw: None,
        },
        enabled_source: EnabledSource::CurrentLimit,
        heartbeat: Some(HeartbeatSpec {
            // watchdog register is in milliseconds
            timeout: ValueReg::holding(REG_WATCHDOG_MS, RegEncoding::U16).scaled(-3),
            action: HeartbeatAction::RewriteCurrent,
        }),
        meter: MeterSpec {
            power: Some(ValueReg::input(REG_POWER, RegEncoding::U32Swapped)),
            total_energy: Some(ValueReg::input(REG_ENERGY, RegEncoding::U32Swapped).scaled(-3)),
            session_energy: None,
            currents: Some([
                ValueReg::input(REG_CURRENTS, RegEncoding::U16).scaled(-1),
                ValueReg::input(REG_CURRENTS + 1, RegEncoding::U16).scaled(-1),
                ValueReg::input(REG_CURRENTS + 2, RegEncoding::U16).scaled(-1),
            ]),
            voltages: Some([
                ValueReg::input(REG_VOLTAGES, RegEncoding::U16),
                ValueReg::input(REG_VOLTAGES + 1, RegEncoding::U16),
                ValueReg::input(REG_VOLTAGES + 2, RegEncoding::U16),
            ]),
        },
        identify: None,
        phase_switch: None,
        diag: vec![
            DiagReg::value("status_raw", ValueReg::input(REG_STATUS, RegEncoding::U16)),
            DiagReg::value(
                "watchdog_timeout_ms",
                ValueReg::holding(REG_WATCHDOG_MS, RegEncoding::U16),
            ),
            DiagReg::value(
                "current_limit_raw",
                ValueReg::holding(REG_AMPS_CONFIG, RegEncoding::U16),
            ),
            DiagReg::value("standby", ValueReg::holding(REG_STANDBY, RegEncoding::U16)),
        ],
    }
}

/// Connect to a Heidelberg Energy Control
///
/// Disables device standby before the engine takes over; a sleeping charger
/// answers register reads with stale values.
pub async fn new<C: ModbusConnection + 'static>(mut conn: C) -> Result<RegisterCharger<C>> {
    conn.write_single_register(REG_STANDBY, STANDBY_DISABLED).await?;
    RegisterCharger::new(conn, spec(), 1).await
}
