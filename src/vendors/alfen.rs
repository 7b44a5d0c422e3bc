//! Alfen Eve Single/Double (Modbus TCP)
//!
//! Float-heavy map: metering values are IEEE 754 singles (energy a double),
//! the setpoint is a float register with native sub-ampere resolution, and
//! the status arrives as short text ("A", "B1", "C2", ...). The station
//! only honours Modbus setpoints in active load balancing mode, so the
//! constructor refuses anything else.

use crate::charger::ChargeStatus;
use crate::decode;
use crate::engine::RegisterCharger;
use crate::error::{AstrapeError, Result};
use crate::map::{
    Bank, CurrentLimitSpec, CurrentWrite, DiagReg, EnableSpec, EnabledSource, HeartbeatAction,
    HeartbeatSpec, MeterSpec, PhaseSwitchSpec, RegEncoding, StatusDecode, StatusSpec, ValueReg,
    VendorSpec,
};
use crate::modbus::ModbusConnection;

pub const DEFAULT_SLAVE: u8 = 1;

const REG_VOLTAGES: u16 = 306;
const REG_CURRENTS: u16 = 320;
const REG_POWER: u16 = 344;
const REG_ENERGY: u16 = 374;
const REG_STATUS: u16 = 1201;
const REG_RATED_MAX: u16 = 1100;
const REG_FAILSAFE_TIMEOUT: u16 = 1208;
const REG_AMPS_CONFIG: u16 = 1210;
const REG_PHASES: u16 = 1215;
const REG_LB_MODE: u16 = 1400;

const STATUS_WORDS: u16 = 5;
const MODE_ACTIVE_BALANCING: u16 = 1;

/// Mode 3 text states; the digit suffix distinguishes sub-states that all
/// share one letter
fn status_text(text: &str) -> Option<ChargeStatus> {
    match text {
        "A" => Some(ChargeStatus::A),
        "B1" | "B2" => Some(ChargeStatus::B),
        "C1" | "C2" => Some(ChargeStatus::C),
        "D1" | "D2" => Some(ChargeStatus::D),
        "E" => Some(ChargeStatus::E),
        "F" => Some(ChargeStatus::F),
        _ => None,
    }
}

pub fn spec(max_amps: Option<u16>) -> VendorSpec {
    VendorSpec {
        name: "alfen",
        floor_amps: 6,
        max_amps,
        connector_block: 0,
        connectors: 1,
        status: StatusSpec {
            address: REG_STATUS,
            bank: Bank::Input,
            decode: StatusDecode::Text {
                count: STATUS_WORDS,
                map: status_text,
            },
        },
        current_limit: CurrentLimitSpec {
            address: REG_AMPS_CONFIG,
            write: CurrentWrite::F32Be,
        },
        enable: EnableSpec {
            write_current: true,
            coil: None,
            command: None,
            disable_raw: None,
        },
        enabled_source: EnabledSource::CurrentLimit,
        heartbeat: Some(HeartbeatSpec {
            timeout: ValueReg::holding(REG_FAILSAFE_TIMEOUT, RegEncoding::U16),
            action: HeartbeatAction::RewriteCurrent,
        }),
        meter: MeterSpec {
            power: Some(ValueReg::input(REG_POWER, RegEncoding::F32Be)),
            // meter reports Wh as a double
            total_energy: Some(ValueReg::input(REG_ENERGY, RegEncoding::F64Be).scaled(-3)),
            session_energy: None,
            currents: Some([
                ValueReg::input(REG_CURRENTS, RegEncoding::F32Be),
                ValueReg::input(REG_CURRENTS + 2, RegEncoding::F32Be),
                ValueReg::input(REG_CURRENTS + 4, RegEncoding::F32Be),
            ]),
            voltages: Some([
                ValueReg::input(REG_VOLTAGES, RegEncoding::F32Be),
                ValueReg::input(REG_VOLTAGES + 2, RegEncoding::F32Be),
                ValueReg::input(REG_VOLTAGES + 4, RegEncoding::F32Be),
            ]),
        },
        identify: None,
        phase_switch: Some(PhaseSwitchSpec {
            address: REG_PHASES,
            one_value: 1,
            three_value: 3,
            readback: Some(ValueReg::holding(REG_PHASES, RegEncoding::U16)),
        }),
        diag: vec![
            DiagReg::value(
                "lb_mode",
                ValueReg::holding(REG_LB_MODE, RegEncoding::U16),
            ),
            DiagReg::value(
                "setpoint_a",
                ValueReg::holding(REG_AMPS_CONFIG, RegEncoding::F32Be),
            ),
            DiagReg::value(
                "failsafe_timeout_s",
                ValueReg::holding(REG_FAILSAFE_TIMEOUT, RegEncoding::U16),
            ),
        ],
    }
}

/// Connect to an Alfen Eve
///
/// Fails when the station is not in active load balancing mode; outside
/// that mode the station ignores Modbus setpoints and charges at its own
/// configured maximum.
pub async fn new<C: ModbusConnection + 'static>(mut conn: C) -> Result<RegisterCharger<C>> {
    let words = conn.read_holding_registers(REG_LB_MODE, 1).await?;
    let mode = decode::u16_be(&words)?;
    if mode != MODE_ACTIVE_BALANCING {
        return Err(AstrapeError::config(format!(
            "Alfen: active load balancing disabled (mode register {} = {}, expected {})",
            REG_LB_MODE, mode, MODE_ACTIVE_BALANCING
        )));
    }

    let words = conn
        .read_holding_registers(REG_RATED_MAX, RegEncoding::F32Be.words())
        .await?;
    let rated = decode::f32_be(&words)?;
    let max_amps = if rated > 0.0 { Some(rated.round() as u16) } else { None };

    RegisterCharger::new(conn, spec(max_amps), 1).await
}
