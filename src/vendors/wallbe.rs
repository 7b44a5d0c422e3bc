//! Wallbe Eco/Pro (Modbus TCP)
//!
//! Phoenix-Contact based controller reporting its status as a bare ASCII
//! letter and switching charging through a coil rather than the current
//! register. Two firmware generations exist: modern firmware takes the
//! limit in deciamps and reports the enable coil back; legacy firmware
//! takes whole amperes and cannot read coils, so the enabled state is
//! tracked locally and is lost across restarts.

use crate::engine::RegisterCharger;
use crate::error::Result;
use crate::map::{
    Bank, CurrentLimitSpec, CurrentWrite, DiagReg, EnableSpec, EnabledSource, MeterSpec,
    RegEncoding, StatusDecode, StatusSpec, ValueReg, VendorSpec,
};
use crate::modbus::ModbusConnection;

pub const DEFAULT_SLAVE: u8 = 255;

const REG_STATUS: u16 = 100;
const REG_CURRENTS: u16 = 114;
const REG_POWER: u16 = 120;
const REG_ENERGY: u16 = 128;
const COIL_ENABLE: u16 = 400;
const REG_AMPS_CONFIG: u16 = 528;

pub fn spec(legacy: bool) -> VendorSpec {
    VendorSpec {
        name: "wallbe",
        floor_amps: 6,
        max_amps: None,
        connector_block: 0,
        connectors: 1,
        status: StatusSpec {
            address: REG_STATUS,
            bank: Bank::Input,
            decode: StatusDecode::AsciiLetter,
        },
        current_limit: CurrentLimitSpec {
            address: REG_AMPS_CONFIG,
            write: CurrentWrite::ScaledU16 {
                multiplier: if legacy { 1 } else { 10 },
            },
        },
        enable: EnableSpec {
            write_current: false,
            coil: Some(COIL_ENABLE),
            command: None,
            disable_raw: None,
        },
        enabled_source: if legacy {
            EnabledSource::Local
        } else {
            EnabledSource::Coil {
                address: COIL_ENABLE,
            }
        },
        heartbeat: None,
        meter: MeterSpec {
            power: Some(ValueReg::input(REG_POWER, RegEncoding::U32Be)),
            total_energy: Some(ValueReg::input(REG_ENERGY, RegEncoding::U32Be).scaled(-4)),
            session_energy: None,
            currents: Some([
                ValueReg::input(REG_CURRENTS, RegEncoding::U16).scaled(-1),
                ValueReg::input(REG_CURRENTS + 1, RegEncoding::U16).scaled(-1),
                ValueReg::input(REG_CURRENTS + 2, RegEncoding::U16).scaled(-1),
            ]),
            voltages: None,
        },
        identify: None,
        phase_switch: None,
        diag: vec![
            DiagReg::value("status_raw", ValueReg::input(REG_STATUS, RegEncoding::U16)),
            DiagReg::value(
                "current_limit_raw",
                ValueReg::holding(REG_AMPS_CONFIG, RegEncoding::U16),
            ),
        ],
    }
}

pub async fn new<C: ModbusConnection + 'static>(
    conn: C,
    legacy: bool,
) -> Result<RegisterCharger<C>> {
    RegisterCharger::new(conn, spec(legacy), 1).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::ChargeStatus;

    #[test]
    fn ascii_letter_status() {
        let s = spec(false);
        assert_eq!(s.status.interpret(&[65]).unwrap(), ChargeStatus::A);
        assert_eq!(s.status.interpret(&[67]).unwrap(), ChargeStatus::C);
        assert_eq!(s.status.interpret(&[70]).unwrap(), ChargeStatus::F);
        let err = s.status.interpret(&[71]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid status: 71");
    }

    #[test]
    fn legacy_firmware_takes_whole_amps() {
        assert_eq!(
            spec(true).current_limit.encode(16.0, 3),
            crate::map::WriteWords::One(16)
        );
        assert!(!spec(true).current_limit.supports_millis());
        assert_eq!(
            spec(false).current_limit.encode(16.0, 3),
            crate::map::WriteWords::One(160)
        );
    }

    #[test]
    fn legacy_firmware_tracks_enabled_locally() {
        assert!(matches!(spec(true).enabled_source, EnabledSource::Local));
        assert!(matches!(
            spec(false).enabled_source,
            EnabledSource::Coil { address: COIL_ENABLE }
        ));
    }
}
