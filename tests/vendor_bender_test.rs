//! Bender CC612/CC613 adapter scenarios
//!
//! Exercises the firmware/config capability probe, the centiamp limit
//! scale, gated session commands and the life-bit keeper against a
//! scripted register bank.

mod common;

use std::time::Duration;

use astrape::charger::{ChargeStatus, Charger};
use astrape::error::AstrapeError;
use astrape::vendors::bender;
use common::{MockConnection, WriteOp};

const REG_CONFIG: u16 = 1000;
const REG_FIRMWARE: u16 = 1002;
const REG_AMPS_CONFIG: u16 = 1004;
const REG_RATED_MAX: u16 = 1006;
const REG_FAILSAFE_TIMEOUT: u16 = 1010;
const REG_LIFE_BIT: u16 = 1012;
const REG_SESSION_COMMAND: u16 = 1014;
const REG_STATUS: u16 = 104;
const REG_SESSION_STATE: u16 = 106;

/// Register bank for a controller with the given probe results
fn bender_mock(firmware: u16, config: u16, rated: u16, timeout_s: u16) -> MockConnection {
    let mock = MockConnection::new();
    mock.set_holding(REG_FIRMWARE, firmware);
    mock.set_holding(REG_CONFIG, config);
    mock.set_holding(REG_RATED_MAX, rated);
    mock.set_holding(REG_AMPS_CONFIG, 0);
    mock.set_holding(REG_FAILSAFE_TIMEOUT, timeout_s);
    mock.set_input(REG_SESSION_STATE, 0);
    mock
}

#[tokio::test]
async fn capable_firmware_resolves_centiamp_limits() {
    let mock = bender_mock(0x0012, 0x0092, 16, 0);
    mock.set_input(REG_STATUS, 3);
    let charger = bender::new(mock.clone()).await.unwrap();

    assert!(charger.capabilities().milliamps);
    assert_eq!(charger.status().await.unwrap(), ChargeStatus::C);

    charger.set_max_current(10).await.unwrap();
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(1000));
}

#[tokio::test]
async fn legacy_firmware_writes_whole_amperes() {
    let mock = bender_mock(0x0010, 0x0012, 32, 0);
    let charger = bender::new(mock.clone()).await.unwrap();

    assert!(!charger.capabilities().milliamps);
    assert!(matches!(
        charger.set_max_current_millis(6.5).await.unwrap_err(),
        AstrapeError::NotSupported { .. }
    ));

    charger.set_max_current(12).await.unwrap();
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(12));
}

#[tokio::test]
async fn fresh_enable_writes_the_floor_and_starts_a_session() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    let charger = bender::new(mock.clone()).await.unwrap();

    charger.enable(true).await.unwrap();
    assert_eq!(
        mock.writes(),
        vec![
            WriteOp::Register {
                address: REG_AMPS_CONFIG,
                value: 600
            },
            WriteOp::Register {
                address: REG_SESSION_COMMAND,
                value: 1
            },
        ]
    );
    assert!(charger.enabled().await.unwrap());
}

#[tokio::test]
async fn milliamp_setpoints_round_to_centiamps() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    let charger = bender::new(mock.clone()).await.unwrap();

    charger.set_max_current_millis(12.34).await.unwrap();
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(1234));
}

#[tokio::test(start_paused = true)]
async fn life_bit_keeper_signals_liveness() {
    let mock = bender_mock(0x0012, 0x0092, 32, 60);
    let charger = bender::new(mock.clone()).await.unwrap();

    assert_eq!(charger.keepalive_period(), Some(Duration::from_secs(30)));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(mock.holding(REG_LIFE_BIT), Some(1));
    // liveness never rewrites the limit register on this controller
    assert_eq!(mock.writes_to(REG_AMPS_CONFIG), 0);
}

#[tokio::test]
async fn unknown_status_code_is_an_error() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    mock.set_input(REG_STATUS, 99);
    let charger = bender::new(mock.clone()).await.unwrap();

    let err = charger.status().await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid status: 99");
}

#[tokio::test]
async fn start_command_skipped_while_a_session_runs() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    mock.set_input(REG_SESSION_STATE, 1);
    let charger = bender::new(mock.clone()).await.unwrap();

    charger.enable(true).await.unwrap();
    assert_eq!(mock.writes_to(REG_SESSION_COMMAND), 0);
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(600));

    // stop goes through regardless of session state
    charger.enable(false).await.unwrap();
    assert_eq!(mock.holding(REG_SESSION_COMMAND), Some(2));
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(0));
}

#[tokio::test]
async fn rated_maximum_bounds_limit_commands() {
    let mock = bender_mock(0x0012, 0x0092, 16, 0);
    let charger = bender::new(mock.clone()).await.unwrap();

    let err = charger.set_max_current(20).await.unwrap_err();
    assert!(err.to_string().contains("exceeds maximum rated current 16 A"));
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(0));

    // a zero rated-max register means the register is unimplemented
    let mock = bender_mock(0x0012, 0x0092, 0, 0);
    let charger = bender::new(mock.clone()).await.unwrap();
    charger.set_max_current(80).await.unwrap();
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(8000));
}

#[tokio::test]
async fn identify_reads_the_rfid_tag() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    mock.set_input_words(
        300,
        &[0x3034, 0x4131, 0x4232, 0x4333, 0, 0, 0, 0],
    );
    let charger = bender::new(mock.clone()).await.unwrap();

    assert!(charger.capabilities().identify);
    assert_eq!(charger.identify().await.unwrap(), "04A1B2C3");
}

#[tokio::test]
async fn meter_readings_scale_into_si_units() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    mock.set_input_words(200, &[0x0000, 0x0BB8]); // 3000 W
    mock.set_input_words(202, &[0x0000, 1234]); // 123.4 kWh lifetime
    mock.set_input_words(204, &[0x0000, 12345]); // 12.345 kWh session
    mock.set_input(210, 16000);
    mock.set_input(211, 15800);
    mock.set_input(212, 0);
    mock.set_input(214, 2301);
    mock.set_input(215, 2299);
    mock.set_input(216, 2305);
    let charger = bender::new(mock.clone()).await.unwrap();

    let close = |a: f64, b: f64| (a - b).abs() < 1e-9;

    assert_eq!(charger.current_power().await.unwrap(), 3000.0);
    assert!(close(charger.total_energy().await.unwrap(), 123.4));
    assert!(close(charger.charged_energy().await.unwrap(), 12.345));

    let currents = charger.currents().await.unwrap();
    assert_eq!(currents.to_array(), [16.0, 15.8, 0.0]);

    let voltages = charger.voltages().await.unwrap();
    assert!(close(voltages.l1, 230.1));
    assert!(close(voltages.l2, 229.9));
    assert!(close(voltages.l3, 230.5));
}

#[tokio::test]
async fn diagnose_reports_probe_registers() {
    let mock = bender_mock(0x0012, 0x0092, 32, 0);
    let charger = bender::new(mock.clone()).await.unwrap();

    let dump = charger.diagnose().await;
    assert_eq!(dump["vendor"], "bender");
    assert_eq!(dump["firmware"], 18.0);
    assert_eq!(dump["session_state"], 0.0);
    assert_eq!(dump["rated_max_a"], 32.0);
    assert!(dump.get("keepalive_period_s").is_none());
}
