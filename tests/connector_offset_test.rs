//! ABB Terra AC two-connector scenarios
//!
//! Both connectors live on one Modbus line, each behind its own register
//! block. Two adapters over a shared bank must never cross into each
//! other's block.

mod common;

use std::time::Duration;

use astrape::charger::{ChargeStatus, Charger};
use astrape::vendors::abb;
use common::MockConnection;

const BLOCK: u16 = 0x100;
const REG_STATUS: u16 = 0x04;
const REG_FAILSAFE_TIMEOUT: u16 = 0x08;
const REG_POWER: u16 = 0x10;
const REG_ENERGY: u16 = 0x12;
const REG_CURRENTS: u16 = 0x16;
const REG_AMPS_CONFIG: u16 = 0x20;
const REG_IDENTIFIER: u16 = 0x30;

/// Seed the construction registers of one connector block
fn seed_connector(mock: &MockConnection, connector: u16, timeout_s: u16) {
    let base = (connector - 1) * BLOCK;
    mock.set_holding(base + REG_AMPS_CONFIG, 0);
    mock.set_input(base + REG_FAILSAFE_TIMEOUT, timeout_s);
}

#[tokio::test]
async fn limit_writes_stay_inside_the_connector_block() {
    let mock = MockConnection::new();
    seed_connector(&mock, 1, 0);
    seed_connector(&mock, 2, 0);
    let c1 = abb::new(mock.clone(), 1).await.unwrap();
    let c2 = abb::new(mock.clone(), 2).await.unwrap();

    c2.set_max_current(6).await.unwrap();
    assert_eq!(mock.holding(BLOCK + REG_AMPS_CONFIG), Some(6000));
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(0));

    c1.set_max_current(10).await.unwrap();
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(10000));
    assert_eq!(mock.holding(BLOCK + REG_AMPS_CONFIG), Some(6000));
}

#[tokio::test]
async fn each_connector_reports_its_own_status() {
    let mock = MockConnection::new();
    seed_connector(&mock, 1, 0);
    seed_connector(&mock, 2, 0);
    mock.set_input(REG_STATUS, 2);
    mock.set_input(BLOCK + REG_STATUS, 0);
    let c1 = abb::new(mock.clone(), 1).await.unwrap();
    let c2 = abb::new(mock.clone(), 2).await.unwrap();

    assert_eq!(c1.status().await.unwrap(), ChargeStatus::C);
    assert_eq!(c2.status().await.unwrap(), ChargeStatus::A);
}

#[tokio::test]
async fn identifier_is_utf16_little_endian() {
    let mock = MockConnection::new();
    seed_connector(&mock, 2, 0);
    mock.set_input_words(
        BLOCK + REG_IDENTIFIER,
        &[0x5400, 0x4100, 0x4300, 0x5700, 0x3200, 0x3200, 0, 0],
    );
    let c2 = abb::new(mock.clone(), 2).await.unwrap();

    assert_eq!(c2.identify().await.unwrap(), "TACW22");
}

#[tokio::test]
async fn meter_uses_swapped_word_order() {
    let mock = MockConnection::new();
    seed_connector(&mock, 1, 0);
    // 7360.0f32 is 0x45E60000, transmitted low word first
    mock.set_input_words(REG_POWER, &[0x0000, 0x45E6]);
    // 123456 * 0.01 kWh, low word first
    mock.set_input_words(REG_ENERGY, &[0xE240, 0x0001]);
    mock.set_input(REG_CURRENTS, 16000);
    mock.set_input(REG_CURRENTS + 1, 15000);
    mock.set_input(REG_CURRENTS + 2, 0);
    let c1 = abb::new(mock.clone(), 1).await.unwrap();

    assert_eq!(c1.current_power().await.unwrap(), 7360.0);
    assert!((c1.total_energy().await.unwrap() - 1234.56).abs() < 1e-9);
    assert_eq!(c1.currents().await.unwrap().to_array(), [16.0, 15.0, 0.0]);
}

#[tokio::test]
async fn milliamp_resolution_on_the_limit_register() {
    let mock = MockConnection::new();
    seed_connector(&mock, 1, 0);
    let c1 = abb::new(mock.clone(), 1).await.unwrap();

    assert!(c1.capabilities().milliamps);
    c1.set_max_current_millis(6.5).await.unwrap();
    assert_eq!(mock.holding(REG_AMPS_CONFIG), Some(6500));
}

#[tokio::test(start_paused = true)]
async fn keepers_run_per_connector() {
    let mock = MockConnection::new();
    seed_connector(&mock, 1, 10);
    seed_connector(&mock, 2, 0);
    let c1 = abb::new(mock.clone(), 1).await.unwrap();
    let c2 = abb::new(mock.clone(), 2).await.unwrap();

    assert_eq!(c1.keepalive_period(), Some(Duration::from_secs(5)));
    assert!(c2.keepalive_period().is_none());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(mock.writes_to(REG_AMPS_CONFIG) >= 1);
    assert_eq!(mock.writes_to(BLOCK + REG_AMPS_CONFIG), 0);
}

#[tokio::test]
async fn a_third_connector_is_rejected() {
    let mock = MockConnection::new();
    let err = abb::new(mock, 3).await.unwrap_err();
    assert!(err.to_string().contains("connector 3 out of range (1..=2)"));
}
