//! Adapter construction from configuration
//!
//! Maps the `vendor` key of a [`ChargerConfig`] to the matching constructor,
//! opening the Modbus connection with that vendor's default slave ID when
//! the configuration leaves it unset.

use crate::charger::Charger;
use crate::config::ChargerConfig;
use crate::error::{AstrapeError, Result};
use crate::modbus::Connection;
use crate::vendors::{abb, alfen, bender, heidelberg, wallbe};

/// Vendor keys accepted in configuration
pub const KNOWN_VENDORS: &[&str] = &["abb", "alfen", "bender", "heidelberg", "wallbe"];

/// Build a charger adapter from its configuration entry
///
/// Fails when the vendor key is unknown, the configuration is invalid, the
/// device is unreachable or a vendor probe rejects the device. No partial
/// adapter is ever returned.
pub async fn new_from_config(config: &ChargerConfig) -> Result<Box<dyn Charger>> {
    config.validate()?;
    let connector = u16::from(config.connector);

    match config.vendor.as_str() {
        "heidelberg" => {
            single_connector_only(config)?;
            let conn = Connection::open(&config.connection, heidelberg::DEFAULT_SLAVE).await?;
            Ok(Box::new(heidelberg::new(conn).await?))
        }
        "wallbe" => {
            single_connector_only(config)?;
            let conn = Connection::open(&config.connection, wallbe::DEFAULT_SLAVE).await?;
            Ok(Box::new(wallbe::new(conn, config.legacy).await?))
        }
        "bender" => {
            single_connector_only(config)?;
            let conn = Connection::open(&config.connection, bender::DEFAULT_SLAVE).await?;
            Ok(Box::new(bender::new(conn).await?))
        }
        "alfen" => {
            single_connector_only(config)?;
            let conn = Connection::open(&config.connection, alfen::DEFAULT_SLAVE).await?;
            Ok(Box::new(alfen::new(conn).await?))
        }
        "abb" => {
            let conn = Connection::open(&config.connection, abb::DEFAULT_SLAVE).await?;
            Ok(Box::new(abb::new(conn, connector).await?))
        }
        other => Err(AstrapeError::config(format!(
            "Unknown charger vendor '{}' (known: {})",
            other,
            KNOWN_VENDORS.join(", ")
        ))),
    }
}

fn single_connector_only(config: &ChargerConfig) -> Result<()> {
    if config.connector != 1 {
        return Err(AstrapeError::config(format!(
            "{}: connector {} not supported (single-connector device)",
            config.vendor, config.connector
        )));
    }
    Ok(())
}
