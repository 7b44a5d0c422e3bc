//! # Astrape - Modbus EV charger drivers
//!
//! A library of EV-charger device drivers for home energy management,
//! adapting vendor-specific Modbus register maps into one common charger
//! interface with enable/disable, current limiting and optional metering.
//!
//! ## Features
//!
//! - **One Engine, Many Vendors**: a generic register-map engine interprets
//!   per-vendor data tables instead of duplicating adapter structs
//! - **Modbus RTU and TCP**: serial multi-drop and socket transports with
//!   per-request timeouts and inter-request settling
//! - **Failsafe Keep-Alive**: background heartbeat tasks feed device
//!   watchdogs at half the configured failsafe window
//! - **State Reconciliation**: cached command state rebuilt from the
//!   device's own registers at construction
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `modbus`: Modbus RTU/TCP connections and the register I/O trait
//! - `decode`: Pure register-to-value decoding helpers
//! - `map`: Vendor register map model
//! - `engine`: The generic register-map charger engine
//! - `heartbeat`: Failsafe keep-alive task
//! - `charger`: The common charger trait and status vocabulary
//! - `vendors`: Per-vendor maps and constructors
//! - `registry`: Configuration-to-adapter dispatch

pub mod charger;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod map;
pub mod modbus;
pub mod registry;
pub mod vendors;

// Re-export commonly used types
pub use charger::{ActivePhases, Capabilities, ChargeStatus, Charger, PhaseValues};
pub use config::{ChargerConfig, Config};
pub use engine::RegisterCharger;
pub use error::{AstrapeError, Result};
pub use heartbeat::Heartbeat;
pub use map::VendorSpec;
pub use modbus::{Connection, ModbusConnection};
pub use registry::new_from_config;
