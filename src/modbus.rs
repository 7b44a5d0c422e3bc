//! Modbus connection layer
//!
//! This module provides async Modbus communication over TCP sockets and RTU
//! serial lines, with per-request timeouts and an optional inter-request
//! settle delay for buses that need breathing room between frames.
//!
//! Adapters talk to the [`ModbusConnection`] trait rather than the concrete
//! [`Connection`] so tests can substitute an in-memory register bank.

use crate::config::{ConnectionConfig, TransportConfig};
use crate::error::{AstrapeError, Result};
use crate::logging::get_logger;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tokio_modbus::client::{Context, rtu, tcp};
use tokio_modbus::prelude::*;
use tokio_serial::SerialStream;

/// Timeout for establishing the initial TCP connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Register-level operations consumed by charger adapters
///
/// Errors carry the full taxonomy: transport failures, device-reported
/// protocol exceptions, and timeouts. No retries happen at this layer.
#[async_trait::async_trait]
pub trait ModbusConnection: Send {
    /// Read `count` holding registers starting at `address` (function 0x03)
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Read `count` input registers starting at `address` (function 0x04)
    async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write a single holding register (function 0x06)
    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()>;

    /// Write multiple holding registers (function 0x10)
    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;

    /// Read `count` coils starting at `address` (function 0x01)
    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>>;

    /// Write a single coil (function 0x05)
    async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<()>;
}

/// A live Modbus link to one charger (or one connector behind one slave ID)
pub struct Connection {
    ctx: Context,

    /// Per-request timeout, fixed at construction
    operation_timeout: Duration,

    /// Minimum spacing between requests; zero disables the settle wait
    request_delay: Duration,

    /// Completion time of the most recent request
    last_request: Option<Instant>,

    logger: crate::logging::StructuredLogger,
}

impl Connection {
    /// Open a connection according to the configuration
    ///
    /// Fails when the TCP endpoint is unreachable or the serial device cannot
    /// be opened, so adapter constructors surface dead devices immediately.
    pub async fn open(config: &ConnectionConfig, default_slave: u8) -> Result<Self> {
        let logger = get_logger("modbus");
        let slave_id = config.slave_id.unwrap_or(default_slave);

        let ctx = match &config.transport {
            TransportConfig::Tcp { host, port } => {
                if slave_id == 0 {
                    return Err(AstrapeError::validation(
                        "connection.slave_id",
                        "slave ID 0 is the broadcast address",
                    ));
                }
                logger.info(&format!(
                    "Connecting to Modbus TCP {}:{} (unit {})",
                    host, port, slave_id
                ));
                let stream = match timeout(
                    CONNECT_TIMEOUT,
                    TcpStream::connect((host.as_str(), *port)),
                )
                .await
                {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        return Err(AstrapeError::modbus(format!(
                            "Failed to connect to {}:{}: {}",
                            host, port, e
                        )));
                    }
                    Err(_) => {
                        return Err(AstrapeError::timeout(format!(
                            "Connection to {}:{} timed out",
                            host, port
                        )));
                    }
                };
                tcp::attach_slave(stream, Slave(slave_id))
            }
            TransportConfig::Rtu {
                device,
                baudrate,
                parity,
                data_bits,
                stop_bits,
            } => {
                if !(1..=247).contains(&slave_id) {
                    return Err(AstrapeError::validation(
                        "connection.slave_id",
                        "RTU slave ID must be between 1 and 247",
                    ));
                }
                logger.info(&format!(
                    "Opening Modbus RTU {} @ {} baud (slave {})",
                    device, baudrate, slave_id
                ));
                let builder = tokio_serial::new(device, *baudrate)
                    .parity(parity_from_str(parity)?)
                    .data_bits(data_bits_from(*data_bits)?)
                    .stop_bits(stop_bits_from(*stop_bits)?);
                let stream = SerialStream::open(&builder).map_err(|e| {
                    AstrapeError::modbus(format!("Failed to open serial device {}: {}", device, e))
                })?;
                rtu::attach_slave(stream, Slave(slave_id))
            }
        };

        Ok(Self {
            ctx,
            operation_timeout: Duration::from_millis(config.timeout_ms),
            request_delay: Duration::from_millis(config.delay_ms),
            last_request: None,
            logger,
        })
    }

    /// Wait out the configured inter-request delay
    async fn settle(&mut self) {
        if self.request_delay.is_zero() {
            return;
        }
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                sleep(self.request_delay - elapsed).await;
            }
        }
    }

    fn mark_request(&mut self) {
        self.last_request = Some(Instant::now());
    }
}

#[async_trait::async_trait]
impl ModbusConnection for Connection {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.settle().await;
        let result = timeout(
            self.operation_timeout,
            self.ctx.read_holding_registers(address, count),
        )
        .await;
        self.mark_request();
        match result {
            Ok(Ok(Ok(words))) => {
                self.logger
                    .trace(&format!("Read {} holding registers @ {}", count, address));
                Ok(words)
            }
            Ok(Ok(Err(exception))) => Err(AstrapeError::protocol(format!(
                "Read holding registers @ {} rejected: {}",
                address, exception
            ))),
            Ok(Err(e)) => Err(AstrapeError::modbus(format!(
                "Read holding registers @ {} failed: {}",
                address, e
            ))),
            Err(_) => Err(AstrapeError::timeout(format!(
                "Read holding registers @ {} timed out",
                address
            ))),
        }
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.settle().await;
        let result = timeout(
            self.operation_timeout,
            self.ctx.read_input_registers(address, count),
        )
        .await;
        self.mark_request();
        match result {
            Ok(Ok(Ok(words))) => Ok(words),
            Ok(Ok(Err(exception))) => Err(AstrapeError::protocol(format!(
                "Read input registers @ {} rejected: {}",
                address, exception
            ))),
            Ok(Err(e)) => Err(AstrapeError::modbus(format!(
                "Read input registers @ {} failed: {}",
                address, e
            ))),
            Err(_) => Err(AstrapeError::timeout(format!(
                "Read input registers @ {} timed out",
                address
            ))),
        }
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.settle().await;
        let result = timeout(
            self.operation_timeout,
            self.ctx.write_single_register(address, value),
        )
        .await;
        self.mark_request();
        match result {
            Ok(Ok(Ok(()))) => {
                self.logger
                    .debug(&format!("Wrote register {} = {}", address, value));
                Ok(())
            }
            Ok(Ok(Err(exception))) => Err(AstrapeError::protocol(format!(
                "Write register {} rejected: {}",
                address, exception
            ))),
            Ok(Err(e)) => Err(AstrapeError::modbus(format!(
                "Write register {} failed: {}",
                address, e
            ))),
            Err(_) => Err(AstrapeError::timeout(format!(
                "Write register {} timed out",
                address
            ))),
        }
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        self.settle().await;
        let result = timeout(
            self.operation_timeout,
            self.ctx.write_multiple_registers(address, values),
        )
        .await;
        self.mark_request();
        match result {
            Ok(Ok(Ok(()))) => {
                self.logger.debug(&format!(
                    "Wrote {} registers starting at {}",
                    values.len(),
                    address
                ));
                Ok(())
            }
            Ok(Ok(Err(exception))) => Err(AstrapeError::protocol(format!(
                "Write registers @ {} rejected: {}",
                address, exception
            ))),
            Ok(Err(e)) => Err(AstrapeError::modbus(format!(
                "Write registers @ {} failed: {}",
                address, e
            ))),
            Err(_) => Err(AstrapeError::timeout(format!(
                "Write registers @ {} timed out",
                address
            ))),
        }
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>> {
        self.settle().await;
        let result = timeout(self.operation_timeout, self.ctx.read_coils(address, count)).await;
        self.mark_request();
        match result {
            Ok(Ok(Ok(bits))) => Ok(bits),
            Ok(Ok(Err(exception))) => Err(AstrapeError::protocol(format!(
                "Read coils @ {} rejected: {}",
                address, exception
            ))),
            Ok(Err(e)) => Err(AstrapeError::modbus(format!(
                "Read coils @ {} failed: {}",
                address, e
            ))),
            Err(_) => Err(AstrapeError::timeout(format!(
                "Read coils @ {} timed out",
                address
            ))),
        }
    }

    async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<()> {
        self.settle().await;
        let result = timeout(
            self.operation_timeout,
            self.ctx.write_single_coil(address, on),
        )
        .await;
        self.mark_request();
        match result {
            Ok(Ok(Ok(()))) => {
                self.logger
                    .debug(&format!("Wrote coil {} = {}", address, on));
                Ok(())
            }
            Ok(Ok(Err(exception))) => Err(AstrapeError::protocol(format!(
                "Write coil {} rejected: {}",
                address, exception
            ))),
            Ok(Err(e)) => Err(AstrapeError::modbus(format!(
                "Write coil {} failed: {}",
                address, e
            ))),
            Err(_) => Err(AstrapeError::timeout(format!(
                "Write coil {} timed out",
                address
            ))),
        }
    }
}

fn parity_from_str(parity: &str) -> Result<tokio_serial::Parity> {
    match parity.to_uppercase().as_str() {
        "N" => Ok(tokio_serial::Parity::None),
        "E" => Ok(tokio_serial::Parity::Even),
        "O" => Ok(tokio_serial::Parity::Odd),
        other => Err(AstrapeError::validation(
            "connection.parity",
            format!("unknown parity {}", other),
        )),
    }
}

fn data_bits_from(bits: u8) -> Result<tokio_serial::DataBits> {
    match bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        other => Err(AstrapeError::validation(
            "connection.data_bits",
            format!("unsupported data bits {}", other),
        )),
    }
}

fn stop_bits_from(bits: u8) -> Result<tokio_serial::StopBits> {
    match bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        other => Err(AstrapeError::validation(
            "connection.stop_bits",
            format!("unsupported stop bits {}", other),
        )),
    }
}
