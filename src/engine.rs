//! Generic register-map charger engine
//!
//! One engine interprets any [`VendorSpec`]: reads and decodes status,
//! encodes and writes current limits, tracks the cached command state and
//! runs the failsafe keep-alive. Vendor modules contribute data and small
//! strategy functions, never their own read-decode-map loops.
//!
//! The connection and the cached state live behind a single mutex. Every
//! foreground operation and every keep-alive tick locks it, so commands
//! serialize in acquisition order and the keeper never interleaves with a
//! half-finished enable sequence.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;

use crate::charger::{ActivePhases, Capabilities, ChargeStatus, Charger, PhaseValues};
use crate::decode;
use crate::error::{AstrapeError, Result};
use crate::heartbeat::Heartbeat;
use crate::logging::{StructuredLogger, get_charger_logger};
use crate::map::{
    Bank, CurrentLimitSpec, DiagItem, EnabledSource, HeartbeatAction, StringReg, ValueReg,
    VendorSpec, WriteWords,
};
use crate::modbus::ModbusConnection;

/// Phase count assumed when no loadpoint collaborator is wired in
const DEFAULT_PHASES: u8 = 3;

/// Cached command state, reconciled against the device at construction
///
/// Never persisted: a process restart rebuilds it from the device's own
/// registers where the vendor map allows.
struct AdapterState {
    enabled: bool,
    /// Last commanded current in amperes; reused by enable and by the
    /// keep-alive. Never zero, the floor stands in until the first
    /// explicit limit command.
    last_current: f64,
    last_status: Option<ChargeStatus>,
    phases: Option<u8>,
}

struct Shared<C> {
    conn: C,
    state: AdapterState,
}

/// A charger adapter driven entirely by its vendor register map
pub struct RegisterCharger<C: ModbusConnection> {
    spec: VendorSpec,
    shared: Arc<Mutex<Shared<C>>>,
    heartbeat: Option<Heartbeat>,
    phase_source: Option<Arc<dyn ActivePhases>>,
    capabilities: Capabilities,
    logger: StructuredLogger,
}

impl<C: ModbusConnection> std::fmt::Debug for RegisterCharger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterCharger")
            .field("vendor", &self.spec.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn active_phases(source: &Option<Arc<dyn ActivePhases>>) -> u8 {
    source
        .as_ref()
        .and_then(|s| s.active_phases())
        .unwrap_or(DEFAULT_PHASES)
}

async fn read_words<C: ModbusConnection>(
    conn: &mut C,
    bank: Bank,
    address: u16,
    count: u16,
) -> Result<Vec<u16>> {
    match bank {
        Bank::Holding => conn.read_holding_registers(address, count).await,
        Bank::Input => conn.read_input_registers(address, count).await,
    }
}

async fn read_value<C: ModbusConnection>(conn: &mut C, reg: &ValueReg) -> Result<f64> {
    let words = read_words(conn, reg.bank, reg.address, reg.encoding.words()).await?;
    reg.decode(&words)
}

async fn read_string<C: ModbusConnection>(conn: &mut C, reg: &StringReg) -> Result<String> {
    let words = read_words(conn, reg.bank, reg.address, reg.count).await?;
    reg.decode(&words)
}

async fn write_limit<C: ModbusConnection>(
    conn: &mut C,
    limit: &CurrentLimitSpec,
    words: WriteWords,
) -> Result<()> {
    match words {
        WriteWords::One(value) => conn.write_single_register(limit.address, value).await,
        WriteWords::Two(values) => conn.write_multiple_registers(limit.address, &values).await,
    }
}

/// Wire form of "disabled" for a limit register
fn disable_words(limit: &CurrentLimitSpec, disable_raw: Option<u16>) -> WriteWords {
    match disable_raw {
        Some(raw) => WriteWords::One(raw),
        None => limit.encode(0.0, DEFAULT_PHASES),
    }
}

/// One keep-alive write, under the same lock as foreground commands
async fn keepalive_tick<C: ModbusConnection>(
    shared: &Mutex<Shared<C>>,
    action: HeartbeatAction,
    limit: CurrentLimitSpec,
    disable_raw: Option<u16>,
    phases: u8,
) -> Result<()> {
    let mut guard = shared.lock().await;
    let Shared { conn, state } = &mut *guard;
    match action {
        HeartbeatAction::LifeBit { address } => conn.write_single_register(address, 1).await,
        HeartbeatAction::RewriteCurrent => {
            let words = if state.enabled {
                limit.encode(state.last_current, phases)
            } else {
                disable_words(&limit, disable_raw)
            };
            write_limit(conn, &limit, words).await
        }
    }
}

impl<C: ModbusConnection + 'static> RegisterCharger<C> {
    /// Build an adapter over an already-open connection
    pub async fn new(conn: C, spec: VendorSpec, connector: u16) -> Result<Self> {
        Self::with_phase_source(conn, spec, connector, None).await
    }

    /// Build an adapter that asks `phase_source` for the active phase count
    ///
    /// Only power-setpoint vendors consult it; everyone else ignores it.
    pub async fn with_phase_source(
        mut conn: C,
        spec: VendorSpec,
        connector: u16,
        phase_source: Option<Arc<dyn ActivePhases>>,
    ) -> Result<Self> {
        let spec = spec.for_connector(connector)?;
        let logger = get_charger_logger("engine", spec.name);

        let mut state = AdapterState {
            enabled: false,
            last_current: spec.floor_amps as f64,
            last_status: None,
            phases: None,
        };

        // Reconcile cached state with the device so a restarted process
        // does not begin from fabricated values.
        match spec.enabled_source {
            EnabledSource::CurrentLimit => {
                let limit = &spec.current_limit;
                let words = conn.read_holding_registers(limit.address, limit.words()).await?;
                let paused_sentinel = match (spec.enable.disable_raw, words.first()) {
                    (Some(sentinel), Some(&raw)) => raw == sentinel,
                    _ => false,
                };
                let amps = limit.decode_amps(&words, active_phases(&phase_source))?;
                if amps > 0.0 && !paused_sentinel {
                    state.enabled = true;
                    state.last_current = amps.max(spec.floor_amps as f64);
                }
            }
            EnabledSource::Coil { address } => {
                let bits = conn.read_coils(address, 1).await?;
                state.enabled = bits.first().copied().unwrap_or(false);
            }
            EnabledSource::Local => {}
        }

        // Failsafe window, read once. Zero means the device watchdog is off
        // and no keeper runs; a failed read fails construction since running
        // without a required keeper would let the charger cut power mid-session.
        let mut keepalive = None;
        if let Some(hb) = &spec.heartbeat {
            let words = read_words(
                &mut conn,
                hb.timeout.bank,
                hb.timeout.address,
                hb.timeout.encoding.words(),
            )
            .await?;
            let seconds = hb.timeout.decode(&words)?;
            if seconds > 0.0 {
                keepalive = Some((hb.action, Duration::from_secs_f64(seconds / 2.0)));
            }
        }

        let capabilities = Capabilities {
            milliamps: spec.current_limit.supports_millis(),
            power: spec.meter.power.is_some(),
            total_energy: spec.meter.total_energy.is_some(),
            session_energy: spec.meter.session_energy.is_some(),
            currents: spec.meter.currents.is_some(),
            voltages: spec.meter.voltages.is_some(),
            identify: spec.identify.is_some(),
            phase_switching: spec.phase_switch.is_some(),
        };

        let shared = Arc::new(Mutex::new(Shared { conn, state }));

        let heartbeat = keepalive.map(|(action, period)| {
            logger.info(&format!(
                "Failsafe keep-alive running every {:.1}s",
                period.as_secs_f64()
            ));
            let limit = spec.current_limit;
            let disable_raw = spec.enable.disable_raw;
            let tick_shared = Arc::clone(&shared);
            let tick_source = phase_source.clone();
            let tick_logger = logger.clone();
            Heartbeat::spawn(period, move || {
                let shared = Arc::clone(&tick_shared);
                let source = tick_source.clone();
                let logger = tick_logger.clone();
                async move {
                    let phases = active_phases(&source);
                    let result =
                        keepalive_tick(&shared, action, limit, disable_raw, phases).await;
                    if let Err(e) = result {
                        logger.warn(&format!("Keep-alive write failed: {}", e));
                    }
                }
            })
        });

        logger.debug(&format!("{} adapter ready (connector {})", spec.name, connector));

        Ok(Self {
            spec,
            shared,
            heartbeat,
            phase_source,
            capabilities,
            logger,
        })
    }

    /// Vendor name of the underlying register map
    pub fn vendor(&self) -> &str {
        self.spec.name
    }

    /// Keep-alive tick period, when a keeper is running
    pub fn keepalive_period(&self) -> Option<Duration> {
        self.heartbeat.as_ref().map(|hb| hb.period())
    }

    /// Stop the keep-alive task without tearing the adapter down
    ///
    /// Dropping the adapter stops it too; this exists for explicit teardown
    /// paths that want the keeper gone before the connection.
    pub fn stop_heartbeat(&self) {
        if let Some(hb) = &self.heartbeat {
            hb.stop();
        }
    }

    async fn write_current_limit(&self, amps: f64) -> Result<()> {
        let floor = self.spec.floor_amps as f64;
        if amps < floor {
            return Err(AstrapeError::validation(
                "current",
                format!("{} A is below the {} A minimum", amps, floor),
            ));
        }
        if let Some(max) = self.spec.max_amps {
            if amps > max as f64 {
                return Err(AstrapeError::validation(
                    "current",
                    format!("{} A exceeds maximum rated current {} A", amps, max),
                ));
            }
        }

        let mut guard = self.shared.lock().await;
        let Shared { conn, state } = &mut *guard;
        let words = self
            .spec
            .current_limit
            .encode(amps, active_phases(&self.phase_source));
        write_limit(conn, &self.spec.current_limit, words).await?;
        state.last_current = amps;
        self.logger.debug(&format!("Current limit set to {} A", amps));
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: ModbusConnection + 'static> Charger for RegisterCharger<C> {
    async fn status(&self) -> Result<ChargeStatus> {
        let mut guard = self.shared.lock().await;
        let Shared { conn, state } = &mut *guard;
        let words = read_words(
            conn,
            self.spec.status.bank,
            self.spec.status.address,
            self.spec.status.words(),
        )
        .await?;
        let status = self.spec.status.interpret(&words)?;
        state.last_status = Some(status);
        Ok(status)
    }

    async fn enabled(&self) -> Result<bool> {
        let mut guard = self.shared.lock().await;
        let Shared { conn, state } = &mut *guard;
        match self.spec.enabled_source {
            EnabledSource::CurrentLimit => {
                let limit = &self.spec.current_limit;
                let words = conn.read_holding_registers(limit.address, limit.words()).await?;
                if let (Some(sentinel), Some(&raw)) = (self.spec.enable.disable_raw, words.first())
                {
                    if raw == sentinel {
                        return Ok(false);
                    }
                }
                let amps = limit.decode_amps(&words, active_phases(&self.phase_source))?;
                Ok(amps > 0.0)
            }
            EnabledSource::Coil { address } => {
                let bits = conn.read_coils(address, 1).await?;
                Ok(bits.first().copied().unwrap_or(false))
            }
            EnabledSource::Local => Ok(state.enabled),
        }
    }

    async fn enable(&self, on: bool) -> Result<()> {
        let mut guard = self.shared.lock().await;
        let Shared { conn, state } = &mut *guard;
        let limit = &self.spec.current_limit;
        let enable_spec = &self.spec.enable;

        if on {
            if enable_spec.write_current {
                let words = limit.encode(state.last_current, active_phases(&self.phase_source));
                write_limit(conn, limit, words).await?;
            }
            if let Some(coil) = enable_spec.coil {
                conn.write_single_coil(coil, true).await?;
            }
            if let Some(cmd) = enable_spec.command {
                let issue = match cmd.start_gate {
                    Some(gate) => {
                        let words = read_words(conn, gate.bank, gate.address, 1).await?;
                        (gate.accepts)(decode::u16_be(&words)?)
                    }
                    None => true,
                };
                if issue {
                    conn.write_single_register(cmd.address, cmd.start_value).await?;
                }
            }
        } else {
            if enable_spec.write_current {
                let words = disable_words(limit, enable_spec.disable_raw);
                write_limit(conn, limit, words).await?;
            }
            if let Some(coil) = enable_spec.coil {
                conn.write_single_coil(coil, false).await?;
            }
            if let Some(cmd) = enable_spec.command {
                conn.write_single_register(cmd.address, cmd.stop_value).await?;
            }
        }

        // only committed after every write succeeded
        state.enabled = on;
        self.logger
            .info(if on { "Charging enabled" } else { "Charging disabled" });
        Ok(())
    }

    async fn set_max_current(&self, amps: u16) -> Result<()> {
        self.write_current_limit(amps as f64).await
    }

    async fn set_max_current_millis(&self, amps: f64) -> Result<()> {
        if !self.capabilities.milliamps {
            return Err(AstrapeError::not_supported("set_max_current_millis"));
        }
        self.write_current_limit(amps).await
    }

    async fn current_power(&self) -> Result<f64> {
        match self.spec.meter.power {
            Some(reg) => {
                let mut guard = self.shared.lock().await;
                read_value(&mut guard.conn, &reg).await
            }
            None => Err(AstrapeError::not_supported("current_power")),
        }
    }

    async fn total_energy(&self) -> Result<f64> {
        match self.spec.meter.total_energy {
            Some(reg) => {
                let mut guard = self.shared.lock().await;
                read_value(&mut guard.conn, &reg).await
            }
            None => Err(AstrapeError::not_supported("total_energy")),
        }
    }

    async fn charged_energy(&self) -> Result<f64> {
        match self.spec.meter.session_energy {
            Some(reg) => {
                let mut guard = self.shared.lock().await;
                read_value(&mut guard.conn, &reg).await
            }
            None => Err(AstrapeError::not_supported("charged_energy")),
        }
    }

    async fn currents(&self) -> Result<PhaseValues> {
        match self.spec.meter.currents {
            Some(regs) => {
                let mut guard = self.shared.lock().await;
                let conn = &mut guard.conn;
                let l1 = read_value(conn, &regs[0]).await?;
                let l2 = read_value(conn, &regs[1]).await?;
                let l3 = read_value(conn, &regs[2]).await?;
                Ok(PhaseValues::new(l1, l2, l3))
            }
            None => Err(AstrapeError::not_supported("currents")),
        }
    }

    async fn voltages(&self) -> Result<PhaseValues> {
        match self.spec.meter.voltages {
            Some(regs) => {
                let mut guard = self.shared.lock().await;
                let conn = &mut guard.conn;
                let l1 = read_value(conn, &regs[0]).await?;
                let l2 = read_value(conn, &regs[1]).await?;
                let l3 = read_value(conn, &regs[2]).await?;
                Ok(PhaseValues::new(l1, l2, l3))
            }
            None => Err(AstrapeError::not_supported("voltages")),
        }
    }

    async fn identify(&self) -> Result<String> {
        match self.spec.identify {
            Some(reg) => {
                let mut guard = self.shared.lock().await;
                read_string(&mut guard.conn, &reg).await
            }
            None => Err(AstrapeError::not_supported("identify")),
        }
    }

    async fn set_phases(&self, phases: u8) -> Result<()> {
        let switch = match self.spec.phase_switch {
            Some(switch) => switch,
            None => return Err(AstrapeError::not_supported("set_phases")),
        };
        let value = match phases {
            1 => switch.one_value,
            3 => switch.three_value,
            other => {
                return Err(AstrapeError::validation(
                    "phases",
                    format!("{} is not a valid phase count (1 or 3)", other),
                ));
            }
        };

        let mut guard = self.shared.lock().await;
        let Shared { conn, state } = &mut *guard;
        conn.write_single_register(switch.address, value).await?;
        state.phases = Some(phases);
        self.logger.info(&format!("Switched to {}-phase supply", phases));
        Ok(())
    }

    async fn phases(&self) -> Result<u8> {
        let switch = match self.spec.phase_switch {
            Some(switch) => switch,
            None => return Err(AstrapeError::not_supported("phases")),
        };
        let mut guard = self.shared.lock().await;
        match switch.readback {
            Some(reg) => {
                let value = read_value(&mut guard.conn, &reg).await?;
                Ok(value.round() as u8)
            }
            // tracked locally, assumed 3-phase before the first switch
            None => Ok(guard.state.phases.unwrap_or(DEFAULT_PHASES)),
        }
    }

    async fn diagnose(&self) -> serde_json::Value {
        let mut dump = serde_json::Map::new();
        let mut guard = self.shared.lock().await;
        let Shared { conn, state } = &mut *guard;

        dump.insert("vendor".to_string(), json!(self.spec.name));
        dump.insert("enabled".to_string(), json!(state.enabled));
        dump.insert("last_current_a".to_string(), json!(state.last_current));
        if let Some(status) = state.last_status {
            dump.insert("last_status".to_string(), json!(status.to_string()));
        }
        if let Some(hb) = &self.heartbeat {
            dump.insert(
                "keepalive_period_s".to_string(),
                json!(hb.period().as_secs_f64()),
            );
        }

        for diag in &self.spec.diag {
            let value = match diag.item {
                DiagItem::Value(reg) => read_value(conn, &reg).await.map(|v| json!(v)),
                DiagItem::Text(reg) => read_string(conn, &reg).await.map(|s| json!(s)),
            };
            match value {
                Ok(value) => {
                    dump.insert(diag.label.to_string(), value);
                }
                Err(e) => {
                    self.logger
                        .debug(&format!("Diagnostic read {} failed: {}", diag.label, e));
                }
            }
        }

        serde_json::Value::Object(dump)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
