//! Shared in-memory register bank for adapter tests
//!
//! The mock is a `Clone`-shared handle: tests keep one clone to seed and
//! inspect the bank while the adapter owns another. Reads of unseeded
//! addresses fail the way a real device rejects an illegal data address,
//! so a misaddressed register map fails loudly instead of returning zeros.

// not every test binary touches every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use astrape::error::{AstrapeError, Result};
use astrape::modbus::ModbusConnection;

/// One recorded write, in issue order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Register { address: u16, value: u16 },
    Registers { address: u16, values: Vec<u16> },
    Coil { address: u16, on: bool },
}

#[derive(Default)]
struct Bank {
    holding: HashMap<u16, u16>,
    input: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
    writes: Vec<WriteOp>,
    offline: bool,
}

#[derive(Clone, Default)]
pub struct MockConnection {
    bank: Arc<Mutex<Bank>>,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_holding(&self, address: u16, value: u16) {
        self.bank.lock().unwrap().holding.insert(address, value);
    }

    pub fn set_holding_words(&self, address: u16, words: &[u16]) {
        let mut bank = self.bank.lock().unwrap();
        for (i, &word) in words.iter().enumerate() {
            bank.holding.insert(address + i as u16, word);
        }
    }

    pub fn set_input(&self, address: u16, value: u16) {
        self.bank.lock().unwrap().input.insert(address, value);
    }

    pub fn set_input_words(&self, address: u16, words: &[u16]) {
        let mut bank = self.bank.lock().unwrap();
        for (i, &word) in words.iter().enumerate() {
            bank.input.insert(address + i as u16, word);
        }
    }

    pub fn set_coil(&self, address: u16, on: bool) {
        self.bank.lock().unwrap().coils.insert(address, on);
    }

    /// Make every subsequent operation fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.bank.lock().unwrap().offline = offline;
    }

    pub fn holding(&self, address: u16) -> Option<u16> {
        self.bank.lock().unwrap().holding.get(&address).copied()
    }

    pub fn coil(&self, address: u16) -> Option<bool> {
        self.bank.lock().unwrap().coils.get(&address).copied()
    }

    pub fn writes(&self) -> Vec<WriteOp> {
        self.bank.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.bank.lock().unwrap().writes.len()
    }

    /// Number of writes (register or block) that targeted `address`
    pub fn writes_to(&self, address: u16) -> usize {
        self.bank
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|op| match op {
                WriteOp::Register { address: a, .. } => *a == address,
                WriteOp::Registers { address: a, .. } => *a == address,
                WriteOp::Coil { address: a, .. } => *a == address,
            })
            .count()
    }

    pub fn clear_writes(&self) {
        self.bank.lock().unwrap().writes.clear();
    }
}

fn illegal_address(kind: &str, address: u16) -> AstrapeError {
    AstrapeError::protocol(format!(
        "Read {} @ {} rejected: Illegal data address",
        kind, address
    ))
}

#[async_trait::async_trait]
impl ModbusConnection for MockConnection {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let bank = self.bank.lock().unwrap();
        if bank.offline {
            return Err(AstrapeError::modbus("connection lost"));
        }
        let mut out = Vec::with_capacity(count as usize);
        for offset in 0..count {
            match bank.holding.get(&(address + offset)) {
                Some(&value) => out.push(value),
                None => return Err(illegal_address("holding registers", address + offset)),
            }
        }
        Ok(out)
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let bank = self.bank.lock().unwrap();
        if bank.offline {
            return Err(AstrapeError::modbus("connection lost"));
        }
        let mut out = Vec::with_capacity(count as usize);
        for offset in 0..count {
            match bank.input.get(&(address + offset)) {
                Some(&value) => out.push(value),
                None => return Err(illegal_address("input registers", address + offset)),
            }
        }
        Ok(out)
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        let mut bank = self.bank.lock().unwrap();
        if bank.offline {
            return Err(AstrapeError::modbus("connection lost"));
        }
        bank.holding.insert(address, value);
        bank.writes.push(WriteOp::Register { address, value });
        Ok(())
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let mut bank = self.bank.lock().unwrap();
        if bank.offline {
            return Err(AstrapeError::modbus("connection lost"));
        }
        for (i, &value) in values.iter().enumerate() {
            bank.holding.insert(address + i as u16, value);
        }
        bank.writes.push(WriteOp::Registers {
            address,
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>> {
        let bank = self.bank.lock().unwrap();
        if bank.offline {
            return Err(AstrapeError::modbus("connection lost"));
        }
        let mut out = Vec::with_capacity(count as usize);
        for offset in 0..count {
            match bank.coils.get(&(address + offset)) {
                Some(&on) => out.push(on),
                None => return Err(illegal_address("coils", address + offset)),
            }
        }
        Ok(out)
    }

    async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<()> {
        let mut bank = self.bank.lock().unwrap();
        if bank.offline {
            return Err(AstrapeError::modbus("connection lost"));
        }
        bank.coils.insert(address, on);
        bank.writes.push(WriteOp::Coil { address, on });
        Ok(())
    }
}
