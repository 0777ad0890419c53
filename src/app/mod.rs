//! Application core: session orchestration, zero I/O.
//!
//! This module contains the business rules for the VitalBand measurement
//! sessions: command arbitration, FSM sequencing, effect execution and
//! hardware lease reconciliation.  All interaction with hardware and the
//! rest of the firmware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
