//! Ready-made boot-and-load handshake between a programmer and a device.
//!
//! The programmer asks the device to boot, waits for the boot banner,
//! sends a firmware image and waits for the load banner. The device answers
//! the boot command after a boot delay and acknowledges the image once its
//! end-of-file record arrived. Both sides are ordinary scripted machines
//! talking over a pair of connected channels.
//!
//! # Example
//!
//! ```rust
//! use scriptstate::handshake::{connect, Endpoint, HandshakeConfig};
//! use scriptstate::runtime::Scheduler;
//! use std::time::Duration;
//!
//! let config = HandshakeConfig::default();
//! let scheduler = Scheduler::new();
//! let device = Endpoint::device(&config, &scheduler).unwrap();
//! let programmer = Endpoint::programmer(&config, &scheduler).unwrap();
//! connect(&device, &programmer);
//!
//! device.start();
//! programmer.start();
//! scheduler.advance(Duration::from_millis(config.boot_delay_ms));
//!
//! assert_eq!(programmer.machine().current_state().as_deref(), Some("s_ok"));
//! assert_eq!(device.machine().current_state().as_deref(), Some("s_loaded"));
//! ```

use crate::builder::{BuildError, StateGraphBuilder, UseChannel};
use crate::channel::{ByteChannel, OpenMode};
use crate::ops::{self, Named};
use crate::runtime::{Scheduler, StateMachine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading a [`HandshakeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Timing and payloads of the handshake. Missing fields take their
/// defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Time the device spends booting before it answers.
    pub boot_delay_ms: u64,
    /// Time the programmer waits for each answer.
    pub response_timeout_ms: u64,
    pub boot_command: String,
    pub boot_banner: String,
    pub firmware: String,
    /// Line marking the end of the firmware image.
    pub eof_record: String,
    pub load_banner: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            boot_delay_ms: 500,
            response_timeout_ms: 1000,
            boot_command: "boot\n".to_string(),
            boot_banner: "boot successful\n".to_string(),
            firmware: "HULLOTHERE\n:00000001FF\n".to_string(),
            eof_record: ":00000001FF".to_string(),
            load_banner: "load successful\n".to_string(),
        }
    }
}

impl HandshakeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.boot_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

// banners are sent with their line ending but matched without it
fn line_pattern(message: &str) -> &str {
    message.trim_end_matches(['\r', '\n'])
}

/// Script of the device side: wait for the boot command, boot, announce,
/// then acknowledge the firmware image.
pub fn device_script(config: &HandshakeConfig, pipe: &ByteChannel) -> StateGraphBuilder {
    let mut builder = StateGraphBuilder::new();
    builder.set_parameter(UseChannel::new(pipe));
    builder
        .append_new(ops::expect(line_pattern(&config.boot_command)).named("s_init"))
        .append_new(ops::delay(config.boot_delay()).named("s_booting"))
        .append_new(ops::send(config.boot_banner.as_str()).named("s_firmware"))
        .append(ops::expect(config.eof_record.as_str()))
        .append_new(ops::terminal().named("s_loaded"))
        .append(ops::send(config.load_banner.as_str()));
    builder
}

/// Script of the programmer side: boot the device, send the firmware and
/// give up if either answer takes longer than the response timeout.
pub fn programmer_script(config: &HandshakeConfig, pipe: &ByteChannel) -> StateGraphBuilder {
    let timeout = config.response_timeout();
    let mut builder = StateGraphBuilder::new();
    builder.set_parameter(UseChannel::new(pipe));
    builder
        .append_new(ops::send(config.boot_command.as_str()).named("s_boot"))
        .append(ops::expect(line_pattern(&config.boot_banner)).within(timeout))
        .append_new(ops::send(config.firmware.as_str()).named("s_send"))
        .append(ops::expect(line_pattern(&config.load_banner)).within(timeout))
        .append_new(ops::terminal().named("s_ok"))
        .append_new(ops::terminal().failure().named("s_failed"));
    builder
}

/// One side of the handshake: its channel and the machine driving it.
pub struct Endpoint {
    pipe: ByteChannel,
    machine: StateMachine,
}

impl Endpoint {
    pub fn device(config: &HandshakeConfig, scheduler: &Scheduler) -> Result<Self, BuildError> {
        let pipe = ByteChannel::new(OpenMode::ReadWrite);
        let machine = device_script(config, &pipe).build(scheduler)?;
        Ok(Self { pipe, machine })
    }

    pub fn programmer(config: &HandshakeConfig, scheduler: &Scheduler) -> Result<Self, BuildError> {
        let pipe = ByteChannel::new(OpenMode::ReadWrite);
        let machine = programmer_script(config, &pipe).build(scheduler)?;
        Ok(Self { pipe, machine })
    }

    pub fn pipe(&self) -> &ByteChannel {
        &self.pipe
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn start(&self) {
        self.machine.start();
    }

    pub fn stop(&self) {
        self.machine.stop();
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }
}

/// Attach the pipes of `a` and `b` to each other.
pub fn connect(a: &Endpoint, b: &Endpoint) {
    a.pipe.attach(&b.pipe);
    b.pipe.attach(&a.pipe);
}
