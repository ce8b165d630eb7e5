//! Boot-and-Load Handshake
//!
//! This demo runs a programmer and a device against each other on one
//! virtual clock and prints the traffic between them.
//!
//! Key concepts:
//! - Two scripted machines sharing a scheduler
//! - Expect timeouts falling back to a failure terminal
//! - Observers printing channel traffic
//! - Optional JSON configuration
//!
//! Run with: cargo run --example handshake [config.json]
//! Set RUST_LOG=scriptstate=debug to see every transition.

use scriptstate::handshake::{connect, Endpoint, HandshakeConfig};
use scriptstate::observer::{observe_channel, Observer};
use scriptstate::runtime::Scheduler;
use std::rc::Rc;
use std::time::Duration;

/// Prints what the programmer sends (`>`) and receives (`<`).
struct Console {
    clock: Scheduler,
}

impl Console {
    fn print(&self, prefix: &str, data: &[u8]) {
        for line in String::from_utf8_lossy(data).lines() {
            println!("[{:>5}ms] {prefix} {line}", self.clock.now().as_millis());
        }
    }
}

impl Observer for Console {
    fn on_state_changed(&self, state: &str) {
        println!("[{:>5}ms]   programmer -> {state}", self.clock.now().as_millis());
    }

    fn on_outgoing(&self, data: &[u8]) {
        self.print(">", data);
    }

    fn on_incoming(&self, data: &[u8]) {
        self.print("<", data);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => HandshakeConfig::from_file(path)?,
        None => HandshakeConfig::default(),
    };

    println!("=== Boot-and-Load Handshake ===\n");
    println!("Boot delay:       {}ms", config.boot_delay_ms);
    println!("Response timeout: {}ms\n", config.response_timeout_ms);

    let scheduler = Scheduler::new();
    let device = Endpoint::device(&config, &scheduler)?;
    let programmer = Endpoint::programmer(&config, &scheduler)?;
    connect(&device, &programmer);

    let console = Rc::new(Console {
        clock: scheduler.clone(),
    });
    observe_channel(programmer.pipe(), console.clone());
    programmer.machine().add_observer(console);

    device.start();
    programmer.start();

    let step = Duration::from_millis(10);
    while programmer.is_running() && scheduler.pending() > 0 {
        scheduler.advance(step);
    }

    let outcome = programmer.machine().current_state().unwrap_or_default();
    println!("\nProgrammer finished in {outcome}");
    println!(
        "Device is in {}",
        device.machine().current_state().unwrap_or_default()
    );
    println!("\nProgrammer history:");
    for transition in programmer.machine().history().transitions() {
        println!(
            "  {:>5}ms  {} -> {}  ({})",
            transition.at.as_millis(),
            transition.from,
            transition.to,
            transition.trigger
        );
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
