//! End-to-end scenarios across channels, builder and runtime.

use scriptstate::builder::{BuildError, StateGraphBuilder, UseChannel};
use scriptstate::channel::{contains_pattern, ByteChannel, OpenMode};
use scriptstate::handshake::{
    connect, device_script, programmer_script, Endpoint, HandshakeConfig,
};
use scriptstate::observer::{observe_channel, EventLog, ObservedEvent};
use scriptstate::ops::{self, Named};
use scriptstate::runtime::Scheduler;
use std::rc::Rc;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn device_boots_after_delay_and_announces_it() {
    let config = HandshakeConfig::default();
    let scheduler = Scheduler::new();
    let p = ByteChannel::new(OpenMode::ReadWrite);
    let q = ByteChannel::new(OpenMode::ReadWrite);
    p.attach(&q);
    q.attach(&p);

    let device = device_script(&config, &p).build(&scheduler).unwrap();
    let states = Rc::new(EventLog::new());
    device.add_observer(states.clone());
    let traffic = Rc::new(EventLog::new());
    observe_channel(&q, traffic.clone());
    device.start();

    q.write(b"boot\n").unwrap();
    assert_eq!(device.current_state().as_deref(), Some("s_booting"));

    scheduler.advance(ms(499));
    assert_eq!(device.current_state().as_deref(), Some("s_booting"));
    scheduler.advance(ms(1));

    assert_eq!(device.current_state().as_deref(), Some("s_firmware"));
    assert_eq!(states.states(), vec!["s_init", "s_booting", "s_firmware"]);
    assert_eq!(
        traffic.events(),
        vec![
            ObservedEvent::Outgoing {
                data: "boot\n".to_string(),
            },
            ObservedEvent::Incoming {
                data: "boot successful\n".to_string(),
            },
        ]
    );
}

#[test]
fn programmer_graph_has_boot_send_ok_and_failed() {
    let config = HandshakeConfig::default();
    let (port, _device) = ByteChannel::pair();
    let mut builder = programmer_script(&config, &port);
    builder.flush().unwrap();

    let summary = builder.summary();
    let names: Vec<_> = summary.states.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["s_boot", "s_send", "s_ok", "s_failed"]);

    let ok = &summary.states[2];
    let failed = &summary.states[3];
    assert!(ok.terminal && !ok.failure);
    assert!(failed.terminal && failed.failure);

    let into_ok = summary.incoming("s_ok");
    assert_eq!(into_ok.len(), 1);
    assert_eq!(into_ok[0].from, "s_send");
    assert_eq!(into_ok[0].trigger, "line contains \"load successful\"");

    let into_failed = summary.incoming("s_failed");
    let sources: Vec<_> = into_failed.iter().map(|t| t.from.as_str()).collect();
    assert_eq!(sources, vec!["s_boot", "s_send"]);
    assert!(into_failed.iter().all(|t| t.trigger == "after 1000ms"));
}

#[test]
fn full_handshake_ends_in_ok_and_loaded() {
    let config = HandshakeConfig::default();
    let scheduler = Scheduler::new();
    let device = Endpoint::device(&config, &scheduler).unwrap();
    let programmer = Endpoint::programmer(&config, &scheduler).unwrap();
    connect(&device, &programmer);
    let log = Rc::new(EventLog::new());
    observe_channel(programmer.pipe(), log.clone());

    device.start();
    programmer.start();
    assert!(device.is_running() && programmer.is_running());
    scheduler.advance(ms(500));

    assert!(!programmer.is_running());
    assert!(!device.is_running());
    assert_eq!(programmer.machine().current_state().as_deref(), Some("s_ok"));
    assert_eq!(device.machine().current_state().as_deref(), Some("s_loaded"));
    assert_eq!(log.outgoing(), "boot\nHULLOTHERE\n:00000001FF\n");
    assert_eq!(log.incoming(), "boot successful\nload successful\n");
    assert_eq!(
        programmer.machine().history().get_path(),
        vec!["s_boot", "s_send", "s_ok"]
    );
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn slow_device_makes_programmer_fail() {
    let config = HandshakeConfig {
        boot_delay_ms: 1500,
        ..HandshakeConfig::default()
    };
    let scheduler = Scheduler::new();
    let device = Endpoint::device(&config, &scheduler).unwrap();
    let programmer = Endpoint::programmer(&config, &scheduler).unwrap();
    connect(&device, &programmer);

    device.start();
    programmer.start();
    scheduler.advance(ms(1000));

    assert_eq!(programmer.machine().current_state().as_deref(), Some("s_failed"));
    assert!(programmer.machine().graph().state(
        programmer.machine().graph().find("s_failed").unwrap()
    ).is_failure());

    // the device still boots, but nobody is listening any more
    scheduler.advance(ms(500));
    assert_eq!(device.machine().current_state().as_deref(), Some("s_firmware"));
    assert!(device.is_running());
}

#[test]
fn leaving_a_state_early_cancels_its_delay() {
    let scheduler = Scheduler::new();
    let (port, peer) = ByteChannel::pair();
    let mut builder = StateGraphBuilder::new();
    builder.set_parameter(UseChannel::new(&port));
    builder
        .append_new(ops::delay(ms(1000)).to("b").named("a"))
        .append(ops::expect("go").to("c"))
        .append_new(ops::terminal().named("b"))
        .append_new(ops::terminal().named("c"));
    let machine = builder.build(&scheduler).unwrap();

    machine.start();
    scheduler.advance(ms(300));
    peer.write(b"go\n").unwrap();
    scheduler.advance(ms(5000));

    assert_eq!(machine.current_state().as_deref(), Some("c"));
    assert_eq!(machine.history().get_path(), vec!["a", "c"]);
}

#[test]
fn reentering_a_state_restarts_its_delay() {
    let scheduler = Scheduler::new();
    let (port, peer) = ByteChannel::pair();
    let mut builder = StateGraphBuilder::new();
    builder.set_parameter(UseChannel::new(&port));
    builder
        .append_new(ops::delay(ms(1000)).to("b").named("a"))
        .append(ops::expect("again").to("a"))
        .append_new(ops::terminal().named("b"));
    let machine = builder.build(&scheduler).unwrap();

    machine.start();
    scheduler.advance(ms(600));
    peer.write(b"again\n").unwrap();
    scheduler.advance(ms(400));
    assert_eq!(machine.current_state().as_deref(), Some("a"));

    scheduler.advance(ms(600));
    assert_eq!(machine.current_state().as_deref(), Some("b"));
    assert_eq!(machine.history().elapsed(), Some(ms(1000)));
}

#[test]
fn matcher_consumes_lines_it_checked() {
    let (tx, rx) = ByteChannel::pair();
    tx.write(b"boot\nfoo\n").unwrap();

    assert!(contains_pattern(&rx, b"boot"));
    assert!(!contains_pattern(&rx, b"foo"));
}

#[test]
fn fan_out_reaches_peers_in_attachment_order() {
    let source = ByteChannel::new(OpenMode::ReadWrite);
    let x = ByteChannel::new(OpenMode::ReadWrite);
    let y = ByteChannel::new(OpenMode::ReadWrite);
    source.attach(&x);
    source.attach(&y);

    let order = Rc::new(std::cell::RefCell::new(Vec::new()));
    for (tag, peer) in [("x", &x), ("y", &y)] {
        let order = Rc::clone(&order);
        peer.subscribe(move |_, event| {
            if let scriptstate::channel::ChannelEvent::Incoming(data) = event {
                order
                    .borrow_mut()
                    .push(format!("{tag}:{}", String::from_utf8_lossy(data)));
            }
        });
    }

    source.write(b"1").unwrap();
    source.write(b"2").unwrap();

    assert_eq!(*order.borrow(), vec!["x:1", "y:1", "x:2", "y:2"]);
}

#[test]
fn missing_channel_fails_before_any_state_is_created() {
    let scheduler = Scheduler::new();
    let mut builder = StateGraphBuilder::new();
    builder
        .append_new(ops::send("boot\n").named("s_boot"))
        .append(ops::expect("boot successful").within(ms(1000)))
        .append_new(ops::terminal().named("s_ok"))
        .append_new(ops::terminal().failure().named("s_failed"));

    assert!(matches!(
        builder.flush(),
        Err(BuildError::MissingParameter { op: "Send", param: "channel" })
    ));
    assert!(builder.graph().is_empty());

    let result = builder.build(&scheduler);
    assert!(matches!(result, Err(BuildError::EmptyGraph)));
}
