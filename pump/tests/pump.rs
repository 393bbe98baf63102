//! Integration tests for the event pump.

use bytes::Bytes;
use event_pump::{Config, EventPump, PumpError, PushOutcome};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn pump_with_capacity(queue_size: usize) -> Arc<EventPump> {
    Arc::new(EventPump::new(Config { queue_size }))
}

#[test]
fn events_are_delivered_in_order() {
    let pump = pump_with_capacity(10);
    assert_eq!(pump.push(Bytes::from_static(b"one")), PushOutcome::Queued);
    assert_eq!(pump.push(Bytes::from_static(b"two")), PushOutcome::Queued);
    assert_eq!(pump.push(Bytes::from_static(b"three")), PushOutcome::Queued);

    let mut buf = [0u8; 16];
    let n = pump.wait_event(&mut buf, None).unwrap();
    assert_eq!(&buf[..n], b"one");
    let n = pump.wait_event(&mut buf, None).unwrap();
    assert_eq!(&buf[..n], b"two");
    let n = pump.wait_event(&mut buf, None).unwrap();
    assert_eq!(&buf[..n], b"three");
}

#[test]
fn saturation_drops_the_overflow_event_only() {
    let pump = pump_with_capacity(2);
    assert_eq!(pump.push(Bytes::from_static(b"a")), PushOutcome::Queued);
    assert_eq!(pump.push(Bytes::from_static(b"b")), PushOutcome::Queued);
    assert_eq!(pump.push(Bytes::from_static(b"c")), PushOutcome::Dropped);

    assert_eq!(pump.dropped(), 1);
    assert_eq!(pump.queued(), 2);

    // the accepted events are intact
    let mut buf = [0u8; 4];
    assert_eq!(pump.wait_event(&mut buf, None).unwrap(), 1);
    assert_eq!(buf[0], b'a');
    assert_eq!(pump.wait_event(&mut buf, None).unwrap(), 1);
    assert_eq!(buf[0], b'b');
}

#[test]
fn oversized_and_empty_events_are_discarded() {
    let pump = pump_with_capacity(10);
    pump.push(Bytes::from_static(b""));
    pump.push(Bytes::from_static(b"way too large"));
    pump.push(Bytes::from_static(b"ok"));

    let mut buf = [0u8; 4];
    let n = pump.wait_event(&mut buf, None).unwrap();
    assert_eq!(&buf[..n], b"ok");
    assert_eq!(pump.discarded(), 2);
}

#[test]
fn waiter_is_resumed_by_push() {
    let pump = pump_with_capacity(10);
    let consumer = {
        let pump = pump.clone();
        thread::spawn(move || {
            let mut buf = [0u8; 8];
            let n = pump.wait_event(&mut buf, None)?;
            Ok::<_, PumpError>(buf[..n].to_vec())
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(pump.push(Bytes::from_static(b"ping")), PushOutcome::Queued);
    assert_eq!(consumer.join().unwrap().unwrap(), b"ping");
}

#[test]
fn second_concurrent_waiter_is_rejected() {
    let pump = pump_with_capacity(10);
    let first = {
        let pump = pump.clone();
        thread::spawn(move || {
            let mut buf = [0u8; 8];
            pump.wait_event(&mut buf, None).map(|_| ())
        })
    };
    thread::sleep(Duration::from_millis(50));

    let mut buf = [0u8; 8];
    assert_eq!(
        pump.wait_event(&mut buf, Some(Duration::from_millis(100))),
        Err(PumpError::WaiterAlreadyRegistered)
    );

    pump.push(Bytes::from_static(b"x"));
    first.join().unwrap().unwrap();
}

#[test]
fn wait_times_out_when_nothing_arrives() {
    let pump = pump_with_capacity(10);
    let mut buf = [0u8; 8];
    assert_eq!(
        pump.wait_event(&mut buf, Some(Duration::from_millis(50))),
        Err(PumpError::TimedOut)
    );
}

#[test]
fn stop_unblocks_the_waiter_and_drains() {
    let pump = pump_with_capacity(10);
    let consumer = {
        let pump = pump.clone();
        thread::spawn(move || {
            let mut buf = [0u8; 8];
            pump.wait_event(&mut buf, None)
        })
    };
    thread::sleep(Duration::from_millis(50));

    pump.push(Bytes::from_static(b"sneaky"));
    // the push may win the race and resume the waiter with data; that is
    // fine, stopping afterwards must still leave the pump empty and stopped
    pump.stop();

    match consumer.join().unwrap() {
        Ok(_) | Err(PumpError::Stopped) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(pump.queued(), 0);
    assert_eq!(pump.push(Bytes::from_static(b"late")), PushOutcome::Dropped);
}
