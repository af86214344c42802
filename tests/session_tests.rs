//! Session-level protocol tests against the mock transport

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use vici_valve_rust::error::ValveError;
use vici_valve_rust::session::{ValveSession, MAX_OPEN_ATTEMPTS};
use vici_valve_rust::transport::mock::{MockBehavior, MockFactory};
use vici_valve_rust::transport::TransportFactory;

fn make_session(factory: &Arc<MockFactory>) -> ValveSession {
    ValveSession::new(
        "v1",
        "/dev/ttyMOCK0",
        None,
        Duration::from_millis(100),
        Arc::clone(factory) as Arc<dyn TransportFactory>,
    )
}

#[tokio::test]
async fn set_then_get_round_trips_every_position() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy));
    let mut session = make_session(&factory);
    session.open().await.unwrap();

    for p in 1..=12u8 {
        session.set_position(p).await.unwrap();
        assert_eq!(session.get_position().await.unwrap(), p);
    }
}

#[tokio::test]
async fn out_of_range_position_fails_without_io() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy));
    let mut session = make_session(&factory);
    session.open().await.unwrap();

    let writes_before = factory.write_log().lock().unwrap().len();
    for bad in [0u8, 13, 200] {
        let err = session.set_position(bad).await.unwrap_err();
        assert!(matches!(err, ValveError::InvalidInput(_)), "{err}");
    }
    assert_eq!(factory.write_log().lock().unwrap().len(), writes_before);
}

#[tokio::test]
async fn set_position_is_fire_and_forget() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy));
    let mut session = make_session(&factory);
    session.open().await.unwrap();

    let log = factory.write_log();
    let before = log.lock().unwrap().len();
    session.set_position(7).await.unwrap();

    // Exactly one write, no read: the reply is deliberately not awaited.
    let entries: Vec<String> = log.lock().unwrap()[before..].to_vec();
    assert_eq!(entries, vec!["GO7".to_string()]);
    assert_eq!(session.last_known_position(), Some(7));
}

#[tokio::test]
async fn sixth_open_attempt_fails_fast_without_io() {
    let factory = Arc::new(MockFactory::new(MockBehavior::RefuseOpen));
    let mut session = make_session(&factory);

    for _ in 0..MAX_OPEN_ATTEMPTS {
        let err = session.get_position().await.unwrap_err();
        assert!(matches!(err, ValveError::Connection(_)), "{err}");
    }
    assert_eq!(factory.open_count(), MAX_OPEN_ATTEMPTS);

    let err = session.get_position().await.unwrap_err();
    assert!(matches!(err, ValveError::ConnectionExhausted(_)), "{err}");
    assert_eq!(factory.open_count(), MAX_OPEN_ATTEMPTS, "no I/O at the cap");

    // Giving up resets the counter, so the next call tries the port again.
    let _ = session.get_position().await.unwrap_err();
    assert_eq!(factory.open_count(), MAX_OPEN_ATTEMPTS + 1);
}

#[tokio::test]
async fn wrong_banner_leaves_session_closed() {
    let factory = Arc::new(MockFactory::new(MockBehavior::BadBanner));
    let mut session = make_session(&factory);

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, ValveError::Connection(_)), "{err}");
    assert!(!session.is_open());
    assert_eq!(session.open_attempts(), 1);
}

#[tokio::test]
async fn silent_device_times_out_and_stays_closed() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Silent));
    let mut session = make_session(&factory);

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, ValveError::Timeout(_)), "{err}");
    assert!(!session.is_open());
}

#[tokio::test]
async fn malformed_position_reply_is_a_protocol_error() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy).with_override("CP", "GARBAGE"));
    let mut session = make_session(&factory);
    session.open().await.unwrap();

    let err = session.get_position().await.unwrap_err();
    assert!(matches!(err, ValveError::Protocol(_)), "{err}");
    assert_eq!(session.last_known_position(), None);
}

#[tokio::test]
async fn wrong_actuator_mode_gets_corrected_on_open() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy).with_override("AM", "AM2"));
    let mut session = make_session(&factory);
    session.open().await.unwrap();

    let log = factory.write_log().lock().unwrap().clone();
    assert!(log.iter().any(|entry| entry == "AM3"), "log: {log:?}");
    assert!(session.is_open());
}

#[tokio::test]
async fn write_failure_closes_the_session() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy));
    let mut session = make_session(&factory);
    session.open().await.unwrap();
    assert!(session.is_open());

    factory.poison_writes();
    let err = session.set_position(4).await.unwrap_err();
    assert!(matches!(err, ValveError::Connection(_)), "{err}");
    assert!(!session.is_open());
}

#[tokio::test]
async fn addressing_id_prefixes_every_command() {
    let factory = Arc::new(MockFactory::new(MockBehavior::Healthy));
    let mut session = ValveSession::new(
        "chained",
        "/dev/ttyMOCK0",
        Some(3),
        Duration::from_millis(100),
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
    );
    session.open().await.unwrap();
    session.set_position(5).await.unwrap();
    session.get_position().await.unwrap();

    let log = factory.write_log().lock().unwrap().clone();
    for entry in log.iter().filter(|entry| *entry != "<read>") {
        assert!(entry.starts_with('3'), "unprefixed command: {entry:?}");
    }
    assert!(log.contains(&"3GO5".to_string()));
    assert!(log.contains(&"3CP".to_string()));
}
