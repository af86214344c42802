//! Error taxonomy tests

use vici_valve_rust::error::ValveError;

#[test]
fn transport_errors_are_retryable() {
    let connection_err = ValveError::connection("cable unplugged");
    assert!(connection_err.is_retryable());
    assert!(!connection_err.is_caller_error());

    let timeout_err = ValveError::timeout("no reply in 3s");
    assert!(timeout_err.is_retryable());

    let io_err = ValveError::from(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "pipe closed",
    ));
    assert!(io_err.is_retryable());
}

#[test]
fn caller_errors_are_not_retryable() {
    let invalid = ValveError::invalid_input("position 13 out of range");
    assert!(invalid.is_caller_error());
    assert!(!invalid.is_retryable());

    let missing = ValveError::not_found("v9");
    assert!(missing.is_caller_error());
    assert!(!missing.is_retryable());
}

#[test]
fn protocol_errors_are_neither_retryable_nor_caller_errors() {
    let garbled = ValveError::protocol("malformed position reply");
    assert!(!garbled.is_retryable());
    assert!(!garbled.is_caller_error());

    let exhausted = ValveError::ConnectionExhausted("v1: 5 attempts failed".to_string());
    assert!(!exhausted.is_retryable());
}

#[test]
fn generic_errors_wrap_anyhow() {
    let err = ValveError::from(anyhow::anyhow!("unexpected startup failure"));
    assert!(matches!(err, ValveError::Generic(_)));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("unexpected startup failure"));
}

#[test]
fn messages_carry_context() {
    let err = ValveError::config("invalid VALVE_SERVER_PORT: abc");
    assert_eq!(
        err.to_string(),
        "Configuration error: invalid VALVE_SERVER_PORT: abc"
    );
}
