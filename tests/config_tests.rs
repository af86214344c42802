//! Config-file parsing and environment override tests

use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;
use vici_valve_rust::config::{parse_valve_table, ServerConfig, DEFAULT_PORT};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn parses_name_address_pairs() {
    let file = write_config("pump_in,/dev/ttyUSB0\npump_out,/dev/ttyUSB1\n");
    let valves = parse_valve_table(file.path()).unwrap();
    assert_eq!(
        valves,
        vec![
            ("pump_in".to_string(), "/dev/ttyUSB0".to_string()),
            ("pump_out".to_string(), "/dev/ttyUSB1".to_string()),
        ]
    );
}

#[test]
fn skips_comments_and_malformed_lines() {
    let file = write_config(
        "# bench valves\n\
         v1,/dev/ttyUSB0\n\
         this line has no comma\n\
         too,many,commas\n\
         ,\n\
         \n\
         v2 , /dev/ttyUSB1 \n",
    );
    let valves = parse_valve_table(file.path()).unwrap();
    assert_eq!(
        valves,
        vec![
            ("v1".to_string(), "/dev/ttyUSB0".to_string()),
            ("v2".to_string(), "/dev/ttyUSB1".to_string()),
        ]
    );
}

#[test]
fn empty_table_falls_back_to_defaults() {
    let file = write_config("# nothing but comments\n");
    let mut config = ServerConfig::default();
    config.load_valve_table(file.path());
    assert_eq!(config.valves.len(), 4);
    assert_eq!(config.valves[0].0, "v1");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let mut config = ServerConfig::default();
    config.load_valve_table(std::path::Path::new("/nonexistent/VICI_config.csv"));
    assert_eq!(config.valves.len(), 4);
}

// Single test so the process-wide env vars are not touched concurrently.
#[test]
fn env_overrides_port_and_timeout() {
    std::env::set_var("VALVE_SERVER_PORT", "9000");
    std::env::set_var("VALVE_SERIAL_TIMEOUT_SECS", "7");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.port, 9000);
    assert_eq!(config.serial_timeout().as_secs(), 7);

    std::env::set_var("VALVE_SERVER_PORT", "not-a-port");
    assert!(ServerConfig::from_env().is_err());

    std::env::remove_var("VALVE_SERVER_PORT");
    std::env::remove_var("VALVE_SERIAL_TIMEOUT_SECS");
}

#[test]
fn default_port_matches_the_deployment() {
    assert_eq!(DEFAULT_PORT, 8972);
    assert_eq!(ServerConfig::default().port, 8972);
}
