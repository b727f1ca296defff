use super::*;

#[test]
fn default_config_is_valid() {
    assert!(SessionConfig::new().validate().is_ok());
}

#[test]
fn rejects_max_turns_out_of_range() {
    let config = SessionConfig::new().max_turns(0);
    assert!(config.validate().is_err());
    let config = SessionConfig::new().max_turns(1001);
    assert!(config.validate().is_err());
}

#[test]
fn rejects_temperature_out_of_range() {
    let config = SessionConfig::new().temperature(2.5);
    assert!(config.validate().is_err());
}

#[test]
fn rejects_tool_timeout_out_of_range() {
    let config = SessionConfig::new().tool_timeout(std::time::Duration::from_millis(10));
    assert!(config.validate().is_err());
}

#[test]
fn rejects_wall_duration_out_of_range() {
    let config = SessionConfig::new().max_wall_duration(std::time::Duration::from_secs(5));
    assert!(config.validate().is_err());
}

#[test]
fn pooling_match_ignores_order_of_tools() {
    let a = SessionConfig::new().tools(vec![Tool::FileSearch, Tool::Function]);
    let b = SessionConfig::new().tools(vec![Tool::Function, Tool::FileSearch]);
    assert!(a.matches_for_pooling(&b));
}

#[test]
fn pooling_match_is_sensitive_to_working_dir() {
    let a = SessionConfig::new().working_dir("/tmp/a");
    let b = SessionConfig::new().working_dir("/tmp/b");
    assert!(!a.matches_for_pooling(&b));
}
