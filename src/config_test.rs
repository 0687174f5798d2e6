use super::*;

// =============================================================================
// ClientConfig::new
// =============================================================================

#[test]
fn new_applies_default_timeouts() {
    let config = ClientConfig::new("https://api.example.com");
    assert_eq!(config.base_url, "https://api.example.com");
    assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
}

#[test]
fn new_trims_trailing_slash() {
    let config = ClientConfig::new("https://api.example.com/");
    assert_eq!(config.base_url, "https://api.example.com");
}

#[test]
fn new_trims_multiple_trailing_slashes() {
    let config = ClientConfig::new("https://api.example.com///");
    assert_eq!(config.base_url, "https://api.example.com");
}

// =============================================================================
// env_parse_u64 — uses unique env var names to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_parse_valid_value() {
    let key = "__TEST_BB_TIMEOUT_411__";
    unsafe { std::env::set_var(key, "30") };
    assert_eq!(env_parse_u64(key, 10), 30);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_invalid_falls_back_to_default() {
    let key = "__TEST_BB_TIMEOUT_BAD_412__";
    unsafe { std::env::set_var(key, "soon") };
    assert_eq!(env_parse_u64(key, 10), 10);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_unset_falls_back_to_default() {
    assert_eq!(env_parse_u64("__TEST_BB_TIMEOUT_UNSET_413__", 10), 10);
}
