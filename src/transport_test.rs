use super::*;

// =============================================================================
// Method
// =============================================================================

#[test]
fn method_names() {
    assert_eq!(Method::Get.as_str(), "GET");
    assert_eq!(Method::Post.as_str(), "POST");
    assert_eq!(Method::Patch.as_str(), "PATCH");
    assert_eq!(Method::Put.as_str(), "PUT");
    assert_eq!(Method::Delete.as_str(), "DELETE");
}

// =============================================================================
// TransportResponse
// =============================================================================

#[test]
fn two_hundreds_are_success() {
    assert!(TransportResponse { status: 200, body: String::new() }.is_success());
    assert!(TransportResponse { status: 201, body: String::new() }.is_success());
    assert!(TransportResponse { status: 299, body: String::new() }.is_success());
}

#[test]
fn non_two_hundreds_are_not_success() {
    assert!(!TransportResponse { status: 199, body: String::new() }.is_success());
    assert!(!TransportResponse { status: 301, body: String::new() }.is_success());
    assert!(!TransportResponse { status: 401, body: String::new() }.is_success());
    assert!(!TransportResponse { status: 500, body: String::new() }.is_success());
}

// =============================================================================
// HttpTransport
// =============================================================================

#[test]
fn http_transport_builds_from_config() {
    let config = crate::config::ClientConfig::new("https://api.example.com");
    assert!(HttpTransport::new(&config).is_ok());
}
