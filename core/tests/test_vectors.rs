//! Verify path qualification and version comparison against JSON test
//! vectors stored in `test-vectors/`.
//!
//! The transport is never touched by these operations, so an offline `Http`
//! that refuses every request is enough.

use std::cmp::Ordering;
use std::sync::Arc;

use splunk_sdk::{Config, Http, HttpRequest, HttpResponse, Namespace, Service, SplunkError};

struct Offline;

impl Http for Offline {
    fn make_request(&self, _request: HttpRequest) -> splunk_sdk::Result<HttpResponse> {
        Err(SplunkError::Transport("offline".to_string()))
    }
}

fn service(config: Config) -> Service {
    Service::new(Arc::new(Offline), config)
}

// ---------------------------------------------------------------------------
// Fullpath
// ---------------------------------------------------------------------------

#[test]
fn fullpath_test_vectors() {
    let raw = include_str!("../../test-vectors/fullpath.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let config: Config = serde_json::from_value(case["context"].clone()).unwrap();
        let namespace: Namespace = serde_json::from_value(case["namespace"].clone()).unwrap();
        let path = case["path"].as_str().unwrap();

        let svc = service(config);
        assert_eq!(
            svc.fullpath(path, &namespace),
            case["expected"].as_str().unwrap(),
            "{name}"
        );
    }
}

// ---------------------------------------------------------------------------
// Version compare
// ---------------------------------------------------------------------------

#[test]
fn version_compare_test_vectors() {
    let raw = include_str!("../../test-vectors/version_compare.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let version = case["version"].as_str().unwrap();
        let other = case["other"].as_str().unwrap();
        let expected = match case["expected"].as_i64().unwrap() {
            -1 => Ordering::Less,
            0 => Ordering::Equal,
            1 => Ordering::Greater,
            other => panic!("unknown ordering: {other}"),
        };

        let svc = service(Config {
            version: Some(version.to_string()),
            ..Config::default()
        });
        assert_eq!(
            svc.version_compare(other),
            expected,
            "{version} vs {other}"
        );
    }
}
