// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests of the sink against the in-process store backend.

use std::sync::Arc;

use caplog::store::memory::{InjectedFailure, MemoryConnector};
use caplog::store::Document;
use caplog::{Config, Error, LogSink, Severity};
use serde_json::json;
use thiserror::Error as ThisError;

fn store_sink(config: Config) -> (MemoryConnector, LogSink) {
    let connector = MemoryConnector::new();
    let sink = LogSink::connect(config, Arc::new(connector.clone())).expect("store mode");
    (connector, sink)
}

fn quiet_config() -> Config {
    Config {
        disable_file_logging: true,
        application_name: "App".to_string(),
        ..Config::default()
    }
}

fn metadata(pairs: &[(&str, serde_json::Value)]) -> Document {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[derive(Debug, ThisError)]
#[error("request handler failed")]
struct HandlerError {
    #[source]
    cause: std::io::Error,
}

#[test]
fn committed_record_matches_request_scenario() {
    let (connector, sink) = store_sink(quiet_config());

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add_metadata(metadata(&[("request_id", json!("abc"))]))?;
        assert_eq!(sink.add(Severity::Info, "hello"), "hello");
        Ok(())
    });
    result.unwrap();

    let documents = connector.store().documents("development_log");
    assert_eq!(documents.len(), 1);
    let document = &documents[0];

    assert_eq!(document.get("request_id").unwrap(), &json!("abc"));
    assert_eq!(document.get("messages").unwrap(), &json!({"info": ["hello"]}));
    assert_eq!(document.get("application_name").unwrap(), &json!("App"));
    assert!(document.get("runtime").unwrap().as_u64().is_some());
    assert!(document.get("request_time").unwrap().as_u64().unwrap() > 0);
    // Nothing else sneaks into the document.
    assert_eq!(document.len(), 5);
}

#[test]
fn metadata_merges_all_pairs_into_committed_record() {
    let (connector, sink) = store_sink(quiet_config());

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add_metadata(metadata(&[
            ("request_id", json!("r-1")),
            ("user_id", json!(42)),
            ("tags", json!(["checkout", "beta"])),
        ]))?;
        Ok(())
    });
    result.unwrap();

    let document = &connector.store().documents("development_log")[0];
    assert_eq!(document.get("request_id").unwrap(), &json!("r-1"));
    assert_eq!(document.get("user_id").unwrap(), &json!(42));
    assert_eq!(document.get("tags").unwrap(), &json!(["checkout", "beta"]));
}

#[test]
fn reserved_metadata_fails_immediately_and_commits_nothing_extra() {
    let (connector, sink) = store_sink(quiet_config());

    let scope = sink.begin_scope(Document::new()).unwrap();
    let err = sink
        .add_metadata(metadata(&[("messages", json!([]))]))
        .unwrap_err();
    assert!(matches!(err, Error::ReservedKey(ref key) if key == "messages"));

    // The failure happened before any commit, and the record is unchanged.
    assert!(connector.store().documents("development_log").is_empty());
    drop(scope);
    let document = &connector.store().documents("development_log")[0];
    assert_eq!(document.get("messages").unwrap(), &json!({}));
    assert!(!document.contains_key("request_id"));
}

#[test]
fn threshold_filters_and_preserves_insertion_order() {
    let config = Config {
        threshold: Severity::Info,
        ..quiet_config()
    };
    let (connector, sink) = store_sink(config);

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Debug, "dropped");
        sink.add(Severity::Info, "one");
        sink.add(Severity::Info, "two");
        sink.add(Severity::Error, "boom");
        sink.add(Severity::Info, "");
        Ok(())
    });
    result.unwrap();

    let document = &connector.store().documents("development_log")[0];
    assert_eq!(
        document.get("messages").unwrap(),
        &json!({"info": ["one", "two"], "error": ["boom"]})
    );
}

#[test]
fn runtime_is_present_after_success_and_after_failure() {
    let (connector, sink) = store_sink(quiet_config());

    let ok: Result<(), Error> = sink.scoped(|| Ok(()));
    ok.unwrap();

    let failed: Result<(), std::io::Error> = sink.scoped(|| {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "handler broke"))
    });
    assert!(failed.is_err());

    for document in connector.store().documents("development_log") {
        assert!(document.get("runtime").unwrap().as_u64().is_some());
    }
}

#[test]
fn wrapped_error_is_logged_once_with_trace_then_reraised() {
    let (connector, sink) = store_sink(quiet_config());

    let result: Result<(), HandlerError> = sink.scoped(|| {
        sink.add(Severity::Info, "working");
        Err(HandlerError {
            cause: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket closed"),
        })
    });

    // The error reached the caller intact.
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "request handler failed");

    // Exactly one error-severity entry, carrying message and cause chain.
    let document = &connector.store().documents("development_log")[0];
    let messages = document.get("messages").unwrap();
    let errors = messages.get("error").unwrap().as_array().unwrap();
    assert_eq!(errors.len(), 1);
    let entry = errors[0].as_str().unwrap();
    assert!(entry.contains("request handler failed"));
    assert!(entry.contains("caused by: socket closed"));
}

#[test]
fn flatten_retry_downgrades_compound_values() {
    let (connector, sink) = store_sink(quiet_config());
    connector.store().reject_compound_values(true);

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add_metadata(metadata(&[("params", json!({"id": 7}))]))?;
        sink.add(Severity::Info, "hello");
        Ok(())
    });
    result.unwrap();

    let document = &connector.store().documents("development_log")[0];
    // Stored as the string representation after one flatten retry.
    assert_eq!(document.get("params").unwrap(), &json!(r#"{"id":7}"#));
    assert_eq!(document.get("messages").unwrap(), &json!({"info": ["hello"]}));
}

#[test]
fn persistent_insert_failure_is_swallowed() {
    let (connector, sink) = store_sink(quiet_config());
    connector
        .store()
        .fail_next_inserts(InjectedFailure::Other, 2);

    // Both the insert and the flatten retry fail; the scope must still
    // complete without panicking or surfacing an error.
    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Info, "lost");
        Ok(())
    });
    result.unwrap();

    assert!(connector.store().documents("development_log").is_empty());
}

#[test]
fn replica_mode_survives_transient_connection_failures() {
    let config = Config {
        replica_set: Some("rs0".to_string()),
        ..quiet_config()
    };
    let (connector, sink) = store_sink(config);
    connector
        .store()
        .fail_next_inserts(InjectedFailure::Connection, 2);

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Info, "replicated");
        Ok(())
    });
    result.unwrap();

    assert_eq!(connector.store().documents("development_log").len(), 1);
    assert_eq!(connector.store().reconnect_count(), 2);
}

#[test]
fn reset_collection_recreates_with_identical_name_and_size() {
    let config = Config {
        capsize_bytes: Some(8192),
        ..quiet_config()
    };
    let (connector, sink) = store_sink(config);

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Info, "pre-reset");
        Ok(())
    });
    result.unwrap();
    assert_eq!(connector.store().documents("development_log").len(), 1);

    sink.reset_collection().unwrap();

    assert_eq!(connector.store().collection_names(), vec!["development_log"]);
    assert_eq!(connector.store().capsize_of("development_log"), Some(8192));
    assert!(connector.store().documents("development_log").is_empty());

    // The sink keeps writing into the recreated collection.
    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Info, "post-reset");
        Ok(())
    });
    result.unwrap();
    assert_eq!(connector.store().documents("development_log").len(), 1);
}

#[test]
fn fallback_mode_writes_to_file_with_warning_free_caller_surface() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fallback.log");

    let connector = MemoryConnector::new();
    connector.store().fail_next_connects(1);
    let config = Config {
        log_file_path: Some(path.clone()),
        ..Config::default()
    };
    let sink = LogSink::connect(config, Arc::new(connector.clone())).unwrap();
    assert!(sink.in_fallback_mode());

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Info, "degraded but alive");
        Ok(())
    });
    result.unwrap();
    sink.flush();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("INFO | degraded but alive"));
    // Nothing reached the store.
    assert!(connector.store().documents("development_log").is_empty());
}

#[test]
fn store_mode_passes_messages_through_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("passthrough.log");

    let config = Config {
        log_file_path: Some(path.clone()),
        application_name: "App".to_string(),
        ..Config::default()
    };
    let (connector, sink) = store_sink(config);

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Warn, "both places");
        Ok(())
    });
    result.unwrap();
    sink.flush();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("WARN | both places"));
    assert_eq!(connector.store().documents("development_log").len(), 1);
}

#[test]
fn disable_file_logging_suppresses_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suppressed.log");

    let config = Config {
        log_file_path: Some(path.clone()),
        disable_file_logging: true,
        ..Config::default()
    };
    let (_, sink) = store_sink(config);

    let result: Result<(), Error> = sink.scoped(|| {
        sink.add(Severity::Info, "store only");
        Ok(())
    });
    result.unwrap();
    sink.flush();

    // The file was never opened, let alone written.
    assert!(!path.exists());
}

#[test]
fn leveled_helpers_return_their_message() {
    let (_, sink) = store_sink(quiet_config());
    let result: Result<(), Error> = sink.scoped(|| {
        assert_eq!(sink.debug("d"), "d");
        assert_eq!(sink.info("i"), "i");
        assert_eq!(sink.warn("w"), "w");
        assert_eq!(sink.error("e"), "e");
        assert_eq!(sink.fatal("f"), "f");
        Ok(())
    });
    result.unwrap();
}
