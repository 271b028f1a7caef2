//! Error aggregation behaviour against a real database file
//!
//! Contexts mirror what the three reporters actually send: browser/device
//! info for frontend errors, request/server info for backend errors, job and
//! worker info for task errors.

use chrono::{Duration, Utc};
use errata_common::store::reports;
use errata_common::{
    AggregatorSettings, DbLocation, ErrorAggregator, ErrorCategory, NewReport, ReportDb,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn frontend_context() -> Value {
    json!({
        "browser": {},
        "os": {},
        "component": "HeaderComponent",
        "device": {
            "is_touch_device": true,
            "screen": {
                "width": 1920,
                "height": 1080,
                "available_width": 1920,
                "available_height": 1040
            }
        }
    })
}

fn backend_context() -> Value {
    json!({
        "request_info": {
            "url": "/api/test",
            "method": "GET",
            "headers": {"User-Agent": "TestAgent"},
            "body": "",
            "query_params": {"test": "true"}
        },
        "server": {"host": "localhost", "port": "8000"},
        "packages": ["django==3.2", "requests==2.31"],
        "python_version": "3.9.1"
    })
}

fn task_context() -> Value {
    json!({
        "job_info": {
            "job_id": "1",
            "func": "test_func",
            "facility_id": null,
            "args": ["test"],
            "kwargs": {"test": "test"},
            "progress": 0,
            "total_progress": 0,
            "extra_metadata": {}
        },
        "worker_info": {
            "worker_host": "localhost",
            "worker_process": "1",
            "worker_thread": "1",
            "worker_extra": null
        }
    })
}

fn settings(developer_mode: bool) -> AggregatorSettings {
    AggregatorSettings {
        developer_mode,
        release_version: "0.3.0".to_string(),
    }
}

async fn open_db() -> (TempDir, Arc<ReportDb>) {
    let temp_dir = tempdir().unwrap();
    let location = DbLocation::Custom(temp_dir.path().join("reports.db"));
    let db = ReportDb::open(location).await.unwrap();
    (temp_dir, Arc::new(db))
}

async fn count(db: &ReportDb) -> i64 {
    db.execute(reports::count_reports).await.unwrap()
}

async fn assert_repeat_increments(category: ErrorCategory, context: Value) {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(false));

    let first = agg
        .insert_or_update_error(category, "Test Error", "Test Traceback", context.clone())
        .await
        .unwrap()
        .expect("production mode must record");

    assert_eq!(first.category, category);
    assert_eq!(first.error_message, "Test Error");
    assert_eq!(first.traceback, "Test Traceback");
    assert_eq!(first.context, context);
    assert_eq!(first.events, 1);
    assert!(!first.reported);
    assert_eq!(first.first_occurred, first.last_occurred);
    assert!(Utc::now() - first.first_occurred < Duration::seconds(1));

    let second = agg
        .insert_or_update_error(category, "Test Error", "Test Traceback", context.clone())
        .await
        .unwrap()
        .expect("production mode must record");

    assert_eq!(second.id, first.id);
    assert_eq!(second.context, context);
    assert_eq!(second.events, 2);
    assert!(!second.reported);
    assert_eq!(second.first_occurred, first.first_occurred);
    assert!(second.last_occurred >= first.last_occurred);
    assert!(Utc::now() - second.last_occurred < Duration::seconds(1));

    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn test_frontend_error_prod_mode() {
    assert_repeat_increments(ErrorCategory::Frontend, frontend_context()).await;
}

#[tokio::test]
async fn test_backend_error_prod_mode() {
    assert_repeat_increments(ErrorCategory::Backend, backend_context()).await;
}

#[tokio::test]
async fn test_task_error_prod_mode() {
    assert_repeat_increments(ErrorCategory::Task, task_context()).await;
}

#[tokio::test]
async fn test_dev_mode_suppresses_every_category() {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(true));

    for (category, context) in [
        (ErrorCategory::Frontend, frontend_context()),
        (ErrorCategory::Backend, backend_context()),
        (ErrorCategory::Task, task_context()),
    ] {
        let result = agg
            .insert_or_update_error(category, "Test Error", "Test Traceback", context)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_get_unreported_errors() {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(false));

    db.execute(|conn| {
        let now = Utc::now();
        reports::insert_report(
            conn,
            &NewReport::new(ErrorCategory::Frontend, "Error 1", "Traceback 1", frontend_context()),
            false,
            now,
            "0.3.0",
        )?;
        reports::insert_report(
            conn,
            &NewReport::new(ErrorCategory::Backend, "Error 2", "Traceback 2", backend_context()),
            false,
            now,
            "0.3.0",
        )?;
        reports::insert_report(
            conn,
            &NewReport::new(ErrorCategory::Backend, "Error 3", "Traceback 3", backend_context()),
            true,
            now,
            "0.3.0",
        )?;
        Ok(())
    })
    .await
    .unwrap();

    let unreported = agg.get_unreported_errors().await.unwrap();
    assert_eq!(unreported.len(), 2);
    assert!(unreported.iter().all(|r| !r.reported));

    let messages: Vec<&str> = unreported.iter().map(|r| r.error_message.as_str()).collect();
    assert_eq!(messages, vec!["Error 1", "Error 2"]);
}

#[tokio::test]
async fn test_distinct_contexts_are_distinct_records() {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(false));

    let a = agg
        .insert_or_update_error(ErrorCategory::Backend, "Test Error", "Test Traceback", backend_context())
        .await
        .unwrap()
        .unwrap();

    let mut other = backend_context();
    other["server"]["port"] = json!("8080");
    let b = agg
        .insert_or_update_error(ErrorCategory::Backend, "Test Error", "Test Traceback", other)
        .await
        .unwrap()
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(a.events, 1);
    assert_eq!(b.events, 1);
    assert_eq!(count(&db).await, 2);
}

#[tokio::test]
async fn test_same_message_different_category_not_merged() {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(false));

    agg.insert_or_update_error(ErrorCategory::Frontend, "Test Error", "Test Traceback", json!({}))
        .await
        .unwrap();
    agg.insert_or_update_error(ErrorCategory::Backend, "Test Error", "Test Traceback", json!({}))
        .await
        .unwrap();

    assert_eq!(count(&db).await, 2);
}

#[tokio::test]
async fn test_context_key_order_does_not_matter() {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(false));

    let ordered: Value =
        serde_json::from_str(r#"{"server": {"host": "localhost", "port": "8000"}, "python_version": "3.9.1"}"#)
            .unwrap();
    let shuffled: Value =
        serde_json::from_str(r#"{"python_version": "3.9.1", "server": {"port": "8000", "host": "localhost"}}"#)
            .unwrap();

    agg.insert_or_update_error(ErrorCategory::Backend, "Test Error", "Test Traceback", ordered)
        .await
        .unwrap();
    let repeat = agg
        .insert_or_update_error(ErrorCategory::Backend, "Test Error", "Test Traceback", shuffled)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(repeat.events, 2);
    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn test_repeat_of_reported_error_stays_reported() {
    let (_dir, db) = open_db().await;
    let agg = ErrorAggregator::new(Arc::clone(&db), settings(false));

    let first = agg
        .insert_or_update_error(ErrorCategory::Task, "Job failed", "Traceback", task_context())
        .await
        .unwrap()
        .unwrap();
    agg.mark_reported(vec![first.id]).await.unwrap();

    let repeat = agg
        .insert_or_update_error(ErrorCategory::Task, "Job failed", "Traceback", task_context())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(repeat.events, 2);
    assert!(repeat.reported);
    assert!(agg.get_unreported_errors().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_never_lose_events() {
    let (_dir, db) = open_db().await;
    let agg = Arc::new(ErrorAggregator::new(Arc::clone(&db), settings(false)));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let agg = Arc::clone(&agg);
        handles.push(tokio::spawn(async move {
            agg.insert_or_update_error(
                ErrorCategory::Backend,
                "Test Error",
                "Test Traceback",
                backend_context(),
            )
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let unreported = agg.get_unreported_errors().await.unwrap();
    assert_eq!(unreported.len(), 1);
    assert_eq!(unreported[0].events, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_connections_share_one_record() {
    // Two handles on one file behave like two processes
    let temp_dir = tempdir().unwrap();
    let location = DbLocation::Custom(temp_dir.path().join("reports.db"));
    let db_a = Arc::new(ReportDb::open(location.clone()).await.unwrap());
    let db_b = Arc::new(ReportDb::open(location).await.unwrap());

    let agg_a = Arc::new(ErrorAggregator::new(db_a, settings(false)));
    let agg_b = Arc::new(ErrorAggregator::new(Arc::clone(&db_b), settings(false)));

    let mut handles = Vec::new();
    for agg in [agg_a, agg_b] {
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                agg.insert_or_update_error(
                    ErrorCategory::Frontend,
                    "Test Error",
                    "Test Traceback",
                    frontend_context(),
                )
                .await
                .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(count(&db_b).await, 1);
    let unreported = db_b.execute(reports::unreported_reports).await.unwrap();
    assert_eq!(unreported[0].events, 50);
}
