use std::time::Duration;

use chrono::{TimeZone, Utc};
use scopedb::ErrorKind;
use scopedb::concurrency::signal::create_signal;
use scopedb::protocol::{DataType, ResultFormat, StatementStatus};
use scopedb::result::Value;
use scopedb::test_utils::arrow::events_batch;
use scopedb::test_utils::fixtures::{
    arrow_result_set, cancel_response, failed_response, finished_response, json_result_set,
    statement_response,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate, Times};

use crate::common::{STATEMENTS_PATH, ScopeDbMock};

async fn mock_fetch(
    mock: &ScopeDbMock,
    statement_id: Uuid,
    body: &impl serde::Serialize,
    priority: u8,
    max_times: Option<u64>,
    expected: impl Into<Times>,
) {
    let mut fetch = Mock::given(method("GET"))
        .and(path(format!("{STATEMENTS_PATH}/{statement_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .with_priority(priority)
        .expect(expected);
    if let Some(max_times) = max_times {
        fetch = fetch.up_to_n_times(max_times);
    }
    fetch.mount(mock).await;
}

async fn forbid_fetches(mock: &ScopeDbMock) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .named("unexpected fetch")
        .expect(0)
        .mount(mock)
        .await;
}

#[tokio::test]
async fn statement_finished_on_submit_is_never_fetched() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Finished),
        1,
    )
    .await;
    forbid_fetches(&mock).await;

    let result_set = mock
        .client()
        .statement("CREATE TABLE events (id int, name string)")
        .execute()
        .await
        .unwrap();

    assert_eq!(result_set.num_rows(), 0);
    assert!(result_set.schema().is_empty());
}

#[tokio::test]
async fn submit_sends_options_of_the_statement() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path(STATEMENTS_PATH))
        .and(body_partial_json(json!({
            "statement": "FROM events",
            "statement_id": statement_id,
            "exec_timeout": "60000ms",
            "wait_timeout": "1500ms",
            "format": "arrow",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(statement_response(statement_id, StatementStatus::Pending)),
        )
        .expect(1)
        .mount(&mock)
        .await;

    let handle = mock
        .client()
        .statement("FROM events")
        .with_statement_id(statement_id)
        .with_exec_timeout(Duration::from_secs(60))
        .with_wait_timeout(Duration::from_millis(1500))
        .with_format(ResultFormat::Arrow)
        .submit()
        .await
        .unwrap();

    assert_eq!(handle.statement_id(), statement_id);
    assert_eq!(handle.status(), Some(StatementStatus::Pending));
    assert_eq!(handle.format(), ResultFormat::Arrow);
}

#[tokio::test]
async fn polling_stops_at_the_first_finished_response() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Pending),
        1,
    )
    .await;

    mock_fetch(
        &mock,
        statement_id,
        &statement_response(statement_id, StatementStatus::Running),
        1,
        Some(2),
        2,
    )
    .await;

    let result_set = json_result_set(
        &[
            ("id", DataType::Int),
            ("name", DataType::String),
            ("seen_at", DataType::Timestamp),
        ],
        vec![
            vec![Some("1"), Some("first"), Some("2024-10-01T12:00:00Z")],
            vec![Some("2"), None, None],
        ],
    );
    mock_fetch(
        &mock,
        statement_id,
        &finished_response(statement_id, result_set),
        2,
        None,
        1,
    )
    .await;

    let values = mock
        .client()
        .statement("FROM events SELECT id, name, seen_at")
        .execute()
        .await
        .unwrap()
        .into_values()
        .unwrap();

    let seen_at = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
    assert_eq!(
        values,
        vec![
            vec![
                Value::Int(1),
                Value::String("first".to_string()),
                Value::Timestamp(seen_at),
            ],
            vec![Value::Int(2), Value::Null, Value::Null],
        ]
    );
}

#[tokio::test]
async fn arrow_results_are_requested_and_decoded() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Running),
        1,
    )
    .await;

    let batch = events_batch(&[7, 8, 9]);
    Mock::given(method("GET"))
        .and(path(format!("{STATEMENTS_PATH}/{statement_id}")))
        .and(query_param("format", "arrow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished_response(
            statement_id,
            arrow_result_set(
                &[("id", DataType::Int), ("name", DataType::String)],
                std::slice::from_ref(&batch),
            ),
        )))
        .expect(1)
        .mount(&mock)
        .await;

    let result_set = mock
        .client()
        .statement("FROM events")
        .with_format(ResultFormat::Arrow)
        .execute()
        .await
        .unwrap();

    assert_eq!(result_set.num_rows(), 3);
    assert_eq!(result_set.to_record_batches().unwrap(), vec![batch]);
}

#[tokio::test]
async fn terminal_handle_does_not_fetch_again() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(&failed_response(statement_id, "table not found"), 1)
        .await;
    forbid_fetches(&mock).await;

    let mut handle = mock
        .client()
        .statement("FROM missing")
        .submit()
        .await
        .unwrap();

    handle.fetch_once().await.unwrap();
    handle.fetch_once().await.unwrap();

    assert_eq!(handle.status(), Some(StatementStatus::Failed));
    assert_eq!(handle.message(), Some("table not found"));
    assert!(handle.result_set().is_none());
}

#[tokio::test]
async fn failed_statement_is_reported_with_its_message() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Running),
        1,
    )
    .await;
    mock_fetch(
        &mock,
        statement_id,
        &failed_response(statement_id, "division by zero"),
        1,
        None,
        1,
    )
    .await;

    let err = mock
        .client()
        .statement("SELECT 1 / 0")
        .execute()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StatementFailed);
    assert_eq!(err.detail(), Some("division by zero"));
}

#[tokio::test]
async fn cancelling_a_terminal_statement_sends_nothing() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Finished),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("{STATEMENTS_PATH}/{statement_id}/cancel")))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock)
        .await;

    let mut handle = mock.client().statement("SELECT 1").submit().await.unwrap();

    assert_eq!(handle.cancel().await.unwrap(), StatementStatus::Finished);
    assert!(handle.result_set().is_some());
}

#[tokio::test]
async fn cancelling_a_running_statement_records_the_new_status() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Running),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("{STATEMENTS_PATH}/{statement_id}/cancel")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(cancel_response(statement_id, StatementStatus::Cancelled)),
        )
        .expect(1)
        .mount(&mock)
        .await;
    forbid_fetches(&mock).await;

    let mut handle = mock
        .client()
        .statement("FROM huge_table")
        .submit()
        .await
        .unwrap();

    assert_eq!(handle.cancel().await.unwrap(), StatementStatus::Cancelled);
    assert_eq!(handle.status(), Some(StatementStatus::Cancelled));
    assert_eq!(handle.progress().unwrap().total_percentage, 50.0);
    assert_eq!(
        handle.message(),
        Some(format!("statement {statement_id} is cancelled").as_str())
    );

    let err = handle.fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StatementCancelled);
}

#[tokio::test]
async fn cancel_response_without_message_leaves_no_message() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Running),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("{STATEMENTS_PATH}/{statement_id}/cancel")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": statement_id,
            "created_at": "2024-10-01T12:00:00Z",
            "status": "cancelled",
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let mut handle = mock
        .client()
        .statement("FROM huge_table")
        .submit()
        .await
        .unwrap();

    assert_eq!(handle.cancel().await.unwrap(), StatementStatus::Cancelled);
    assert_eq!(handle.message(), None);
}

#[tokio::test]
async fn attached_handle_fetches_before_reporting_a_status() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock_fetch(
        &mock,
        statement_id,
        &statement_response(statement_id, StatementStatus::Running),
        1,
        None,
        1,
    )
    .await;

    let mut handle = mock.client().statement_handle(statement_id);
    assert_eq!(handle.status(), None);

    handle.fetch_once().await.unwrap();
    assert_eq!(handle.status(), Some(StatementStatus::Running));
}

#[tokio::test]
async fn cancellation_signal_stops_polling() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Running),
        1,
    )
    .await;
    mock_fetch(
        &mock,
        statement_id,
        &statement_response(statement_id, StatementStatus::Running),
        1,
        None,
        0..,
    )
    .await;

    let mut handle = mock.client().statement("FROM events").submit().await.unwrap();
    let (cancel_tx, mut cancel_rx) = create_signal();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(()).unwrap();
        // Keep the transmitter alive until the signal is observed.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let err = handle
        .fetch_with_cancellation(&mut cancel_rx)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(handle.status(), Some(StatementStatus::Running));
}

#[tokio::test]
async fn polling_deadline_is_reported_as_cancellation() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    mock.mock_submit(
        &statement_response(statement_id, StatementStatus::Running),
        1,
    )
    .await;
    mock_fetch(
        &mock,
        statement_id,
        &statement_response(statement_id, StatementStatus::Running),
        1,
        None,
        1..,
    )
    .await;

    let mut handle = mock.client().statement("FROM events").submit().await.unwrap();
    let err = handle
        .fetch_with_deadline(Duration::from_millis(100))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn server_errors_carry_the_status_and_message() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("POST"))
        .and(path(STATEMENTS_PATH))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "internal failure"})),
        )
        .expect(1)
        .mount(&mock)
        .await;

    let err = mock
        .client()
        .statement("SELECT 1")
        .submit()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert_eq!(err.http_status(), Some(500));
    assert_eq!(err.detail(), Some("internal failure"));
}

#[tokio::test]
async fn rate_limited_submission_is_not_retried() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("POST"))
        .and(path(STATEMENTS_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&mock)
        .await;

    let err = mock
        .client()
        .statement("SELECT 1")
        .submit()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert!(err.is_rate_limited());
    assert_eq!(err.http_status(), Some(429));
    assert_eq!(err.detail(), Some("slow down"));
}
