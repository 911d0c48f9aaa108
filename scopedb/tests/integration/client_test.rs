use scopedb::{Client, ClientConfig, ErrorKind};
use scopedb::codec::{decode_arrow_batches, json_line};
use scopedb::protocol::{IngestData, IngestRequest, IngestType};
use scopedb::test_utils::arrow::events_batch;
use scopedb::test_utils::fixtures::ingest_result;
use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{HEALTH_PATH, INGEST_PATH, ScopeDbMock, json_rows};

#[derive(Serialize)]
struct Click {
    user: &'static str,
    x: u32,
    y: u32,
}

#[tokio::test]
async fn healthy_server_passes_the_health_check() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock)
        .await;

    mock.client().health_check().await.unwrap();
}

#[tokio::test]
async fn unhealthy_server_fails_the_health_check() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("starting up"))
        .expect(1)
        .mount(&mock)
        .await;

    let err = mock.client().health_check().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert_eq!(err.http_status(), Some(503));
    assert_eq!(err.detail(), Some("starting up"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    scopedb_telemetry::tracing::init_test_tracing();
    // Nothing listens on the tcpmux port of the loopback interface.
    let client = Client::new(ClientConfig::new("http://127.0.0.1:1")).unwrap();

    let err = client.health_check().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportFailed);
    assert_eq!(err.http_status(), None);
}

#[tokio::test]
async fn json_rows_are_ingested_in_one_committed_request() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .and(body_partial_json(json!({
            "type": "committed",
            "statement": "INSERT INTO clicks",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ingest_result(2)))
        .expect(1)
        .mount(&mock)
        .await;

    let rows = [
        Click {
            user: "ann",
            x: 1,
            y: 2,
        },
        Click {
            user: "bob",
            x: 3,
            y: 4,
        },
    ];
    let result = mock
        .client()
        .ingest_json_rows("INSERT INTO clicks", &rows)
        .await
        .unwrap();

    assert_eq!(result.num_rows_inserted, 2);

    let bodies = mock.received_bodies(INGEST_PATH).await;
    assert_eq!(
        json_rows(&bodies[0]),
        vec![
            json!({"user": "ann", "x": 1, "y": 2}),
            json!({"user": "bob", "x": 3, "y": 4}),
        ]
    );
}

#[tokio::test]
async fn arrow_batches_are_ingested_in_one_request() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(ingest_result(3)))
        .expect(1)
        .mount(&mock)
        .await;

    let batches = vec![events_batch(&[1]), events_batch(&[2, 3])];
    mock.client()
        .ingest_arrow_batches("INSERT INTO events", &batches)
        .await
        .unwrap();

    let bodies = mock.received_bodies(INGEST_PATH).await;
    let rows = bodies[0]["data"]["rows"].as_str().unwrap();
    assert_eq!(decode_arrow_batches(rows).unwrap(), batches);
}

#[tokio::test]
async fn empty_ingest_is_rejected_locally() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;
    let client = mock.client();

    let err = client
        .ingest_arrow_batches("INSERT INTO events", &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyBatch);

    let err = client
        .ingest_json_rows::<Click>("INSERT INTO clicks", &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyBatch);
}

#[tokio::test]
async fn buffered_ingest_request_is_sent_as_built() {
    let mock = ScopeDbMock::start().await;
    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .and(body_partial_json(json!({
            "type": "buffered",
            "statement": "INSERT INTO clicks",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ingest_result(1)))
        .expect(1)
        .mount(&mock)
        .await;

    let request = IngestRequest {
        ty: IngestType::Buffered,
        data: IngestData::Json {
            rows: json_line(&json!({"user": "ann", "x": 1, "y": 2})).unwrap(),
        },
        statement: "INSERT INTO clicks".to_string(),
    };
    let result = mock.client().ingest(&request).await.unwrap();

    assert_eq!(result.num_rows_inserted, 1);
}
