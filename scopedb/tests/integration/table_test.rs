use scopedb::protocol::{DataType, StatementStatus};
use scopedb::test_utils::fixtures::{finished_response, json_result_set, statement_response};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{STATEMENTS_PATH, ScopeDbMock};

#[tokio::test]
async fn drop_issues_a_quoted_statement() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path(STATEMENTS_PATH))
        .and(body_partial_json(json!({
            "statement": "DROP TABLE `analytics`.`public`.`click\\`s`",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(statement_response(statement_id, StatementStatus::Finished)),
        )
        .expect(1)
        .mount(&mock)
        .await;

    mock.client()
        .table("click`s")
        .with_database("analytics")
        .with_schema("public")
        .drop()
        .await
        .unwrap();
}

#[tokio::test]
async fn table_schema_is_read_from_the_catalog() {
    let mock = ScopeDbMock::start().await;
    let statement_id = Uuid::new_v4();
    let catalog = json_result_set(
        &[
            ("column_name", DataType::String),
            ("data_type", DataType::String),
        ],
        vec![
            vec![Some("id"), Some("uint")],
            vec![Some("payload"), Some("variant")],
            vec![Some("amount"), Some("decimal")],
        ],
    );
    Mock::given(method("POST"))
        .and(path(STATEMENTS_PATH))
        .and(body_partial_json(json!({
            "statement": "FROM scopedb.system.columns \
                WHERE table_name = 'events' AND schema_name = 'public' AND database_name = 'scopedb' \
                SELECT column_name, data_type",
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(finished_response(statement_id, catalog)),
        )
        .expect(1)
        .mount(&mock)
        .await;

    let schema = mock.client().table("events").table_schema().await.unwrap();

    let fields = schema
        .fields()
        .iter()
        .map(|field| (field.name().to_string(), field.data_type()))
        .collect::<Vec<_>>();
    assert_eq!(
        fields,
        vec![
            ("id".to_string(), DataType::UInt),
            ("payload".to_string(), DataType::Variant),
            ("amount".to_string(), DataType::Unknown),
        ]
    );
}
