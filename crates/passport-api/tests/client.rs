//! Integration tests for `PassportClient` using wiremock HTTP mocks.

use passport_api::{ApiError, ImportReview, PassportClient, PendingEntity, ReviewStage};
use passport_core::{CatalogEntityKind, ImportJobStatus};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB_ID: &str = "6f1c2a9e-4b7d-4c1e-9a3f-2d5b8e7c1a00";

fn test_client(base_url: &str) -> PassportClient {
    PassportClient::with_base_url(base_url, "secret", 30, "passport-test")
        .expect("client construction should not fail")
        .with_brand("brand-1")
}

fn job_id() -> Uuid {
    Uuid::parse_str(JOB_ID).unwrap()
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": { "data": data } }))
}

fn job_json(status: &str) -> serde_json::Value {
    json!({
        "id": JOB_ID,
        "status": status,
        "fileName": "products.csv",
        "totalRows": 3,
        "validRows": 2,
        "errorRows": 1,
        "createdAt": "2026-03-01T10:00:00Z"
    })
}

#[tokio::test]
async fn job_status_sends_envelope_auth_and_brand() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.status"))
        .and(bearer_token("secret"))
        .and(header("x-brand-id", "brand-1"))
        .and(body_json(json!({ "input": { "jobId": JOB_ID } })))
        .respond_with(ok(job_json("validated")))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let job = client.job_status(job_id()).await.expect("should parse job");

    assert_eq!(job.id, job_id());
    assert_eq!(job.status, ImportJobStatus::Validated);
    assert_eq!(job.error_rows, 1);
    assert_eq!(job.file_name.as_deref(), Some("products.csv"));
}

#[tokio::test]
async fn rpc_error_envelope_becomes_rpc_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.approve"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "CONFLICT", "message": "job is not validated" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri()).with_retry(3, 0);
    let err = client.approve(job_id()).await.unwrap_err();

    match err {
        ApiError::Rpc {
            procedure,
            code,
            message,
        } => {
            assert_eq!(procedure, "bulkImport.approve");
            assert_eq!(code, "CONFLICT");
            assert_eq!(message, "job is not validated");
        }
        other => panic!("expected ApiError::Rpc, got: {other:?}"),
    }
}

#[tokio::test]
async fn not_found_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.cancel"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.cancel(job_id()).await.unwrap_err();
    assert!(
        matches!(err, ApiError::NotFound { ref procedure } if procedure == "bulkImport.cancel"),
        "expected NotFound, got: {err:?}"
    );
}

#[tokio::test]
async fn rate_limit_reads_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/catalog.categories.list"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.list_categories().await.unwrap_err();
    assert!(
        matches!(err, ApiError::RateLimited { retry_after_secs: 30 }),
        "expected RateLimited(30), got: {err:?}"
    );
}

#[tokio::test]
async fn malformed_success_body_is_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.status"))
        .respond_with(ok(json!({ "id": "not-a-uuid" })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.job_status(job_id()).await.unwrap_err();
    assert!(
        matches!(err, ApiError::Deserialize { ref context, .. } if context == "bulkImport.status"),
        "expected Deserialize, got: {err:?}"
    );
}

#[tokio::test]
async fn retries_after_503_and_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/catalog.categories.list"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc/catalog.categories.list"))
        .respond_with(ok(json!([
            { "id": "1", "name": "Tops" },
            { "id": "2", "name": "T-Shirts", "parent_id": "1" }
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server.uri()).with_retry(1, 0);
    let categories = client
        .list_categories()
        .await
        .expect("expected Ok after 503 retry");
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[1].parent_id.as_deref(), Some("1"));
}

#[tokio::test]
async fn gives_up_after_exhausting_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.status"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server.uri()).with_retry(2, 0);
    let err = client.job_status(job_id()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnexpectedStatus { status: 502, .. }
    ));
}

#[tokio::test]
async fn approve_reuses_idempotency_key_across_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.approve"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.approve"))
        .respond_with(ok(job_json("completed")))
        .mount(&server)
        .await;

    let client = test_client(&server.uri()).with_retry(1, 0);
    let job = client.approve(job_id()).await.expect("approve should succeed");
    assert_eq!(job.status, ImportJobStatus::Completed);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let keys: Vec<_> = requests
        .iter()
        .map(|r| {
            r.headers
                .get("idempotency-key")
                .expect("approve must send an idempotency key")
                .to_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(keys[0], keys[1]);
    assert!(Uuid::parse_str(&keys[0]).is_ok());
}

#[tokio::test]
async fn fetch_snapshot_collects_every_entity_kind() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/catalog.categories.list"))
        .respond_with(ok(json!([{ "id": "1", "name": "T-Shirts" }])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc/catalog.entities.list"))
        .and(body_json(json!({ "input": { "kind": "color" } })))
        .respond_with(ok(json!([
            { "id": "c2", "kind": "color", "name": "White" },
            { "id": "c1", "kind": "color", "name": "Black" }
        ])))
        .mount(&server)
        .await;

    // Every other kind is empty.
    Mock::given(method("POST"))
        .and(path("/rpc/catalog.entities.list"))
        .respond_with(ok(json!([])))
        .expect(6)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let snapshot = client.fetch_snapshot().await.expect("snapshot");

    assert_eq!(snapshot.categories.len(), 1);
    let colors: Vec<&str> = snapshot
        .entities_of(CatalogEntityKind::Color)
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(colors, vec!["Black", "White"]);
}

#[tokio::test]
async fn all_errors_walks_every_page() {
    let server = MockServer::start().await;

    for (page, rows) in [(1, vec![2, 3]), (2, vec![7])] {
        let items: Vec<_> = rows
            .into_iter()
            .map(|row| json!({ "rowNumber": row, "field": "upid", "message": "duplicate upid" }))
            .collect();
        Mock::given(method("POST"))
            .and(path("/rpc/bulkImport.errors"))
            .and(body_json(json!({
                "input": { "jobId": JOB_ID, "page": page, "pageSize": 2 }
            })))
            .respond_with(ok(json!({
                "items": items, "page": page, "pageSize": 2, "total": 3
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = test_client(&server.uri());
    let errors = client.all_errors(job_id(), 2).await.expect("errors");

    let rows: Vec<u32> = errors.iter().map(|e| e.row_number).collect();
    assert_eq!(rows, vec![2, 3, 7]);
}

#[tokio::test]
async fn all_errors_stops_on_a_page_that_cannot_advance() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.errors"))
        .respond_with(ok(json!({
            "items": [], "page": 1, "pageSize": 0, "total": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let errors = client.all_errors(job_id(), 50).await.expect("errors");

    assert!(errors.is_empty());
}

#[tokio::test]
async fn define_unmapped_sends_pending_entities() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.unmapped.batchDefine"))
        .and(body_json(json!({
            "input": {
                "jobId": JOB_ID,
                "entities": [
                    { "sourceColumn": "color_name", "rawValue": "Coral", "name": "Coral" }
                ]
            }
        })))
        .respond_with(ok(json!([
            { "sourceColumn": "color_name", "rawValue": "Coral", "entityId": "c-7" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let defined = client
        .define_unmapped(
            job_id(),
            &[PendingEntity {
                source_column: "color_name".to_string(),
                raw_value: "Coral".to_string(),
                name: "Coral".to_string(),
            }],
        )
        .await
        .unwrap();
    assert_eq!(defined.len(), 1);
    assert_eq!(defined[0].entity_id, "c-7");
}

#[tokio::test]
async fn review_commit_maps_then_approves() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.status"))
        .respond_with(ok(job_json("validated")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.preview"))
        .respond_with(ok(json!({
            "items": [
                { "rowNumber": 1, "data": { "product_name": "Tee" }, "status": "valid" }
            ],
            "page": 1, "pageSize": 50, "total": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.errors"))
        .respond_with(ok(json!({ "items": [], "page": 1, "pageSize": 50, "total": 0 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.unmapped.list"))
        .respond_with(ok(json!([
            { "rawValue": "Coral", "sourceColumn": "color_name", "affectedRows": [1] }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.unmapped.map"))
        .and(body_json(json!({
            "input": {
                "jobId": JOB_ID,
                "sourceColumn": "color_name",
                "rawValue": "Coral",
                "entityId": "c-1"
            }
        })))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc/bulkImport.approve"))
        .respond_with(ok(job_json("completed")))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let mut review = ImportReview::load(&client, job_id(), 50).await.unwrap();
    assert_eq!(review.preview().items.len(), 1);
    assert_eq!(review.unresolved().len(), 1);

    review.map_value("color_name", "Coral", "c-1").unwrap();
    let job = review.commit().await.unwrap();

    assert_eq!(job.status, ImportJobStatus::Completed);
    assert_eq!(review.stage(), ReviewStage::Committed);
}
