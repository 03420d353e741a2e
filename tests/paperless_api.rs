use chrono::NaiveDate;
use serde_json::json;
use statement_audit::archive::{PaperlessClient, StatementSource};
use statement_audit::config::PaperlessConfig;
use statement_audit::matcher::{DateWindow, DocumentSearch};
use statement_audit::models::AuditPeriod;
use statement_audit::notes::{NoteStore, NoteSync, NoteSynchronizer};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> PaperlessClient {
    PaperlessClient::new(&PaperlessConfig {
        base_url: format!("{}/", server.uri()),
        token: TOKEN.to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_search_sends_query_and_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .and(header("Authorization", "Token test-token"))
        .and(query_param("query", "Acme Ltd 120.50"))
        .and(query_param("page_size", "10"))
        .and(query_param("created__date__gte", "2025-02-08"))
        .and(query_param("created__date__lte", "2025-03-24"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "results": [
                {"id": 17, "title": "March statement", "tags": [9], "content": "..."},
                {"id": 42, "title": "Acme Invoice 55231", "tags": []}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client(&server)
        .search(
            "Acme Ltd 120.50",
            Some(DateWindow {
                from: NaiveDate::from_ymd_opt(2025, 2, 8).unwrap(),
                to: NaiveDate::from_ymd_opt(2025, 3, 24).unwrap(),
            }),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].has_tag(9));
    assert_eq!(results[1].id, 42);
    assert_eq!(results[1].title, "Acme Invoice 55231");
}

#[tokio::test]
async fn test_search_without_window_sends_no_date_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .and(query_param("query", "120.50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [{"id": 8, "title": "Receipt"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client(&server).search("120.50", None).await.unwrap();
    assert_eq!(results[0].id, 8);

    let requests = server.received_requests().await.unwrap();
    let keys: Vec<String> = requests[0]
        .url
        .query_pairs()
        .map(|(key, _)| key.into_owned())
        .collect();
    assert!(!keys.iter().any(|k| k.starts_with("created__date")));
}

#[tokio::test]
async fn test_list_statements_follows_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .and(query_param("tags__id__all", "9"))
        .and(query_param("created__date__gte", "2025-12-01"))
        .and(query_param("created__date__lt", "2026-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}/api/documents/?page=2", server.uri()),
            "results": [{"id": 1, "title": "Bank A"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [{"id": 2, "title": null}]
        })))
        .mount(&server)
        .await;

    let statements = client(&server)
        .list_statements(9, AuditPeriod::new(2025, 12).unwrap())
        .await
        .unwrap();

    let ids: Vec<u64> = statements.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(statements[1].display_title(), "Document #2");
}

#[tokio::test]
async fn test_download_original_reads_filename() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/5/download/"))
        .and(query_param("original", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="march.csv""#)
                .set_body_bytes(b"Date,Amount\n".to_vec()),
        )
        .mount(&server)
        .await;

    let original = client(&server).download_original(5).await.unwrap();
    assert_eq!(original.filename, "march.csv");
    assert_eq!(original.bytes, b"Date,Amount\n");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/5/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let err = client(&server).document_content(5).await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_audit_note_replaced_through_api() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/17/notes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "note": "Checked by accountant"},
            {"id": 4, "note": "[AUDIT] 0/1\n\n..."}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/documents/17/notes/"))
        .and(query_param("id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/documents/17/notes/"))
        .and(body_json(json!({ "note": "[AUDIT] 0/0" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store: Arc<dyn NoteStore> = Arc::new(client(&server));
    let sync = NoteSynchronizer::new(store);

    let outcome = sync.write_audit_note(17, &[]).await.unwrap();
    assert_eq!(outcome, NoteSync::Replaced);
}
