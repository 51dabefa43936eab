//! Integration tests for the Dropbox (path-store) client

use drsync_core::domain::{RemoteId, RemotePath};
use drsync_core::ports::{CloudError, ICloudClient};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common;

fn remote(p: &str) -> RemotePath {
    RemotePath::new(p).unwrap()
}

/// Matches requests whose `Dropbox-API-Arg` header decodes to `expected`
fn api_arg(expected: serde_json::Value) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |request: &Request| {
        request
            .headers
            .get("Dropbox-API-Arg")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| serde_json::from_str::<serde_json::Value>(v).ok())
            .is_some_and(|v| v == expected)
    }
}

fn file_metadata(path_display: &str) -> serde_json::Value {
    let name = path_display.rsplit('/').next().unwrap_or_default();
    serde_json::json!({
        ".tag": "file",
        "name": name,
        "path_display": path_display,
        "path_lower": path_display.to_lowercase(),
        "id": format!("id:{name}"),
        "size": 3
    })
}

fn not_found_409() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(serde_json::json!({
        "error_summary": "path/not_found/..",
        "error": {".tag": "path", "path": {".tag": "not_found"}}
    }))
}

// ============================================================================
// Account
// ============================================================================

#[tokio::test]
async fn test_account_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/users/get_current_account"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "account_id": "dbid:1",
            "name": {"display_name": "Dee Box", "given_name": "Dee"},
            "email": "dee@example.com"
        })))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let info = client.account_info().await.unwrap();
    assert_eq!(info.display_name, "Dee Box");
    assert_eq!(info.email.as_deref(), Some("dee@example.com"));
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/users/get_current_account"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error_summary": "expired_access_token/..",
        })))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert_eq!(client.account_info().await.unwrap_err(), CloudError::AuthExpired);
}

#[tokio::test]
async fn test_server_error_maps_to_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/users/get_current_account"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert!(matches!(
        client.account_info().await,
        Err(CloudError::Transport(_))
    ));
}

#[tokio::test]
async fn test_unparsable_json_maps_to_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/users/get_current_account"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert!(matches!(
        client.account_info().await,
        Err(CloudError::Malformed(_))
    ));
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_children_follows_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_json(serde_json::json!({
            "path": "/Packages",
            "recursive": false,
            "include_deleted": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                {".tag": "folder", "name": "Theme", "path_display": "/Packages/Theme", "id": "id:t"},
                file_metadata("/Packages/a.py")
            ],
            "cursor": "c1",
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder/continue"))
        .and(body_json(serde_json::json!({"cursor": "c1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                {".tag": "deleted", "name": "gone.py", "path_display": "/Packages/gone.py"},
                file_metadata("/Packages/b.py")
            ],
            "cursor": "c2",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let entries = client.list_children(&remote("/Packages")).await.unwrap();

    let listed: Vec<(&str, &str, bool)> = entries
        .iter()
        .map(|e| (e.relative_path.as_str(), e.remote_id.as_str(), e.is_folder))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("/Packages/Theme", "/Packages/Theme", true),
            ("/Packages/a.py", "/Packages/a.py", false),
            ("/Packages/b.py", "/Packages/b.py", false),
        ]
    );
}

#[tokio::test]
async fn test_list_root_sends_empty_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_json(serde_json::json!({
            "path": "",
            "recursive": false,
            "include_deleted": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [], "cursor": "c", "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert!(client.list_children(&RemotePath::root()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_missing_folder_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .respond_with(not_found_409())
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let err = client.list_children(&remote("/Installed Packages")).await.unwrap_err();
    assert_eq!(err, CloudError::NotFound("/Installed Packages".into()));
}

// ============================================================================
// Probing
// ============================================================================

#[tokio::test]
async fn test_stat_existing_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/get_metadata"))
        .and(body_json(serde_json::json!({"path": "/User/a.json"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_metadata("/User/a.json")))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let entry = client.stat(&remote("User/a.json")).await.unwrap();
    assert_eq!(entry.relative_path.as_str(), "/User/a.json");
}

#[tokio::test]
async fn test_stat_deleted_entry_counts_as_absent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/get_metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            ".tag": "deleted", "name": "a.json", "path_display": "/User/a.json"
        })))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert!(client.stat(&remote("/User/a.json")).await.unwrap_err().is_not_found());
    assert!(client.probe(&remote("/User/a.json")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_probe_missing_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/get_metadata"))
        .respond_with(not_found_409())
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert_eq!(client.probe(&remote("/x")).await.unwrap(), None);
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_download_by_path_and_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .and(api_arg(serde_json::json!({"path": "/DrSync.drsync-data"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Dropbox-API-Result", file_metadata("/DrSync.drsync-data").to_string())
                .set_body_bytes(b"{\"settings\":{}}".to_vec()),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let by_path = client.get_file(&remote("/DrSync.drsync-data")).await.unwrap();
    let by_id = client
        .get_content(&RemoteId::new("/DrSync.drsync-data").unwrap())
        .await
        .unwrap();
    assert_eq!(by_path, b"{\"settings\":{}}");
    assert_eq!(by_id, by_path);
}

#[tokio::test]
async fn test_download_without_result_header_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert!(matches!(
        client.get_file(&remote("/a")).await,
        Err(CloudError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_download_missing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(not_found_409())
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    assert!(client.get_file(&remote("/DrSync.drsync-data")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_upload_overwrite_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(header("content-type", "application/octet-stream"))
        .and(api_arg(serde_json::json!({
            "path": "/User/a.json",
            "mode": "overwrite",
            "autorename": false,
            "mute": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_metadata("/User/a.json")))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let entry = client.put_file(&remote("/User/a.json"), b"{}", true).await.unwrap();
    assert_eq!(entry.relative_path.as_str(), "/User/a.json");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, b"{}");
}

#[tokio::test]
async fn test_upload_add_mode_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(api_arg(serde_json::json!({
            "path": "/a",
            "mode": "add",
            "autorename": false,
            "mute": true
        })))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error_summary": "path/conflict/file/...",
            "error": {".tag": "path"}
        })))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let err = client.put_file(&remote("/a"), b"x", false).await.unwrap_err();
    assert_eq!(err, CloudError::Conflict("/a".into()));
}

#[tokio::test]
async fn test_remove_file_and_missing_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .and(body_json(serde_json::json!({"path": "/DrSync.drsync-data"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metadata": file_metadata("/DrSync.drsync-data")
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .and(body_json(serde_json::json!({"path": "/missing"})))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error_summary": "path_lookup/not_found/.."
        })))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    client.remove_file(&remote("/DrSync.drsync-data")).await.unwrap();
    client.remove_file(&remote("/missing")).await.unwrap();
}

#[tokio::test]
async fn test_other_rejections_carry_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Error in call to API function"))
        .mount(&server)
        .await;

    let client = common::path_store_client(&server);
    let err = client.remove_file(&remote("/a")).await.unwrap_err();
    assert_eq!(
        err,
        CloudError::Rejected {
            status: 400,
            message: "Error in call to API function".into()
        }
    );
}

#[tokio::test]
async fn test_ensure_folder_is_a_no_op() {
    let server = MockServer::start().await;
    let client = common::path_store_client(&server);

    assert_eq!(client.ensure_folder(&remote("/a/b")).await.unwrap(), None);
    assert!(server.received_requests().await.unwrap().is_empty());
}
