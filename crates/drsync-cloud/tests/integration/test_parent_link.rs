//! Integration tests for the Google Drive (parent-link) client
//!
//! Runs the client against [`FakeDrive`], which keeps objects, parent links
//! and duplicate titles the way Drive does.

use drsync_core::domain::{RemoteId, RemotePath};
use drsync_core::ports::{CloudError, ICloudClient};

use crate::common::{self, FakeDrive};

fn path(p: &str) -> RemotePath {
    RemotePath::new(p).unwrap()
}

#[tokio::test]
async fn test_account_info() {
    let (server, _fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    let info = client.account_info().await.expect("account info");
    assert_eq!(info.display_name, "Drive Tester");
    assert_eq!(info.email.as_deref(), Some("tester@example.com"));
}

// ============================================================================
// ensure_folder
// ============================================================================

#[tokio::test]
async fn test_ensure_folder_creates_each_segment_once() {
    let (server, fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    let first = client.ensure_folder(&path("/a/b")).await.unwrap();
    let second = client.ensure_folder(&path("/a/b")).await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(fake.folders_created(), 2);

    let third = client.ensure_folder(&path("/a/b")).await.unwrap();
    assert_eq!(third, first);
    assert_eq!(fake.folders_created(), 2);

    let a = fake.named("appdata", "a");
    assert_eq!(a.len(), 1);
    let b = fake.named(&a[0].id, "b");
    assert_eq!(b.len(), 1);
    assert_eq!(first, Some(RemoteId::new(b[0].id.clone()).unwrap()));
}

#[tokio::test]
async fn test_ensure_folder_reuses_existing_folders() {
    let (server, fake) = FakeDrive::start().await;
    let existing = fake.seed("Packages", "appdata", true, b"");
    let client = common::parent_link_client(&server);

    let id = client.ensure_folder(&path("/Packages")).await.unwrap();
    assert_eq!(id, Some(RemoteId::new(existing).unwrap()));
    assert_eq!(fake.folders_created(), 0);
}

#[tokio::test]
async fn test_ensure_folder_ignores_files_with_same_title() {
    let (server, fake) = FakeDrive::start().await;
    fake.seed("User", "appdata", false, b"not a folder");
    let client = common::parent_link_client(&server);

    client.ensure_folder(&path("/User")).await.unwrap();
    assert_eq!(fake.folders_created(), 1);
}

// ============================================================================
// put_file / remove_file
// ============================================================================

#[tokio::test]
async fn test_put_replaces_every_duplicate() {
    let (server, fake) = FakeDrive::start().await;
    fake.seed("x", "appdata", false, b"old one");
    fake.seed("x", "appdata", false, b"old two");
    let client = common::parent_link_client(&server);

    let entry = client.put_file(&path("/x"), b"fresh", true).await.unwrap();

    let copies = fake.named("appdata", "x");
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].content, b"fresh");
    assert_eq!(entry.remote_id.as_str(), copies[0].id);
    assert_eq!(entry.relative_path.as_str(), "/x");
}

#[tokio::test]
async fn test_put_ignores_overwrite_flag() {
    let (server, fake) = FakeDrive::start().await;
    fake.seed("x", "appdata", false, b"old");
    let client = common::parent_link_client(&server);

    client.put_file(&path("/x"), b"new", false).await.unwrap();

    let copies = fake.named("appdata", "x");
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].content, b"new");
}

#[tokio::test]
async fn test_put_creates_parent_folders() {
    let (server, fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    client
        .put_file(&path("/Packages/User/a.json"), b"{}", true)
        .await
        .unwrap();

    let packages = fake.named("appdata", "Packages");
    assert_eq!(packages.len(), 1);
    let user = fake.named(&packages[0].id, "User");
    assert_eq!(user.len(), 1);
    assert_eq!(fake.named(&user[0].id, "a.json").len(), 1);
    assert_eq!(fake.folders_created(), 2);
}

#[tokio::test]
async fn test_remove_missing_file_is_success() {
    let (server, _fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    client.remove_file(&path("/DrSync.drsync-data")).await.unwrap();
    client.remove_file(&path("/no/such/file")).await.unwrap();
}

#[tokio::test]
async fn test_remove_keeps_folders_with_same_title() {
    let (server, fake) = FakeDrive::start().await;
    fake.seed("x", "appdata", true, b"");
    fake.seed("x", "appdata", false, b"file");
    let client = common::parent_link_client(&server);

    client.remove_file(&path("/x")).await.unwrap();

    let left = fake.named("appdata", "x");
    assert_eq!(left.len(), 1);
    assert!(left[0].is_folder);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_get_file_and_get_content() {
    let (server, fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    let entry = client
        .put_file(&path("/User/Preferences.sublime-settings"), b"{\"font_size\": 12}", true)
        .await
        .unwrap();

    let by_path = client
        .get_file(&path("/User/Preferences.sublime-settings"))
        .await
        .unwrap();
    let by_id = client.get_content(&entry.remote_id).await.unwrap();

    assert_eq!(by_path, b"{\"font_size\": 12}");
    assert_eq!(by_id, by_path);
    assert_eq!(fake.folders_created(), 1);
}

#[tokio::test]
async fn test_get_file_missing_is_not_found() {
    let (server, _fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    let err = client.get_file(&path("/DrSync.drsync-data")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.get_file(&path("/missing/dir/file")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_stat_and_probe() {
    let (server, fake) = FakeDrive::start().await;
    let folder = fake.seed("User", "appdata", true, b"");
    fake.seed("a.json", &folder, false, b"{}");
    let client = common::parent_link_client(&server);

    let entry = client.stat(&path("/User/a.json")).await.unwrap();
    assert_eq!(entry.relative_path.as_str(), "/User/a.json");
    assert!(!entry.is_folder);

    let dir = client.stat(&path("/User")).await.unwrap();
    assert!(dir.is_folder);
    assert_eq!(dir.remote_id.as_str(), folder);

    assert!(client.probe(&path("/User/b.json")).await.unwrap().is_none());
    assert!(matches!(
        client.stat(&path("/Nope/a.json")).await,
        Err(CloudError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_children_builds_relative_paths() {
    let (server, fake) = FakeDrive::start().await;
    let packages = fake.seed("Packages", "appdata", true, b"");
    fake.seed("Theme", &packages, true, b"");
    fake.seed("README.md", &packages, false, b"hi");
    let client = common::parent_link_client(&server);

    let entries = client.list_children(&path("/Packages")).await.unwrap();
    let paths: Vec<(&str, bool)> = entries
        .iter()
        .map(|e| (e.relative_path.as_str(), e.is_folder))
        .collect();
    assert_eq!(
        paths,
        vec![("/Packages/Theme", true), ("/Packages/README.md", false)]
    );
}

#[tokio::test]
async fn test_list_missing_folder_is_not_found() {
    let (server, _fake) = FakeDrive::start().await;
    let client = common::parent_link_client(&server);

    let err = client.list_children(&path("/Installed Packages")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_root_lists_appdata() {
    let (server, fake) = FakeDrive::start().await;
    fake.seed("DrSync.drsync-data", "appdata", false, b"{}");
    let client = common::parent_link_client(&server);

    let entries = client.list_children(&RemotePath::root()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].relative_path.as_str(), "/DrSync.drsync-data");
}
