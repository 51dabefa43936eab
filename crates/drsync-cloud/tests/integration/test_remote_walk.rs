//! Walking and download planning over the parent-link client
//!
//! Folder ids are resolved title by title from `appdata`, and every listing
//! is split into pages so the walk has to follow page tokens.

use drsync_core::domain::{RemoteId, RemotePath, SyncFlags};
use drsync_core::ports::RemoteEntry;
use drsync_sync::planner::{self, LocalRoots};
use drsync_sync::walker;
use tempfile::TempDir;

use crate::common::{self, FakeDrive};

/// appdata/Packages/{Lint/{a.py, sub/{b.py}, c.py}, top.txt}
fn seed_packages(fake: &FakeDrive) -> String {
    let packages = fake.seed("Packages", "appdata", true, b"");
    let lint = fake.seed("Lint", &packages, true, b"");
    fake.seed("top.txt", &packages, false, b"top");
    let a = fake.seed("a.py", &lint, false, b"a");
    let sub = fake.seed("sub", &lint, true, b"");
    fake.seed("c.py", &lint, false, b"c");
    fake.seed("b.py", &sub, false, b"b");
    a
}

fn paths(entries: &[RemoteEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.relative_path.as_str()).collect()
}

#[tokio::test]
async fn test_walk_is_pre_order_across_pages() {
    let (server, fake) = FakeDrive::start().await;
    let a_id = seed_packages(&fake);
    fake.paginate(2);
    let client = common::parent_link_client(&server);

    let files = walker::walk(&client, &RemotePath::new("/Packages").unwrap())
        .await
        .unwrap();

    assert_eq!(
        paths(&files),
        vec![
            "/Packages/Lint/a.py",
            "/Packages/Lint/sub/b.py",
            "/Packages/Lint/c.py",
            "/Packages/top.txt",
        ]
    );
    assert!(files.iter().all(|f| !f.is_folder));
    assert_eq!(files[0].remote_id, RemoteId::new(a_id).unwrap());
    // Lint has three children, so its listing spans two pages
    assert!(fake.page_tokens().contains(&"offset-2".to_string()));
}

#[tokio::test]
async fn test_walk_of_missing_root_is_empty() {
    let (server, fake) = FakeDrive::start().await;
    seed_packages(&fake);
    let client = common::parent_link_client(&server);

    let files = walker::walk(&client, &RemotePath::new("/Installed Packages").unwrap())
        .await
        .unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_plan_download_maps_remote_files_to_local_paths() {
    let (server, fake) = FakeDrive::start().await;
    seed_packages(&fake);
    fake.paginate(1);
    let client = common::parent_link_client(&server);

    let tmp = TempDir::new().unwrap();
    let roots = LocalRoots::new(
        tmp.path().join("Installed Packages"),
        tmp.path().join("Packages"),
        "User",
    );
    let mut flags = SyncFlags::none();
    flags.installed_packages = true;
    flags.local_packages = true;

    let plan = planner::plan_download(&client, &roots, &flags).await.unwrap();

    let local: Vec<_> = plan.items.iter().map(|item| item.local_path().unwrap()).collect();
    assert_eq!(
        local,
        vec![
            roots.packages.join("Lint").join("a.py"),
            roots.packages.join("Lint").join("sub").join("b.py"),
            roots.packages.join("Lint").join("c.py"),
            roots.packages.join("top.txt"),
        ]
    );
    assert!(plan.items.iter().all(|item| item.local_root == roots.packages));
}
