//! Remote tree walker
//!
//! Depth-first, pre-order traversal of a remote folder that yields files
//! only, in backend listing order. A folder that vanished between listing
//! and descending (`NotFound`) contributes nothing; any other error aborts
//! the whole walk.

use drsync_core::domain::RemotePath;
use drsync_core::ports::{CloudError, ICloudClient, RemoteEntry};
use tracing::debug;

/// Collects every file below `root`
pub async fn walk(client: &dyn ICloudClient, root: &RemotePath) -> Result<Vec<RemoteEntry>, CloudError> {
    let mut files = Vec::new();
    // explicit stack of pending listings; entries are pushed in reverse so
    // they pop in listing order
    let mut stack: Vec<RemoteEntry> = Vec::new();

    let mut pending = Some(root.clone());
    loop {
        if let Some(folder) = pending.take() {
            match client.list_children(&folder).await {
                Ok(children) => stack.extend(children.into_iter().rev()),
                Err(e) if e.is_not_found() => {
                    debug!(path = %folder, "Remote folder absent, skipping subtree");
                }
                Err(e) => return Err(e),
            }
        }

        match stack.pop() {
            Some(entry) if entry.is_folder => pending = Some(entry.relative_path),
            Some(entry) => files.push(entry),
            None => break,
        }
    }

    debug!(root = %root, files = files.len(), "Walked remote tree");
    Ok(files)
}
