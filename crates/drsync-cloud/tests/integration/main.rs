//! Integration tests for drsync-cloud
//!
//! Uses wiremock to simulate the Dropbox and Google Drive HTTP APIs and
//! verifies token exchange, listing, probing, transfers and error mapping,
//! plus remote walks and download plans over the Drive client.

mod common;

mod test_auth;
mod test_parent_link;
mod test_path_store;
mod test_remote_walk;
