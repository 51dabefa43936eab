//! DrSync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemotePath`, `RemoteId`, `SyncFlags`, `SyncManifest`
//! - **Port definitions** - Traits for adapters: `ICloudClient`, `IAuthSession`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that the cloud adapter crate implements,
//! and that the sync engine consumes without knowing which backend it talks to.

pub mod config;
pub mod domain;
pub mod ports;
