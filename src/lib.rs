//! ICON blocks indexer
//!
//! The core of a blockchain indexing service for the ICON chain, specialized
//! to the "blocks" entity. Consumes raw chain events off a streaming message
//! bus, normalizes and enriches them into a consolidated `block` record with
//! per-block aggregates, persists them to a relational store, and fans out
//! near-real-time notifications to HTTP/WebSocket API clients.
//!
//! The pipeline (broker consumer adapters, transformers, per-entity loaders,
//! the cross-entity reload protocol, and the counter/pub-sub coordinator) is
//! the part worth reading closely; the HTTP/WS surface, configuration, and
//! observability layers around it exist to make the pipeline runnable, not
//! to be interesting in their own right.
//!
//! This crate builds two binaries over the modules below: `indexer-worker`
//! runs the pipeline, `indexer-api` serves the read-only HTTP/WS surface.
//! They share the same relational pool and KV client.

pub mod api;
pub mod bigint;
pub mod broadcaster;
pub mod broker;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod kv;
pub mod loader;
pub mod metrics;
pub mod observability;
pub mod retry;
mod testing;
pub mod transform;

mod pipeline_tests;
