//! Donations API Library
//!
//! This crate provides the donation intent creation flow: amount
//! normalization, idempotent payment intent creation against the processor,
//! and duplicate-tolerant donation record keeping.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// All application routes, without middleware layers. `main` wraps these in
/// tracing/CORS/timeout layers; tests drive them directly.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(handlers::health::ping))
        .nest("/health", handlers::health::health_routes())
        .nest("/donations", handlers::donations::donation_routes())
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
}
