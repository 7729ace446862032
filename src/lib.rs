#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # LIMS Sample Workflow
//!
//! Tracks each received sample through testing, report authoring, review and
//! approval, with an append-only audit trail of every state change.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Workflow states, the transition table, test task statuses
//! - [`models`] - Row types for workflows, audit entries, tasks and registries
//! - [`database`] - The [`database::LimsStore`] trait with PostgreSQL and in-memory backends
//! - [`services`] - Workflow engine, test task lifecycle, commission reaction
//! - [`events`] - Broadcast publisher for committed workflow events
//! - [`web`] - axum HTTP surface with role checks at the boundary
//! - [`config`] - Layered TOML plus environment configuration
//! - [`logging`] - tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lims_workflow::config::LimsConfig;
//! use lims_workflow::database::InMemoryStore;
//! use lims_workflow::web::{create_app, AppState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(Arc::new(InMemoryStore::new()), LimsConfig::default());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, create_app(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;
pub mod state_machine;
pub mod web;

pub use config::{ConfigManager, LimsConfig};
pub use database::{InMemoryStore, LimsStore, PgStore, StoreError};
pub use error::{LimsError, Result};
pub use events::EventPublisher;
pub use services::{ServiceError, TestTaskService, WorkflowEngine};
pub use state_machine::{Priority, TestTaskStatus, WorkflowState};
