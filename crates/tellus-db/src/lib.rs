//! Tellus DB - PostgreSQL storage for harvested catalogs
//!
//! This crate implements the storage traits of `tellus-core` on top of
//! PostgreSQL with sqlx.
//!
//! # Overview
//!
//! The main components are:
//! - [`NodeRepository`] - catalog/dataset/distribution/field nodes and payloads
//! - [`TaskRepository`] - harvest run records with their logs
//! - [`ScheduleRepository`] - repeatable job registrations
//! - [`run_migrations`] - creates the schema

mod node_repository;
mod schedule_repository;
mod schema;
mod task_repository;

pub use node_repository::NodeRepository;
pub use schedule_repository::ScheduleRepository;
pub use schema::{MIGRATIONS, run_migrations};
pub use task_repository::TaskRepository;
