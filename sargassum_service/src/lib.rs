//! Sargassum beach risk scoring service.
//!
//! Turns the particle clouds written by an external ocean-drift simulation
//! into per-beach, per-day risk scores for Saint-Barthélemy beaches.
//!
//! Modules:
//! - `model` — shared domain types and errors.
//! - `beaches` — the validated beach registry.
//! - `risk` — kernel scoring and risk classification.
//! - `store` — snapshot and score repositories (memory, postgres).
//! - `pipeline` — the compute-mode controller.
//! - `report` — report-mode rendering.
//! - `config`, `db`, `logging`, `staleness` — service plumbing.

pub mod beaches;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod staleness;
pub mod store;
