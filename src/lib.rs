//! Maintenance Scheduling Quickstart
//!
//! Schedules maintenance jobs onto crews and time grains, solving in the
//! background while every improved solution is persisted as assignment deltas.
//!
//! # Domain Model
//!
//! - [`MaintenanceJobAssignment`](domain::MaintenanceJobAssignment): planning entity
//!   with an assigned crew and a starting time grain
//! - [`MaintenanceCrew`](domain::MaintenanceCrew), [`TimeGrain`](domain::TimeGrain),
//!   [`MaintainableUnit`](domain::MaintainableUnit): reference facts
//! - [`MaintenanceSchedule`](domain::MaintenanceSchedule): complete planning solution
//! - [`Room`](geometry::Room): located entity with integer distance
//!
//! # Solving
//!
//! - [`SolverService`](solver::SolverService): submit, stop early, status, fetch current
//! - [`SolverEngine`](engine::SolverEngine): pluggable search engine
//! - [`ScheduleRepository`](repository::ScheduleRepository): delta-only persistence

pub mod api;
pub mod config;
pub mod console;
pub mod constraints;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod repository;
pub mod score;
pub mod solver;
