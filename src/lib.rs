//! Drone Arena Simulation Library
//!
//! Fixed-step simulation core for a top-down drone arena: rigid-body
//! physics, layered collision with enter/stay/exit events, spatial
//! perception, and behavior-tree driven AI.
//!
//! # Features
//!
//! - `trace_ticks` - Per-tick trace logging of entity and contact counts

pub mod behavior;
pub mod config;
pub mod game;
pub mod util;
