//! New Overlord map editor library
//!
//! World model, terrain catalog, settlement naming and the interaction
//! controller, plus the backend client and terminal front end used by the
//! binary.

pub mod backend;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod economics;
pub mod explorer;
pub mod geometry;
pub mod movement;
pub mod naming;
pub mod panel;
pub mod terrain;
pub mod world;
pub mod world_file;
