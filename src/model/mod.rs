//! Core data structures representing trajectory snapshots.
//!
//! This module provides the foundational types that flow through `traj-detect`:
//!
//! - [`types`] – Periodic table elements.
//! - [`atom`] – Minimal atom representation with id, element, and Cartesian coordinates.
//! - [`step`] – One trajectory step: timestep, periodic box, and its atom set.
//! - [`table`] – The immutable species-index-to-element mapping supplied by the caller.
//!
//! Everything here is plain data: once built, these values are immutable and
//! safe to share read-only across worker threads processing independent steps.

pub mod atom;
pub mod step;
pub mod table;
pub mod types;
