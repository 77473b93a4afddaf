#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Procedural track-easement geometry engine.
//!
//! The engine-independent core of a train-set construction game: it fits
//! Euler-spiral (clothoid) transition curves between track anchors, samples
//! them into rail points, deforms straight track meshes onto the solved
//! curves, and crops track meshes against axis-aligned boxes.
//!
//! Everything here is pure, synchronous, and stateless: callers supply
//! anchor points, directions, meshes, and bounds, and receive solved spiral
//! parameters, bent meshes, cropped meshes, or arc-length sample arrays.
//! Host-engine concerns (scenes, rendering, physics, persistence) live with
//! the caller.

pub mod geom;
