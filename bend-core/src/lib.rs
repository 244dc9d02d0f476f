//! Core morphology bending and rotation-chain library.
//!
//! Main components:
//! - [`morphology`] — sections, the shared geometry buffer and validated
//!   parent-before-child traversal.
//! - [`boundary`] — the [`boundary::BoundaryField`] trait, reference fields
//!   and inside checks.
//! - [`bend`] — probabilistic bending of points away from the border.
//! - [`codec`] — lossless rotation/length chains and retargeting.
//! - [`config`] — parameters of the bending algorithm.
//! - [`distance_cache`] — per-bend memo of distance queries.
//! - [`rotation`] / [`sampling`] — rotation and random-draw helpers.
//! - [`error`] — topology and numeric errors.
//! - [`types`] — shared type aliases and IDs.

pub mod bend;
pub mod boundary;
pub mod codec;
pub mod config;
pub mod distance_cache;
pub mod error;
pub mod morphology;
pub mod rotation;
pub mod sampling;
pub mod types;
