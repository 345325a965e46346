//! Progress overlay: per-user mutable state layered over an immutable roadmap.

pub mod store;

pub use store::{OverlayPatch, OverlayStore, ProgressStatus, UserRoadmap};
