//! Integration tests entry point
//!
//! Pulls in every module under integration/ so they build as one test binary.

mod integration;
