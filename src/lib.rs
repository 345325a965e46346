//! Skillsprint: personalised learning roadmaps
//!
//! Generates a Roadmap → Phase → Topic → InfoBit tree (one quiz per infobit),
//! enriches every topic with web and video resources through a bounded chain of
//! resumable hops, stores the tree as flat records, and layers per-user progress on
//! top of the stored roadmap.

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod tree;
pub mod types;
