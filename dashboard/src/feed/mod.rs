//! # Feed viewer plumbing
//!
//! Configuration, logging, and the in-memory dashboard store behind the
//! `dashboard_feed` binary.

pub mod config;
pub mod logger;
pub mod store;
