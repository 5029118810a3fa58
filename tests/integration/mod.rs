//! Integration tests for reprokit
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod bundle_flow;
pub mod cli;
pub mod record_flow;
