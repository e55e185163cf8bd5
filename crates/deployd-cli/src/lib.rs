//! Command-line front end for the deployd control plane.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by main.rs
use deployd_axum as _;
use dotenvy as _;
use tokio as _;
use tracing as _;
use tracing_subscriber as _;

pub mod parser;

pub use parser::Cli;
