// src/lib.rs

//! algograde
//!
//! Executes untrusted solutions in JavaScript, Python, Java and C++ as
//! isolated child processes, grades them against input/expected-output
//! fixtures and scores the result.
//!
//! Pipeline: [`runners`] → [`engine::Engine`] → [`engine::Grader`] →
//! [`engine::ValidationReport`]. The CLI ([`commands`]) and the HTTP
//! runtime ([`runtime`]) are thin layers over it.

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod metrics;
pub mod request_id;
pub mod runners;
pub mod runtime;
pub mod shim;
pub mod suite;
pub mod util;

pub use error::GradeError;
