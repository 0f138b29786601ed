//! apexcov: LCOV coverage reports for Apex code.
//!
//! A run logs in through the SOAP partner API ([`login`]), queries the
//! `ApexCodeCoverageAggregate` tooling object ([`coverage`]) and renders the
//! records that have a local source file as an LCOV tracefile ([`report`]).
//! [`generate`] ties the steps together; [`cli`] is the command-line surface.

pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod generate;
pub mod login;
pub mod report;

pub use cli::{run, Cli};
pub use error::{Error, Result};
