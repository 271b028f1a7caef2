//! Errata Control - CLI for recording and exporting error reports

pub mod cli;
pub mod commands;
pub mod logging;
