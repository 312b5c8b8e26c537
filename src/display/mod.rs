// src/display/mod.rs
//! Display modules for run state

pub mod terminal;

pub use terminal::TerminalDisplay;
