//! Shared utility functions.

pub mod decimal;
