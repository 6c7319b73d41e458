//! Recurring invoice templates and occurrence generation.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod recurrence;
pub mod services;
pub mod startup;
