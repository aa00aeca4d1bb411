#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod data;
pub mod decision;
pub mod error;
pub mod explanation;
pub mod histogram;
pub mod stats;
pub mod view;

pub use error::DashboardError;
