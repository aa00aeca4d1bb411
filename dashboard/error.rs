//! The dashboard's error taxonomy.
//!
//! Only `DataUnavailable` is fatal: it means there is no table to explore. Every
//! other variant is local to the panel that raised it, and the view layer turns it
//! into a notice while the rest of the dashboard keeps rendering.

use crate::data::DataError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("The client dataset could not be loaded: {0}")]
    DataUnavailable(#[from] DataError),

    #[error("No client has the identifier {client_id}. Identifiers run from 0 to {last_id}.")]
    ClientNotFound { client_id: i64, last_id: usize },

    #[error("No data in this group.")]
    EmptyGroup,

    #[error(
        "The feature '{0}' takes a single value across all clients, so no histogram can be drawn."
    )]
    DegenerateRange(String),

    #[error("The explanation image '{}' is unavailable: {reason}", path.display())]
    ImageUnavailable { path: PathBuf, reason: String },

    #[error("'{0}' is not a feature of the client dataset.")]
    UnknownFeature(String),

    #[error("The tolerance threshold must be a percentage between 0 and 100, got {0}.")]
    InvalidThreshold(f64),
}

impl DashboardError {
    /// True when the session cannot continue without this piece of data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DataUnavailable(_))
    }
}
