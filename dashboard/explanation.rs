//! The static feature-importance panel.
//!
//! The importance plot is produced upstream and shown as-is. A missing or
//! undecodable picture only hides this panel.

use crate::error::DashboardError;
use image::DynamicImage;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

pub const EXPLANATION_TITLE: &str = "Explaining the predictions";

pub const EXPLANATION_CAPTION: [&str; 2] = [
    "Blue points stand for low values of the feature and red points for high values. \
     The further left a point sits, the more it lowers the score (towards more solvency), \
     and the further right, the more it raises it.",
    "For example, a high age (red points of DAYS_BIRTH) goes together with good solvency \
     (points on the left).",
];

/// A decoded importance plot.
#[derive(Debug, Clone)]
pub struct ExplanationImage {
    path: PathBuf,
    image: DynamicImage,
}

impl ExplanationImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Downsampled RGB pixels, row-major, for front ends that cannot show the
    /// full-resolution picture.
    pub fn preview(&self, columns: u32, rows: u32) -> Vec<Vec<[u8; 3]>> {
        let small = self
            .image
            .resize_exact(columns.max(1), rows.max(1), FilterType::Triangle)
            .to_rgb8();
        small
            .rows()
            .map(|row| row.map(|pixel| pixel.0).collect())
            .collect()
    }
}

pub fn load_explanation_image(path: &Path) -> Result<ExplanationImage, DashboardError> {
    match image::open(path) {
        Ok(image) => {
            log::info!(
                "Loaded explanation image '{}' ({}x{})",
                path.display(),
                image.width(),
                image.height()
            );
            Ok(ExplanationImage {
                path: path.to_path_buf(),
                image,
            })
        }
        Err(err) => {
            log::warn!("Explanation image '{}' unavailable: {err}", path.display());
            Err(DashboardError::ImageUnavailable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        }
    }
}
