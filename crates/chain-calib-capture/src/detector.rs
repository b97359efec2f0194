use chain_calib_core::Pt2;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Internal corner grid of a checkerboard, as `(columns, rows)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSize {
    pub cols: u32,
    pub rows: u32,
}

impl PatternSize {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    pub fn is_valid(&self) -> bool {
        self.cols > 0 && self.rows > 0
    }

    /// Number of inner corners a full detection yields.
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

impl From<(u32, u32)> for PatternSize {
    fn from((cols, rows): (u32, u32)) -> Self {
        Self::new(cols, rows)
    }
}

/// External checkerboard corner detector.
///
/// Returns the detected corners in the detector's native row-major `(x, y)`
/// order, or `None` when the pattern was not found.
pub trait FeatureDetector: Send + Sync {
    fn find_corners(&self, image: &GrayImage, pattern: PatternSize) -> Option<Vec<Pt2>>;
}

impl<F> FeatureDetector for F
where
    F: Fn(&GrayImage, PatternSize) -> Option<Vec<Pt2>> + Send + Sync,
{
    fn find_corners(&self, image: &GrayImage, pattern: PatternSize) -> Option<Vec<Pt2>> {
        self(image, pattern)
    }
}
