//! Image recognition collaborator for the scheduler.
//!
//! The core only talks to the [`Vision`] trait: template search returning
//! found/not-found plus coordinates, and text (digit) recognition inside an
//! area. [`TemplateVision`] is the bundled implementation built on `imageproc`.

pub mod library;
pub mod matcher;
pub mod ocr;
pub mod pool;
pub mod templates;

use crate::geometry::{Area, Point};
use async_trait::async_trait;
use image::{GrayImage, RgbImage};
use std::sync::Arc;
use thiserror::Error;

pub use library::{LoadedTemplate, TemplateLibrary};
pub use pool::MatchPool;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Failed to decode screenshot: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Template '{name}' not found in {dir}")]
    TemplateNotFound { name: String, dir: String },

    #[error("Failed to load template {path}: {description}")]
    TemplateLoad { path: String, description: String },

    #[error("Template '{name}' ({template_w}x{template_h}) does not fit search area {area:?}")]
    AreaTooSmall {
        name: String,
        template_w: u32,
        template_h: u32,
        area: Area,
    },

    #[error("Matching worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Matching pool is closed")]
    PoolClosed,
}

/// Decoded screenshot, shared cheaply between searches.
#[derive(Clone)]
pub struct Screenshot {
    rgb: Arc<RgbImage>,
    gray: Arc<GrayImage>,
}

impl Screenshot {
    pub fn decode(png: &[u8]) -> Result<Self, VisionError> {
        let img = image::load_from_memory(png)?;
        Ok(Self::from_rgb(img.to_rgb8()))
    }

    pub fn from_rgb(rgb: RgbImage) -> Self {
        let gray = image::DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
        Self {
            rgb: Arc::new(rgb),
            gray: Arc::new(gray),
        }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn full_area(&self) -> Area {
        Area::full_screen(self.width(), self.height())
    }
}

/// Result of a template search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub found: bool,
    /// Center of the best match, in screen coordinates
    pub point: Point,
    pub score: f32,
}

impl MatchResult {
    pub fn not_found(score: f32) -> Self {
        Self {
            found: false,
            point: Point::new(0, 0),
            score,
        }
    }
}

#[async_trait]
pub trait Vision: Send + Sync {
    /// Colour template search. `area` of `None` uses the template's default area, else full screen.
    async fn search(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
    ) -> Result<MatchResult, VisionError>;

    async fn search_grayscale(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
    ) -> Result<MatchResult, VisionError>;

    /// All non-overlapping matches above `threshold`, best first.
    async fn search_all(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<MatchResult>, VisionError>;

    /// Recognise text inside `area`.
    async fn read_text(&self, screenshot: &Screenshot, area: Area) -> Result<String, VisionError>;
}

/// Default [`Vision`] implementation: templates from disk, matching on the blocking pool.
pub struct TemplateVision {
    library: Arc<TemplateLibrary>,
    pool: MatchPool,
}

impl TemplateVision {
    pub fn new(library: Arc<TemplateLibrary>, pool: MatchPool) -> Self {
        Self { library, pool }
    }

    fn resolve_area(&self, screenshot: &Screenshot, template: &LoadedTemplate, area: Option<Area>) -> Area {
        area.or(template.default_area)
            .unwrap_or_else(|| screenshot.full_area())
            .clip_to(screenshot.width(), screenshot.height())
    }

    async fn search_best(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
        color: bool,
    ) -> Result<MatchResult, VisionError> {
        let tpl = self.library.get(template)?;
        let area = self.resolve_area(screenshot, &tpl, area);
        let shot = screenshot.clone();
        let best = self
            .pool
            .run(move || {
                if color {
                    matcher::best_match_color(shot.rgb(), &tpl, area)
                } else {
                    matcher::best_match_gray(shot.gray(), &tpl, area)
                }
            })
            .await??;
        Ok(match best {
            Some(m) if m.score >= threshold => MatchResult {
                found: true,
                point: m.center,
                score: m.score,
            },
            Some(m) => MatchResult::not_found(m.score),
            None => MatchResult::not_found(0.0),
        })
    }
}

#[async_trait]
impl Vision for TemplateVision {
    async fn search(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
    ) -> Result<MatchResult, VisionError> {
        self.search_best(screenshot, template, area, threshold, true).await
    }

    async fn search_grayscale(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
    ) -> Result<MatchResult, VisionError> {
        self.search_best(screenshot, template, area, threshold, false).await
    }

    async fn search_all(
        &self,
        screenshot: &Screenshot,
        template: &str,
        area: Option<Area>,
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<MatchResult>, VisionError> {
        let tpl = self.library.get(template)?;
        let area = self.resolve_area(screenshot, &tpl, area);
        let shot = screenshot.clone();
        let matches = self
            .pool
            .run(move || matcher::all_matches_gray(shot.gray(), &tpl, area, threshold, max_results))
            .await??;
        Ok(matches
            .into_iter()
            .map(|m| MatchResult {
                found: true,
                point: m.center,
                score: m.score,
            })
            .collect())
    }

    async fn read_text(&self, screenshot: &Screenshot, area: Area) -> Result<String, VisionError> {
        let glyphs = ocr::load_glyphs(&self.library)?;
        let area = area.clip_to(screenshot.width(), screenshot.height());
        let shot = screenshot.clone();
        self.pool
            .run(move || ocr::read_glyphs(shot.gray(), area, &glyphs, ocr::GLYPH_THRESHOLD))
            .await
    }
}

#[cfg(test)]
mod tests;
