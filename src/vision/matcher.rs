/// Template matching over screenshots
///
/// Normalised cross-correlation from `imageproc`, restricted to a search
/// area. Colour matching averages the per-channel correlation maps.
use super::VisionError;
use super::library::LoadedTemplate;
use crate::geometry::{Area, Point};
use image::{GrayImage, ImageBuffer, Luma, RgbImage, imageops};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};

type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// A single match in screen coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    pub top_left: Point,
    pub center: Point,
    /// Correlation score (0.0-1.0)
    pub score: f32,
}

impl Match {
    fn at(area: Area, x: u32, y: u32, tw: u32, th: u32, score: f32) -> Self {
        let top_left = Point::new(area.x + x, area.y + y);
        Self {
            top_left,
            center: Point::new(top_left.x + tw / 2, top_left.y + th / 2),
            score,
        }
    }
}

fn check_fits(template: &LoadedTemplate, area: Area) -> Result<(), VisionError> {
    if !area.is_valid() || template.width() > area.width || template.height() > area.height {
        return Err(VisionError::AreaTooSmall {
            name: template.name.clone(),
            template_w: template.width(),
            template_h: template.height(),
            area,
        });
    }
    Ok(())
}

fn crop_gray(image: &GrayImage, area: Area) -> GrayImage {
    imageops::crop_imm(image, area.x, area.y, area.width, area.height).to_image()
}

fn gray_scores(image: &GrayImage, template: &GrayImage, area: Area) -> ScoreMap {
    let region = crop_gray(image, area);
    match_template(&region, template, MatchTemplateMethod::CrossCorrelationNormalized)
}

fn channel(image: &RgbImage, index: usize) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[index]])
    })
}

fn color_scores(image: &RgbImage, template: &RgbImage, area: Area) -> ScoreMap {
    let region = imageops::crop_imm(image, area.x, area.y, area.width, area.height).to_image();
    let mut sum: Option<ScoreMap> = None;
    for index in 0..3 {
        let scores = match_template(
            &channel(&region, index),
            &channel(template, index),
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        sum = Some(match sum {
            None => scores,
            Some(mut acc) => {
                for (a, s) in acc.pixels_mut().zip(scores.pixels()) {
                    a.0[0] += s.0[0];
                }
                acc
            }
        });
    }
    let mut scores = sum.unwrap_or_else(|| ScoreMap::new(0, 0));
    for p in scores.pixels_mut() {
        p.0[0] /= 3.0;
    }
    scores
}

fn best_of(scores: &ScoreMap, area: Area, template: &LoadedTemplate) -> Option<Match> {
    if scores.width() == 0 || scores.height() == 0 {
        return None;
    }
    let extremes = find_extremes(scores);
    let (x, y) = extremes.max_value_location;
    let score = extremes.max_value;
    // flat regions produce NaN correlation
    let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
    Some(Match::at(area, x, y, template.width(), template.height(), score))
}

pub fn best_match_gray(
    image: &GrayImage,
    template: &LoadedTemplate,
    area: Area,
) -> Result<Option<Match>, VisionError> {
    check_fits(template, area)?;
    let scores = gray_scores(image, &template.gray, area);
    Ok(best_of(&scores, area, template))
}

pub fn best_match_color(
    image: &RgbImage,
    template: &LoadedTemplate,
    area: Area,
) -> Result<Option<Match>, VisionError> {
    check_fits(template, area)?;
    let scores = color_scores(image, &template.rgb, area);
    Ok(best_of(&scores, area, template))
}

/// Every match above `threshold`, suppressing matches that overlap a better one.
pub fn all_matches_gray(
    image: &GrayImage,
    template: &LoadedTemplate,
    area: Area,
    threshold: f32,
    max_matches: usize,
) -> Result<Vec<Match>, VisionError> {
    check_fits(template, area)?;
    let scores = gray_scores(image, &template.gray, area);
    let (tw, th) = (template.width(), template.height());

    let mut candidates: Vec<Match> = scores
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0].is_finite() && p.0[0] >= threshold)
        .map(|(x, y, p)| Match::at(area, x, y, tw, th, p.0[0].min(1.0)))
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(suppress_overlaps(candidates, tw, th, max_matches))
}

/// Greedy non-maximum suppression over score-sorted candidates.
pub fn suppress_overlaps(sorted: Vec<Match>, width: u32, height: u32, max: usize) -> Vec<Match> {
    let mut kept: Vec<Match> = Vec::new();
    for candidate in sorted {
        if kept.len() >= max {
            break;
        }
        let overlaps = kept.iter().any(|k| {
            k.top_left.x.abs_diff(candidate.top_left.x) < width
                && k.top_left.y.abs_diff(candidate.top_left.y) < height
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
