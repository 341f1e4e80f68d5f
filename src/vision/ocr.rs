//! Digit recognition by glyph templates.
//!
//! Game counters (stamina, timers) are drawn in a fixed font, so each glyph
//! is matched as a template inside the area and the surviving hits are read
//! left to right.

use super::library::{LoadedTemplate, TemplateLibrary};
use super::matcher::{Match, all_matches_gray};
use super::VisionError;
use crate::geometry::Area;
use image::GrayImage;
use std::sync::Arc;

pub const GLYPH_THRESHOLD: f32 = 0.92;
const MAX_GLYPHS_PER_CHAR: usize = 8;

/// Required digit glyphs plus optional separators.
const DIGITS: [(char, &str); 10] = [
    ('0', "digit_0"),
    ('1', "digit_1"),
    ('2', "digit_2"),
    ('3', "digit_3"),
    ('4', "digit_4"),
    ('5', "digit_5"),
    ('6', "digit_6"),
    ('7', "digit_7"),
    ('8', "digit_8"),
    ('9', "digit_9"),
];
const SEPARATORS: [(char, &str); 2] = [('/', "digit_slash"), (':', "digit_colon")];

pub type Glyphs = Vec<(char, Arc<LoadedTemplate>)>;

pub fn load_glyphs(library: &TemplateLibrary) -> Result<Glyphs, VisionError> {
    let mut glyphs = Vec::with_capacity(DIGITS.len() + SEPARATORS.len());
    for (c, name) in DIGITS {
        glyphs.push((c, library.get(name)?));
    }
    for (c, name) in SEPARATORS {
        if let Ok(tpl) = library.get(name) {
            glyphs.push((c, tpl));
        }
    }
    Ok(glyphs)
}

/// Read the glyph string inside `area`; an empty string means nothing matched.
pub fn read_glyphs(image: &GrayImage, area: Area, glyphs: &Glyphs, threshold: f32) -> String {
    let mut hits: Vec<(char, Match, u32)> = Vec::new();
    for (c, tpl) in glyphs {
        match all_matches_gray(image, tpl, area, threshold, MAX_GLYPHS_PER_CHAR) {
            Ok(matches) => hits.extend(matches.into_iter().map(|m| (*c, m, tpl.width()))),
            Err(e) => log::debug!("Glyph '{c}' skipped: {e}"),
        }
    }

    // best hit wins where glyphs of different characters overlap
    hits.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    let mut kept: Vec<(char, Match)> = Vec::new();
    for (c, m, width) in hits {
        let clash = kept
            .iter()
            .any(|(_, k)| k.top_left.x.abs_diff(m.top_left.x) < width.saturating_sub(1).max(1));
        if !clash {
            kept.push((c, m));
        }
    }
    kept.sort_by_key(|(_, m)| m.top_left.x);
    kept.into_iter().map(|(c, _)| c).collect()
}

/// Parse the leading number of an OCR reading such as `85/120`.
pub fn parse_leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
