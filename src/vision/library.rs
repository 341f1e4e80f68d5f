//! Template images loaded lazily from a directory.
//!
//! A template named `claim_button` is read from `claim_button.png`, or from
//! `claim_button-[x,y,w,h].png` in which case `[x,y,w,h]` becomes the
//! default search area for that template.

use super::VisionError;
use crate::geometry::Area;
use image::{GrayImage, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct LoadedTemplate {
    pub name: String,
    pub rgb: RgbImage,
    pub gray: GrayImage,
    pub default_area: Option<Area>,
}

impl LoadedTemplate {
    pub fn from_rgb(name: impl Into<String>, rgb: RgbImage, default_area: Option<Area>) -> Self {
        let gray = image::DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
        Self {
            name: name.into(),
            rgb,
            gray,
            default_area,
        }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

pub struct TemplateLibrary {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<LoadedTemplate>>>,
}

impl TemplateLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register an in-memory template, replacing any cached one.
    pub fn insert(&self, template: LoadedTemplate) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.name.clone(), Arc::new(template));
    }

    pub fn get(&self, name: &str) -> Result<Arc<LoadedTemplate>, VisionError> {
        if let Some(tpl) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(tpl));
        }

        let (path, default_area) = self.locate(name)?;
        let img = image::open(&path).map_err(|e| VisionError::TemplateLoad {
            path: path.display().to_string(),
            description: e.to_string(),
        })?;
        let tpl = Arc::new(LoadedTemplate::from_rgb(name, img.to_rgb8(), default_area));
        log::debug!("🖼️ Loaded template '{}' from {}", name, path.display());
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&tpl));
        Ok(tpl)
    }

    fn locate(&self, name: &str) -> Result<(PathBuf, Option<Area>), VisionError> {
        let exact = self.dir.join(format!("{name}.png"));
        if exact.is_file() {
            return Ok((exact, None));
        }

        let prefix = format!("{name}-[");
        let entries = std::fs::read_dir(&self.dir).map_err(|_| self.not_found(name))?;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with(&prefix) && file_name.ends_with(".png") {
                return Ok((entry.path(), Area::parse_from_filename(file_name)));
            }
        }
        Err(self.not_found(name))
    }

    fn not_found(&self, name: &str) -> VisionError {
        VisionError::TemplateNotFound {
            name: name.to_string(),
            dir: self.dir.display().to_string(),
        }
    }
}
