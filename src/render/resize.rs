//! The built-in render step: rotated, resized JPEG derivatives.
//!
//! Derivatives are written to `{output_root}/{name}/{key}.jpg`, first to a
//! temporary file next to the target and then renamed over it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sb_core::config::{DerivativeConfig, ResizeMode};

use super::focus::Focus;
use super::queue::{RenderJob, RenderStep};

pub struct ResizeStep {
    output_root: PathBuf,
}

impl ResizeStep {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Where the derivative `name` of `key` is stored.
    pub fn target_path(&self, name: &str, key: &str) -> PathBuf {
        self.output_root.join(name).join(format!("{key}.jpg"))
    }

    fn render_blocking(&self, job: &RenderJob) -> Result<Vec<PathBuf>> {
        let img = image::open(&job.source)
            .with_context(|| format!("Failed to decode image: {}", job.source.display()))?;
        let img = rotate(img, job.rotation);
        let focus = job.focus.rotate(job.rotation);

        let mut written = Vec::with_capacity(job.tasks.len());
        for task in &job.tasks {
            let out = derivative(&img, task, focus);
            let path = self.target_path(&task.name, &job.key);
            write_jpeg(&out, &path)?;
            tracing::debug!(
                key = %job.key,
                derivative = %task.name,
                width = out.width(),
                height = out.height(),
                "derivative written"
            );
            written.push(path);
        }
        Ok(written)
    }
}

#[async_trait]
impl RenderStep for ResizeStep {
    async fn render(&self, job: &RenderJob) -> Result<()> {
        let step = Self::new(self.output_root.clone());
        let job = job.clone();
        tokio::task::spawn_blocking(move || step.render_blocking(&job))
            .await
            .context("Render task panicked")??;
        Ok(())
    }
}

fn rotate(img: DynamicImage, degrees: i32) -> DynamicImage {
    match degrees.rem_euclid(360) {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}

fn derivative(img: &DynamicImage, task: &DerivativeConfig, focus: Focus) -> DynamicImage {
    let bound = |v: u32| if v == 0 { u32::MAX } else { v };
    match task.mode {
        ResizeMode::Fit => {
            let (w, h) = (bound(task.max_width), bound(task.max_height));
            if img.width() <= w && img.height() <= h {
                img.clone()
            } else {
                img.resize(w, h, FilterType::Lanczos3)
            }
        }
        ResizeMode::Crop => {
            let or_source = |v: u32, len: u32| if v == 0 { len } else { v };
            let target = (
                or_source(task.max_width, img.width()),
                or_source(task.max_height, img.height()),
            );
            crop_to_fill(img, target, focus)
        }
    }
}

/// Scale `img` to cover `target`, then cut the window around `focus`.
fn crop_to_fill(img: &DynamicImage, target: (u32, u32), focus: Focus) -> DynamicImage {
    let (w, h) = (img.width().max(1), img.height().max(1));
    let scale = f64::max(
        f64::from(target.0) / f64::from(w),
        f64::from(target.1) / f64::from(h),
    );
    let cover = (
        ((f64::from(w) * scale).ceil() as u32).max(target.0),
        ((f64::from(h) * scale).ceil() as u32).max(target.1),
    );
    let scaled = img.resize_exact(cover.0, cover.1, FilterType::Lanczos3);
    let (x, y) = focus.offset(cover, target);
    scaled.crop_imm(x, y, target.0, target.1)
}

fn write_jpeg(img: &DynamicImage, path: &Path) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("Derivative path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create derivative directory: {}", dir.display()))?;

    let tmp = path.with_extension("jpg.tmp");
    DynamicImage::ImageRgb8(img.to_rgb8())
        .save_with_format(&tmp, ImageFormat::Jpeg)
        .with_context(|| format!("Failed to encode derivative: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move derivative into place: {}", path.display()))?;
    Ok(())
}
