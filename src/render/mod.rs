//! Derivative rendering outside of sync runs.

pub mod focus;
pub mod queue;
pub mod resize;

pub use focus::Focus;
pub use queue::{QueueError, RenderJob, RenderQueue, RenderStep};
pub use resize::ResizeStep;

use anyhow::Result;
use sb_core::config::Config;
use sb_db::models::ImageRecord;

/// The job rendering every configured derivative of `image`.
pub fn job_for_image(config: &Config, image: &ImageRecord) -> Result<RenderJob> {
    let root = config
        .filesystem
        .roots
        .get(&image.root)
        .ok_or_else(|| anyhow::anyhow!("Image {} belongs to unknown root '{}'", image.id, image.root))?;

    Ok(RenderJob {
        key: image.id.to_string(),
        source: root.root.join(image.relative_path()),
        rotation: image.rotation,
        focus: Focus::resolve(image.focus_mode, image.focus_x, image.focus_y),
        tasks: config.derivatives.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::config::{DerivativeConfig, ResizeMode, RootConfig};
    use sb_core::FocusMode;
    use std::path::PathBuf;

    #[test]
    fn job_points_at_original() {
        let mut config = Config::default();
        config.filesystem.roots.insert(
            "photos".into(),
            RootConfig {
                root: PathBuf::from("/srv/photos"),
                excluded: Vec::new(),
            },
        );
        config.derivatives.push(DerivativeConfig {
            name: "thumb".into(),
            max_width: 320,
            max_height: 320,
            mode: ResizeMode::Crop,
        });

        let mut image = ImageRecord::new("photos", "2024/iceland", "IMG_1.jpg", "jpg");
        image.rotation = 270;
        image.focus_mode = FocusMode::Manual;
        image.focus_x = Some(0.2);
        image.focus_y = Some(0.7);
        let job = job_for_image(&config, &image).unwrap();
        assert_eq!(job.key, image.id.to_string());
        assert_eq!(job.source, PathBuf::from("/srv/photos/2024/iceland/IMG_1.jpg"));
        assert_eq!(job.rotation, 270);
        assert_eq!(job.focus, Focus { x: 0.2, y: 0.7 });
        assert_eq!(job.tasks.len(), 1);

        image.root = "scans".into();
        assert!(job_for_image(&config, &image).is_err());
    }
}
