//! Crop anchors.

use sb_core::FocusMode;

/// The point a crop keeps in view, as fractions of width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Focus {
    pub x: f32,
    pub y: f32,
}

impl Default for Focus {
    fn default() -> Self {
        Self::CENTER
    }
}

impl Focus {
    pub const CENTER: Focus = Focus { x: 0.5, y: 0.5 };

    /// The anchor for `mode`. Manual mode uses the stored point when both
    /// coordinates are present and falls back to the centre otherwise.
    pub fn resolve(mode: FocusMode, x: Option<f32>, y: Option<f32>) -> Self {
        match mode {
            FocusMode::Top => Self { x: 0.5, y: 0.0 },
            FocusMode::Bottom => Self { x: 0.5, y: 1.0 },
            FocusMode::Left => Self { x: 0.0, y: 0.5 },
            FocusMode::Right => Self { x: 1.0, y: 0.5 },
            FocusMode::Manual => match (x, y) {
                (Some(x), Some(y)) => Self {
                    x: x.clamp(0.0, 1.0),
                    y: y.clamp(0.0, 1.0),
                },
                _ => Self::CENTER,
            },
            FocusMode::Auto | FocusMode::Center => Self::CENTER,
        }
    }

    /// The same point after the image is rotated clockwise by `degrees`.
    pub fn rotate(self, degrees: i32) -> Self {
        let Self { x, y } = self;
        match degrees.rem_euclid(360) {
            90 => Self { x: 1.0 - y, y: x },
            180 => Self {
                x: 1.0 - x,
                y: 1.0 - y,
            },
            270 => Self { x: y, y: 1.0 - x },
            _ => self,
        }
    }

    /// Top-left corner of a `target`-sized window inside `size`, centred on
    /// this point as far as the edges allow.
    pub fn offset(self, size: (u32, u32), target: (u32, u32)) -> (u32, u32) {
        let axis = |len: u32, want: u32, at: f32| {
            let centre = (len as f32 * at).round() as i64;
            let max = i64::from(len.saturating_sub(want));
            (centre - i64::from(want / 2)).clamp(0, max) as u32
        };
        (axis(size.0, target.0, self.x), axis(size.1, target.1, self.y))
    }
}
