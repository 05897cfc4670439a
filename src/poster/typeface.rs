use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;

use super::PosterError;

/// Text measuring and drawing for one face.
pub trait Typeface: Send + Sync {
    /// Advance width of `text` at `px` pixels.
    fn measure(&self, text: &str, px: f32) -> f32;

    /// Draw `text` with its alphabetic baseline at `baseline`, left edge at `x`.
    fn draw(&self, canvas: &mut RgbaImage, color: Rgba<u8>, x: f32, baseline: f32, px: f32, text: &str);
}

/// TrueType/OpenType face loaded from disk.
pub struct FontFace {
    font: FontVec,
}

impl FontFace {
    pub fn load(path: &Path) -> Result<Self, PosterError> {
        let font_error = |reason: String| PosterError::Font {
            path: path.display().to_string(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| font_error(e.to_string()))?;
        Ok(Self { font })
    }
}

impl Typeface for FontFace {
    fn measure(&self, text: &str, px: f32) -> f32 {
        let font = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut last = None;
        for c in text.chars() {
            let id = font.glyph_id(c);
            if let Some(prev) = last {
                width += font.kern(prev, id);
            }
            width += font.h_advance(id);
            last = Some(id);
        }
        width
    }

    fn draw(&self, canvas: &mut RgbaImage, color: Rgba<u8>, x: f32, baseline: f32, px: f32, text: &str) {
        // imageproc positions the top of the line box, one ascent above the baseline
        let ascent = self.font.as_scaled(PxScale::from(px)).ascent();
        draw_text_mut(
            canvas,
            color,
            x.round() as i32,
            (baseline - ascent).round() as i32,
            PxScale::from(px),
            &self.font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_is_reported() {
        let err = FontFace::load(Path::new("/nonexistent/Serif-BoldItalic.ttf"))
            .err()
            .unwrap();
        assert!(matches!(err, PosterError::Font { .. }));
    }

    #[test]
    fn garbage_font_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(FontFace::load(&path), Err(PosterError::Font { .. })));
    }
}
