use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgba, RgbaImage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::typeface::{FontFace, Typeface};
use super::wrap::wrap_words;
use super::PosterError;
use crate::config::Config;

pub const JPEG_QUALITY: u8 = 90;

const PADDING_RATIO: f32 = 0.08;
const FONT_RATIO: f32 = 0.06;
const LINE_HEIGHT_RATIO: f32 = 1.3;
const LABEL_RATIO: f32 = 0.5;
/// Overlay opacity at the bottom edge
const GRADIENT_MAX_ALPHA: f32 = 0.85;
/// Row, as a fraction of the height from the top, where the overlay is fully transparent
const GRADIENT_CLEAR_AT: f32 = 0.4;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DEFAULT_ACCENT: Rgba<u8> = Rgba([0xfb, 0xbf, 0x24, 255]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterSpec {
    pub id: String,
    pub text: String,
    pub reference: String,
    pub image_url: String,
}

/// Built-in catalogue shown on the posters tab.
pub fn default_posters() -> Vec<PosterSpec> {
    vec![
        PosterSpec {
            id: "1".to_string(),
            text: "O Senhor é o meu pastor; nada me faltará.".to_string(),
            reference: "Salmos 23:1".to_string(),
            image_url: "https://images.unsplash.com/photo-1501854140801-50d01698950b?auto=format&fit=crop&q=80&w=800".to_string(),
        },
        PosterSpec {
            id: "2".to_string(),
            text: "Tudo posso naquele que me fortalece.".to_string(),
            reference: "Filipenses 4:13".to_string(),
            image_url: "https://images.unsplash.com/photo-1464822759023-fed622ff2c3b?auto=format&fit=crop&q=80&w=800".to_string(),
        },
    ]
}

#[derive(Clone)]
pub struct PosterFonts {
    /// Italic bold serif for the quotation
    pub quote: Arc<dyn Typeface>,
    /// Bold sans-serif for the reference label
    pub label: Arc<dyn Typeface>,
}

/// `#rrggbb` to an opaque pixel.
pub fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let hex = hex.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Fetch and decode a background photo: http(s) URL, `file://` URL or plain path.
pub async fn load_source(http: &Client, url: &str) -> Result<DynamicImage, PosterError> {
    let load_error = |reason: String| PosterError::ImageLoad {
        url: url.to_string(),
        reason,
    };

    let bytes: Bytes = match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            let resp = http
                .get(parsed)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| load_error(e.to_string()))?;
            resp.bytes().await.map_err(|e| load_error(e.to_string()))?
        }
        Ok(parsed) if parsed.scheme() == "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| load_error("invalid file URL".to_string()))?;
            tokio::fs::read(&path)
                .await
                .map_err(|e| load_error(e.to_string()))?
                .into()
        }
        Ok(parsed) => {
            return Err(load_error(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        Err(_) => tokio::fs::read(url)
            .await
            .map_err(|e| load_error(e.to_string()))?
            .into(),
    };

    image::load_from_memory(&bytes).map_err(|e| load_error(e.to_string()))
}

/// Opacity of the black overlay on row `y`.
fn overlay_alpha(y: u32, height: u32) -> f32 {
    let h = height as f32;
    let clear_at = h * GRADIENT_CLEAR_AT;
    if h - clear_at <= 0.0 {
        return 0.0;
    }
    let t = ((h - (y as f32 + 0.5)) / (h - clear_at)).clamp(0.0, 1.0);
    GRADIENT_MAX_ALPHA * (1.0 - t)
}

fn apply_gradient(canvas: &mut RgbaImage) {
    let height = canvas.height();
    for (y, row) in canvas.enumerate_rows_mut() {
        let a = overlay_alpha(y, height);
        if a <= 0.0 {
            continue;
        }
        for (_, _, px) in row {
            for c in 0..3 {
                px[c] = (px[c] as f32 * (1.0 - a)).round() as u8;
            }
            px[3] = (a * 255.0 + px[3] as f32 * (1.0 - a)).round() as u8;
        }
    }
}

/// Draw the poster onto a copy of `source`. The returned canvas has the source's dimensions.
pub fn paint(
    source: &DynamicImage,
    text: &str,
    reference: &str,
    fonts: &PosterFonts,
    accent: Rgba<u8>,
) -> RgbaImage {
    let mut canvas = source.to_rgba8();
    let (width, height) = canvas.dimensions();
    let (w, h) = (width as f32, height as f32);

    apply_gradient(&mut canvas);

    let padding = w * PADDING_RATIO;
    let max_width = w - padding * 2.0;
    let font_size = (w * FONT_RATIO).floor();
    let line_height = font_size * LINE_HEIGHT_RATIO;

    let quoted = format!("\"{}\"", text);
    let lines = wrap_words(&quoted, max_width, |s| fonts.quote.measure(s, font_size));

    // Bottom line first, stepping upwards.
    let mut baseline = h - padding * 2.5;
    for line in lines.iter().rev() {
        fonts.quote.draw(&mut canvas, WHITE, padding, baseline, font_size, line);
        baseline -= line_height;
    }

    let label_size = (font_size * LABEL_RATIO).floor();
    fonts.label.draw(
        &mut canvas,
        accent,
        padding,
        h - padding,
        label_size,
        &reference.to_uppercase(),
    );

    canvas
}

fn encode_jpeg(canvas: RgbaImage) -> Result<Vec<u8>, PosterError> {
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

async fn write_then_rename(partial: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(partial, bytes).await?;
    tokio::fs::rename(partial, path).await
}

fn file_stem(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

pub struct PosterCompositor {
    http: Client,
    fonts: PosterFonts,
    accent: Rgba<u8>,
}

impl PosterCompositor {
    pub fn new(http: Client, fonts: PosterFonts, accent: Rgba<u8>) -> Self {
        Self { http, fonts, accent }
    }

    pub fn from_config(config: &Config) -> Result<Self, PosterError> {
        let fonts = PosterFonts {
            quote: Arc::new(FontFace::load(Path::new(config.poster_serif_font))?),
            label: Arc::new(FontFace::load(Path::new(config.poster_sans_font))?),
        };
        let accent = parse_hex_color(config.poster_accent).unwrap_or_else(|| {
            log::warn!("Invalid poster accent '{}', using default", config.poster_accent);
            DEFAULT_ACCENT
        });
        Ok(Self::new(Client::new(), fonts, accent))
    }

    /// Load the background and render the poster as JPEG bytes.
    pub async fn compose(&self, spec: &PosterSpec) -> Result<Vec<u8>, PosterError> {
        let source = load_source(&self.http, &spec.image_url).await?;
        log::debug!(
            "Poster {}: source {}x{}",
            spec.id,
            source.width(),
            source.height()
        );

        let fonts = self.fonts.clone();
        let accent = self.accent;
        let text = spec.text.clone();
        let reference = spec.reference.clone();
        tokio::task::spawn_blocking(move || {
            let canvas = paint(&source, &text, &reference, &fonts, accent);
            encode_jpeg(canvas)
        })
        .await
        .map_err(|e| PosterError::Render(e.to_string()))?
    }

    /// Compose and write `<dir>/versiculo-<id>.jpg`. Nothing is written unless composition succeeds.
    pub async fn export(&self, spec: &PosterSpec, dir: &Path) -> Result<PathBuf, PosterError> {
        let bytes = self.compose(spec).await?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("versiculo-{}.jpg", file_stem(&spec.id)));
        let partial = path.with_extension("jpg.part");
        if let Err(e) = write_then_rename(&partial, &path, &bytes).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                log::debug!("No partial file to remove at {}: {}", partial.display(), cleanup);
            }
            return Err(e.into());
        }

        log::info!("Poster {} exported to {}", spec.id, path.display());
        Ok(path)
    }
}
