//! Certificate rendering.
//!
//! A certificate is the background template with three text blocks drawn on
//! top: the participant name, the long-form topic, and the date block with
//! the year. Positions are fixed against the template; only the name is
//! scaled down when it would overflow its band. A plain-text renderer backs
//! the sandbox topic, where a deterministic byte-for-byte attachment beats
//! a pretty one.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::debug;

use crate::error::{Error, Result};

/// Name scale search bounds, in pixels. The upper bound is exclusive.
const NAME_SCALE_MIN: u32 = 100;
const NAME_SCALE_MAX: u32 = 150;

/// Widest the name may grow relative to the template width.
const NAME_MAX_REL_WIDTH: f32 = 0.81;

const NAME_CENTER_Y: i32 = 590;
const TOPIC_TOP_Y: i32 = 795;
const TOPIC_LINE_HEIGHT: i32 = 70;
const TOPIC_SCALE: u32 = 56;
const DATE_TOP_Y: i32 = 1070;
const DATE_LINE_HEIGHT: i32 = 60;
const DATE_SCALE: u32 = 48;

const INK: Rgba<u8> = Rgba([0x2b, 0x2b, 0x2b, 0xff]);

/// Everything drawn onto one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateText {
    /// Participant full name, already inflected for the certificate case.
    pub full_name: String,
    /// Long topic text, possibly multi-line.
    pub topic: String,
    /// Date block, range on one line and `<year> г.` on the next.
    pub date: String,
}

/// Renders one certificate into attachment bytes.
///
/// The production implementation is [`CertificateTemplate`]; the sandbox
/// topic uses [`TextRenderer`], and tests swap in stubs so the send
/// pipeline runs without template and font assets.
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, text: &CertificateText) -> Result<Vec<u8>>;

    fn file_name(&self) -> &'static str {
        "certificate.png"
    }

    fn content_type(&self) -> &'static str {
        "image/png"
    }
}

/// Template image plus the fonts used to draw on it.
///
/// Loaded once per run and reused for every participant.
pub struct CertificateTemplate {
    background: RgbaImage,
    name_font: FontVec,
    text_font: FontVec,
}

impl CertificateTemplate {
    /// Load the background image and both fonts from disk.
    pub fn load(template: &Path, name_font: &Path, text_font: &Path) -> Result<Self> {
        let background = image::open(template)
            .map_err(|err| Error::Render(format!("{}: {err}", template.display())))?
            .to_rgba8();
        Ok(Self {
            background,
            name_font: load_font(name_font)?,
            text_font: load_font(text_font)?,
        })
    }

    fn fit_name_scale(&self, name: &str, canvas_width: u32) -> u32 {
        let max_width = (canvas_width as f32 * NAME_MAX_REL_WIDTH) as u32;
        fit_scale(NAME_SCALE_MIN, NAME_SCALE_MAX, max_width, |scale| {
            text_size(px(scale), &self.name_font, name).0
        })
    }

    fn draw_block(&self, canvas: &mut RgbaImage, text: &str, top_y: i32, line_height: i32, scale: u32) {
        for (idx, line) in text.lines().enumerate() {
            draw_centered(canvas, &self.text_font, px(scale), top_y + idx as i32 * line_height, line);
        }
    }
}

impl CertificateRenderer for CertificateTemplate {
    /// Render a certificate and encode it as PNG bytes.
    fn render(&self, text: &CertificateText) -> Result<Vec<u8>> {
        let mut canvas = self.background.clone();
        let width = canvas.width();

        let name_scale = self.fit_name_scale(&text.full_name, width);
        debug!(name = %text.full_name, scale = name_scale, "fitted certificate name");
        draw_centered(
            &mut canvas,
            &self.name_font,
            px(name_scale),
            NAME_CENTER_Y,
            &text.full_name,
        );
        self.draw_block(&mut canvas, &text.topic, TOPIC_TOP_Y, TOPIC_LINE_HEIGHT, TOPIC_SCALE);
        self.draw_block(&mut canvas, &text.date, DATE_TOP_Y, DATE_LINE_HEIGHT, DATE_SCALE);

        let mut bytes = Cursor::new(Vec::new());
        canvas
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|err| Error::Render(err.to_string()))?;
        Ok(bytes.into_inner())
    }
}

/// Deterministic plain-text certificate, used for the sandbox topic.
pub struct TextRenderer;

impl CertificateRenderer for TextRenderer {
    fn render(&self, text: &CertificateText) -> Result<Vec<u8>> {
        Ok(format!("{}\n{}\n{}\n", text.topic, text.full_name, text.date).into_bytes())
    }

    fn file_name(&self) -> &'static str {
        "certificate.txt"
    }

    fn content_type(&self) -> &'static str {
        "text/plain"
    }
}

fn px(scale: u32) -> PxScale {
    PxScale::from(scale as f32)
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|err| Error::Render(format!("{}: {err}", path.display())))
}

/// Largest scale in `[min, max)` whose measured width fits `max_width`.
///
/// Falls back to `min` when even the smallest scale overflows; a cramped
/// name still beats a failed certificate.
fn fit_scale(min: u32, max: u32, max_width: u32, measure: impl Fn(u32) -> u32) -> u32 {
    (min..max)
        .take_while(|scale| measure(*scale) <= max_width)
        .last()
        .unwrap_or(min)
}

fn draw_centered(canvas: &mut RgbaImage, font: &FontVec, scale: PxScale, center_y: i32, text: &str) {
    let (text_width, text_height) = text_size(scale, font, text);
    let x = (canvas.width() as i32 - text_width as i32) / 2;
    let y = center_y - text_height as i32 / 2;
    draw_text_mut(canvas, INK, x, y, scale, font, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> CertificateText {
        CertificateText {
            full_name: "Марии Ивановой".to_string(),
            topic: "Формирование базовых\nграмматических представлений".to_string(),
            date: "1 февраля - 2 марта\n2021 г.".to_string(),
        }
    }

    #[test]
    fn fit_scale_picks_largest_fitting() {
        // Width grows linearly with the scale.
        let picked = fit_scale(100, 150, 1200, |scale| scale * 10);
        assert_eq!(picked, 120);
    }

    #[test]
    fn fit_scale_upper_bound_is_exclusive() {
        assert_eq!(fit_scale(100, 150, 10_000, |scale| scale * 10), 149);
    }

    #[test]
    fn fit_scale_falls_back_to_min() {
        assert_eq!(fit_scale(100, 150, 10, |scale| scale * 10), 100);
    }

    #[test]
    fn text_renderer_emits_topic_name_and_date() {
        let bytes = TextRenderer.render(&sample_text()).unwrap();
        let rendered = String::from_utf8(bytes).unwrap();
        assert!(rendered.contains("Марии Ивановой"));
        assert!(rendered.contains("Формирование базовых\nграмматических представлений"));
        assert!(rendered.contains("1 февраля - 2 марта\n2021 г."));
        assert_eq!(TextRenderer.file_name(), "certificate.txt");
        assert_eq!(TextRenderer.content_type(), "text/plain");
    }

    #[test]
    fn render_produces_png() {
        let Some(font) = test_font() else { return };
        let template = CertificateTemplate {
            background: RgbaImage::from_pixel(2000, 1400, Rgba([255, 255, 255, 255])),
            name_font: font,
            text_font: test_font().unwrap(),
        };
        let bytes = template.render(&sample_text()).unwrap();
        // PNG magic.
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    // Font files are not checked in, so this pokes around the usual
    // system locations and skips the rendering test when none is there.
    fn test_font() -> Option<FontVec> {
        let bytes = std::fs::read("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
            .or_else(|_| std::fs::read("/usr/share/fonts/TTF/DejaVuSans.ttf"))
            .ok()?;
        FontVec::try_from_vec(bytes).ok()
    }
}
