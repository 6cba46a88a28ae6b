use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use tracing::warn;

/// Margin between the text block and the anchored canvas edges.
pub const WATERMARK_MARGIN: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkAnchor {
    #[default]
    BottomRight,
    BottomLeft,
    TopLeft,
    TopRight,
}

impl WatermarkAnchor {
    /// Unrecognized labels fall back to the bottom-right corner.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bottom-left" => Self::BottomLeft,
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            _ => Self::BottomRight,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
        }
    }
}

/// Watermark request attached to a save call. Compositing is skipped
/// entirely when `text` is empty.
#[derive(Debug, Clone, Default)]
pub struct WatermarkSpec {
    pub text: String,
    pub font_path: Option<PathBuf>,
    /// Values ≤ 0 fall back to the configured default size.
    pub font_size: i32,
    pub anchor: WatermarkAnchor,
    /// Alpha applied to the rendered white text, 0 (invisible) to 255.
    pub opacity: u8,
}

/// Process-configured fallbacks for font resolution.
#[derive(Debug, Clone, Default)]
pub struct WatermarkDefaults {
    pub font_path: Option<PathBuf>,
    pub font_size: u32,
}

/// Top-left corner for a text block of `text_w` x `text_h` on a canvas of
/// `canvas_w` x `canvas_h`. Both coordinates clamp to zero so oversized text
/// on a small canvas still lands on the image.
pub fn anchor_position(
    anchor: WatermarkAnchor,
    canvas_w: u32,
    canvas_h: u32,
    text_w: u32,
    text_h: u32,
    margin: u32,
) -> (u32, u32) {
    let cw = i64::from(canvas_w);
    let ch = i64::from(canvas_h);
    let tw = i64::from(text_w);
    let th = i64::from(text_h);
    let m = i64::from(margin);

    let (x, y) = match anchor {
        WatermarkAnchor::BottomRight => (cw - tw - m, ch - th - m),
        WatermarkAnchor::BottomLeft => (m, ch - th - m),
        WatermarkAnchor::TopLeft => (m, m),
        WatermarkAnchor::TopRight => (cw - tw - m, m),
    };
    (x.max(0) as u32, y.max(0) as u32)
}

/// Resolved glyph source. A loadable TTF/OTF renders through `ab_glyph`;
/// otherwise the embedded 5x7 bitmap set takes over so a bad font path can
/// never fail the save.
pub enum WatermarkFont {
    Outline(FontVec),
    Builtin,
}

/// Try the explicit font path first, then the configured default. Load
/// failures log and fall through to the builtin glyph set.
pub fn resolve_font(explicit: Option<&Path>, configured: Option<&Path>) -> WatermarkFont {
    for candidate in [explicit, configured].into_iter().flatten() {
        if !candidate.is_file() {
            continue;
        }
        match fs::read(candidate) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => return WatermarkFont::Outline(font),
                Err(_) => warn!(
                    path = %candidate.display(),
                    "font file is not a loadable font, falling back to builtin glyphs"
                ),
            },
            Err(error) => warn!(
                path = %candidate.display(),
                %error,
                "font file could not be read, falling back to builtin glyphs"
            ),
        }
    }
    WatermarkFont::Builtin
}

impl WatermarkFont {
    /// Bounding box of `text` at `font_size`, in pixels.
    pub fn measure(&self, text: &str, font_size: u32) -> (u32, u32) {
        match self {
            Self::Outline(font) => {
                let scale = PxScale::from(font_size as f32);
                let scaled = font.as_scaled(scale);
                let mut width = 0.0f32;
                let mut prev: Option<ab_glyph::GlyphId> = None;
                for c in text.chars() {
                    let glyph_id = scaled.glyph_id(c);
                    if let Some(prev) = prev {
                        width += scaled.kern(prev, glyph_id);
                    }
                    width += scaled.h_advance(glyph_id);
                    prev = Some(glyph_id);
                }
                (width.ceil() as u32, scaled.height().ceil() as u32)
            }
            Self::Builtin => {
                let scale = builtin_scale(font_size);
                let chars = text.chars().count() as u32;
                (chars * BUILTIN_ADVANCE * scale, BUILTIN_CELL_HEIGHT * scale)
            }
        }
    }

    /// Draw `text` in white at the given alpha, top-left corner at (x, y),
    /// alpha-blending over whatever is underneath.
    pub fn draw(&self, image: &mut RgbaImage, x: u32, y: u32, text: &str, font_size: u32, alpha: u8) {
        match self {
            Self::Outline(font) => draw_outline_text(font, image, x, y, text, font_size, alpha),
            Self::Builtin => draw_builtin_text(image, x, y, text, font_size, alpha),
        }
    }
}

/// Measure and place the watermark, then render it onto the image. The text
/// is assumed non-empty; callers skip the call otherwise.
pub fn composite_text(image: &mut RgbaImage, spec: &WatermarkSpec, defaults: &WatermarkDefaults) {
    let font = resolve_font(spec.font_path.as_deref(), defaults.font_path.as_deref());
    let font_size = if spec.font_size > 0 {
        spec.font_size as u32
    } else {
        defaults.font_size.max(1)
    };
    let (text_w, text_h) = font.measure(spec.text.as_str(), font_size);
    let (x, y) = anchor_position(
        spec.anchor,
        image.width(),
        image.height(),
        text_w,
        text_h,
        WATERMARK_MARGIN,
    );
    font.draw(image, x, y, spec.text.as_str(), font_size, spec.opacity);
}

fn draw_outline_text(
    font: &FontVec,
    image: &mut RgbaImage,
    x: u32,
    y: u32,
    text: &str,
    font_size: u32,
    alpha: u8,
) {
    let scale = PxScale::from(font_size as f32);
    let scaled = font.as_scaled(scale);
    let width = image.width() as i32;
    let height = image.height() as i32;
    let baseline_y = y as f32 + scaled.ascent();

    let mut cursor_x = x as f32;
    let mut prev: Option<ab_glyph::GlyphId> = None;
    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        let glyph = glyph_id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let tx = px as i32 + bounds.min.x as i32;
                let ty = py as i32 + bounds.min.y as i32;
                if tx >= 0 && ty >= 0 && tx < width && ty < height {
                    let pixel_alpha = (coverage * alpha as f32) as u8;
                    let existing = *image.get_pixel(tx as u32, ty as u32);
                    let blended = blend_over(existing, Rgba([255, 255, 255, pixel_alpha]));
                    image.put_pixel(tx as u32, ty as u32, blended);
                }
            });
        }
        cursor_x += scaled.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
}

const BUILTIN_ADVANCE: u32 = 6;
const BUILTIN_CELL_HEIGHT: u32 = 8;

fn builtin_scale(font_size: u32) -> u32 {
    (font_size / BUILTIN_CELL_HEIGHT).max(1)
}

fn draw_builtin_text(image: &mut RgbaImage, x: u32, y: u32, text: &str, font_size: u32, alpha: u8) {
    let scale = builtin_scale(font_size);
    let width = image.width();
    let height = image.height();
    let ink = Rgba([255, 255, 255, alpha]);

    let mut cursor_x = x;
    for c in text.chars() {
        let glyph = builtin_glyph(c);
        for (col, bits) in glyph.iter().enumerate() {
            for row in 0..7u32 {
                if bits & (1 << row) == 0 {
                    continue;
                }
                let block_x = cursor_x + col as u32 * scale;
                let block_y = y + row * scale;
                for dx in 0..scale {
                    for dy in 0..scale {
                        let px = block_x + dx;
                        let py = block_y + dy;
                        if px < width && py < height {
                            let existing = *image.get_pixel(px, py);
                            image.put_pixel(px, py, blend_over(existing, ink));
                        }
                    }
                }
            }
        }
        cursor_x = cursor_x.saturating_add(BUILTIN_ADVANCE * scale);
    }
}

/// Porter-Duff "over" for straight-alpha pixels.
fn blend_over(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;
    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }
    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let v = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (v * 255.0).clamp(0.0, 255.0) as u8
    };
    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0) as u8,
    ])
}

fn builtin_glyph(c: char) -> [u8; 5] {
    let index = match u32::from(c) {
        0x20..=0x7E => (u32::from(c) - 0x20) as usize,
        // Everything outside printable ASCII renders as '?'.
        _ => (u32::from('?') - 0x20) as usize,
    };
    FONT_5X7[index]
}

/// Classic 5x7 column-encoded ASCII glyphs (bit 0 is the top row), covering
/// 0x20..=0x7E.
const FONT_5X7: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // '!'
    [0x00, 0x07, 0x00, 0x07, 0x00], // '"'
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // '#'
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // '$'
    [0x23, 0x13, 0x08, 0x64, 0x62], // '%'
    [0x36, 0x49, 0x55, 0x22, 0x50], // '&'
    [0x00, 0x05, 0x03, 0x00, 0x00], // '\''
    [0x00, 0x1C, 0x22, 0x41, 0x00], // '('
    [0x00, 0x41, 0x22, 0x1C, 0x00], // ')'
    [0x14, 0x08, 0x3E, 0x08, 0x14], // '*'
    [0x08, 0x08, 0x3E, 0x08, 0x08], // '+'
    [0x00, 0x50, 0x30, 0x00, 0x00], // ','
    [0x08, 0x08, 0x08, 0x08, 0x08], // '-'
    [0x00, 0x60, 0x60, 0x00, 0x00], // '.'
    [0x20, 0x10, 0x08, 0x04, 0x02], // '/'
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // '0'
    [0x00, 0x42, 0x7F, 0x40, 0x00], // '1'
    [0x42, 0x61, 0x51, 0x49, 0x46], // '2'
    [0x21, 0x41, 0x45, 0x4B, 0x31], // '3'
    [0x18, 0x14, 0x12, 0x7F, 0x10], // '4'
    [0x27, 0x45, 0x45, 0x45, 0x39], // '5'
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // '6'
    [0x01, 0x71, 0x09, 0x05, 0x03], // '7'
    [0x36, 0x49, 0x49, 0x49, 0x36], // '8'
    [0x06, 0x49, 0x49, 0x29, 0x1E], // '9'
    [0x00, 0x36, 0x36, 0x00, 0x00], // ':'
    [0x00, 0x56, 0x36, 0x00, 0x00], // ';'
    [0x08, 0x14, 0x22, 0x41, 0x00], // '<'
    [0x14, 0x14, 0x14, 0x14, 0x14], // '='
    [0x00, 0x41, 0x22, 0x14, 0x08], // '>'
    [0x02, 0x01, 0x51, 0x09, 0x06], // '?'
    [0x32, 0x49, 0x79, 0x41, 0x3E], // '@'
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // 'A'
    [0x7F, 0x49, 0x49, 0x49, 0x36], // 'B'
    [0x3E, 0x41, 0x41, 0x41, 0x22], // 'C'
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // 'D'
    [0x7F, 0x49, 0x49, 0x49, 0x41], // 'E'
    [0x7F, 0x09, 0x09, 0x09, 0x01], // 'F'
    [0x3E, 0x41, 0x49, 0x49, 0x7A], // 'G'
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // 'H'
    [0x00, 0x41, 0x7F, 0x41, 0x00], // 'I'
    [0x20, 0x40, 0x41, 0x3F, 0x01], // 'J'
    [0x7F, 0x08, 0x14, 0x22, 0x41], // 'K'
    [0x7F, 0x40, 0x40, 0x40, 0x40], // 'L'
    [0x7F, 0x02, 0x0C, 0x02, 0x7F], // 'M'
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // 'N'
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // 'O'
    [0x7F, 0x09, 0x09, 0x09, 0x06], // 'P'
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // 'Q'
    [0x7F, 0x09, 0x19, 0x29, 0x46], // 'R'
    [0x46, 0x49, 0x49, 0x49, 0x31], // 'S'
    [0x01, 0x01, 0x7F, 0x01, 0x01], // 'T'
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // 'U'
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // 'V'
    [0x3F, 0x40, 0x38, 0x40, 0x3F], // 'W'
    [0x63, 0x14, 0x08, 0x14, 0x63], // 'X'
    [0x07, 0x08, 0x70, 0x08, 0x07], // 'Y'
    [0x61, 0x51, 0x49, 0x45, 0x43], // 'Z'
    [0x00, 0x7F, 0x41, 0x41, 0x00], // '['
    [0x02, 0x04, 0x08, 0x10, 0x20], // '\\'
    [0x00, 0x41, 0x41, 0x7F, 0x00], // ']'
    [0x04, 0x02, 0x01, 0x02, 0x04], // '^'
    [0x40, 0x40, 0x40, 0x40, 0x40], // '_'
    [0x00, 0x01, 0x02, 0x04, 0x00], // '`'
    [0x20, 0x54, 0x54, 0x54, 0x78], // 'a'
    [0x7F, 0x48, 0x44, 0x44, 0x38], // 'b'
    [0x38, 0x44, 0x44, 0x44, 0x20], // 'c'
    [0x38, 0x44, 0x44, 0x48, 0x7F], // 'd'
    [0x38, 0x54, 0x54, 0x54, 0x18], // 'e'
    [0x08, 0x7E, 0x09, 0x01, 0x02], // 'f'
    [0x0C, 0x52, 0x52, 0x52, 0x3E], // 'g'
    [0x7F, 0x08, 0x04, 0x04, 0x78], // 'h'
    [0x00, 0x44, 0x7D, 0x40, 0x00], // 'i'
    [0x20, 0x40, 0x44, 0x3D, 0x00], // 'j'
    [0x7F, 0x10, 0x28, 0x44, 0x00], // 'k'
    [0x00, 0x41, 0x7F, 0x40, 0x00], // 'l'
    [0x7C, 0x04, 0x18, 0x04, 0x78], // 'm'
    [0x7C, 0x08, 0x04, 0x04, 0x78], // 'n'
    [0x38, 0x44, 0x44, 0x44, 0x38], // 'o'
    [0x7C, 0x14, 0x14, 0x14, 0x08], // 'p'
    [0x08, 0x14, 0x14, 0x18, 0x7C], // 'q'
    [0x7C, 0x08, 0x04, 0x04, 0x08], // 'r'
    [0x48, 0x54, 0x54, 0x54, 0x20], // 's'
    [0x04, 0x3F, 0x44, 0x40, 0x20], // 't'
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // 'u'
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // 'v'
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // 'w'
    [0x44, 0x28, 0x10, 0x28, 0x44], // 'x'
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // 'y'
    [0x44, 0x64, 0x54, 0x4C, 0x44], // 'z'
    [0x00, 0x08, 0x36, 0x41, 0x00], // '{'
    [0x00, 0x00, 0x7F, 0x00, 0x00], // '|'
    [0x00, 0x41, 0x36, 0x08, 0x00], // '}'
    [0x08, 0x08, 0x2A, 0x1C, 0x08], // '~'
];
