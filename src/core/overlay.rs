// Frame annotation: overlay instructions and the rasterizer that draws them

use crate::core::angle::Point2;
use crate::models::capture::SourceKind;
use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;

const FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 220, 90]);
pub const YELLOW: Rgb<u8> = Rgb([255, 210, 0]);
pub const RED: Rgb<u8> = Rgb([230, 40, 40]);
pub const PANEL: Rgb<u8> = Rgb([24, 24, 32]);

/// A drawing instruction in normalized [0, 1] frame coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayItem {
    Segment { from: Point2, to: Point2, color: Rgb<u8> },
    Joint { at: Point2, color: Rgb<u8> },
    Label { at: Point2, text: String, color: Rgb<u8> },
}

/// Counters and status drawn on every outgoing frame
#[derive(Debug, Clone)]
pub struct Hud<'a> {
    pub exercise_name: &'a str,
    pub left_count: u32,
    pub right_count: u32,
    pub feedback: Option<&'a str>,
    pub fps: u32,
    pub source: SourceKind,
}

fn to_pixels(image: &RgbImage, p: Point2) -> (f32, f32) {
    let (w, h) = image.dimensions();
    ((p.x * w as f64) as f32, (p.y * h as f64) as f32)
}

pub fn render(image: &mut RgbImage, items: &[OverlayItem]) {
    for item in items {
        match item {
            OverlayItem::Segment { from, to, color } => {
                let (x0, y0) = to_pixels(image, *from);
                let (x1, y1) = to_pixels(image, *to);
                // Three parallel strokes for a visible line width
                for offset in [-1.0f32, 0.0, 1.0] {
                    draw_line_segment_mut(image, (x0 + offset, y0), (x1 + offset, y1), *color);
                }
            }
            OverlayItem::Joint { at, color } => {
                let (x, y) = to_pixels(image, *at);
                draw_filled_circle_mut(image, (x as i32, y as i32), 5, *color);
                draw_filled_circle_mut(image, (x as i32, y as i32), 2, BLACK);
            }
            OverlayItem::Label { at, text, color } => {
                let (x, y) = to_pixels(image, *at);
                draw_text(image, x as i32 + 8, y as i32 - 8, text, 16.0, *color);
            }
        }
    }
}

fn font() -> Option<FontRef<'static>> {
    match FontRef::try_from_slice(FONT_DATA) {
        Ok(font) => Some(font),
        Err(e) => {
            log::error!("Embedded overlay font is invalid: {}", e);
            None
        }
    }
}

/// Draw text `size` pixels tall. Pixels outside the image are clipped.
pub fn draw_text(image: &mut RgbImage, x: i32, y: i32, text: &str, size: f32, color: Rgb<u8>) {
    if let Some(font) = font() {
        draw_text_mut(image, color, x, y, PxScale::from(size), &font, text);
    }
}

/// Rendered width of `text` in pixels
pub fn text_width(text: &str, size: f32) -> u32 {
    font().map_or(0, |font| text_size(PxScale::from(size), &font, text).0)
}

/// Text centered horizontally on the image
pub fn draw_text_centered(image: &mut RgbImage, y: i32, text: &str, size: f32, color: Rgb<u8>) {
    let width = text_width(text, size) as i32;
    let x = (image.width() as i32 - width) / 2;
    draw_text(image, x.max(0), y, text, size, color);
}

pub fn draw_panel(image: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(image, Rect::at(x, y).of_size(width, height), color);
}

/// Outlined bar filled to `fraction` (clamped to [0, 1])
pub fn draw_progress_bar(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    fraction: f64,
    color: Rgb<u8>,
) {
    if width < 2 || height < 2 {
        return;
    }

    let filled = ((width - 2) as f64 * fraction.clamp(0.0, 1.0)) as u32;
    draw_hollow_rect_mut(image, Rect::at(x, y).of_size(width, height), WHITE);
    if filled > 0 {
        draw_filled_rect_mut(image, Rect::at(x + 1, y + 1).of_size(filled, height - 2), color);
    }
}

pub fn draw_hud(image: &mut RgbImage, hud: &Hud) {
    let width = image.width();
    let height = image.height();

    draw_panel(image, 0, 0, width, 64, PANEL);
    draw_text(image, 12, 8, hud.exercise_name, 18.0, WHITE);
    draw_text(
        image,
        12,
        32,
        &format!("L: {}   R: {}", hud.left_count, hud.right_count),
        24.0,
        GREEN,
    );

    let mode = match hud.source {
        SourceKind::Camera => "CAM",
        SourceKind::Synthetic => "SIM",
    };
    let status = format!("{} FPS {}", mode, hud.fps);
    let status_x = width as i32 - text_width(&status, 18.0) as i32 - 12;
    draw_text(image, status_x, 8, &status, 18.0, YELLOW);

    if let Some(feedback) = hud.feedback.filter(|text| !text.is_empty()) {
        draw_panel(image, 0, height as i32 - 40, width, 40, PANEL);
        draw_text_centered(image, height as i32 - 31, feedback, 20.0, WHITE);
    }
}
