/// Click preview: mark the proposed pointer target on the screenshot so an
/// operator can see where the agent is about to click.
use std::path::Path;

use crate::errors::{EyeControlError, EyeControlResult};

const MARK_COLOUR: [u8; 4] = [255, 40, 40, 255];

/// Draw a crosshair and a box around normalized `(x, y)` on `src_bytes`
/// (PNG/JPEG) and write the result as PNG to `dest`.
pub fn draw_preview(src_bytes: &[u8], x: f64, y: f64, dest: &Path) -> EyeControlResult<()> {
    let img = image::load_from_memory(src_bytes)
        .map_err(|e| EyeControlError::Preview(format!("preview load: {e}")))?;
    let mut canvas = img.to_rgba8();
    let (w, h) = canvas.dimensions();

    let cx = (x * w as f64).round() as i32;
    let cy = (y * h as f64).round() as i32;
    let arm: i32 = if w > 1600 { 36 } else { 18 };
    let thickness: i32 = if w > 1600 { 3 } else { 2 };

    draw_cross(&mut canvas, cx, cy, arm, thickness, MARK_COLOUR);
    draw_rect(&mut canvas, cx - arm, cy - arm, cx + arm, cy + arm, MARK_COLOUR, thickness);

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image::DynamicImage::ImageRgba8(canvas)
        .save_with_format(dest, image::ImageFormat::Png)
        .map_err(|e| EyeControlError::Preview(format!("PNG encode: {e}")))?;
    Ok(())
}

/// Expand `{i}` in the configured template.
pub fn preview_path(template: &str, step: u32) -> std::path::PathBuf {
    std::path::PathBuf::from(template.replace("{i}", &step.to_string()))
}

fn set_pixel(canvas: &mut image::RgbaImage, x: i32, y: i32, col: [u8; 4]) {
    let (w, h) = canvas.dimensions();
    if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
        canvas.put_pixel(x as u32, y as u32, image::Rgba(col));
    }
}

fn draw_cross(canvas: &mut image::RgbaImage, cx: i32, cy: i32, arm: i32, thickness: i32, col: [u8; 4]) {
    let half = thickness / 2;
    for d in -arm..=arm {
        for t in -half..=half {
            set_pixel(canvas, cx + d, cy + t, col);
            set_pixel(canvas, cx + t, cy + d, col);
        }
    }
}

fn draw_rect(
    canvas: &mut image::RgbaImage,
    x1: i32, y1: i32, x2: i32, y2: i32,
    col: [u8; 4],
    thickness: i32,
) {
    for t in 0..thickness {
        for x in x1..=x2 {
            set_pixel(canvas, x, y1 + t, col);
            set_pixel(canvas, x, y2 - t, col);
        }
        for y in y1..=y2 {
            set_pixel(canvas, x1 + t, y, col);
            set_pixel(canvas, x2 - t, y, col);
        }
    }
}
