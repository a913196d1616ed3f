//! Canvas layout
//!
//! Fits a source frame into the fixed canvas without distorting it and
//! draws it there.

/// Where a scaled source lands on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Scale `src` so one dimension fills the canvas and center it.
    ///
    /// Wider sources get bars above and below (letterbox); taller ones get
    /// bars left and right (pillarbox).
    pub fn letterbox(src_width: u32, src_height: u32, canvas_width: u32, canvas_height: u32) -> Self {
        if src_width == 0 || src_height == 0 {
            return Self {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }

        let scale = f64::min(
            canvas_width as f64 / src_width as f64,
            canvas_height as f64 / src_height as f64,
        );
        let width = ((src_width as f64 * scale).round() as u32).clamp(1, canvas_width);
        let height = ((src_height as f64 * scale).round() as u32).clamp(1, canvas_height);

        Self {
            x: (canvas_width - width) / 2,
            y: (canvas_height - height) / 2,
            width,
            height,
        }
    }
}

/// Fill the whole canvas with opaque black
pub fn clear(canvas: &mut [u8]) {
    for pixel in canvas.chunks_exact_mut(4) {
        pixel.copy_from_slice(&[0, 0, 0, 255]);
    }
}

/// Draw an RGBA source onto the canvas at `placement` (nearest neighbor)
pub fn draw_scaled(
    canvas: &mut [u8],
    canvas_width: u32,
    source: &[u8],
    src_width: u32,
    src_height: u32,
    placement: Placement,
) {
    if placement.width == 0 || placement.height == 0 || src_width == 0 || src_height == 0 {
        return;
    }

    for dy in 0..placement.height {
        let src_y = ((dy as u64 * src_height as u64) / placement.height as u64) as u32;
        let src_y = src_y.min(src_height - 1);
        let dest_y = placement.y + dy;

        for dx in 0..placement.width {
            let src_x = ((dx as u64 * src_width as u64) / placement.width as u64) as u32;
            let src_x = src_x.min(src_width - 1);

            let src_idx = (src_y as usize * src_width as usize + src_x as usize) * 4;
            let dest_idx =
                (dest_y as usize * canvas_width as usize + (placement.x + dx) as usize) * 4;

            if src_idx + 3 >= source.len() || dest_idx + 3 >= canvas.len() {
                continue;
            }

            canvas[dest_idx..dest_idx + 3].copy_from_slice(&source[src_idx..src_idx + 3]);
            canvas[dest_idx + 3] = 255;
        }
    }
}
