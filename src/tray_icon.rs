//! Synthesizes the tray icon bitmap from a price change percentage.
//!
//! The icon is a vertical bar chart: the bar grows from the bottom for a
//! rising price and from the top for a falling one, with a gray reference
//! line at the previous-close level. The whole module is pure so the
//! drawing contract is unit-testable without a tray.

use tauri::image::Image;

pub const ICON_SIZE: usize = 16;

/// Changes beyond +-10% no longer grow the bar.
pub const MAX_ABS_CHANGE: f64 = 10.0;

const BAR_WIDTH: usize = 8;
/// Vertical inset of the bar track from the top and bottom edges.
const TRACK_INSET: usize = 2;

type Rgba = [u8; 4];

const BG_COLOR: Rgba = [40, 40, 40, 255];
const UP_COLOR: Rgba = [255, 77, 79, 255];
const DOWN_COLOR: Rgba = [82, 196, 26, 255];
const MIDLINE_COLOR: Rgba = [100, 100, 100, 255];

/// Bar height in pixels for a given signed change percentage.
///
/// At least 2 px, scaling linearly up to 12 px at a 10% move.
pub fn bar_height(change: f64) -> usize {
    let clamped = change.abs().min(MAX_ABS_CHANGE);
    let scaled = (clamped / MAX_ABS_CHANGE * (ICON_SIZE - 2 * TRACK_INSET) as f64).round() as usize;
    scaled.max(2)
}

/// Renders the 16x16 RGBA pixel buffer for a signed change percentage.
pub fn render_pixels(change: f64) -> Vec<u8> {
    let is_up = change >= 0.0;
    let bar_color = if is_up { UP_COLOR } else { DOWN_COLOR };
    let height = bar_height(change);

    let bar_left = (ICON_SIZE - BAR_WIDTH) / 2;
    let bar_right = bar_left + BAR_WIDTH;
    let midline_row = ICON_SIZE / 2;

    let mut pixels = Vec::with_capacity(ICON_SIZE * ICON_SIZE * 4);
    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            let mut color = BG_COLOR;

            if x >= bar_left && x < bar_right {
                if is_up {
                    // Rising: anchored to the bottom of the track, growing upward.
                    let bar_top = ICON_SIZE - TRACK_INSET - height;
                    if y >= bar_top && y < ICON_SIZE - TRACK_INSET {
                        color = bar_color;
                    }
                } else if y >= TRACK_INSET && y < TRACK_INSET + height {
                    // Falling: anchored to the top of the track, growing downward.
                    color = bar_color;
                }
            }

            // Previous-close reference line, drawn over the bar.
            if y == midline_row && x >= 1 && x < ICON_SIZE - 1 {
                color = MIDLINE_COLOR;
            }

            pixels.extend_from_slice(&color);
        }
    }
    pixels
}

/// Renders the tray image for a signed change percentage.
pub fn render_icon(change: f64) -> Image<'static> {
    Image::new_owned(render_pixels(change), ICON_SIZE as u32, ICON_SIZE as u32)
}

/// Tooltip summary, e.g. `"AAPL: 150.00 (+2.50%)"`.
///
/// Negative changes carry their own minus sign from formatting.
pub fn format_tooltip(name: &str, price: &str, change: f64) -> String {
    let sign = if change >= 0.0 { "+" } else { "" };
    format!("{}: {} ({}{:.2}%)", name, price, sign, change)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_at(pixels: &[u8], x: usize, y: usize) -> Rgba {
        let offset = (y * ICON_SIZE + x) * 4;
        [
            pixels[offset],
            pixels[offset + 1],
            pixels[offset + 2],
            pixels[offset + 3],
        ]
    }

    #[test]
    fn bar_height_has_floor_of_two_pixels() {
        assert_eq!(bar_height(0.0), 2);
        assert_eq!(bar_height(0.5), 2);
        assert_eq!(bar_height(-0.5), 2);
    }

    #[test]
    fn bar_height_scales_linearly() {
        assert_eq!(bar_height(2.5), 3);
        assert_eq!(bar_height(5.0), 6);
        assert_eq!(bar_height(-5.0), 6);
        assert_eq!(bar_height(10.0), 12);
    }

    #[test]
    fn bar_height_clamps_beyond_ten_percent() {
        assert_eq!(bar_height(-12.0), 12);
        assert_eq!(bar_height(25.0), 12);
        assert_eq!(bar_height(f64::INFINITY), 12);
    }

    #[test]
    fn bar_height_is_monotonic_up_to_clamp() {
        let mut previous = 0;
        for tenths in 0..=100 {
            let change = tenths as f64 / 10.0;
            let height = bar_height(change);
            assert!(height >= previous, "height shrank at change {}", change);
            previous = height;
        }
    }

    #[test]
    fn rising_bar_is_anchored_to_bottom_and_up_colored() {
        let pixels = render_pixels(2.5);
        let height = bar_height(2.5);
        // Bottom row of the track, inside the bar columns.
        assert_eq!(pixel_at(&pixels, 7, ICON_SIZE - TRACK_INSET - 1), UP_COLOR);
        // First row above the bar is background.
        let bar_top = ICON_SIZE - TRACK_INSET - height;
        assert_eq!(pixel_at(&pixels, 7, bar_top - 1), BG_COLOR);
        // Nothing hangs below the track.
        assert_eq!(pixel_at(&pixels, 7, ICON_SIZE - 1), BG_COLOR);
    }

    #[test]
    fn falling_bar_is_anchored_to_top_and_down_colored() {
        let pixels = render_pixels(-3.0);
        let height = bar_height(-3.0);
        assert_eq!(pixel_at(&pixels, 7, TRACK_INSET), DOWN_COLOR);
        assert_eq!(pixel_at(&pixels, 7, TRACK_INSET + height), BG_COLOR);
        assert_eq!(pixel_at(&pixels, 7, 0), BG_COLOR);
    }

    #[test]
    fn clamped_falling_bar_fills_the_track() {
        let pixels = render_pixels(-12.0);
        for y in TRACK_INSET..TRACK_INSET + 12 {
            if y == ICON_SIZE / 2 {
                continue; // midline wins
            }
            assert_eq!(pixel_at(&pixels, 4, y), DOWN_COLOR, "row {}", y);
        }
    }

    #[test]
    fn reference_line_is_always_on_top() {
        for change in [-12.0, -3.0, 0.0, 2.5, 10.0] {
            let pixels = render_pixels(change);
            for x in 1..ICON_SIZE - 1 {
                assert_eq!(
                    pixel_at(&pixels, x, ICON_SIZE / 2),
                    MIDLINE_COLOR,
                    "change {} column {}",
                    change,
                    x
                );
            }
            // The line does not extend into the outermost columns.
            assert_eq!(pixel_at(&pixels, 0, ICON_SIZE / 2), BG_COLOR);
            assert_eq!(pixel_at(&pixels, ICON_SIZE - 1, ICON_SIZE / 2), BG_COLOR);
        }
    }

    #[test]
    fn bar_is_horizontally_centered() {
        let pixels = render_pixels(10.0);
        let y = ICON_SIZE - TRACK_INSET - 1;
        assert_eq!(pixel_at(&pixels, 3, y), BG_COLOR);
        assert_eq!(pixel_at(&pixels, 4, y), UP_COLOR);
        assert_eq!(pixel_at(&pixels, 11, y), UP_COLOR);
        assert_eq!(pixel_at(&pixels, 12, y), BG_COLOR);
    }

    #[test]
    fn renderer_is_deterministic() {
        assert_eq!(render_pixels(1.23), render_pixels(1.23));
    }

    #[test]
    fn tooltip_formats_positive_change() {
        assert_eq!(
            format_tooltip("AAPL", "150.00", 2.5),
            "AAPL: 150.00 (+2.50%)"
        );
    }

    #[test]
    fn tooltip_formats_negative_and_zero_change() {
        assert_eq!(
            format_tooltip("600519", "1688.00", -12.0),
            "600519: 1688.00 (-12.00%)"
        );
        assert_eq!(format_tooltip("TSLA", "240.10", 0.0), "TSLA: 240.10 (+0.00%)");
    }
}
