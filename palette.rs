//! palette - Theme gradients for quantized cell values
//! Each theme is four stops, black through two accents to white.

pub type Rgb = [u8; 3];

pub const THEME_COUNT: u8 = 11;

const BLACK: Rgb = [0, 0, 0];
const WHITE: Rgb = [255, 255, 255];
const RED: Rgb = [255, 0, 0];
const ORANGE: Rgb = [255, 165, 0];
const BLUE: Rgb = [0, 0, 255];
const PURPLE: Rgb = [128, 0, 128];
const GREEN: Rgb = [0, 128, 0];
const YELLOW: Rgb = [255, 255, 0];
const AQUA: Rgb = [0, 255, 255];
const DARK_GREEN: Rgb = [0, 100, 0];
const LIME: Rgb = [0, 255, 0];
const MAGENTA: Rgb = [255, 0, 255];
const PINK: Rgb = [255, 192, 203];
const CYAN: Rgb = [0, 255, 255];
const GOLD: Rgb = [255, 215, 0];
const NAVY: Rgb = [0, 0, 128];
const GRAY: Rgb = [128, 128, 128];

static THEMES: [[Rgb; 4]; THEME_COUNT as usize] = [
    [BLACK, RED, ORANGE, WHITE],
    [BLACK, BLUE, PURPLE, WHITE],
    [BLACK, GREEN, YELLOW, WHITE],
    [BLACK, AQUA, BLUE, WHITE],
    [BLACK, DARK_GREEN, LIME, WHITE],
    [BLACK, MAGENTA, PINK, WHITE],
    [BLACK, CYAN, AQUA, WHITE],
    [BLACK, GOLD, ORANGE, WHITE],
    [BLACK, NAVY, BLUE, WHITE],
    [BLACK, RED, PURPLE, WHITE],
    [BLACK, GRAY, WHITE, WHITE],
];

/// Map a cell value to RGB. Themes past the last one use the last one.
pub fn color(theme: u8, value: u8) -> Rgb {
    let stops = &THEMES[theme.min(THEME_COUNT - 1) as usize];
    // Three equal segments over 0..=255
    let pos = value as u32 * 3;
    let seg = (pos / 255).min(2) as usize;
    let frac = pos - seg as u32 * 255;
    let (a, b) = (stops[seg], stops[seg + 1]);
    let mut out = BLACK;
    for ch in 0..3 {
        let (a, b) = (a[ch] as i32, b[ch] as i32);
        out[ch] = (a + (b - a) * frac as i32 / 255) as u8;
    }
    out
}
