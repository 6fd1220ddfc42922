//! payload - Display payload wire format and device-side cell layout
//! Fixed 19-byte little-endian header followed by `cell_count` value bytes.

use core::mem::size_of;

use thiserror::Error;

use crate::config::{BoundaryShape, SCREEN_HEIGHT, SCREEN_WIDTH};

/// roundRect, screenW, screenH, cellCount, gridGap, cellRatio, allowCut, cols, rows,
/// cellW, cellH, theme, brightness
pub const HEADER_LEN: usize = size_of::<u8>()
    + 3 * size_of::<u16>()
    + size_of::<u8>()
    + size_of::<f32>()
    + 7 * size_of::<u8>();

const _: () = assert!(HEADER_LEN == 19);

/// Highest allowCut with its own rule; larger values behave the same.
pub const MAX_ALLOW_CUT: u8 = 3;

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload of {0} bytes is shorter than the header")]
    TooShort(usize),
    #[error("payload is for a {width}x{height} screen")]
    ScreenMismatch { width: u16, height: u16 },
    #[error("payload declares {expected} cells but carries {got}")]
    Truncated { expected: usize, got: usize },
    #[error("output buffer of {0} bytes is too small")]
    BufferTooSmall(usize),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DisplayHeader {
    pub round_rect: u8,
    pub screen_width: u16,
    pub screen_height: u16,
    pub cell_count: u16,
    pub grid_gap: u8,
    pub cell_ratio: f32,
    pub allow_cut: u8,
    pub cols: u8,
    pub rows: u8,
    pub cell_w: u8,
    pub cell_h: u8,
    pub theme: u8,
    pub brightness: u8,
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn f32_at(b: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Pixel extent of one cell when `count` cells and their gaps span `screen`.
fn cell_extent(screen: u16, count: u8, gap: u8) -> u8 {
    if count == 0 {
        return 0;
    }
    let gaps = (count as i32 - 1) * gap as i32;
    ((screen as i32 - gaps) / count as i32).clamp(1, u8::MAX as i32) as u8
}

impl DisplayHeader {
    /// Header describing a locally computed grid on this device's screen.
    pub fn for_grid(
        cols: u8,
        rows: u8,
        cell_count: u16,
        gap: u8,
        theme: u8,
        brightness: u8,
        allow_cut: u8,
    ) -> Self {
        let cell_w = cell_extent(SCREEN_WIDTH, cols, gap);
        let cell_h = cell_extent(SCREEN_HEIGHT, rows, gap);
        Self {
            round_rect: 0,
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            cell_count,
            grid_gap: gap,
            cell_ratio: if cell_w > 0 { cell_h as f32 / cell_w as f32 } else { 1.0 },
            allow_cut,
            cols,
            rows,
            cell_w,
            cell_h,
            theme,
            brightness,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut b = [0u8; HEADER_LEN];
        b[0] = self.round_rect;
        b[1..3].copy_from_slice(&self.screen_width.to_le_bytes());
        b[3..5].copy_from_slice(&self.screen_height.to_le_bytes());
        b[5..7].copy_from_slice(&self.cell_count.to_le_bytes());
        b[7] = self.grid_gap;
        b[8..12].copy_from_slice(&self.cell_ratio.to_le_bytes());
        b[12] = self.allow_cut;
        b[13] = self.cols;
        b[14] = self.rows;
        b[15] = self.cell_w;
        b[16] = self.cell_h;
        b[17] = self.theme;
        b[18] = self.brightness;
        b
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, PayloadError> {
        if b.len() < HEADER_LEN {
            return Err(PayloadError::TooShort(b.len()));
        }
        Ok(Self {
            round_rect: b[0],
            screen_width: u16_at(b, 1),
            screen_height: u16_at(b, 3),
            cell_count: u16_at(b, 5),
            grid_gap: b[7],
            cell_ratio: f32_at(b, 8),
            allow_cut: b[12],
            cols: b[13],
            rows: b[14],
            cell_w: b[15],
            cell_h: b[16],
            theme: b[17],
            brightness: b[18],
        })
    }
}

/// A validated payload borrowing its value bytes from the datagram.
#[derive(Debug, PartialEq)]
pub struct DisplayPayload<'a> {
    pub header: DisplayHeader,
    pub values: &'a [u8],
}

/// Validate a whole payload. Any failure rejects it, nothing is partially usable.
pub fn decode(bytes: &[u8]) -> Result<DisplayPayload<'_>, PayloadError> {
    let header = DisplayHeader::from_bytes(bytes)?;
    if header.screen_width != SCREEN_WIDTH || header.screen_height != SCREEN_HEIGHT {
        return Err(PayloadError::ScreenMismatch {
            width: header.screen_width,
            height: header.screen_height,
        });
    }
    let expected = header.cell_count as usize;
    let body = &bytes[HEADER_LEN..];
    if body.len() < expected {
        return Err(PayloadError::Truncated { expected, got: body.len() });
    }
    Ok(DisplayPayload { header, values: &body[..expected] })
}

/// Write header plus values into `out`; returns bytes written.
pub fn encode(header: &DisplayHeader, values: &[u8], out: &mut [u8]) -> Result<usize, PayloadError> {
    let count = (header.cell_count as usize).min(values.len());
    let total = HEADER_LEN + count;
    if out.len() < total {
        return Err(PayloadError::BufferTooSmall(out.len()));
    }
    let mut header = *header;
    header.cell_count = count as u16;
    out[..HEADER_LEN].copy_from_slice(&header.to_bytes());
    out[HEADER_LEN..total].copy_from_slice(&values[..count]);
    Ok(total)
}

/// One cell to draw, in screen pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCell {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub value: u8,
}

/// Corners of the cell rectangle that fall inside the screen's boundary shape.
fn corners_inside(shape: BoundaryShape, x: i32, y: i32, w: i32, h: i32) -> u8 {
    let (sw, sh) = (SCREEN_WIDTH as i32, SCREEN_HEIGHT as i32);
    let corners = [(x, y), (x + w, y), (x, y + h), (x + w, y + h)];
    let inside = |&(px, py): &(i32, i32)| match shape {
        BoundaryShape::Rectangular => (0..=sw).contains(&px) && (0..=sh).contains(&py),
        BoundaryShape::Circular => {
            // Doubled coordinates keep the center exact for odd sizes
            let dx = (2 * px - sw) as i64;
            let dy = (2 * py - sh) as i64;
            let r = sw.min(sh) as i64;
            dx * dx + dy * dy <= r * r
        }
    };
    corners.iter().filter(|c| inside(c)).count() as u8
}

/// Iterator over drawable cells of a payload, row-major and centered on screen.
///
/// A cell is drawn when at least `4 - allowCut` corners lie inside the boundary. Skipped cells
/// do not consume a value, so values fill the surviving cells in order.
pub struct Layout<'a> {
    header: DisplayHeader,
    values: &'a [u8],
    shape: BoundaryShape,
    required: u8,
    origin: (i32, i32),
    row: u8,
    col: u8,
    next_value: usize,
}

pub fn layout<'a>(header: &DisplayHeader, values: &'a [u8], shape: BoundaryShape) -> Layout<'a> {
    let (cols, rows) = (header.cols as i32, header.rows as i32);
    let gap = header.grid_gap as i32;
    let grid_w = cols * header.cell_w as i32 + (cols - 1).max(0) * gap;
    let grid_h = rows * header.cell_h as i32 + (rows - 1).max(0) * gap;
    Layout {
        header: *header,
        values: &values[..(header.cell_count as usize).min(values.len())],
        shape,
        required: 4 - header.allow_cut.min(MAX_ALLOW_CUT),
        origin: (
            (SCREEN_WIDTH as i32 - grid_w) / 2,
            (SCREEN_HEIGHT as i32 - grid_h) / 2,
        ),
        row: 0,
        col: 0,
        next_value: 0,
    }
}

impl<'a> Iterator for Layout<'a> {
    type Item = DrawCell;

    fn next(&mut self) -> Option<DrawCell> {
        let h = &self.header;
        let (w_px, h_px, gap) = (h.cell_w as i32, h.cell_h as i32, h.grid_gap as i32);
        while self.next_value < self.values.len() && self.row < h.rows {
            let x = self.origin.0 + self.col as i32 * (w_px + gap);
            let y = self.origin.1 + self.row as i32 * (h_px + gap);
            self.col += 1;
            if self.col >= h.cols {
                self.col = 0;
                self.row += 1;
            }
            if corners_inside(self.shape, x, y, w_px, h_px) < self.required {
                continue;
            }
            let value = self.values[self.next_value];
            self.next_value += 1;
            return Some(DrawCell { x, y, w: w_px as u32, h: h_px as u32, value });
        }
        None
    }
}
