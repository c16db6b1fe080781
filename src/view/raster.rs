//! Pixel capture of a rendered report buffer.
//!
//! Each cell becomes an 8x16 pixel tile (times the capture scale). Glyphs come
//! from the font8x8 tables; block elements are filled geometrically so charts
//! keep crisp edges. Characters outside the tables are drawn as an outlined box.

use font8x8::{
    UnicodeFonts, BASIC_FONTS, BLOCK_FONTS, BOX_FONTS, GREEK_FONTS, HIRAGANA_FONTS, LATIN_FONTS,
    MISC_FONTS,
};
use image::{Rgb, RgbImage};
use ratatui::buffer::{Buffer, Cell};
use ratatui::style::{Color, Modifier};
use unicode_width::UnicodeWidthStr;

pub const CELL_WIDTH: u32 = 8;
pub const CELL_HEIGHT: u32 = 16;
/// Device-pixel multiplier applied when capturing for documents.
pub const CAPTURE_SCALE: u32 = 2;

/// Page background; stands in for the terminal default background.
pub const BACKGROUND: [u8; 3] = [0xff, 0xff, 0xff];
/// Stands in for the terminal default foreground.
pub const FOREGROUND: [u8; 3] = [0x1e, 0x29, 0x3b];

/// Geometric shapes, in eighths of a cell: `(x0, y0, x1, y1)`.
enum Glyph {
    Blank,
    Bitmap([u8; 8]),
    Rects(&'static [(u32, u32, u32, u32)]),
    Tofu,
}

fn glyph(symbol: &str) -> Glyph {
    let Some(c) = symbol.chars().next() else {
        return Glyph::Blank;
    };
    if c == ' ' {
        return Glyph::Blank;
    }
    let rects: Option<&'static [(u32, u32, u32, u32)]> = match c {
        '█' => Some(&[(0, 0, 8, 8)]),
        '▀' => Some(&[(0, 0, 8, 4)]),
        '▄' => Some(&[(0, 4, 8, 8)]),
        '▌' => Some(&[(0, 0, 4, 8)]),
        '▐' => Some(&[(4, 0, 8, 8)]),
        '▁' => Some(&[(0, 7, 8, 8)]),
        '▂' => Some(&[(0, 6, 8, 8)]),
        '▃' => Some(&[(0, 5, 8, 8)]),
        '▅' => Some(&[(0, 3, 8, 8)]),
        '▆' => Some(&[(0, 2, 8, 8)]),
        '▇' => Some(&[(0, 1, 8, 8)]),
        '■' => Some(&[(1, 2, 7, 6)]),
        '•' => Some(&[(3, 3, 5, 5)]),
        '…' => Some(&[(0, 6, 2, 7), (3, 6, 5, 7), (6, 6, 8, 7)]),
        _ => None,
    };
    if let Some(r) = rects {
        return Glyph::Rects(r);
    }
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BOX_FONTS.get(c))
        .or_else(|| BLOCK_FONTS.get(c))
        .or_else(|| GREEK_FONTS.get(c))
        .or_else(|| HIRAGANA_FONTS.get(c))
        .or_else(|| MISC_FONTS.get(c))
        .map(Glyph::Bitmap)
        .unwrap_or(Glyph::Tofu)
}

fn rgb(color: Color, default: [u8; 3]) -> [u8; 3] {
    match color {
        Color::Reset => default,
        Color::Rgb(r, g, b) => [r, g, b],
        Color::Black => [0x00, 0x00, 0x00],
        Color::Red => [0xdc, 0x26, 0x26],
        Color::Green => [0x16, 0xa3, 0x4a],
        Color::Yellow => [0xca, 0x8a, 0x04],
        Color::Blue => [0x25, 0x63, 0xeb],
        Color::Magenta => [0xc0, 0x26, 0xd3],
        Color::Cyan => [0x08, 0x91, 0xb2],
        Color::Gray => [0x94, 0xa3, 0xb8],
        Color::DarkGray => [0x47, 0x55, 0x69],
        Color::LightRed => [0xf8, 0x71, 0x71],
        Color::LightGreen => [0x4a, 0xde, 0x80],
        Color::LightYellow => [0xfa, 0xcc, 0x15],
        Color::LightBlue => [0x60, 0xa5, 0xfa],
        Color::LightMagenta => [0xe8, 0x79, 0xf9],
        Color::LightCyan => [0x22, 0xd3, 0xee],
        Color::White => [0xf8, 0xfa, 0xfc],
        Color::Indexed(i) => {
            let v = i.saturating_mul(10);
            [v, v, v]
        }
    }
}

struct Canvas {
    img: RgbImage,
    scale: u32,
}

impl Canvas {
    fn fill(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        let (max_x, max_y) = self.img.dimensions();
        for py in y..(y + h).min(max_y) {
            for px in x..(x + w).min(max_x) {
                self.img.put_pixel(px, py, Rgb(color));
            }
        }
    }

    fn cell_origin(&self, col: u16, row: u16) -> (u32, u32) {
        (
            u32::from(col) * CELL_WIDTH * self.scale,
            u32::from(row) * CELL_HEIGHT * self.scale,
        )
    }

    fn draw_glyph(&mut self, col: u16, row: u16, cell: &Cell) {
        let reversed = cell.modifier.contains(Modifier::REVERSED);
        let (fg, _) = colors(cell, reversed);
        let (ox, oy) = self.cell_origin(col, row);
        let s = self.scale;
        let cols = cell.symbol().width().max(1) as u32;

        match glyph(cell.symbol()) {
            Glyph::Blank => {}
            Glyph::Rects(rects) => {
                // Eighths of the cell in both directions.
                let ex = CELL_WIDTH * s / 8;
                let ey = CELL_HEIGHT * s / 8;
                for &(x0, y0, x1, y1) in rects {
                    self.fill(ox + x0 * ex, oy + y0 * ey, (x1 - x0) * ex, (y1 - y0) * ey, fg);
                }
            }
            Glyph::Bitmap(rows) => {
                let bold = cell.modifier.contains(Modifier::BOLD);
                let y_step = CELL_HEIGHT / 8;
                for (r, bits) in rows.iter().enumerate() {
                    for bit in 0..8u32 {
                        if bits & (1 << bit) == 0 {
                            continue;
                        }
                        let w = if bold { 2 * s } else { s };
                        self.fill(ox + bit * s, oy + r as u32 * y_step * s, w, y_step * s, fg);
                    }
                }
            }
            Glyph::Tofu => {
                let w = cols * CELL_WIDTH * s;
                let h = CELL_HEIGHT * s;
                let (x0, y0) = (ox + s, oy + 2 * s);
                let (bw, bh) = (w - 2 * s, h - 4 * s);
                self.fill(x0, y0, bw, s, fg);
                self.fill(x0, y0 + bh - s, bw, s, fg);
                self.fill(x0, y0, s, bh, fg);
                self.fill(x0 + bw - s, y0, s, bh, fg);
            }
        }

        if cell.modifier.contains(Modifier::UNDERLINED) {
            let w = cols * CELL_WIDTH * s;
            self.fill(ox, oy + (CELL_HEIGHT - 2) * s, w, s, fg);
        }
        if cell.modifier.contains(Modifier::CROSSED_OUT) {
            let w = cols * CELL_WIDTH * s;
            self.fill(ox, oy + CELL_HEIGHT / 2 * s, w, s, fg);
        }
    }
}

fn colors(cell: &Cell, reversed: bool) -> ([u8; 3], [u8; 3]) {
    let fg = rgb(cell.fg, FOREGROUND);
    let bg = rgb(cell.bg, BACKGROUND);
    if reversed {
        (bg, fg)
    } else {
        (fg, bg)
    }
}

/// Rasterize every cell of `buf` at `scale`.
pub fn rasterize(buf: &Buffer, scale: u32) -> RgbImage {
    let scale = scale.max(1);
    let area = buf.area;
    let width = u32::from(area.width) * CELL_WIDTH * scale;
    let height = u32::from(area.height) * CELL_HEIGHT * scale;
    let mut canvas = Canvas {
        img: RgbImage::from_pixel(width, height, Rgb(BACKGROUND)),
        scale,
    };

    // Backgrounds first so wide glyphs are not clipped by the cell after them.
    for row in 0..area.height {
        for col in 0..area.width {
            let Some(cell) = buf.cell((area.x + col, area.y + row)) else {
                continue;
            };
            let (_, bg) = colors(cell, cell.modifier.contains(Modifier::REVERSED));
            if bg != BACKGROUND {
                let (x, y) = canvas.cell_origin(col, row);
                canvas.fill(x, y, CELL_WIDTH * scale, CELL_HEIGHT * scale, bg);
            }
        }
    }
    for row in 0..area.height {
        for col in 0..area.width {
            if let Some(cell) = buf.cell((area.x + col, area.y + row)) {
                canvas.draw_glyph(col, row, cell);
            }
        }
    }
    canvas.img
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;
    use ratatui::style::Style;

    #[test]
    fn image_size_follows_cell_grid() {
        let buf = Buffer::empty(Rect::new(0, 0, 10, 3));
        let img = rasterize(&buf, 2);
        assert_eq!(img.dimensions(), (10 * 8 * 2, 3 * 16 * 2));
        assert!(img.pixels().all(|p| p.0 == BACKGROUND));
    }

    #[test]
    fn block_elements_fill_exact_halves() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 1, 1));
        buf.set_string(0, 0, "▀", Style::default().fg(Color::Rgb(1, 2, 3)));
        let img = rasterize(&buf, 1);
        assert_eq!(img.get_pixel(4, 2).0, [1, 2, 3]);
        assert_eq!(img.get_pixel(4, 12).0, BACKGROUND);
    }

    #[test]
    fn backgrounds_are_painted() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 2, 1));
        buf.set_string(1, 0, " ", Style::default().bg(Color::Rgb(9, 9, 9)));
        let img = rasterize(&buf, 1);
        assert_eq!(img.get_pixel(3, 3).0, BACKGROUND);
        assert_eq!(img.get_pixel(12, 3).0, [9, 9, 9]);
    }

    #[test]
    fn text_uses_default_foreground() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 1, 1));
        buf.set_string(0, 0, "H", Style::default());
        let img = rasterize(&buf, 1);
        assert!(img.pixels().any(|p| p.0 == FOREGROUND));
    }

    #[test]
    fn unknown_characters_become_boxes() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 2, 1));
        buf.set_string(0, 0, "億", Style::default());
        let img = rasterize(&buf, 1);
        // Left edge of the box, on both halves of the wide glyph.
        assert_eq!(img.get_pixel(1, 8).0, FOREGROUND);
        assert_eq!(img.get_pixel(14, 8).0, FOREGROUND);
    }
}
