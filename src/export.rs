use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::Local;
use image::{ImageBuffer, Rgb, RgbImage};

use crate::tiles::{TileIndex, TileLayer};

const PALETTE: [[u8; 3]; 12] = [
    [38, 70, 160],   // deep water
    [64, 120, 200],  // shallow water
    [222, 208, 150], // sand
    [120, 180, 80],  // grass
    [60, 130, 60],   // forest
    [30, 90, 40],    // dense forest
    [140, 120, 90],  // dirt
    [120, 120, 120], // stone
    [90, 90, 95],    // cliff
    [240, 240, 245], // snow
    [170, 60, 40],   // brick
    [200, 160, 60],  // wood
];

const EMPTY: [u8; 3] = [0, 0, 0];

/// Color for a tile index. Indices past the palette wrap around.
pub fn tile_color(tile: Option<TileIndex>) -> [u8; 3] {
    match tile {
        Some(i) => PALETTE[i as usize % PALETTE.len()],
        None => EMPTY,
    }
}

/// Export a tile layer as a PNG, `scale` pixels per tile.
pub fn export_layer(layer: &TileLayer, path: &str, scale: u32) -> Result<(), image::ImageError> {
    let scale = scale.max(1);
    let mut img: RgbImage = ImageBuffer::new(layer.width as u32 * scale, layer.height as u32 * scale);

    for (x, y, tile) in layer.iter() {
        let color = Rgb(tile_color(tile));
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(x as u32 * scale + dx, y as u32 * scale + dy, color);
            }
        }
    }

    img.save(path)
}

fn tile_char(tile: Option<TileIndex>) -> char {
    const GLYPHS: &[u8] = b"~-.,\"^;:#*%&";
    match tile {
        Some(i) => GLYPHS[i as usize % GLYPHS.len()] as char,
        None => ' ',
    }
}

/// Render the layer as one glyph per tile.
pub fn render_ascii(layer: &TileLayer) -> String {
    let mut out = String::with_capacity((layer.width + 1) * layer.height);
    for (x, _, tile) in layer.iter() {
        out.push(tile_char(tile));
        if x + 1 == layer.width {
            out.push('\n');
        }
    }
    out
}

/// Write an ASCII dump of the layer with a header and free-form summary lines.
pub fn export_ascii(layer: &TileLayer, path: &str, summary: &[String]) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    writeln!(file, "=== TILE LAYER {}x{} ===", layer.width, layer.height)?;
    writeln!(file, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(file)?;
    for line in summary {
        writeln!(file, "{}", line)?;
    }
    writeln!(file)?;
    write!(file, "{}", render_ascii(layer))?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileStorage;

    #[test]
    fn test_render_ascii_rows() {
        let mut layer = TileLayer::new(3, 2);
        layer.put_tile_at(0, 0, 0);
        layer.put_tile_at(4, 2, 1);
        assert_eq!(render_ascii(&layer), "~  \n  \"\n");
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(tile_color(Some(0)), tile_color(Some(PALETTE.len() as u32)));
        assert_eq!(tile_color(None), EMPTY);
    }
}
