//! Indexed texture storage with a lazily re-resolved RGB cache.
//!
//! Grounded on `original_source/components/VM_PPU.hpp`'s `Texture`: a fixed
//! `w*h` indexed-pixel buffer (`data`), an RGB cache (`processedData`) kept
//! in sync with `currentPalette`, and a renderer-owned streaming texture
//! handle. `update()` there is our `resolve()`.

use crate::error::VmError;
use crate::ppu::palette::Palette;

/// `color_format == 1` means the source pixel data is packed 2 bits/pixel
/// and must be expanded before storage (spec.md §4.B). No other format is
/// currently defined.
const COLOR_FORMAT_PACKED_2BPP: u8 = 1;

pub struct Texture<H> {
    pub w: u8,
    pub h: u8,
    pub size: u8,
    pub color_format: u8,
    indexed: Vec<u8>,
    rgb_cache: Vec<u8>,
    pub handle: H,
    pub current_palette: i32,
}

impl<H> Texture<H> {
    pub fn new(w: u8, h: u8, size: u8, color_format: u8, indexed: Vec<u8>, handle: H) -> Self {
        let pixel_count = w as usize * h as usize;
        Texture {
            w,
            h,
            size,
            color_format,
            indexed,
            rgb_cache: vec![0; pixel_count * 3],
            handle,
            current_palette: -1,
        }
    }

    /// Expand a packed 2-bit-per-pixel buffer into one index byte per
    /// pixel, high-to-low pair order within each source byte (spec.md
    /// §4.B: "each source byte yields four pixels in high-to-low 2-bit
    /// pairs").
    pub fn expand_2bpp(packed: &[u8], pixel_count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(pixel_count);
        'outer: for byte in packed {
            for shift in [6u8, 4, 2, 0] {
                if out.len() == pixel_count {
                    break 'outer;
                }
                out.push((byte >> shift) & 0b11);
            }
        }
        out
    }

    /// Build a texture from wire data, expanding packed formats as needed.
    pub fn from_wire(w: u8, h: u8, size: u8, color_format: u8, raw: &[u8], handle: H) -> Result<Self, VmError> {
        let pixel_count = w as usize * h as usize;
        let indexed = match color_format {
            COLOR_FORMAT_PACKED_2BPP => Self::expand_2bpp(raw, pixel_count),
            other => return Err(VmError::InvalidTextureFormat(other)),
        };
        Ok(Self::new(w, h, size, color_format, indexed, handle))
    }

    pub fn pixel_count(&self) -> usize {
        self.w as usize * self.h as usize
    }

    /// Recompute `rgb_cache` against `palette` if it isn't already current,
    /// returning `true` if an upload to the renderer is needed.
    pub fn resolve(&mut self, palette_id: usize, palette: &Palette) -> bool {
        if self.current_palette == palette_id as i32 {
            return false;
        }
        for (i, &index) in self.indexed.iter().enumerate() {
            let (r, g, b) = palette.rgb_at(index);
            self.rgb_cache[i * 3] = r;
            self.rgb_cache[i * 3 + 1] = g;
            self.rgb_cache[i * 3 + 2] = b;
        }
        self.current_palette = palette_id as i32;
        true
    }

    pub fn rgb_cache(&self) -> &[u8] {
        &self.rgb_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::palette::PaletteKind;

    #[test]
    fn expand_2bpp_unpacks_high_to_low() {
        let packed = [0b11_10_01_00u8];
        let out = Texture::<()>::expand_2bpp(&packed, 4);
        assert_eq!(out, vec![0b11, 0b10, 0b01, 0b00]);
    }

    #[test]
    fn resolve_is_idempotent_per_palette() {
        let palette = Palette::from_wire(4, &[10, 20, 30, 40, 50, 60, 0, 0, 0, 0, 0, 0]).unwrap();
        let _ = PaletteKind::Bpp2;
        let mut tex = Texture::new(2, 1, 1, COLOR_FORMAT_PACKED_2BPP, vec![0, 1], ());
        assert!(tex.resolve(0, &palette));
        assert_eq!(tex.rgb_cache(), &[10, 20, 30, 40, 50, 60]);
        assert!(!tex.resolve(0, &palette));
    }
}
