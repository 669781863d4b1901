//! Picture Processing Unit: palette/texture pools plus the draw commands
//! that translate PPU calls into renderer calls with the coordinate/scale
//! conversion spec.md §4.D describes.
//!
//! Grounded on `original_source/components/VM_PPU.hpp`'s `K_PPU`.

pub mod palette;
pub mod texture;

use log::{error, warn};

pub use palette::{Palette, PaletteKind};
pub use texture::Texture;

use crate::error::VmError;
use crate::renderer::{HostEvent, Rect, Renderer, Rgb};

/// Logical screen size (spec.md §4.D); origin is bottom-left.
pub const SCREEN_WIDTH: u32 = 256;
pub const SCREEN_HEIGHT: u32 = 240;
/// Default pixel scale, 256x240 logical -> 1024x960 window.
pub const DEFAULT_SCALE: u32 = 4;
/// Default tile edge length in logical pixels.
pub const DEFAULT_TILE_SIZE: u32 = 8;

pub struct Ppu<R: Renderer> {
    pub renderer: R,
    pub scale: u32,
    pub tile_size: u32,
    palettes: Vec<Palette>,
    textures: Vec<Texture<R::TextureHandle>>,
}

impl<R: Renderer> Ppu<R> {
    pub fn new(renderer: R) -> Self {
        Ppu {
            renderer,
            scale: DEFAULT_SCALE,
            tile_size: DEFAULT_TILE_SIZE,
            palettes: Vec::new(),
            textures: Vec::new(),
        }
    }

    pub fn init(&mut self, title: &str) -> anyhow::Result<()> {
        self.renderer.init(
            title,
            SCREEN_WIDTH * self.scale,
            SCREEN_HEIGHT * self.scale,
        )
    }

    /// `real_pos(x, y) = (x*scale, (240 - y)*scale)` -- spec.md §4.D.
    pub fn real_pos(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x * self.scale as i32,
            (SCREEN_HEIGHT as i32 - y) * self.scale as i32,
        )
    }

    pub fn load_palette(&mut self, kind_byte: u8, data: &[u8]) -> Result<usize, VmError> {
        let palette = Palette::from_wire(kind_byte, data)?;
        self.palettes.push(palette);
        Ok(self.palettes.len() - 1)
    }

    pub fn load_texture(
        &mut self,
        w: u8,
        h: u8,
        size: u8,
        color_format: u8,
        raw: &[u8],
    ) -> Result<usize, VmError> {
        let handle = self
            .renderer
            .create_streaming_texture(w as u32, h as u32)
            .map_err(|_| VmError::InvalidTextureFormat(color_format))?;
        let texture = Texture::from_wire(w, h, size, color_format, raw, handle)?;
        self.textures.push(texture);
        Ok(self.textures.len() - 1)
    }

    pub fn color_background(&mut self, r: u8, g: u8, b: u8) {
        if let Err(e) = self.renderer.clear(Rgb { r, g, b }) {
            error!("PPU: clear failed: {e}");
        }
    }

    pub fn draw_pixel(&mut self, x: u8, y: u8, r: u8, g: u8, b: u8) {
        let (px, py) = self.real_pos(x as i32, y as i32 + 1);
        let rect = Rect {
            x: px,
            y: py,
            w: self.scale,
            h: self.scale,
        };
        if let Err(e) = self.renderer.fill_rect(rect, Rgb { r, g, b }) {
            error!("PPU: draw_pixel failed: {e}");
        }
    }

    pub fn draw_tile(&mut self, tx: u8, ty: u8, r: u8, g: u8, b: u8) {
        let (px, py) = self.real_pos(
            tx as i32 * self.tile_size as i32,
            ty as i32 * self.tile_size as i32 + self.tile_size as i32,
        );
        let side = self.scale * self.tile_size;
        let rect = Rect {
            x: px,
            y: py,
            w: side,
            h: side,
        };
        if let Err(e) = self.renderer.fill_rect(rect, Rgb { r, g, b }) {
            error!("PPU: draw_tile failed: {e}");
        }
    }

    pub fn draw_texture(&mut self, x: u8, y: u8, tex_id: u8, pal_id: u8) {
        let Some(texture) = self.textures.get_mut(tex_id as usize) else {
            warn!("INVALID TEXTURE ID: {tex_id}");
            return;
        };
        let Some(palette) = self.palettes.get(pal_id as usize) else {
            warn!("INVALID TEXTURE ID: {tex_id}");
            return;
        };
        if texture.resolve(pal_id as usize, palette) {
            let stride = texture.w as u32;
            if let Err(e) = self
                .renderer
                .update_texture(&mut texture.handle, texture.rgb_cache(), stride)
            {
                error!("PPU: texture upload failed: {e}");
                return;
            }
        }

        let (px, py) = self.real_pos(x as i32, y as i32);
        let side_w = texture.w as u32 * self.scale * texture.size as u32;
        let side_h = texture.h as u32 * self.scale * texture.size as u32;
        let rect = Rect {
            x: px,
            y: py,
            w: side_w,
            h: side_h,
        };
        if let Err(e) = self.renderer.blit(&texture.handle, rect) {
            error!("PPU: blit failed: {e}");
        }
    }

    pub fn present(&mut self) {
        self.renderer.present();
    }

    pub fn poll_events(&mut self) -> Vec<HostEvent> {
        self.renderer.poll_events()
    }

    pub fn destroy(&mut self) {
        self.renderer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::TestRenderer;

    fn ppu() -> Ppu<TestRenderer> {
        Ppu::new(TestRenderer::new())
    }

    #[test]
    fn real_pos_matches_law() {
        let p = ppu();
        assert_eq!(p.real_pos(0, 0), (0, 240 * 4));
    }

    #[test]
    fn draw_pixel_fills_expected_rect() {
        let mut p = ppu();
        p.draw_pixel(10, 5, 1, 2, 3);
        let (rect, color) = p.renderer.filled_rects[0];
        assert_eq!(rect, Rect { x: 40, y: (240 - 6) * 4, w: 4, h: 4 });
        assert_eq!(color, Rgb { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn draw_tile_matches_scenario_s5() {
        let mut p = ppu();
        p.draw_tile(0, 0, 255, 0, 0);
        let (rect, color) = p.renderer.filled_rects[0];
        assert_eq!(rect, Rect { x: 0, y: 928, w: 32, h: 32 });
        assert_eq!(color, Rgb { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn background_fill_matches_scenario_s4() {
        let mut p = ppu();
        p.color_background(10, 20, 30);
        assert_eq!(p.renderer.cleared, vec![Rgb { r: 10, g: 20, b: 30 }]);
    }

    #[test]
    fn draw_texture_with_unknown_id_is_a_logged_no_op() {
        let mut p = ppu();
        p.draw_texture(0, 0, 9, 0);
        assert!(p.renderer.blits.is_empty());
    }

    #[test]
    fn resolve_uploads_exactly_once_across_two_draws() {
        let mut p = ppu();
        let pal = p.load_palette(4, &[1, 2, 3, 4, 5, 6, 0, 0, 0, 0, 0, 0]).unwrap();
        let tex = p.load_texture(2, 1, 1, 1, &[0b00_01_00_00]).unwrap();
        p.draw_texture(0, 0, tex as u8, pal as u8);
        p.draw_texture(0, 0, tex as u8, pal as u8);
        assert_eq!(p.renderer.uploads.len(), 1);
        assert_eq!(p.renderer.blits.len(), 2);
    }
}
