//! The host graphics/window/event abstraction the PPU draws through.
//!
//! `Renderer` decouples the PPU from any particular windowing library the
//! way `CpuBus` decouples a 6502 core from its memory map. `Sdl2Renderer` is
//! the concrete backing (grounded on `KWINDOW` in
//! `original_source/libs/KGraphics.hpp` and on `nes.rs`'s `run()`);
//! `TestRenderer` is a recording fake used by the PPU and CPU unit tests.

use log::info;
use sdl2::{
    event::Event,
    pixels::PixelFormatEnum,
    rect::Rect as SdlRect,
    render::{Canvas, Texture, TextureCreator},
    video::{Window, WindowContext},
    Sdl,
};

/// Default window size, in pixels, before the logical 256x240 screen is
/// scaled up (`original_source/libs/KGraphics.hpp`'s `WINDOW_INFO` default).
pub const DEFAULT_WINDOW_WIDTH: u32 = 1024;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 960;

/// An axis-aligned rectangle in screen (post-`real_pos`) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// An RGB triple, the color unit the PPU and renderer trade in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Host input/window events the console loop forwards into a tick.
///
/// Key events carry a raw SDL-style scancode (not a keycode): `SYS
/// KEY_QUERY` (spec.md §4.E) translates an ASCII letter to this same
/// numbering (`'a'..'z' -> key-93`, `'A'..'Z' -> key-61`) and compares
/// against it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    KeyDown(u8),
    KeyUp(u8),
    WindowClose,
}

/// The capabilities the PPU and the host loop need from a graphics backend.
///
/// A `TextureHandle` is an opaque renderer-owned resource; the PPU stores
/// one per loaded texture (spec.md §4.B) and only ever hands it back to the
/// same `Renderer` it came from.
pub trait Renderer {
    type TextureHandle;

    fn init(&mut self, title: &str, width: u32, height: u32) -> anyhow::Result<()>;

    /// Fill the whole frame with a single color (`GFX BG_COLOR`).
    fn clear(&mut self, color: Rgb) -> anyhow::Result<()>;

    /// Fill an opaque rectangle with a single color (`GFX TILE_RGB`/`PIXEL_RGB`).
    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> anyhow::Result<()>;

    /// Create a streaming texture of `width`x`height` RGB24 pixels, returning
    /// a handle the PPU will pass back into `update_texture`/`blit`.
    fn create_streaming_texture(&mut self, width: u32, height: u32) -> anyhow::Result<Self::TextureHandle>;

    /// Upload `rgb` (tightly packed, `width * height * 3` bytes) into a
    /// previously created streaming texture.
    fn update_texture(&mut self, handle: &mut Self::TextureHandle, rgb: &[u8], width: u32) -> anyhow::Result<()>;

    /// Blit a texture into `dest` (`GFX DRAW_TEX`).
    fn blit(&mut self, handle: &Self::TextureHandle, dest: Rect) -> anyhow::Result<()>;

    /// Swap the frame onto the screen (`SYS PRESENT`, the cooperative yield
    /// point, spec.md §4.F).
    fn present(&mut self);

    /// Drain pending host events since the last call.
    fn poll_events(&mut self) -> Vec<HostEvent>;

    fn destroy(&mut self);
}

/// The real SDL2-backed renderer used by the `kvm8` binary.
pub struct Sdl2Renderer {
    sdl: Option<Sdl>,
    canvas: Option<Canvas<Window>>,
    texture_creator: Option<&'static TextureCreator<WindowContext>>,
}

impl Sdl2Renderer {
    pub fn new() -> Self {
        Sdl2Renderer {
            sdl: None,
            canvas: None,
            texture_creator: None,
        }
    }

    fn canvas_mut(&mut self) -> &mut Canvas<Window> {
        self.canvas.as_mut().expect("renderer not initialized")
    }
}

impl Default for Sdl2Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for Sdl2Renderer {
    type TextureHandle = Texture<'static>;

    fn init(&mut self, title: &str, width: u32, height: u32) -> anyhow::Result<()> {
        let sdl = sdl2::init().map_err(|e| anyhow::anyhow!("failed to initialize SDL2: {e}"))?;
        let video = sdl
            .video()
            .map_err(|e| anyhow::anyhow!("failed to initialize SDL2 video subsystem: {e}"))?;
        let window = video
            .window(title, width, height)
            .position_centered()
            .build()?;
        let canvas = window.into_canvas().accelerated().present_vsync().build()?;
        // Leaked to obtain a `TextureCreator` with a `'static` lifetime, so
        // that `Texture<'static>` handles can be stored by the PPU alongside
        // (not borrowed from) the renderer. One Sdl2Renderer lives for the
        // whole process, so this is a one-time leak, not a growing one.
        let texture_creator: &'static TextureCreator<WindowContext> =
            Box::leak(Box::new(canvas.texture_creator()));

        info!("SDL2 window created ({width}x{height})");
        self.sdl = Some(sdl);
        self.canvas = Some(canvas);
        self.texture_creator = Some(texture_creator);
        Ok(())
    }

    fn clear(&mut self, color: Rgb) -> anyhow::Result<()> {
        let canvas = self.canvas_mut();
        canvas.set_draw_color(sdl2::pixels::Color::RGB(color.r, color.g, color.b));
        canvas.clear();
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> anyhow::Result<()> {
        let canvas = self.canvas_mut();
        canvas.set_draw_color(sdl2::pixels::Color::RGB(color.r, color.g, color.b));
        canvas
            .fill_rect(SdlRect::new(rect.x, rect.y, rect.w, rect.h))
            .map_err(|e| anyhow::anyhow!("fill_rect failed: {e}"))
    }

    fn create_streaming_texture(&mut self, width: u32, height: u32) -> anyhow::Result<Self::TextureHandle> {
        let creator = self.texture_creator.expect("renderer not initialized");
        Ok(creator.create_texture_streaming(PixelFormatEnum::RGB24, width, height)?)
    }

    fn update_texture(&mut self, handle: &mut Self::TextureHandle, rgb: &[u8], width: u32) -> anyhow::Result<()> {
        handle.update(None, rgb, width as usize * 3)?;
        Ok(())
    }

    fn blit(&mut self, handle: &Self::TextureHandle, dest: Rect) -> anyhow::Result<()> {
        let canvas = self.canvas_mut();
        canvas
            .copy(handle, None, SdlRect::new(dest.x, dest.y, dest.w, dest.h))
            .map_err(|e| anyhow::anyhow!("blit failed: {e}"))
    }

    fn present(&mut self) {
        self.canvas_mut().present();
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        let Some(sdl) = self.sdl.as_ref() else {
            return Vec::new();
        };
        let Ok(mut pump) = sdl.event_pump() else {
            return Vec::new();
        };
        pump.poll_iter()
            .filter_map(|event| match event {
                Event::Quit { .. } => Some(HostEvent::WindowClose),
                Event::KeyDown { scancode: Some(s), .. } => Some(HostEvent::KeyDown(s as i32 as u8)),
                Event::KeyUp { scancode: Some(s), .. } => Some(HostEvent::KeyUp(s as i32 as u8)),
                _ => None,
            })
            .collect()
    }

    fn destroy(&mut self) {
        self.canvas = None;
        self.texture_creator = None;
        self.sdl = None;
    }
}

/// A non-windowed fake used by unit tests, grounded on `nes_cpu.rs`'s
/// `TestBus` pattern: it records what was asked of it instead of drawing
/// anything.
#[derive(Default)]
pub struct TestRenderer {
    pub cleared: Vec<Rgb>,
    pub filled_rects: Vec<(Rect, Rgb)>,
    pub textures: Vec<(u32, u32)>,
    pub uploads: Vec<Vec<u8>>,
    pub blits: Vec<Rect>,
    pub present_count: u32,
    pub queued_events: Vec<HostEvent>,
    pub destroyed: bool,
}

impl TestRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_event(&mut self, event: HostEvent) {
        self.queued_events.push(event);
    }
}

impl Renderer for TestRenderer {
    type TextureHandle = usize;

    fn init(&mut self, _title: &str, _width: u32, _height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    fn clear(&mut self, color: Rgb) -> anyhow::Result<()> {
        self.cleared.push(color);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> anyhow::Result<()> {
        self.filled_rects.push((rect, color));
        Ok(())
    }

    fn create_streaming_texture(&mut self, width: u32, height: u32) -> anyhow::Result<Self::TextureHandle> {
        self.textures.push((width, height));
        Ok(self.textures.len() - 1)
    }

    fn update_texture(&mut self, handle: &mut Self::TextureHandle, rgb: &[u8], _width: u32) -> anyhow::Result<()> {
        let _ = handle;
        self.uploads.push(rgb.to_vec());
        Ok(())
    }

    fn blit(&mut self, _handle: &Self::TextureHandle, dest: Rect) -> anyhow::Result<()> {
        self.blits.push(dest);
        Ok(())
    }

    fn present(&mut self) {
        self.present_count += 1;
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.queued_events)
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_records_clear_and_present() {
        let mut r = TestRenderer::new();
        r.clear(Rgb { r: 1, g: 2, b: 3 }).unwrap();
        r.present();
        assert_eq!(r.cleared, vec![Rgb { r: 1, g: 2, b: 3 }]);
        assert_eq!(r.present_count, 1);
    }

    #[test]
    fn test_renderer_queues_events_for_one_drain() {
        let mut r = TestRenderer::new();
        r.queue_event(HostEvent::WindowClose);
        assert_eq!(r.poll_events(), vec![HostEvent::WindowClose]);
        assert!(r.poll_events().is_empty());
    }
}
