//! Hosted windows and their redraw strategies
//!
//! A [`Window`] pairs a backend surface with the strategy that produces its
//! content every frame. Windows live in the [`WindowRegistry`], which only
//! the command executor thread touches.

use crate::graphics::{Color, GraphicsBackend, GraphicsError, GraphicsResult, MeshId, SurfaceId, TextureId};
use crate::qr::{QrError, RecoveryLevel};
use thiserror::Error;

pub mod registry;

pub use registry::WindowRegistry;

/// Errors raised while building or updating a window
#[derive(Error, Debug)]
pub enum WindowError {
    /// The graphics backend rejected an operation
    #[error(transparent)]
    Graphics(#[from] GraphicsError),

    /// The QR text could not be encoded
    #[error(transparent)]
    Qr(#[from] QrError),
}

/// Result type for window registry operations
pub type WindowResult<T> = Result<T, WindowError>;

/// What a window draws each frame
///
/// Each variant carries exactly the resources it needs; resources owned by a
/// variant are released when the strategy is replaced or the window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStrategy {
    /// Clear the framebuffer to a color
    Solid {
        /// Fill color
        color: Color,
    },
    /// Draw a viewport-covering mesh sampled from a texture
    TexturedQuad {
        /// Owned texture
        texture: TextureId,
        /// Owned mesh
        mesh: MeshId,
    },
}

impl DrawStrategy {
    /// Describe the next frame of `surface`
    pub fn draw(&self, surface: SurfaceId, graphics: &mut dyn GraphicsBackend) -> GraphicsResult<()> {
        match *self {
            Self::Solid { color } => graphics.clear(surface, color),
            Self::TexturedQuad { texture, mesh } => {
                graphics.clear(surface, Color::BLACK)?;
                graphics.draw_textured_mesh(surface, mesh, texture)
            }
        }
    }

    /// Release any GPU resources owned by this strategy
    pub fn release(self, graphics: &mut dyn GraphicsBackend) {
        if let Self::TexturedQuad { texture, mesh } = self {
            graphics.destroy_texture(texture);
            graphics.destroy_mesh(mesh);
        }
    }

    /// Texture drawn by this strategy, if any
    pub fn texture(&self) -> Option<TextureId> {
        match *self {
            Self::Solid { .. } => None,
            Self::TexturedQuad { texture, .. } => Some(texture),
        }
    }
}

/// A registered, fully constructed window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    surface: SurfaceId,
    title: String,
    width: u32,
    height: u32,
    strategy: DrawStrategy,
}

impl Window {
    pub(crate) fn new(surface: SurfaceId, title: String, width: u32, height: u32, strategy: DrawStrategy) -> Self {
        Self {
            surface,
            title,
            width,
            height,
            strategy,
        }
    }

    /// Backend surface handle
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Current title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Current redraw strategy
    pub fn strategy(&self) -> &DrawStrategy {
        &self.strategy
    }

    /// Run the redraw strategy for one frame
    pub fn redraw(&self, graphics: &mut dyn GraphicsBackend) -> GraphicsResult<()> {
        self.strategy.draw(self.surface, graphics)
    }

    pub(crate) fn set_title_and_size(
        &mut self,
        graphics: &mut dyn GraphicsBackend,
        title: &str,
        width: u32,
        height: u32,
    ) -> GraphicsResult<()> {
        graphics.set_title(self.surface, title)?;
        self.title = title.to_string();
        graphics.set_size(self.surface, width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub(crate) fn replace_strategy(&mut self, strategy: DrawStrategy) -> DrawStrategy {
        std::mem::replace(&mut self.strategy, strategy)
    }

    /// Release the strategy's resources and close the surface
    pub fn release(&self, graphics: &mut dyn GraphicsBackend) {
        self.strategy.release(graphics);
        graphics.destroy_window(self.surface);
    }
}

/// Validated parameters for a solid-color window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidWindowSpec {
    /// Registry key
    pub id: String,
    /// Width in screen coordinates
    pub width: u32,
    /// Height in screen coordinates
    pub height: u32,
    /// Title bar text
    pub title: String,
    /// Fill color
    pub color: Color,
}

/// Validated parameters for a QR window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrWindowSpec {
    /// Registry key
    pub id: String,
    /// Title bar text
    pub title: String,
    /// Text to encode
    pub text: String,
    /// Error recovery level
    pub level: RecoveryLevel,
    /// Side length of the square window and image
    pub size: u32,
}

/// Result of a create-or-update request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new window was opened
    Created,
    /// An existing window was updated in place
    Updated,
}

/// Result of a close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequest {
    /// The close flag was set; the next sweep destroys the window
    Requested,
    /// No window has that identifier
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{HeadlessBackend, WindowDesc};

    #[test]
    fn test_title_tracks_backend_when_resize_fails() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let surface = graphics.create_window(&WindowDesc::new(10, 10, "old")).unwrap();
        let mut window = Window::new(surface, "old".to_string(), 10, 10, DrawStrategy::Solid { color: Color::WHITE });

        probe.fail_next_resize("resize refused");
        assert!(window.set_title_and_size(&mut graphics, "new", 20, 30).is_err());

        assert_eq!(window.title(), "new");
        assert_eq!(probe.title(surface).as_deref(), Some("new"));
        assert_eq!(window.size(), (10, 10));
        assert_eq!(probe.size(surface), Some((10, 10)));
    }
}
