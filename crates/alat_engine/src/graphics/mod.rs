//! Graphics capability consumed by the command executor
//!
//! This module defines the backend-agnostic interface the window registry and
//! the frame sweep drive. It covers window lifecycle (create, title, size,
//! close flag, key state, destroy), input polling, presentation and the two
//! drawing primitives the host needs: clearing to a color and drawing a
//! textured mesh.
//!
//! # Thread Affinity
//!
//! Backends are not required to be `Send`. A backend is created on the
//! executor thread and every call happens there; other threads reach it only
//! through [`crate::executor::Submitter`].
//!
//! # Frame Model
//!
//! Drawing calls (`clear`, `draw_textured_mesh`) describe the content of the
//! next frame of one surface; `present` submits and shows it. A backend may
//! record immediately or defer until `present`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

pub mod headless;

pub use headless::{HeadlessBackend, HeadlessProbe, RecordedFrame};

new_key_type! {
    /// Handle to an on-screen window owned by a backend
    pub struct SurfaceId;
    /// Handle to a texture resident on the GPU
    pub struct TextureId;
    /// Handle to an uploaded vertex/index mesh
    pub struct MeshId;
}

/// Graphics errors
#[derive(Error, Debug)]
pub enum GraphicsError {
    /// Window or surface creation failed
    #[error("Window creation failed: {0}")]
    WindowCreation(String),

    /// The surface handle does not name a live window
    #[error("Unknown surface")]
    UnknownSurface,

    /// The texture handle does not name a live texture
    #[error("Unknown texture")]
    UnknownTexture,

    /// The mesh handle does not name a live mesh
    #[error("Unknown mesh")]
    UnknownMesh,

    /// Shader loading or pipeline creation failed
    #[error("Shader error: {0}")]
    Shader(String),

    /// Texture creation or upload failed
    #[error("Texture upload failed: {0}")]
    TextureUpload(String),

    /// Any other backend failure
    #[error("Graphics backend error: {0}")]
    Backend(String),
}

/// Result type for graphics operations
pub type GraphicsResult<T> = Result<T, GraphicsError>;

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Opaque white
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Fully opaque color from RGB channels
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Normalized channels for clear values
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }
}

/// Keys the host reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Escape closes the focused window
    Escape,
}

/// Parameters for a new window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDesc {
    /// Width in screen coordinates
    pub width: u32,
    /// Height in screen coordinates
    pub height: u32,
    /// Title bar text
    pub title: String,
}

impl WindowDesc {
    /// Create a window description
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            width,
            height,
            title: title.into(),
        }
    }
}

/// Interleaved vertex data: `[x, y, u, v]` per vertex plus triangle indices
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Positions in normalized device coordinates with texture coordinates
    pub vertices: Vec<[f32; 4]>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Two triangles covering the whole viewport
    ///
    /// Texture coordinates put the image origin at the top-left corner.
    pub fn viewport_quad() -> Self {
        Self {
            vertices: vec![
                [1.0, 1.0, 1.0, 0.0],   // top right
                [1.0, -1.0, 1.0, 1.0],  // bottom right
                [-1.0, -1.0, 0.0, 1.0], // bottom left
                [-1.0, 1.0, 0.0, 0.0],  // top left
            ],
            indices: vec![
                0, 1, 3, // first triangle
                1, 2, 3, // second triangle
            ],
        }
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        u32::try_from(self.indices.len()).unwrap_or(u32::MAX)
    }
}

/// Backend-agnostic graphics capability
///
/// Every method must be called on the thread that created the backend.
pub trait GraphicsBackend {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Open a new window
    fn create_window(&mut self, desc: &WindowDesc) -> GraphicsResult<SurfaceId>;

    /// Close and release a window; unknown handles are ignored
    fn destroy_window(&mut self, surface: SurfaceId);

    /// Change the title bar text
    fn set_title(&mut self, surface: SurfaceId, title: &str) -> GraphicsResult<()>;

    /// Resize the window
    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32) -> GraphicsResult<()>;

    /// Whether the window's close flag is set
    ///
    /// Unknown handles report `true` so the sweep discards them.
    fn should_close(&self, surface: SurfaceId) -> bool;

    /// Set or clear the window's close flag
    fn set_should_close(&mut self, surface: SurfaceId, should_close: bool);

    /// Whether `key` is currently held down in the window
    fn is_key_pressed(&self, surface: SurfaceId, key: Key) -> bool;

    /// Upload mesh data and prepare `surface` for textured drawing
    fn create_mesh(&mut self, surface: SurfaceId, mesh: &MeshData) -> GraphicsResult<MeshId>;

    /// Release a mesh; unknown handles are ignored
    fn destroy_mesh(&mut self, mesh: MeshId);

    /// Upload an RGBA image as a sampled texture
    fn upload_texture(&mut self, image: &RgbaImage) -> GraphicsResult<TextureId>;

    /// Release a texture; unknown handles are ignored
    fn destroy_texture(&mut self, texture: TextureId);

    /// Fill the next frame of `surface` with `color`
    fn clear(&mut self, surface: SurfaceId, color: Color) -> GraphicsResult<()>;

    /// Draw `mesh` sampled from `texture` into the next frame of `surface`
    fn draw_textured_mesh(
        &mut self,
        surface: SurfaceId,
        mesh: MeshId,
        texture: TextureId,
    ) -> GraphicsResult<()>;

    /// Submit and show the frame described since the last present
    fn present(&mut self, surface: SurfaceId) -> GraphicsResult<()>;

    /// Process pending window-system events
    fn poll_events(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_normalization() {
        assert_eq!(Color::rgb(255, 0, 0).to_f32_array(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(Color::BLACK.a, 255);
    }

    #[test]
    fn test_viewport_quad_covers_clip_space() {
        let quad = MeshData::viewport_quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.index_count(), 6);
        assert!(quad.indices.iter().all(|&i| (i as usize) < quad.vertices.len()));

        let xs: Vec<f32> = quad.vertices.iter().map(|v| v[0]).collect();
        assert!(xs.contains(&1.0) && xs.contains(&-1.0));
    }
}
