//! In-memory graphics backend
//!
//! Keeps every window, texture and mesh as plain data and records the last
//! presented frame of each surface. The host uses it when configured with
//! `renderer.backend = "headless"`, and tests use the paired
//! [`HeadlessProbe`] to inspect frames and inject input from other threads.

use super::{
    Color, GraphicsBackend, GraphicsError, GraphicsResult, Key, MeshData, MeshId, SurfaceId,
    TextureId, WindowDesc,
};
use image::RgbaImage;
use slotmap::SlotMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Content of one presented frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedFrame {
    /// The frame was cleared to a solid color
    Cleared(Color),
    /// A textured mesh was drawn over the frame
    TexturedMesh {
        /// Mesh that was drawn
        mesh: MeshId,
        /// Texture that was sampled
        texture: TextureId,
    },
}

#[derive(Debug)]
struct HeadlessSurface {
    title: String,
    width: u32,
    height: u32,
    should_close: bool,
    escape_down: bool,
    textured_ready: bool,
    pending: Option<RecordedFrame>,
    last_presented: Option<RecordedFrame>,
    presented: u64,
}

#[derive(Debug, Default)]
struct HeadlessState {
    surfaces: SlotMap<SurfaceId, HeadlessSurface>,
    textures: SlotMap<TextureId, RgbaImage>,
    meshes: SlotMap<MeshId, MeshData>,
    polls: u64,
    fail_next_window: Option<String>,
    fail_next_resize: Option<String>,
}

fn lock(state: &Mutex<HeadlessState>) -> MutexGuard<'_, HeadlessState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Graphics backend without a display
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for observing this backend from other threads
    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_window(&mut self, desc: &WindowDesc) -> GraphicsResult<SurfaceId> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_next_window.take() {
            return Err(GraphicsError::WindowCreation(reason));
        }

        Ok(state.surfaces.insert(HeadlessSurface {
            title: desc.title.clone(),
            width: desc.width,
            height: desc.height,
            should_close: false,
            escape_down: false,
            textured_ready: false,
            pending: None,
            last_presented: None,
            presented: 0,
        }))
    }

    fn destroy_window(&mut self, surface: SurfaceId) {
        lock(&self.state).surfaces.remove(surface);
    }

    fn set_title(&mut self, surface: SurfaceId, title: &str) -> GraphicsResult<()> {
        let mut state = lock(&self.state);
        let target = state.surfaces.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target.title = title.to_string();
        Ok(())
    }

    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32) -> GraphicsResult<()> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_next_resize.take() {
            return Err(GraphicsError::Backend(reason));
        }
        let target = state.surfaces.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target.width = width;
        target.height = height;
        Ok(())
    }

    fn should_close(&self, surface: SurfaceId) -> bool {
        lock(&self.state)
            .surfaces
            .get(surface)
            .map_or(true, |target| target.should_close)
    }

    fn set_should_close(&mut self, surface: SurfaceId, should_close: bool) {
        if let Some(target) = lock(&self.state).surfaces.get_mut(surface) {
            target.should_close = should_close;
        }
    }

    fn is_key_pressed(&self, surface: SurfaceId, key: Key) -> bool {
        let state = lock(&self.state);
        match key {
            Key::Escape => state.surfaces.get(surface).is_some_and(|target| target.escape_down),
        }
    }

    fn create_mesh(&mut self, surface: SurfaceId, mesh: &MeshData) -> GraphicsResult<MeshId> {
        let mut state = lock(&self.state);
        let target = state.surfaces.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target.textured_ready = true;
        Ok(state.meshes.insert(mesh.clone()))
    }

    fn destroy_mesh(&mut self, mesh: MeshId) {
        lock(&self.state).meshes.remove(mesh);
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> GraphicsResult<TextureId> {
        if image.width() == 0 || image.height() == 0 {
            return Err(GraphicsError::TextureUpload("empty image".to_string()));
        }
        Ok(lock(&self.state).textures.insert(image.clone()))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        lock(&self.state).textures.remove(texture);
    }

    fn clear(&mut self, surface: SurfaceId, color: Color) -> GraphicsResult<()> {
        let mut state = lock(&self.state);
        let target = state.surfaces.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target.pending = Some(RecordedFrame::Cleared(color));
        Ok(())
    }

    fn draw_textured_mesh(
        &mut self,
        surface: SurfaceId,
        mesh: MeshId,
        texture: TextureId,
    ) -> GraphicsResult<()> {
        let mut state = lock(&self.state);
        if !state.meshes.contains_key(mesh) {
            return Err(GraphicsError::UnknownMesh);
        }
        if !state.textures.contains_key(texture) {
            return Err(GraphicsError::UnknownTexture);
        }
        let target = state.surfaces.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        if !target.textured_ready {
            return Err(GraphicsError::Shader("surface has no textured pipeline".to_string()));
        }
        target.pending = Some(RecordedFrame::TexturedMesh { mesh, texture });
        Ok(())
    }

    fn present(&mut self, surface: SurfaceId) -> GraphicsResult<()> {
        let mut state = lock(&self.state);
        let target = state.surfaces.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        if let Some(frame) = target.pending.take() {
            target.last_presented = Some(frame);
        }
        target.presented += 1;
        Ok(())
    }

    fn poll_events(&mut self) {
        lock(&self.state).polls += 1;
    }
}

/// Observer and input injector for a [`HeadlessBackend`]
///
/// Cloneable and `Send`, so tests can hold it on another thread while the
/// backend lives on the executor thread.
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessProbe {
    /// Number of windows currently open
    pub fn open_windows(&self) -> usize {
        lock(&self.state).surfaces.len()
    }

    /// Whether `surface` is still open
    pub fn is_open(&self, surface: SurfaceId) -> bool {
        lock(&self.state).surfaces.contains_key(surface)
    }

    /// Current title of `surface`
    pub fn title(&self, surface: SurfaceId) -> Option<String> {
        lock(&self.state).surfaces.get(surface).map(|target| target.title.clone())
    }

    /// Current size of `surface`
    pub fn size(&self, surface: SurfaceId) -> Option<(u32, u32)> {
        lock(&self.state)
            .surfaces
            .get(surface)
            .map(|target| (target.width, target.height))
    }

    /// Content of the most recently presented frame of `surface`
    pub fn last_frame(&self, surface: SurfaceId) -> Option<RecordedFrame> {
        lock(&self.state)
            .surfaces
            .get(surface)
            .and_then(|target| target.last_presented.clone())
    }

    /// Number of frames presented on `surface`
    pub fn presented_frames(&self, surface: SurfaceId) -> u64 {
        lock(&self.state)
            .surfaces
            .get(surface)
            .map_or(0, |target| target.presented)
    }

    /// Number of textures currently alive
    pub fn live_textures(&self) -> usize {
        lock(&self.state).textures.len()
    }

    /// Number of meshes currently alive
    pub fn live_meshes(&self) -> usize {
        lock(&self.state).meshes.len()
    }

    /// Copy of an uploaded texture
    pub fn texture(&self, texture: TextureId) -> Option<RgbaImage> {
        lock(&self.state).textures.get(texture).cloned()
    }

    /// Number of event polls performed so far
    pub fn poll_count(&self) -> u64 {
        lock(&self.state).polls
    }

    /// Hold or release the escape key in `surface`
    pub fn set_key(&self, surface: SurfaceId, key: Key, pressed: bool) {
        if let Some(target) = lock(&self.state).surfaces.get_mut(surface) {
            match key {
                Key::Escape => target.escape_down = pressed,
            }
        }
    }

    /// Simulate the user clicking the window's close button
    pub fn request_close(&self, surface: SurfaceId) {
        if let Some(target) = lock(&self.state).surfaces.get_mut(surface) {
            target.should_close = true;
        }
    }

    /// Make the next `create_window` call fail with `reason`
    pub fn fail_next_window(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_window = Some(reason.into());
    }

    /// Make the next `set_size` call fail with `reason`
    pub fn fail_next_resize(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_resize = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_records_last_clear() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        let surface = backend.create_window(&WindowDesc::new(100, 100, "T")).unwrap();

        backend.clear(surface, Color::rgb(255, 0, 0)).unwrap();
        backend.present(surface).unwrap();

        assert_eq!(probe.last_frame(surface), Some(RecordedFrame::Cleared(Color::rgb(255, 0, 0))));
        assert_eq!(probe.presented_frames(surface), 1);
    }

    #[test]
    fn test_textured_draw_requires_mesh_on_surface() {
        let mut backend = HeadlessBackend::new();
        let first = backend.create_window(&WindowDesc::new(64, 64, "a")).unwrap();
        let second = backend.create_window(&WindowDesc::new(64, 64, "b")).unwrap();
        let mesh = backend.create_mesh(first, &MeshData::viewport_quad()).unwrap();
        let texture = backend.upload_texture(&RgbaImage::new(4, 4)).unwrap();

        assert!(backend.draw_textured_mesh(first, mesh, texture).is_ok());
        assert!(matches!(
            backend.draw_textured_mesh(second, mesh, texture),
            Err(GraphicsError::Shader(_))
        ));
    }

    #[test]
    fn test_destroyed_surface_reports_should_close() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        let surface = backend.create_window(&WindowDesc::new(10, 10, "x")).unwrap();

        backend.destroy_window(surface);

        assert!(!probe.is_open(surface));
        assert!(backend.should_close(surface));
        assert!(matches!(backend.set_title(surface, "y"), Err(GraphicsError::UnknownSurface)));
    }

    #[test]
    fn test_injected_window_failure_is_one_shot() {
        let mut backend = HeadlessBackend::new();
        backend.probe().fail_next_window("no display");

        assert!(matches!(
            backend.create_window(&WindowDesc::new(10, 10, "x")),
            Err(GraphicsError::WindowCreation(_))
        ));
        assert!(backend.create_window(&WindowDesc::new(10, 10, "x")).is_ok());
    }
}
