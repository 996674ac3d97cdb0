//! Identifier to window mapping
//!
//! Every method takes the graphics backend explicitly because every one of
//! them runs inside a privileged operation on the executor thread. Windows are
//! only inserted once fully built; a failed build releases whatever it
//! created and leaves the registry untouched.

use super::{
    CloseRequest, DrawStrategy, QrWindowSpec, SolidWindowSpec, Upsert, Window, WindowResult,
};
use crate::graphics::{GraphicsBackend, GraphicsResult, MeshData, SurfaceId, TextureId, WindowDesc};
use crate::qr::QrEncoder;
use image::RgbaImage;
use std::collections::HashMap;

/// Windows keyed by identifier
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: HashMap<String, Window>,
}

impl WindowRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered windows
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no windows are registered
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Look up a window
    pub fn get(&self, id: &str) -> Option<&Window> {
        self.windows.get(id)
    }

    /// Whether a window with `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.windows.contains_key(id)
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.windows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Keep only the windows for which `keep` returns true
    pub(crate) fn retain(&mut self, keep: impl FnMut(&String, &mut Window) -> bool) {
        self.windows.retain(keep);
    }

    /// Open a solid-color window, or restyle the existing one
    pub fn upsert_solid(
        &mut self,
        graphics: &mut dyn GraphicsBackend,
        spec: SolidWindowSpec,
    ) -> WindowResult<Upsert> {
        let strategy = DrawStrategy::Solid { color: spec.color };

        if let Some(window) = self.windows.get_mut(&spec.id) {
            window.set_title_and_size(graphics, &spec.title, spec.width, spec.height)?;
            window.replace_strategy(strategy).release(graphics);
            log::info!("Window '{}' restyled as solid {:?}", spec.id, spec.color);
            return Ok(Upsert::Updated);
        }

        let surface = graphics.create_window(&WindowDesc::new(spec.width, spec.height, spec.title.as_str()))?;
        log::info!("Window '{}' created ({}x{}, solid)", spec.id, spec.width, spec.height);
        self.windows.insert(
            spec.id,
            Window::new(surface, spec.title, spec.width, spec.height, strategy),
        );
        Ok(Upsert::Created)
    }

    /// Open a QR window, or re-encode the existing one
    ///
    /// Updating keeps the window and its mesh and swaps only the texture. A
    /// solid window targeted by a QR request gains a mesh and switches to
    /// textured drawing.
    pub fn upsert_qr(
        &mut self,
        graphics: &mut dyn GraphicsBackend,
        encoder: &dyn QrEncoder,
        spec: QrWindowSpec,
    ) -> WindowResult<Upsert> {
        let image = encoder.encode(&spec.text, spec.level, spec.size)?;

        if let Some(window) = self.windows.get_mut(&spec.id) {
            let texture = graphics.upload_texture(&image)?;
            if let Err(err) = retexture(graphics, window, texture, &spec) {
                graphics.destroy_texture(texture);
                return Err(err.into());
            }
            log::info!("Window '{}' re-encoded", spec.id);
            return Ok(Upsert::Updated);
        }

        let surface = graphics.create_window(&WindowDesc::new(spec.size, spec.size, spec.title.as_str()))?;
        let strategy = match build_textured(graphics, surface, &image) {
            Ok(strategy) => strategy,
            Err(err) => {
                graphics.destroy_window(surface);
                return Err(err.into());
            }
        };

        log::info!("Window '{}' created ({}x{}, QR)", spec.id, spec.size, spec.size);
        self.windows.insert(
            spec.id,
            Window::new(surface, spec.title, spec.size, spec.size, strategy),
        );
        Ok(Upsert::Created)
    }

    /// Set the close flag of window `id`
    ///
    /// Destruction happens on the next frame sweep.
    pub fn request_close(&mut self, graphics: &mut dyn GraphicsBackend, id: &str) -> CloseRequest {
        match self.windows.get(id) {
            Some(window) => {
                graphics.set_should_close(window.surface(), true);
                log::debug!("Window '{id}' close requested");
                CloseRequest::Requested
            }
            None => CloseRequest::Missing,
        }
    }

    /// Release every window and its resources
    pub fn release_all(&mut self, graphics: &mut dyn GraphicsBackend) {
        for (id, window) in self.windows.drain() {
            log::debug!("Releasing window '{id}'");
            window.release(graphics);
        }
    }
}

fn build_textured(
    graphics: &mut dyn GraphicsBackend,
    surface: SurfaceId,
    image: &RgbaImage,
) -> GraphicsResult<DrawStrategy> {
    let mesh = graphics.create_mesh(surface, &MeshData::viewport_quad())?;
    match graphics.upload_texture(image) {
        Ok(texture) => Ok(DrawStrategy::TexturedQuad { texture, mesh }),
        Err(err) => {
            graphics.destroy_mesh(mesh);
            Err(err)
        }
    }
}

fn retexture(
    graphics: &mut dyn GraphicsBackend,
    window: &mut Window,
    texture: TextureId,
    spec: &QrWindowSpec,
) -> GraphicsResult<()> {
    let mesh = match *window.strategy() {
        DrawStrategy::TexturedQuad { mesh, .. } => mesh,
        DrawStrategy::Solid { .. } => graphics.create_mesh(window.surface(), &MeshData::viewport_quad())?,
    };

    if let Err(err) = window.set_title_and_size(graphics, &spec.title, spec.size, spec.size) {
        if !matches!(window.strategy(), DrawStrategy::TexturedQuad { .. }) {
            graphics.destroy_mesh(mesh);
        }
        return Err(err);
    }

    match window.replace_strategy(DrawStrategy::TexturedQuad { texture, mesh }) {
        DrawStrategy::TexturedQuad { texture: old, .. } => graphics.destroy_texture(old),
        DrawStrategy::Solid { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{Color, HeadlessBackend, RecordedFrame};
    use crate::qr::{QrCodeEncoder, QrError, RecoveryLevel};

    fn solid(id: &str, color: Color) -> SolidWindowSpec {
        SolidWindowSpec {
            id: id.to_string(),
            width: 100,
            height: 80,
            title: "T".to_string(),
            color,
        }
    }

    fn qr(id: &str, text: &str) -> QrWindowSpec {
        QrWindowSpec {
            id: id.to_string(),
            title: "QR".to_string(),
            text: text.to_string(),
            level: RecoveryLevel::Low,
            size: 256,
        }
    }

    struct FailingEncoder;

    impl QrEncoder for FailingEncoder {
        fn encode(&self, _: &str, _: RecoveryLevel, size: u32) -> Result<RgbaImage, QrError> {
            Err(QrError::InvalidSize(size))
        }
    }

    #[test]
    fn test_solid_create_then_update_in_place() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();

        assert_eq!(registry.upsert_solid(&mut graphics, solid("a", Color::rgb(255, 0, 0))).unwrap(), Upsert::Created);
        let surface = registry.get("a").unwrap().surface();

        let mut update = solid("a", Color::rgb(0, 0, 255));
        update.title = "Renamed".to_string();
        update.width = 300;
        assert_eq!(registry.upsert_solid(&mut graphics, update).unwrap(), Upsert::Updated);

        assert_eq!(registry.len(), 1);
        assert_eq!(probe.open_windows(), 1);
        let window = registry.get("a").unwrap();
        assert_eq!(window.surface(), surface);
        assert_eq!(window.title(), "Renamed");
        assert_eq!(probe.size(surface), Some((300, 80)));
        assert_eq!(*window.strategy(), DrawStrategy::Solid { color: Color::rgb(0, 0, 255) });
    }

    #[test]
    fn test_qr_update_swaps_only_texture() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();

        registry.upsert_qr(&mut graphics, &QrCodeEncoder, qr("x", "hello")).unwrap();
        let DrawStrategy::TexturedQuad { texture: first, mesh } = *registry.get("x").unwrap().strategy() else {
            panic!("expected textured strategy");
        };

        assert_eq!(registry.upsert_qr(&mut graphics, &QrCodeEncoder, qr("x", "world")).unwrap(), Upsert::Updated);
        let DrawStrategy::TexturedQuad { texture: second, mesh: same_mesh } = *registry.get("x").unwrap().strategy() else {
            panic!("expected textured strategy");
        };

        assert_eq!(mesh, same_mesh);
        assert_ne!(first, second);
        assert!(probe.texture(first).is_none());
        assert_eq!(probe.live_textures(), 1);
        assert_eq!(probe.live_meshes(), 1);
        assert_eq!(probe.open_windows(), 1);
    }

    #[test]
    fn test_qr_over_solid_gains_mesh() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();

        registry.upsert_solid(&mut graphics, solid("s", Color::WHITE)).unwrap();
        registry.upsert_qr(&mut graphics, &QrCodeEncoder, qr("s", "hello")).unwrap();

        let window = registry.get("s").unwrap();
        assert!(window.strategy().texture().is_some());
        assert_eq!(window.size(), (256, 256));
        assert_eq!(probe.live_meshes(), 1);

        window.redraw(&mut graphics).unwrap();
        graphics.present(window.surface()).unwrap();
        assert!(matches!(probe.last_frame(window.surface()), Some(RecordedFrame::TexturedMesh { .. })));
    }

    #[test]
    fn test_solid_over_qr_releases_texture_and_mesh() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();

        registry.upsert_qr(&mut graphics, &QrCodeEncoder, qr("q", "hello")).unwrap();
        registry.upsert_solid(&mut graphics, solid("q", Color::BLACK)).unwrap();

        assert_eq!(probe.live_textures(), 0);
        assert_eq!(probe.live_meshes(), 0);
    }

    #[test]
    fn test_failed_encode_registers_nothing() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();

        let result = registry.upsert_qr(&mut graphics, &FailingEncoder, qr("q", "hello"));

        assert!(matches!(result, Err(crate::window::WindowError::Qr(_))));
        assert!(registry.is_empty());
        assert_eq!(probe.open_windows(), 0);
    }

    #[test]
    fn test_failed_window_creation_registers_nothing() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();

        probe.fail_next_window("display lost");
        assert!(registry.upsert_solid(&mut graphics, solid("a", Color::WHITE)).is_err());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_close_sets_flag_only() {
        let mut graphics = HeadlessBackend::new();
        let mut registry = WindowRegistry::new();
        registry.upsert_solid(&mut graphics, solid("a", Color::WHITE)).unwrap();

        assert_eq!(registry.request_close(&mut graphics, "missing"), CloseRequest::Missing);
        assert_eq!(registry.request_close(&mut graphics, "a"), CloseRequest::Requested);

        let surface = registry.get("a").unwrap().surface();
        assert!(graphics.should_close(surface));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_all_closes_everything() {
        let mut graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let mut registry = WindowRegistry::new();
        registry.upsert_solid(&mut graphics, solid("a", Color::WHITE)).unwrap();
        registry.upsert_qr(&mut graphics, &QrCodeEncoder, qr("b", "hello")).unwrap();

        registry.release_all(&mut graphics);

        assert!(registry.is_empty());
        assert_eq!(probe.open_windows(), 0);
        assert_eq!(probe.live_textures(), 0);
    }
}
