//! CPU (headless) renderer and PNG snapshot export.
//!
//! The particle layer is rasterized into a premultiplied float buffer, then
//! composited at the layer's opacity over the backdrop and quantized to RGBA8.
//! Expect small differences from the egui preview, which approximates the
//! radial gradient with rings.

use crate::backdrop::{Backdrop, BackdropFrame};
use crate::config::AppConfig;
use crate::layer::{LayerEnv, LayerEvent, ParticleLayer};
use crate::scheduler::FrameRequester;
use crate::surface::{RadialGradient, Surface};

use anyhow::Context;
use egui::{Color32, Mesh, Pos2, Vec2};
use image::{Rgba, RgbaImage};
use imageproc::drawing::BresenhamLineIter;

use std::path::Path;

/// Seed used by snapshots when the config does not pin one
pub const SNAPSHOT_SEED: u64 = 0x5eed;

/// Largest snapshot, in pixels (an 8K frame)
pub const MAX_SNAPSHOT_PIXELS: usize = 7680 * 4320;

pub type FrameBuffer = RgbaImage;

/// Raster surface for the particle layer.
pub struct FrameRenderer {
    width: u32,
    height: u32,
    /// Premultiplied RGBA in 0..1
    layer: Vec<[f32; 4]>,
    layer_opacity: f32,
}

impl FrameRenderer {
    pub fn new(width: u32, height: u32, layer_opacity: f32) -> Self {
        Self {
            width,
            height,
            layer: vec![[0.0; 4]; width as usize * height as usize],
            layer_opacity: layer_opacity.clamp(0.0, 1.0),
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Layer coverage at a pixel, before layer opacity
    pub fn coverage(&self, x: u32, y: u32) -> f32 {
        self.layer[self.index(x, y)][3]
    }

    /// Source-over blend of a straight-alpha color into the layer.
    fn blend(&mut self, x: i32, y: i32, rgb: [f32; 3], alpha: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let index = self.index(x as u32, y as u32);
        let dst = &mut self.layer[index];
        for c in 0..3 {
            dst[c] = rgb[c] * a + dst[c] * (1.0 - a);
        }
        dst[3] = a + dst[3] * (1.0 - a);
    }

    /// Composite the layer over the backdrop (if any) into RGBA8.
    pub fn composite(&self, backdrop: Option<(&Backdrop, &BackdropFrame)>) -> FrameBuffer {
        let mut out = RgbaImage::new(self.width, self.height);
        let op = self.layer_opacity;

        let scenery = backdrop.map(|(_, frame)| {
            let mut scenery = vec![[0.0; 4]; self.layer.len()];
            rasterize_mesh(&mut scenery, self.width, self.height, &frame.scenery);
            scenery
        });

        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let index = self.index(x, y);
            let src = self.layer[index];
            let src = [src[0] * op, src[1] * op, src[2] * op, src[3] * op];

            let (rgb, alpha) = match (backdrop, &scenery) {
                (Some((backdrop, frame)), Some(scenery)) => {
                    let uv = Vec2::new(
                        (x as f32 + 0.5) / self.width as f32,
                        (y as f32 + 0.5) / self.height as f32,
                    );
                    let base = backdrop.color_at(uv, frame.phase);
                    let decor = scenery[index];
                    let base = [
                        decor[0] + base.r() as f32 / 255.0 * (1.0 - decor[3]),
                        decor[1] + base.g() as f32 / 255.0 * (1.0 - decor[3]),
                        decor[2] + base.b() as f32 / 255.0 * (1.0 - decor[3]),
                    ];
                    let rgb = [
                        src[0] + base[0] * (1.0 - src[3]),
                        src[1] + base[1] * (1.0 - src[3]),
                        src[2] + base[2] * (1.0 - src[3]),
                    ];
                    (rgb, 1.0)
                }
                _ if src[3] > 0.0 => ([src[0] / src[3], src[1] / src[3], src[2] / src[3]], src[3]),
                _ => ([0.0; 3], 0.0),
            };

            let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            *pixel = Rgba([q(rgb[0]), q(rgb[1]), q(rgb[2]), q(alpha)]);
        }

        out
    }
}

impl Surface for FrameRenderer {
    fn clear(&mut self) {
        self.layer.fill([0.0; 4]);
    }

    fn fill_glow(&mut self, center: Pos2, radius: f32, gradient: &RadialGradient, alpha: f32) {
        if radius <= 0.0 || alpha <= 0.0 {
            return;
        }

        let min_x = (center.x - radius).floor() as i32;
        let max_x = (center.x + radius).ceil() as i32;
        let min_y = (center.y - radius).floor() as i32;
        let max_y = (center.y + radius).ceil() as i32;

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 + 0.5 - center.x;
                let dy = py as f32 + 0.5 - center.y;
                let t = (dx * dx + dy * dy).sqrt() / radius;
                if t > 1.0 {
                    continue;
                }
                let [r, g, b, a] = gradient.sample(t);
                self.blend(px, py, [r, g, b], a * alpha);
            }
        }
    }

    fn stroke_line(&mut self, from: Pos2, to: Pos2, color: Color32, width: f32, alpha: f32) {
        if alpha <= 0.0 {
            return;
        }
        let rgb = [
            color.r() as f32 / 255.0,
            color.g() as f32 / 255.0,
            color.b() as f32 / 255.0,
        ];
        let half = ((width - 1.0) * 0.5).round().max(0.0) as i32;

        for (x, y) in BresenhamLineIter::new((from.x, from.y), (to.x, to.y)) {
            for oy in -half..=half {
                for ox in -half..=half {
                    self.blend(x + ox, y + oy, rgb, alpha);
                }
            }
        }
    }
}

/// Fill every triangle of `mesh` into a premultiplied float buffer, blending
/// source-over. Pixels are sampled at their centers; colors interpolate
/// barycentrically. A center exactly on an edge shared by two triangles is
/// claimed by only one of them.
fn rasterize_mesh(buffer: &mut [[f32; 4]], width: u32, height: u32, mesh: &Mesh) {
    let to_rgba = |c: Color32| {
        let [r, g, b, a] = c.to_array();
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0]
    };
    let cross = |u: Vec2, v: Vec2| u.x * v.y - u.y * v.x;
    // Opposite directions of one edge never both own it
    let owns_ties = |d: Vec2| d.y > 0.0 || (d.y == 0.0 && d.x < 0.0);

    for tri in mesh.indices.chunks_exact(3) {
        let mut corners = [tri[0], tri[1], tri[2]].map(|i| {
            let vertex = &mesh.vertices[i as usize];
            (vertex.pos, to_rgba(vertex.color))
        });

        let area = cross(corners[1].0 - corners[0].0, corners[2].0 - corners[0].0);
        if area.abs() <= f32::EPSILON {
            continue;
        }
        if area < 0.0 {
            corners.swap(1, 2);
        }
        let area = area.abs();
        let [(pa, ca), (pb, cb), (pc, cc)] = corners;

        let min_x = pa.x.min(pb.x).min(pc.x).floor().max(0.0) as u32;
        let min_y = pa.y.min(pb.y).min(pc.y).floor().max(0.0) as u32;
        let max_x = (pa.x.max(pb.x).max(pc.x).ceil().max(0.0) as u32).min(width);
        let max_y = (pa.y.max(pb.y).max(pc.y).ceil().max(0.0) as u32).min(height);

        // Edge opposite each corner
        let edges = [(pb, pc), (pc, pa), (pa, pb)];

        for py in min_y..max_y {
            for px in min_x..max_x {
                let p = Pos2::new(px as f32 + 0.5, py as f32 + 0.5);

                let mut w = [0.0; 3];
                let mut inside = true;
                for (k, &(from, to)) in edges.iter().enumerate() {
                    let e = cross(to - from, p - from);
                    if e < 0.0 || (e == 0.0 && !owns_ties(to - from)) {
                        inside = false;
                        break;
                    }
                    w[k] = e / area;
                }
                if !inside {
                    continue;
                }

                let dst = &mut buffer[py as usize * width as usize + px as usize];
                let mut src = [0.0; 4];
                for (k, s) in src.iter_mut().enumerate() {
                    *s = ca[k] * w[0] + cb[k] * w[1] + cc[k] * w[2];
                }
                for k in 0..4 {
                    dst[k] = src[k] + dst[k] * (1.0 - src[3]);
                }
            }
        }
    }
}

/// Headless frames are "delivered" by the snapshot loop itself.
#[derive(Default)]
struct HeadlessRequester {
    requested: u64,
}

impl FrameRequester for HeadlessRequester {
    fn request_frame(&mut self) {
        self.requested += 1;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotOptions {
    pub width: u32,
    pub height: u32,
    /// Frames simulated before the capture
    pub frames: u32,
    pub pointer: Option<Pos2>,
    pub backdrop: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 120,
            pointer: None,
            backdrop: true,
        }
    }
}

/// Run the layer headlessly and return the final composited frame.
pub fn render_snapshot(config: &AppConfig, options: &SnapshotOptions) -> anyhow::Result<FrameBuffer> {
    if options.width == 0 || options.height == 0 {
        anyhow::bail!(
            "Snapshot size must be non-zero, got {}x{}",
            options.width,
            options.height
        );
    }
    let pixels = (options.width as usize).checked_mul(options.height as usize);
    if !pixels.is_some_and(|pixels| pixels <= MAX_SNAPSHOT_PIXELS) {
        anyhow::bail!(
            "Snapshot size {}x{} exceeds the {} pixel limit",
            options.width,
            options.height,
            MAX_SNAPSHOT_PIXELS
        );
    }
    if options.frames == 0 {
        anyhow::bail!("Snapshot needs at least one frame to draw the particles");
    }

    let env = LayerEnv {
        viewport: Vec2::new(options.width as f32, options.height as f32),
        dark_mode: config.dark_mode,
        reduced_motion: config.reduced_motion,
    };
    let seed = config.seed.unwrap_or(SNAPSHOT_SEED);

    let mut requester = HeadlessRequester::default();
    let mut layer = ParticleLayer::mount(config.field.clone(), env, seed, &mut requester);
    if let Some(pointer) = options.pointer {
        layer.handle_event(LayerEvent::PointerMoved(pointer), &mut requester);
    }

    let mut renderer = FrameRenderer::new(options.width, options.height, config.field.layer_opacity);
    let mut ticks = 0;
    for _ in 0..options.frames {
        if layer.frame(1.0, Some(&mut renderer), &mut requester) {
            ticks += 1;
        }
    }
    log::debug!(
        "Snapshot ran {} ticks ({} frame requests), {} particles",
        ticks,
        requester.requested,
        layer.field().map(|f| f.len()).unwrap_or(0)
    );

    let backdrop = options.backdrop.then(|| {
        let backdrop = Backdrop::new(layer.palette(), env.viewport.x, seed);
        let time_secs = options.frames as f32 / 60.0;
        let frame = backdrop.frame(env.viewport, time_secs, config.reduced_motion);
        (backdrop, frame)
    });

    Ok(renderer.composite(backdrop.as_ref().map(|(backdrop, frame)| (backdrop, frame))))
}

/// Render a snapshot and write it as PNG.
pub fn export_snapshot(config: &AppConfig, options: &SnapshotOptions, path: &Path) -> anyhow::Result<()> {
    let frame = render_snapshot(config, options)?;
    frame
        .save(path)
        .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
    log::info!("Wrote {}x{} snapshot to {}", frame.width(), frame.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Palette;

    #[test]
    fn glow_lights_pixels_around_the_center_only() {
        let mut renderer = FrameRenderer::new(20, 20, 1.0);
        let gradient = RadialGradient::glow(&Palette::dark());

        renderer.fill_glow(Pos2::new(10.0, 10.0), 3.0, &gradient, 0.5);

        assert!((renderer.coverage(10, 10) - 0.5).abs() < 0.05);
        assert_eq!(renderer.coverage(0, 0), 0.0);
        assert_eq!(renderer.coverage(10, 15), 0.0);

        renderer.clear();
        assert_eq!(renderer.coverage(10, 10), 0.0);
    }

    #[test]
    fn glow_near_the_edge_is_clipped() {
        let mut renderer = FrameRenderer::new(8, 8, 1.0);
        let gradient = RadialGradient::glow(&Palette::light());
        renderer.fill_glow(Pos2::new(-1.0, 4.0), 3.0, &gradient, 1.0);
        renderer.fill_glow(Pos2::new(50.0, 50.0), 3.0, &gradient, 1.0);
        assert!(renderer.coverage(0, 4) > 0.0);
    }

    #[test]
    fn line_covers_its_pixels() {
        let mut renderer = FrameRenderer::new(10, 4, 1.0);
        renderer.stroke_line(
            Pos2::new(0.0, 1.0),
            Pos2::new(9.0, 1.0),
            Color32::from_rgb(0, 255, 255),
            1.0,
            0.2,
        );

        for x in 1..9 {
            assert!((renderer.coverage(x, 1) - 0.2).abs() < 1e-6);
            assert_eq!(renderer.coverage(x, 3), 0.0);
        }
    }

    #[test]
    fn composite_applies_layer_opacity() {
        let mut renderer = FrameRenderer::new(4, 4, 0.6);
        renderer.stroke_line(
            Pos2::new(0.0, 0.0),
            Pos2::new(3.0, 0.0),
            Color32::from_rgb(255, 0, 0),
            1.0,
            1.0,
        );

        let frame = renderer.composite(None);
        assert_eq!(frame.get_pixel(1, 0).0, [255, 0, 0, 153]);
        assert_eq!(frame.get_pixel(1, 2).0, [0, 0, 0, 0]);
    }

    #[test]
    fn composite_over_backdrop_is_opaque() {
        let renderer = FrameRenderer::new(6, 6, 0.6);
        let backdrop = Backdrop::new(&Palette::dark(), 1280.0, 1);
        let scene = backdrop.frame(Vec2::new(6.0, 6.0), 0.0, false);
        let frame = renderer.composite(Some((&backdrop, &scene)));
        assert!(frame.pixels().all(|p| p.0[3] == 255));
    }

    fn quad(mesh: &mut Mesh, min: Pos2, max: Pos2, color: Color32) {
        let base = mesh.vertices.len() as u32;
        for pos in [min, Pos2::new(max.x, min.y), max, Pos2::new(min.x, max.y)] {
            mesh.colored_vertex(pos, color);
        }
        mesh.add_triangle(base, base + 1, base + 2);
        mesh.add_triangle(base, base + 2, base + 3);
    }

    #[test]
    fn scenery_sits_between_gradient_and_particles() {
        let mut renderer = FrameRenderer::new(8, 4, 1.0);
        renderer.stroke_line(
            Pos2::new(6.0, 0.0),
            Pos2::new(6.0, 3.0),
            Color32::from_rgb(0, 0, 255),
            1.0,
            1.0,
        );

        let backdrop = Backdrop::new(&Palette::dark(), 1280.0, 1);
        let mut scene = BackdropFrame::default();
        quad(&mut scene.scenery, Pos2::new(4.0, 0.0), Pos2::new(8.0, 4.0), Color32::RED);

        let frame = renderer.composite(Some((&backdrop, &scene)));
        // Left half is bare gradient, right half scenery, particle line on top
        let bare = backdrop.color_at(Vec2::new(0.5 / 8.0, 1.5 / 4.0), 0.0);
        assert_eq!(frame.get_pixel(0, 1).0, [bare.r(), bare.g(), bare.b(), 255]);
        assert_eq!(frame.get_pixel(5, 1).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(6, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn rasterized_triangles_blend_their_vertex_colors() {
        let mut mesh = Mesh::default();
        quad(
            &mut mesh,
            Pos2::new(0.0, 0.0),
            Pos2::new(4.0, 4.0),
            Color32::from_rgba_unmultiplied(255, 255, 255, 128),
        );
        // Off-canvas and degenerate triangles are skipped
        quad(&mut mesh, Pos2::new(-9.0, -9.0), Pos2::new(-5.0, -5.0), Color32::WHITE);
        quad(&mut mesh, Pos2::new(1.0, 1.0), Pos2::new(1.0, 1.0), Color32::WHITE);

        let mut buffer = vec![[0.0; 4]; 16];
        rasterize_mesh(&mut buffer, 4, 4, &mesh);

        // Each pixel is covered exactly once, including the shared diagonal
        for pixel in &buffer {
            assert!((pixel[3] - 128.0 / 255.0).abs() < 0.02, "{:?}", pixel);
        }
    }

    #[test]
    fn oversized_snapshot_is_an_error() {
        for (width, height) in [(65_536, 65_536), (u32::MAX, 2), (100_000, 1_000)] {
            let options = SnapshotOptions {
                width,
                height,
                ..SnapshotOptions::default()
            };
            assert!(render_snapshot(&AppConfig::default(), &options).is_err());
        }
    }

    #[test]
    fn zero_frame_snapshot_is_an_error() {
        let options = SnapshotOptions {
            width: 32,
            height: 24,
            frames: 0,
            ..SnapshotOptions::default()
        };
        let err = render_snapshot(&AppConfig::default(), &options).unwrap_err();
        assert!(err.to_string().contains("at least one frame"));
    }

    #[test]
    fn reduced_motion_snapshot_is_empty() {
        let config = AppConfig {
            reduced_motion: true,
            ..AppConfig::default()
        };
        let options = SnapshotOptions {
            width: 64,
            height: 48,
            frames: 10,
            backdrop: false,
            ..SnapshotOptions::default()
        };

        let frame = render_snapshot(&config, &options).unwrap();
        assert!(frame.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn snapshot_draws_particles() {
        let options = SnapshotOptions {
            width: 400,
            height: 300,
            frames: 5,
            pointer: Some(Pos2::new(200.0, 150.0)),
            backdrop: false,
        };

        let frame = render_snapshot(&AppConfig::default(), &options).unwrap();
        assert_eq!(frame.dimensions(), (400, 300));
        assert!(frame.pixels().any(|p| p.0[3] > 0));
    }

    #[test]
    fn zero_sized_snapshot_is_an_error() {
        let options = SnapshotOptions {
            width: 0,
            ..SnapshotOptions::default()
        };
        assert!(render_snapshot(&AppConfig::default(), &options).is_err());
    }

    #[test]
    fn export_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.png");
        let options = SnapshotOptions {
            width: 32,
            height: 24,
            frames: 2,
            ..SnapshotOptions::default()
        };

        export_snapshot(&AppConfig::default(), &options, &path).unwrap();
        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (32, 24));
    }
}
