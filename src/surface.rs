//! Drawing surfaces
//! The field renders through `Surface`, so the same frame can go to the live
//! egui painter or to the CPU raster in `offscreen_render`.

use crate::config::Palette;
use egui::{Color32, Mesh, Painter, Pos2, Shape, Stroke, Vec2};

use std::f32::consts::TAU;

/// Vertices per ring of a disc mesh
pub(crate) const DISC_SEGMENTS: u32 = 24;

/// Target the particle field draws into
pub trait Surface {
    /// Drop everything drawn so far.
    fn clear(&mut self);

    /// Filled circle shaded by `gradient` from center (0.0) to edge (1.0),
    /// with `alpha` applied on top.
    fn fill_glow(&mut self, center: Pos2, radius: f32, gradient: &RadialGradient, alpha: f32);

    fn stroke_line(&mut self, from: Pos2, to: Pos2, color: Color32, width: f32, alpha: f32);
}

// ============================================================================
// Radial gradient
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    /// Straight (unmultiplied) RGBA in 0..1
    pub rgba: [f32; 4],
}

impl GradientStop {
    fn new(offset: f32, color: Color32, alpha: f32) -> Self {
        let [r, g, b, _] = color.to_array();
        Self {
            offset,
            rgba: [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, alpha],
        }
    }
}

/// Piecewise-linear radial gradient
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGradient {
    stops: Vec<GradientStop>,
}

impl RadialGradient {
    /// Stops must be sorted by offset.
    pub fn new(stops: Vec<GradientStop>) -> Self {
        Self { stops }
    }

    /// Particle glow: primary at the center, secondary halfway, transparent at
    /// the edge.
    pub fn glow(palette: &Palette) -> Self {
        Self::new(vec![
            GradientStop::new(0.0, palette.primary, 1.0),
            GradientStop::new(0.5, palette.secondary, 1.0),
            GradientStop::new(1.0, palette.secondary, 0.0),
        ])
    }

    /// Straight RGBA at offset `t`, clamped to the first/last stop.
    pub fn sample(&self, t: f32) -> [f32; 4] {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return [0.0; 4],
        };
        if t <= first.offset {
            return first.rgba;
        }
        if t >= last.offset {
            return last.rgba;
        }

        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.offset {
                let span = (b.offset - a.offset).max(f32::EPSILON);
                let k = (t - a.offset) / span;
                let mut out = [0.0; 4];
                for (c, o) in out.iter_mut().enumerate() {
                    *o = a.rgba[c] + (b.rgba[c] - a.rgba[c]) * k;
                }
                return out;
            }
        }
        last.rgba
    }

    pub fn sample_color32(&self, t: f32, alpha: f32) -> Color32 {
        let [r, g, b, a] = self.sample(t);
        Color32::from_rgba_unmultiplied(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
            (a * alpha * 255.0).clamp(0.0, 255.0).round() as u8,
        )
    }
}

// ============================================================================
// Disc meshes
// ============================================================================

/// Append a filled disc as a center vertex plus `rings` concentric vertex
/// rings. `shade` gets each vertex's offset in unit-disc coordinates, so its
/// length runs 0 at the center to 1 at the rim. Triangles never overlap, so
/// every covered point is painted exactly once.
pub(crate) fn push_disc(
    mesh: &mut Mesh,
    center: Pos2,
    radius: f32,
    rings: u32,
    shade: impl Fn(Vec2) -> Color32,
) {
    let rings = rings.max(1);
    let n = DISC_SEGMENTS;
    let base = mesh.vertices.len() as u32;

    mesh.colored_vertex(center, shade(Vec2::ZERO));
    for ring in 1..=rings {
        let t = ring as f32 / rings as f32;
        for seg in 0..n {
            let offset = Vec2::angled(seg as f32 / n as f32 * TAU) * t;
            mesh.colored_vertex(center + offset * radius, shade(offset));
        }
    }

    for seg in 0..n {
        let next = (seg + 1) % n;
        mesh.add_triangle(base, base + 1 + seg, base + 1 + next);
    }
    for ring in 1..rings {
        let inner = base + 1 + (ring - 1) * n;
        let outer = inner + n;
        for seg in 0..n {
            let next = (seg + 1) % n;
            mesh.add_triangle(inner + seg, outer + seg, outer + next);
            mesh.add_triangle(inner + seg, outer + next, inner + next);
        }
    }
}

// ============================================================================
// egui painter surface
// ============================================================================

/// Live preview surface. Paints into an egui layer, offset by `origin`.
pub struct PainterSurface<'a> {
    painter: &'a Painter,
    origin: Pos2,
    layer_opacity: f32,
    glow_steps: u32,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a Painter, origin: Pos2, layer_opacity: f32, glow_steps: u32) -> Self {
        Self {
            painter,
            origin,
            layer_opacity,
            glow_steps: glow_steps.max(2),
        }
    }

    fn to_screen(&self, p: Pos2) -> Pos2 {
        self.origin + p.to_vec2()
    }
}

impl Surface for PainterSurface<'_> {
    fn clear(&mut self) {
        // egui rebuilds its shape list every frame; nothing to erase.
    }

    fn fill_glow(&mut self, center: Pos2, radius: f32, gradient: &RadialGradient, alpha: f32) {
        if radius <= 0.0 || alpha <= 0.0 {
            return;
        }
        let alpha = alpha * self.layer_opacity;

        // One vertex ring per gradient step; colors interpolate in between
        let mut mesh = Mesh::default();
        push_disc(&mut mesh, self.to_screen(center), radius, self.glow_steps, |offset| {
            gradient.sample_color32(offset.length(), alpha)
        });
        self.painter.add(Shape::mesh(mesh));
    }

    fn stroke_line(&mut self, from: Pos2, to: Pos2, color: Color32, width: f32, alpha: f32) {
        let color = color.gamma_multiply(alpha * self.layer_opacity);
        self.painter.line_segment(
            [self.to_screen(from), self.to_screen(to)],
            Stroke::new(width, color),
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Run one headless egui pass and return the shapes painted on the
    /// background layer.
    pub fn paint_headless(paint: impl FnOnce(&Painter)) -> Vec<Shape> {
        let ctx = egui::Context::default();
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            paint(&ctx.layer_painter(egui::LayerId::background()));
        });
        output.shapes.into_iter().map(|clipped| clipped.shape).collect()
    }

    pub fn meshes(shapes: &[Shape]) -> Vec<&Mesh> {
        shapes
            .iter()
            .filter_map(|shape| match shape {
                Shape::Mesh(mesh) => Some(mesh),
                _ => None,
            })
            .collect()
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum DrawCall {
        Clear,
        Glow {
            center: Pos2,
            radius: f32,
            alpha: f32,
        },
        Line {
            from: Pos2,
            to: Pos2,
            color: Color32,
            width: f32,
            alpha: f32,
        },
    }

    /// Records draw calls instead of producing pixels
    pub struct RecordingSurface {
        pub calls: Vec<DrawCall>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self { calls: Vec::new() }
        }
    }

    impl Surface for RecordingSurface {
        fn clear(&mut self) {
            self.calls.push(DrawCall::Clear);
        }

        fn fill_glow(&mut self, center: Pos2, radius: f32, _gradient: &RadialGradient, alpha: f32) {
            self.calls.push(DrawCall::Glow {
                center,
                radius,
                alpha,
            });
        }

        fn stroke_line(&mut self, from: Pos2, to: Pos2, color: Color32, width: f32, alpha: f32) {
            self.calls.push(DrawCall::Line {
                from,
                to,
                color,
                width,
                alpha,
            });
        }
    }

    #[test]
    fn glow_gradient_runs_primary_secondary_transparent() {
        let gradient = RadialGradient::glow(&Palette::dark());

        assert_eq!(gradient.sample(0.0), [0.0, 1.0, 1.0, 1.0]);
        assert_eq!(gradient.sample(0.5), [1.0, 0.0, 1.0, 1.0]);
        assert_eq!(gradient.sample(1.0)[3], 0.0);

        let quarter = gradient.sample(0.25);
        assert!((quarter[0] - 0.5).abs() < 1e-6);
        assert!((quarter[1] - 0.5).abs() < 1e-6);

        let three_quarters = gradient.sample(0.75);
        assert!((three_quarters[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sample_clamps_outside_the_stops() {
        let gradient = RadialGradient::glow(&Palette::light());
        assert_eq!(gradient.sample(-1.0), gradient.sample(0.0));
        assert_eq!(gradient.sample(3.0), gradient.sample(1.0));
        assert_eq!(RadialGradient::new(Vec::new()).sample(0.3), [0.0; 4]);
    }

    #[test]
    fn sample_color32_applies_alpha() {
        let gradient = RadialGradient::glow(&Palette::dark());
        assert_eq!(gradient.sample_color32(0.0, 0.0).a(), 0);
        assert_eq!(gradient.sample_color32(0.0, 1.0), Color32::from_rgb(0, 255, 255));
    }

    #[test]
    fn painter_glow_is_a_single_mesh_with_the_particle_opacity_at_its_center() {
        let gradient = RadialGradient::glow(&Palette::dark());
        let shapes = paint_headless(|painter| {
            let mut surface = PainterSurface::new(painter, Pos2::new(5.0, 7.0), 1.0, 8);
            surface.fill_glow(Pos2::new(10.0, 10.0), 3.0, &gradient, 0.3);
        });

        assert_eq!(shapes.len(), 1);
        let meshes = meshes(&shapes);
        assert_eq!(meshes.len(), 1);
        let mesh = meshes[0];

        let n = DISC_SEGMENTS as usize;
        assert_eq!(mesh.vertices.len(), 1 + 8 * n);
        assert_eq!(mesh.indices.len(), 3 * (n + 2 * n * 7));
        assert!(mesh.is_valid());

        // Offset by the surface origin; alpha 0.3 and never above it
        assert_eq!(mesh.vertices[0].pos, Pos2::new(15.0, 17.0));
        assert_eq!(mesh.vertices[0].color.a(), 77);
        assert!(mesh.vertices.iter().all(|v| v.color.a() <= 77));
        assert!(mesh.vertices[mesh.vertices.len() - 1].color.a() == 0);

        let rim = mesh.vertices[1 + 7 * n].pos;
        assert!(((rim - Pos2::new(15.0, 17.0)).length() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn painter_glow_scales_with_layer_opacity() {
        let gradient = RadialGradient::glow(&Palette::light());
        let shapes = paint_headless(|painter| {
            let mut surface = PainterSurface::new(painter, Pos2::ZERO, 0.6, 4);
            surface.fill_glow(Pos2::new(10.0, 10.0), 2.0, &gradient, 0.3);
            surface.fill_glow(Pos2::new(20.0, 10.0), 2.0, &gradient, 0.0);
            surface.fill_glow(Pos2::new(30.0, 10.0), 0.0, &gradient, 1.0);
        });

        let meshes = meshes(&shapes);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].vertices[0].color.a(), (0.3f32 * 0.6 * 255.0).round() as u8);
    }

    #[test]
    fn painter_line_fades_by_alpha_and_layer_opacity() {
        let color = Color32::from_rgb(0, 255, 255);
        let shapes = paint_headless(|painter| {
            let mut surface = PainterSurface::new(painter, Pos2::new(1.0, 2.0), 0.6, 8);
            surface.stroke_line(Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), color, 1.0, 0.5);
        });

        assert_eq!(shapes.len(), 1);
        match &shapes[0] {
            Shape::LineSegment { points, stroke } => {
                assert_eq!(*points, [Pos2::new(1.0, 2.0), Pos2::new(11.0, 2.0)]);
                assert_eq!(stroke.width, 1.0);
                assert_eq!(stroke.color, color.gamma_multiply(0.5 * 0.6));
            }
            other => panic!("expected a line segment, got {:?}", other),
        }
    }

    #[test]
    fn disc_rings_share_no_triangles() {
        let mut mesh = Mesh::default();
        push_disc(&mut mesh, Pos2::ZERO, 1.0, 3, |_| Color32::WHITE);
        push_disc(&mut mesh, Pos2::new(5.0, 0.0), 1.0, 1, |_| Color32::WHITE);

        let n = DISC_SEGMENTS as usize;
        assert_eq!(mesh.vertices.len(), (1 + 3 * n) + (1 + n));
        assert!(mesh.is_valid());

        // Total triangle area equals the inscribed polygon area of both discs
        let area: f32 = mesh
            .indices
            .chunks(3)
            .map(|tri| {
                let [a, b, c] = [0, 1, 2].map(|k| mesh.vertices[tri[k] as usize].pos);
                ((b - a).x * (c - a).y - (b - a).y * (c - a).x).abs() * 0.5
            })
            .sum();
        let polygon = 0.5 * n as f32 * (TAU / n as f32).sin();
        assert!((area - 2.0 * polygon).abs() < 1e-3);
    }
}
