//! Backdrop behind the particle layer
//!
//! A six-stop diagonal gradient, four viewports long, that slides back and
//! forth so only a quarter of it is visible at any time. On top of it sits
//! the scenery: floating orbs, slowly spinning shapes and drifting streaks,
//! all placed from a seed so a snapshot is reproducible.

use crate::config::Palette;
use crate::surface::push_disc;
use egui::emath::Rot2;
use egui::{Color32, Mesh, Painter, Pos2, Rect, Shape, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_4, PI, TAU};

/// Seconds for one back-and-forth sweep
pub const SWEEP_SECS: f32 = 15.0;
/// Slower sweep on narrow (mobile-sized) viewports
pub const NARROW_SWEEP_SECS: f32 = 20.0;
pub const NARROW_VIEWPORT: f32 = 768.0;
pub const WIDE_VIEWPORT: f32 = 1200.0;

pub const MAX_ORBS: usize = 35;
pub const SHAPE_COUNT: usize = 8;
pub const STREAK_COUNT: usize = 12;

/// Grid resolution of the painted mesh
const MESH_CELLS: usize = 12;

const SHAPE_OPACITY: f32 = 0.1;
/// Peak scale change of the three spin variants
const SHAPE_PULSE: [f32; 3] = [0.2, 0.3, 0.5];

/// Orb wander in pixels, and peak scale change
const ORB_DRIFT: f32 = 30.0;
const ORB_PULSE: f32 = 0.15;

/// (vertical travel px, extra rotation rad, opacity low, opacity high) of the
/// four streak drift variants
const STREAK_DRIFT: [(f32, f32, f32, f32); 4] = [
    (-100.0, PI, 0.3, 0.8),
    (80.0, -PI, 0.2, 0.6),
    (-60.0, PI / 2.0, 0.4, 0.9),
    (120.0, -PI / 2.0, 0.1, 0.7),
];

/// Floating orbs shown at a viewport width: fewer on small screens.
pub fn orb_count(viewport_width: f32) -> usize {
    if viewport_width < NARROW_VIEWPORT {
        15
    } else if viewport_width < WIDE_VIEWPORT {
        25
    } else {
        MAX_ORBS
    }
}

/// Per-frame backdrop state shared by the egui and raster paths
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackdropFrame {
    /// Gradient sweep position, see [`Backdrop::phase`]
    pub phase: f32,
    /// Scenery in viewport coordinates (origin at the top-left corner)
    pub scenery: Mesh,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Backdrop {
    stops: [Color32; 6],
    accents: [Color32; 6],
    orb_alpha: f32,
    streak_alpha: f32,
    sweep_secs: f32,
    orbs: usize,
    /// Top-left corners as fractions of the viewport
    orb_anchors: Vec<Vec2>,
    shape_anchors: Vec<Vec2>,
    streak_anchors: Vec<Vec2>,
}

impl Backdrop {
    pub fn new(palette: &Palette, viewport_width: f32, seed: u64) -> Self {
        let sweep_secs = if viewport_width < NARROW_VIEWPORT {
            NARROW_SWEEP_SECS
        } else {
            SWEEP_SECS
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let mut anchors = |count: usize| -> Vec<Vec2> {
            (0..count)
                .map(|_| Vec2::new(rng.gen::<f32>(), rng.gen::<f32>()))
                .collect()
        };

        Self {
            stops: palette.backdrop,
            accents: palette.accents,
            orb_alpha: palette.orb_alpha,
            streak_alpha: palette.streak_alpha,
            sweep_secs,
            orbs: orb_count(viewport_width),
            orb_anchors: anchors(MAX_ORBS),
            shape_anchors: anchors(SHAPE_COUNT),
            streak_anchors: anchors(STREAK_COUNT),
        }
    }

    pub fn sweep_secs(&self) -> f32 {
        self.sweep_secs
    }

    pub fn orbs(&self) -> usize {
        self.orbs
    }

    /// Sweep position in 0..=1, eased in and out at both ends. Frozen at 0
    /// under reduced motion.
    pub fn phase(&self, time_secs: f32, reduced_motion: bool) -> f32 {
        if reduced_motion || self.sweep_secs <= 0.0 {
            return 0.0;
        }
        let cycle = (time_secs / self.sweep_secs).rem_euclid(1.0);
        let tri = if cycle < 0.5 { cycle * 2.0 } else { 2.0 - cycle * 2.0 };
        tri * tri * (3.0 - 2.0 * tri)
    }

    /// Color at `uv` (0..1 across the viewport). The gradient runs from the
    /// bottom-right corner toward the top-left.
    pub fn color_at(&self, uv: Vec2, phase: f32) -> Color32 {
        let along = 1.0 - (uv.x + uv.y) * 0.5;
        let s = ((along + phase * 3.0) / 4.0).clamp(0.0, 1.0);

        let scaled = s * (self.stops.len() - 1) as f32;
        let i = (scaled.floor() as usize).min(self.stops.len() - 2);
        let k = scaled - i as f32;
        lerp_color(self.stops[i], self.stops[i + 1], k)
    }

    /// Everything that moves at `time_secs` for a viewport of `size`.
    ///
    /// Reduced motion hides the orbs and holds shapes and streaks at their
    /// starting pose.
    pub fn frame(&self, size: Vec2, time_secs: f32, reduced_motion: bool) -> BackdropFrame {
        let time = if reduced_motion { 0.0 } else { time_secs };
        let mut scenery = Mesh::default();

        if !reduced_motion {
            for i in 0..self.orbs {
                self.push_orb(&mut scenery, i, size, time);
            }
        }
        for i in 0..SHAPE_COUNT {
            self.push_shape(&mut scenery, i, size, time);
        }
        for i in 0..STREAK_COUNT {
            self.push_streak(&mut scenery, i, size, time);
        }

        BackdropFrame {
            phase: self.phase(time_secs, reduced_motion),
            scenery,
        }
    }

    /// Radial glow, 100 px wide plus 50 px per index, wandering on a loop of
    /// 8 s plus 2 s per index.
    fn push_orb(&self, mesh: &mut Mesh, i: usize, size: Vec2, time: f32) {
        let diameter = 100.0 + 50.0 * i as f32;
        let cycle = time / (8.0 + 2.0 * i as f32) * TAU;
        let seed_angle = i as f32;

        let wander = Vec2::new(
            (cycle + seed_angle).sin() - seed_angle.sin(),
            (2.0 * cycle + seed_angle).cos() - seed_angle.cos(),
        ) * ORB_DRIFT;
        let scale = 1.0 + ORB_PULSE * cycle.sin();

        let corner = (self.orb_anchors[i] * size).to_pos2();
        let center = corner + Vec2::splat(diameter * 0.5) + wander;

        // The gradient reaches transparent at the corner of the orb's box,
        // so the visible rim keeps a little color
        let color = self.accents[i % self.accents.len()];
        let orb_alpha = self.orb_alpha;
        push_disc(mesh, center, diameter * 0.5 * scale, 1, |offset| {
            let t = offset.length() * FRAC_1_SQRT_2;
            tint(color, orb_alpha * (1.0 - t))
        });
    }

    /// Small square or disc with a corner-to-corner fade, spinning once every
    /// 10 s plus 1 s per index.
    fn push_shape(&self, mesh: &mut Mesh, i: usize, size: Vec2, time: f32) {
        let side = 20.0 + 10.0 * i as f32;
        let cycle = (time / (10.0 + i as f32)).rem_euclid(1.0);
        let base_angle = if i % 2 == 0 { FRAC_PI_4 } else { 0.0 };
        let rot = Rot2::from_angle(base_angle + cycle * TAU);
        let scale = 1.0 + SHAPE_PULSE[i % 3] * (cycle * PI).sin();
        let half = side * 0.5 * scale;

        let corner = (self.shape_anchors[i] * size).to_pos2();
        let center = corner + Vec2::splat(side * 0.5);
        let color = self.accents[i % 4];

        // Local unit square: bottom-left solid, top-right transparent
        let shade = |local: Vec2| {
            let t = ((local.x - local.y) * 0.5 + 1.0) * 0.5;
            tint(color, SHAPE_OPACITY * (1.0 - t))
        };

        if i % 3 == 0 {
            // The outline is round, so only the fade needs rotating
            push_disc(mesh, center, half, 1, |offset| shade(rot.inverse() * offset));
        } else {
            let corners = [
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(-1.0, 1.0),
            ];
            push_quad(mesh, corners.map(|c| (center + rot * (c * half), shade(c))));
        }
    }

    /// One-pixel streak fading downward, drifting on a loop of 15 s plus
    /// 2 s per index.
    fn push_streak(&self, mesh: &mut Mesh, i: usize, size: Vec2, time: f32) {
        let length = 50.0 + 20.0 * i as f32;
        let (travel, turn, low, high) = STREAK_DRIFT[i % STREAK_DRIFT.len()];
        let ease = 0.5 - 0.5 * (time / (15.0 + 2.0 * i as f32) * TAU).cos();

        let rot = Rot2::from_angle((i as f32 * 30.0).to_radians() + turn * ease);
        let corner = (self.streak_anchors[i] * size).to_pos2();
        let center = corner + Vec2::new(0.5, length * 0.5) + Vec2::new(0.0, travel * ease);

        let alpha = self.streak_alpha * (low + (high - low) * ease);
        let color = self.accents[i % 3];
        let head = tint(color, alpha);
        let tail = tint(color, 0.0);

        let half = Vec2::new(0.5, length * 0.5);
        push_quad(
            mesh,
            [
                (center + rot * Vec2::new(-half.x, -half.y), head),
                (center + rot * Vec2::new(half.x, -half.y), head),
                (center + rot * Vec2::new(half.x, half.y), tail),
                (center + rot * Vec2::new(-half.x, half.y), tail),
            ],
        );
    }

    /// Paint the gradient and the frame's scenery into `rect`.
    pub fn paint(&self, painter: &Painter, rect: Rect, frame: &BackdropFrame) {
        let mut mesh = Mesh::default();
        let n = MESH_CELLS;

        for row in 0..=n {
            for col in 0..=n {
                let uv = Vec2::new(col as f32 / n as f32, row as f32 / n as f32);
                let pos = Pos2::new(
                    rect.left() + uv.x * rect.width(),
                    rect.top() + uv.y * rect.height(),
                );
                mesh.colored_vertex(pos, self.color_at(uv, frame.phase));
            }
        }

        let stride = (n + 1) as u32;
        for row in 0..n as u32 {
            for col in 0..n as u32 {
                let top_left = row * stride + col;
                let bottom_left = top_left + stride;
                mesh.add_triangle(top_left, top_left + 1, bottom_left);
                mesh.add_triangle(top_left + 1, bottom_left + 1, bottom_left);
            }
        }

        painter.add(Shape::mesh(mesh));

        if !frame.scenery.is_empty() {
            let mut scenery = frame.scenery.clone();
            scenery.translate(rect.min.to_vec2());
            painter.add(Shape::mesh(scenery));
        }
    }
}

/// Quad from four corners in winding order
fn push_quad(mesh: &mut Mesh, corners: [(Pos2, Color32); 4]) {
    let base = mesh.vertices.len() as u32;
    for (pos, color) in corners {
        mesh.colored_vertex(pos, color);
    }
    mesh.add_triangle(base, base + 1, base + 2);
    mesh.add_triangle(base, base + 2, base + 3);
}

fn tint(color: Color32, alpha: f32) -> Color32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), a)
}

fn lerp_color(a: Color32, b: Color32, k: f32) -> Color32 {
    let k = k.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * k).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}
