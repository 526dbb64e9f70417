//! Particle field engine
//! Spawning, per-frame physics with pointer attraction, and link discovery

use crate::config::{FieldConfig, Palette};
use crate::surface::{RadialGradient, Surface};
use egui::Vec2;
use rand::Rng;

/// Individual particle data
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// Spawn radius; `radius` relaxes back to it away from the pointer
    pub base_radius: f32,
    pub opacity: f32,
}

impl Particle {
    /// Spawn a particle uniformly inside a `width` x `height` canvas.
    pub fn spawn(config: &FieldConfig, width: f32, height: f32, rng: &mut impl Rng) -> Self {
        let speed = config.max_spawn_speed;
        let base_radius = config.min_spawn_radius
            + rng.gen::<f32>() * (config.max_spawn_radius - config.min_spawn_radius);
        let opacity = config.min_spawn_opacity
            + rng.gen::<f32>() * (config.max_spawn_opacity - config.min_spawn_opacity);

        Self {
            pos: Vec2::new(rng.gen::<f32>() * width, rng.gen::<f32>() * height),
            vel: Vec2::new(
                (rng.gen::<f32>() - 0.5) * 2.0 * speed,
                (rng.gen::<f32>() - 0.5) * 2.0 * speed,
            ),
            radius: base_radius,
            base_radius,
            opacity,
        }
    }

    /// Advance one step. `dt` is in 60 Hz display frames, so `dt = 1.0` is a
    /// single frame.
    ///
    /// Bounces only flip the velocity sign; the position itself is never
    /// clamped and may sit briefly outside `bounds`.
    #[must_use]
    pub fn step(mut self, pointer: Vec2, bounds: Vec2, config: &FieldConfig, dt: f32) -> Self {
        self.pos += self.vel * dt;

        if self.pos.x < 0.0 || self.pos.x > bounds.x {
            self.vel.x = -self.vel.x;
        }
        if self.pos.y < 0.0 || self.pos.y > bounds.y {
            self.vel.y = -self.vel.y;
        }

        let delta = pointer - self.pos;
        let distance = delta.length();

        if distance < config.pointer_radius {
            let force = (config.pointer_radius - distance) / config.pointer_radius;
            self.radius = self.base_radius + force * config.radius_boost;
            self.opacity = (self.opacity + force * config.opacity_boost).min(1.0);
            self.vel += delta * config.attraction * force * dt;
        } else {
            self.radius = self.base_radius;
            self.opacity = (self.opacity - config.opacity_decay * dt).max(config.min_opacity);
        }

        self.vel *= config.damping.powf(dt);
        self
    }
}

/// Faded line between two nearby particles
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub particle_a: usize,
    pub particle_b: usize,
    pub alpha: f32,
}

/// The particle set for one canvas, plus the last known pointer position
pub struct ParticleField {
    particles: Vec<Particle>,
    pub width: f32,
    pub height: f32,
    pointer: Vec2,
}

impl ParticleField {
    /// Build a field sized to the canvas, with the count derived from `width`.
    pub fn spawn(config: &FieldConfig, width: f32, height: f32, rng: &mut impl Rng) -> Self {
        let count = config.particle_count(width);
        let particles = (0..count)
            .map(|_| Particle::spawn(config, width, height, rng))
            .collect();

        Self {
            particles,
            width,
            height,
            pointer: Vec2::ZERO,
        }
    }

    #[cfg(test)]
    pub fn from_particles(particles: Vec<Particle>, width: f32, height: f32) -> Self {
        Self {
            particles,
            width,
            height,
            pointer: Vec2::ZERO,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Change the canvas size in place; particles are kept and bounce
    /// against the new bounds from the next step on.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    pub fn set_pointer(&mut self, pointer: Vec2) {
        self.pointer = pointer;
    }

    pub fn update(&mut self, config: &FieldConfig, dt: f32) {
        let pointer = self.pointer;
        let bounds = self.bounds();
        for p in &mut self.particles {
            *p = p.step(pointer, bounds, config, dt);
        }
    }

    /// Every unordered pair closer than the link distance. O(n²), which is
    /// fine for the capped particle count.
    pub fn find_links(&self, config: &FieldConfig) -> Vec<Link> {
        let mut links = Vec::new();

        for (i, a) in self.particles.iter().enumerate() {
            for (offset, b) in self.particles[i + 1..].iter().enumerate() {
                let distance = (a.pos - b.pos).length();
                if distance < config.link_distance {
                    links.push(Link {
                        particle_a: i,
                        particle_b: i + 1 + offset,
                        alpha: config.link_alpha(distance),
                    });
                }
            }
        }

        links
    }

    /// Clear the surface, draw every particle as a glowing dot, then the links.
    pub fn render(&self, surface: &mut dyn Surface, config: &FieldConfig, palette: &Palette) {
        surface.clear();

        let gradient = RadialGradient::glow(palette);
        for p in &self.particles {
            surface.fill_glow(p.pos.to_pos2(), p.radius, &gradient, p.opacity);
        }

        for link in self.find_links(config) {
            let a = self.particles[link.particle_a].pos.to_pos2();
            let b = self.particles[link.particle_b].pos.to_pos2();
            surface.stroke_line(a, b, palette.primary, config.link_width, link.alpha);
        }
    }
}
