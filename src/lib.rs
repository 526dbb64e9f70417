//! Particle Field
//! Ambient, pointer-reactive particle layer with an egui preview and a
//! headless PNG renderer

pub mod backdrop;
pub mod config;
pub mod layer;
pub mod offscreen_render;
pub mod particles;
pub mod scheduler;
pub mod surface;

pub use config::{AppConfig, FieldConfig, Palette, Theme};
pub use layer::{LayerEnv, LayerEvent, ParticleLayer};
pub use particles::{Particle, ParticleField};
