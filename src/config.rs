//! Configuration for the particle field
//! Physics/render constants, theme palettes and the persisted app settings

use egui::Color32;
use serde::{Deserialize, Serialize};

// ============================================================================
// Field Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    /// Hard cap on the particle count
    pub max_particles: usize,
    /// Viewport pixels per particle when computing the count
    pub pixels_per_particle: f32,

    // Spawn ranges
    pub max_spawn_speed: f32,
    pub min_spawn_radius: f32,
    pub max_spawn_radius: f32,
    pub min_spawn_opacity: f32,
    pub max_spawn_opacity: f32,

    // Pointer interaction
    pub pointer_radius: f32,
    pub radius_boost: f32,
    pub opacity_boost: f32,
    pub attraction: f32,

    // Relaxation
    pub opacity_decay: f32,
    pub min_opacity: f32,
    pub damping: f32,

    // Links
    pub link_distance: f32,
    pub link_max_alpha: f32,
    pub link_width: f32,

    /// Opacity of the whole layer when composited over the page
    pub layer_opacity: f32,
    /// Concentric rings used to approximate the radial gradient on egui
    pub glow_steps: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            max_particles: 50,
            pixels_per_particle: 20.0,
            max_spawn_speed: 0.25,
            min_spawn_radius: 1.0,
            max_spawn_radius: 3.0,
            min_spawn_opacity: 0.2,
            max_spawn_opacity: 0.7,
            pointer_radius: 100.0,
            radius_boost: 3.0,
            opacity_boost: 0.3,
            attraction: 0.00005,
            opacity_decay: 0.01,
            min_opacity: 0.2,
            damping: 0.99,
            link_distance: 80.0,
            link_max_alpha: 0.2,
            link_width: 1.0,
            layer_opacity: 0.6,
            glow_steps: 8,
        }
    }
}

impl FieldConfig {
    /// Number of particles for a viewport of the given width.
    ///
    /// `min(max_particles, floor(width / pixels_per_particle))`, zero for
    /// degenerate widths.
    pub fn particle_count(&self, width: f32) -> usize {
        if !width.is_finite() || width <= 0.0 || self.pixels_per_particle <= 0.0 {
            return 0;
        }
        let fit = (width / self.pixels_per_particle).floor() as usize;
        fit.min(self.max_particles)
    }

    /// Link alpha for two particles `distance` apart, zero at and beyond
    /// `link_distance`.
    pub fn link_alpha(&self, distance: f32) -> f32 {
        if distance >= self.link_distance || self.link_distance <= 0.0 {
            return 0.0;
        }
        (self.link_distance - distance.max(0.0)) / self.link_distance * self.link_max_alpha
    }
}

// ============================================================================
// Palette
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }
}

/// Accent colors for particles and links
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub primary: Color32,
    pub secondary: Color32,
    /// Backdrop gradient stops along the -45° diagonal
    pub backdrop: [Color32; 6],
    /// Scenery tints: orbs cycle all six, shapes the first four, streaks the
    /// first three
    pub accents: [Color32; 6],
    /// Center alpha of a floating orb
    pub orb_alpha: f32,
    /// Head alpha of a drifting streak
    pub streak_alpha: f32,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            primary: Color32::from_rgb(0x00, 0xff, 0xff),
            secondary: Color32::from_rgb(0xff, 0x00, 0xff),
            backdrop: [
                Color32::from_rgb(0x00, 0x00, 0x00),
                Color32::from_rgb(0x0a, 0x0a, 0x0a),
                Color32::from_rgb(0x1a, 0x1a, 0x1a),
                Color32::from_rgb(0x11, 0x11, 0x11),
                Color32::from_rgb(0x05, 0x05, 0x05),
                Color32::from_rgb(0x0d, 0x0d, 0x0d),
            ],
            accents: [
                Color32::from_rgb(0x00, 0xff, 0xff),
                Color32::from_rgb(0xff, 0x00, 0xff),
                Color32::from_rgb(0xff, 0xff, 0x00),
                Color32::from_rgb(0x00, 0xff, 0x00),
                Color32::from_rgb(0xff, 0x00, 0x80),
                Color32::from_rgb(0x80, 0x00, 0xff),
            ],
            orb_alpha: 0x20 as f32 / 255.0,
            streak_alpha: 0x60 as f32 / 255.0,
        }
    }

    pub fn light() -> Self {
        Self {
            primary: Color32::from_rgb(0x3b, 0x82, 0xf6),
            secondary: Color32::from_rgb(0x8b, 0x5c, 0xf6),
            backdrop: [
                Color32::from_rgb(0xf0, 0xf9, 0xff),
                Color32::from_rgb(0xe0, 0xf2, 0xfe),
                Color32::from_rgb(0xba, 0xe6, 0xfd),
                Color32::from_rgb(0x7d, 0xd3, 0xfc),
                Color32::from_rgb(0x38, 0xbd, 0xf8),
                Color32::from_rgb(0x0e, 0xa5, 0xe9),
            ],
            accents: [
                Color32::from_rgb(0x3b, 0x82, 0xf6),
                Color32::from_rgb(0x8b, 0x5c, 0xf6),
                Color32::from_rgb(0xf5, 0x9e, 0x0b),
                Color32::from_rgb(0x10, 0xb9, 0x81),
                Color32::from_rgb(0xef, 0x44, 0x44),
                Color32::from_rgb(0x63, 0x66, 0xf1),
            ],
            orb_alpha: 0x15 as f32 / 255.0,
            streak_alpha: 0x40 as f32 / 255.0,
        }
    }

    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }
}

// ============================================================================
// Main App Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub field: FieldConfig,
    #[serde(default = "default_dark_mode")]
    pub dark_mode: bool,
    #[serde(default)]
    pub reduced_motion: bool,
    /// Fixed spawn seed; a fresh one is drawn when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_dark_mode() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            dark_mode: default_dark_mode(),
            reduced_motion: false,
            seed: None,
        }
    }
}

impl AppConfig {
    pub fn theme(&self) -> Theme {
        Theme::from_dark_mode(self.dark_mode)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_count_scales_with_width_and_caps() {
        let config = FieldConfig::default();
        assert_eq!(config.particle_count(400.0), 20);
        assert_eq!(config.particle_count(1200.0), 50);
        assert_eq!(config.particle_count(19.0), 0);
        assert_eq!(config.particle_count(0.0), 0);
        assert_eq!(config.particle_count(-300.0), 0);
        assert_eq!(config.particle_count(f32::NAN), 0);
    }

    #[test]
    fn link_alpha_fades_to_zero_at_threshold() {
        let config = FieldConfig::default();
        assert_eq!(config.link_alpha(80.0), 0.0);
        assert_eq!(config.link_alpha(120.0), 0.0);
        assert!((config.link_alpha(0.0) - 0.2).abs() < 1e-6);
        assert!((config.link_alpha(40.0) - 0.1).abs() < 1e-6);

        let mut previous = config.link_alpha(0.0);
        for step in 1..=80 {
            let alpha = config.link_alpha(step as f32);
            assert!(alpha <= previous);
            previous = alpha;
        }
    }

    #[test]
    fn palettes_follow_theme() {
        assert_eq!(Palette::for_theme(Theme::Dark).primary, Color32::from_rgb(0, 255, 255));
        assert_eq!(
            Palette::for_theme(Theme::Light).secondary,
            Color32::from_rgb(0x8b, 0x5c, 0xf6)
        );
        assert!(Theme::from_dark_mode(true).is_dark());
        assert!(!Theme::from_dark_mode(false).is_dark());
    }

    #[test]
    fn config_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.json");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.dark_mode = false;
        config.seed = Some(42);
        config.field.max_particles = 12;
        config.save(path).unwrap();

        assert_eq!(AppConfig::load(path).unwrap(), config);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "field": { "damping": 0.5 } }"#).unwrap();
        assert!(config.dark_mode);
        assert!(!config.reduced_motion);
        assert_eq!(config.field.damping, 0.5);
        assert_eq!(config.field.max_particles, 50);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(AppConfig::load(path.to_str().unwrap()).is_err());
    }
}
