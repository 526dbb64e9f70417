//! Mounted particle layer
//!
//! Ties the field to its host: viewport and pointer signals come in as
//! `LayerEvent`s, frames are paced by `FrameLoop`, and the theme and
//! reduced-motion preferences decide whether a field exists at all.

use crate::config::{FieldConfig, Palette, Theme};
use crate::particles::ParticleField;
use crate::scheduler::{FrameLoop, FrameRequester};
use crate::surface::Surface;
use egui::{Pos2, Vec2};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Host signals at mount time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerEnv {
    pub viewport: Vec2,
    pub dark_mode: bool,
    pub reduced_motion: bool,
}

/// Input streams the layer listens to while a field is live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Resize,
    PointerMove,
    TouchMove,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerEvent {
    Resize(Vec2),
    PointerMoved(Pos2),
    /// Active touch points; only the first one steers the field
    TouchMoved(Vec<Pos2>),
    ThemeChanged { dark_mode: bool },
    ReducedMotionChanged(bool),
}

#[derive(Debug, Default)]
pub struct Subscriptions {
    kinds: Vec<EventKind>,
}

impl Subscriptions {
    pub fn subscribe(&mut self, kind: EventKind) {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

pub struct ParticleLayer {
    config: FieldConfig,
    env: LayerEnv,
    palette: Palette,
    field: Option<ParticleField>,
    /// Survives field rebuilds, like the host's pointer does
    pointer: Vec2,
    frame_loop: FrameLoop,
    subscriptions: Subscriptions,
    rng: StdRng,
    mounted: bool,
}

impl ParticleLayer {
    /// Mount the layer. Under reduced motion nothing is spawned, nothing is
    /// subscribed and no frame is ever requested.
    pub fn mount(
        config: FieldConfig,
        env: LayerEnv,
        seed: u64,
        requester: &mut impl FrameRequester,
    ) -> Self {
        let mut layer = Self {
            config,
            env,
            palette: Palette::for_theme(Theme::from_dark_mode(env.dark_mode)),
            field: None,
            pointer: Vec2::ZERO,
            frame_loop: FrameLoop::new(),
            subscriptions: Subscriptions::default(),
            rng: StdRng::seed_from_u64(seed),
            mounted: true,
        };
        layer.attach(requester);
        layer
    }

    fn attach(&mut self, requester: &mut impl FrameRequester) {
        if self.env.reduced_motion {
            log::info!("Reduced motion preferred, particle layer stays hidden");
            return;
        }

        let mut field = ParticleField::spawn(
            &self.config,
            self.env.viewport.x,
            self.env.viewport.y,
            &mut self.rng,
        );
        field.set_pointer(self.pointer);
        log::debug!(
            "Spawned {} particles for {}x{}",
            field.len(),
            self.env.viewport.x,
            self.env.viewport.y
        );
        self.field = Some(field);

        self.subscriptions.subscribe(EventKind::Resize);
        self.subscriptions.subscribe(EventKind::PointerMove);
        self.subscriptions.subscribe(EventKind::TouchMove);
        self.frame_loop.start(requester);
    }

    fn detach(&mut self) {
        if self.frame_loop.stop() {
            log::debug!("Cancelled pending particle frame");
        }
        self.subscriptions.clear();
        self.field = None;
    }

    fn rebuild(&mut self, requester: &mut impl FrameRequester) {
        self.detach();
        self.attach(requester);
    }

    pub fn handle_event(&mut self, event: LayerEvent, requester: &mut impl FrameRequester) {
        if !self.mounted {
            return;
        }

        match event {
            LayerEvent::Resize(viewport) => {
                // The host always knows its size; the field only hears about it
                // while subscribed.
                self.env.viewport = viewport;
                if self.subscriptions.is_subscribed(EventKind::Resize) {
                    if let Some(field) = self.field.as_mut() {
                        field.resize(viewport.x, viewport.y);
                    }
                }
            }
            LayerEvent::PointerMoved(pos) => {
                if self.subscriptions.is_subscribed(EventKind::PointerMove) {
                    self.set_pointer(pos);
                }
            }
            LayerEvent::TouchMoved(touches) => {
                if self.subscriptions.is_subscribed(EventKind::TouchMove) {
                    if let Some(&first) = touches.first() {
                        self.set_pointer(first);
                    }
                }
            }
            LayerEvent::ThemeChanged { dark_mode } => {
                if self.env.dark_mode == dark_mode {
                    return;
                }
                self.env.dark_mode = dark_mode;
                self.palette = Palette::for_theme(Theme::from_dark_mode(dark_mode));
                log::info!("Theme changed (dark: {}), rebuilding particle field", dark_mode);
                if !self.env.reduced_motion {
                    self.rebuild(requester);
                }
            }
            LayerEvent::ReducedMotionChanged(reduced_motion) => {
                if self.env.reduced_motion == reduced_motion {
                    return;
                }
                self.env.reduced_motion = reduced_motion;
                if reduced_motion {
                    log::info!("Reduced motion enabled, tearing down particle layer");
                    self.detach();
                } else {
                    self.attach(requester);
                }
            }
        }
    }

    fn set_pointer(&mut self, pos: Pos2) {
        self.pointer = pos.to_vec2();
        if let Some(field) = self.field.as_mut() {
            field.set_pointer(self.pointer);
        }
    }

    /// Replace the field configuration and respawn.
    pub fn reconfigure(&mut self, config: FieldConfig, requester: &mut impl FrameRequester) {
        self.config = config;
        if self.mounted && !self.env.reduced_motion {
            self.rebuild(requester);
        }
    }

    /// Respawn from a fresh seed.
    pub fn reseed(&mut self, seed: u64, requester: &mut impl FrameRequester) {
        self.rng = StdRng::seed_from_u64(seed);
        if self.mounted && !self.env.reduced_motion {
            self.rebuild(requester);
        }
    }

    /// Deliver one display frame: advance physics by `dt` (in 60 Hz frames)
    /// and draw onto `surface`, if there is one. Returns whether a tick ran.
    pub fn frame(
        &mut self,
        dt: f32,
        surface: Option<&mut dyn Surface>,
        requester: &mut impl FrameRequester,
    ) -> bool {
        let config = &self.config;
        let palette = &self.palette;
        let field = &mut self.field;

        self.frame_loop.fire(requester, || {
            if let Some(field) = field.as_mut() {
                field.update(config, dt);
                if let Some(surface) = surface {
                    field.render(surface, config, palette);
                }
            }
        })
    }

    /// Stop the loop and drop every subscription. Idempotent.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.detach();
        self.mounted = false;
        log::debug!("Particle layer unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether a field exists (mounted and motion allowed)
    pub fn is_visible(&self) -> bool {
        self.field.is_some()
    }

    pub fn field(&self) -> Option<&ParticleField> {
        self.field.as_ref()
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn env(&self) -> LayerEnv {
        self.env
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frame_loop
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }
}

impl Drop for ParticleLayer {
    fn drop(&mut self) {
        self.unmount();
    }
}
