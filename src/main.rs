//! Particle Field - preview window and headless snapshots
//!
//! Without arguments this opens an egui window with the field painted on the
//! background layer. `--snapshot out.png` renders headlessly instead.

use anyhow::Context;
use eframe::egui;
use particle_field::backdrop::Backdrop;
use particle_field::offscreen_render::{export_snapshot, SnapshotOptions};
use particle_field::surface::PainterSurface;
use particle_field::{AppConfig, LayerEnv, LayerEvent, ParticleLayer};
use std::path::PathBuf;
use std::time::Instant;

const INITIAL_SIZE: [f32; 2] = [1280.0, 800.0];

/// Upper bound on one step, in 60 Hz frames, after a stall
const MAX_FRAME_STEP: f32 = 4.0;

/// Main application state
struct ParticleFieldApp {
    config: AppConfig,
    layer: ParticleLayer,
    backdrop: Backdrop,
    /// Places the backdrop scenery; kept across rebuilds so it does not jump
    scenery_seed: u64,
    started: Instant,
    last_update: Instant,
    viewport: egui::Vec2,
    show_settings: bool,
}

impl ParticleFieldApp {
    fn new(cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        cc.egui_ctx.set_visuals(visuals_for(config.dark_mode));

        let viewport = egui::Vec2::from(INITIAL_SIZE);
        let env = LayerEnv {
            viewport,
            dark_mode: config.dark_mode,
            reduced_motion: config.reduced_motion,
        };
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut requester = cc.egui_ctx.clone();
        let layer = ParticleLayer::mount(config.field.clone(), env, seed, &mut requester);
        let backdrop = Backdrop::new(layer.palette(), viewport.x, seed);

        log::info!("Particle layer mounted (seed {})", seed);

        Self {
            config,
            layer,
            backdrop,
            scenery_seed: seed,
            started: Instant::now(),
            last_update: Instant::now(),
            viewport,
            show_settings: true,
        }
    }

    /// Forward window-size and pointer/touch input to the layer.
    fn forward_input(&mut self, ctx: &egui::Context) {
        let mut requester = ctx.clone();

        let screen = ctx.screen_rect().size();
        if screen != self.viewport {
            log::debug!("Viewport resized to {}x{}", screen.x, screen.y);
            self.viewport = screen;
            self.backdrop = Backdrop::new(self.layer.palette(), screen.x, self.scenery_seed);
            self.layer.handle_event(LayerEvent::Resize(screen), &mut requester);
        }

        let events = ctx.input(|i| i.events.clone());
        let mut touches = Vec::new();
        for event in events {
            match event {
                egui::Event::PointerMoved(pos) => {
                    self.layer.handle_event(LayerEvent::PointerMoved(pos), &mut requester);
                }
                egui::Event::Touch {
                    phase: egui::TouchPhase::Move,
                    pos,
                    ..
                } => touches.push(pos),
                _ => {}
            }
        }
        if !touches.is_empty() {
            self.layer.handle_event(LayerEvent::TouchMoved(touches), &mut requester);
        }
    }

    fn set_dark_mode(&mut self, ctx: &egui::Context, dark_mode: bool) {
        self.config.dark_mode = dark_mode;
        ctx.set_visuals(visuals_for(dark_mode));
        let mut requester = ctx.clone();
        self.layer.handle_event(LayerEvent::ThemeChanged { dark_mode }, &mut requester);
        self.backdrop = Backdrop::new(self.layer.palette(), self.viewport.x, self.scenery_seed);
    }

    fn set_reduced_motion(&mut self, ctx: &egui::Context, reduced_motion: bool) {
        self.config.reduced_motion = reduced_motion;
        let mut requester = ctx.clone();
        self.layer
            .handle_event(LayerEvent::ReducedMotionChanged(reduced_motion), &mut requester);
        ctx.request_repaint();
    }

    fn apply_config(&mut self, ctx: &egui::Context, config: AppConfig) {
        let mut requester = ctx.clone();
        self.layer.reconfigure(config.field.clone(), &mut requester);
        if let Some(seed) = config.seed {
            self.layer.reseed(seed, &mut requester);
        }
        self.set_dark_mode(ctx, config.dark_mode);
        self.set_reduced_motion(ctx, config.reduced_motion);
        self.config = config;
    }

    fn render_canvas(&mut self, ctx: &egui::Context, dt: f32) {
        let screen = ctx.screen_rect();
        // Background layer: never allocates a response, so input passes through
        let painter = ctx.layer_painter(egui::LayerId::background());

        let time_secs = self.started.elapsed().as_secs_f32();
        let frame = self
            .backdrop
            .frame(screen.size(), time_secs, self.config.reduced_motion);
        self.backdrop.paint(&painter, screen, &frame);

        let field_config = self.layer.config();
        let mut surface = PainterSurface::new(
            &painter,
            screen.min,
            field_config.layer_opacity,
            field_config.glow_steps,
        );
        let mut requester = ctx.clone();
        self.layer.frame(dt, Some(&mut surface), &mut requester);
    }

    fn render_settings_panel(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        egui::Window::new("Particle Field")
            .open(&mut open)
            .resizable(false)
            .default_pos([16.0, 16.0])
            .show(ctx, |ui| {
                let mut dark_mode = self.config.dark_mode;
                if ui.checkbox(&mut dark_mode, "Dark mode").changed() {
                    self.set_dark_mode(ctx, dark_mode);
                }

                let mut reduced_motion = self.config.reduced_motion;
                if ui.checkbox(&mut reduced_motion, "Reduce motion").changed() {
                    self.set_reduced_motion(ctx, reduced_motion);
                }

                ui.separator();

                let mut field = self.config.field.clone();
                let mut changed = false;
                changed |= ui
                    .add(egui::Slider::new(&mut field.max_particles, 0..=200).text("Max particles"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut field.link_distance, 0.0..=200.0).text("Link distance"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut field.pointer_radius, 1.0..=300.0).text("Pointer radius"))
                    .changed();
                if changed {
                    let mut requester = ctx.clone();
                    self.layer.reconfigure(field.clone(), &mut requester);
                    self.config.field = field;
                }

                if ui.button("Reseed").clicked() {
                    let seed = rand::random();
                    let mut requester = ctx.clone();
                    self.layer.reseed(seed, &mut requester);
                    log::info!("Reseeded particle field ({})", seed);
                }

                ui.separator();
                match self.layer.field() {
                    Some(field) => ui.label(format!(
                        "{} particles, {} links",
                        field.len(),
                        field.find_links(self.layer.config()).len()
                    )),
                    None => ui.label("Hidden (reduced motion)"),
                };
                ui.label(format!("Frames: {}", self.layer.frame_loop().frames()));

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save Config").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("JSON", &["json"])
                            .save_file()
                        {
                            if let Err(e) = self.config.save(&path.to_string_lossy()) {
                                log::error!("Error saving config: {}", e);
                            }
                        }
                    }

                    if ui.button("Load Config").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("JSON", &["json"])
                            .pick_file()
                        {
                            match AppConfig::load(&path.to_string_lossy()) {
                                Ok(config) => self.apply_config(ctx, config),
                                Err(e) => log::error!("Error loading config: {}", e),
                            }
                        }
                    }
                });
                ui.small("F1 toggles this window");
            });
        self.show_settings = open;
    }
}

impl eframe::App for ParticleFieldApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = (now.duration_since(self.last_update).as_secs_f32() * 60.0).clamp(0.0, MAX_FRAME_STEP);
        self.last_update = now;

        if ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            self.show_settings = !self.show_settings;
        }

        self.forward_input(ctx);

        if self.show_settings {
            self.render_settings_panel(ctx);
        }

        self.render_canvas(ctx, dt);
    }
}

fn visuals_for(dark_mode: bool) -> egui::Visuals {
    if dark_mode {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    }
}

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<String>,
    snapshot: Option<PathBuf>,
    frames: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    seed: Option<u64>,
    dark_mode: Option<bool>,
    reduced_motion: bool,
    pointer: Option<egui::Pos2>,
    no_backdrop: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .with_context(|| format!("{} expects a value", name))
            };
            match arg.as_str() {
                "--config" => parsed.config = Some(value("--config")?),
                "--snapshot" => parsed.snapshot = Some(PathBuf::from(value("--snapshot")?)),
                "--frames" => parsed.frames = Some(parse_number(&value("--frames")?, "--frames")?),
                "--width" => parsed.width = Some(parse_number(&value("--width")?, "--width")?),
                "--height" => parsed.height = Some(parse_number(&value("--height")?, "--height")?),
                "--seed" => parsed.seed = Some(parse_number(&value("--seed")?, "--seed")?),
                "--pointer" => parsed.pointer = Some(parse_pointer(&value("--pointer")?)?),
                "--light" => parsed.dark_mode = Some(false),
                "--dark" => parsed.dark_mode = Some(true),
                "--reduced-motion" => parsed.reduced_motion = true,
                "--no-backdrop" => parsed.no_backdrop = true,
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }

        Ok(parsed)
    }

    fn apply(&self, config: &mut AppConfig) {
        if let Some(dark_mode) = self.dark_mode {
            config.dark_mode = dark_mode;
        }
        if self.reduced_motion {
            config.reduced_motion = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }

    fn snapshot_options(&self) -> SnapshotOptions {
        let defaults = SnapshotOptions::default();
        SnapshotOptions {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            frames: self.frames.unwrap_or(defaults.frames),
            pointer: self.pointer,
            backdrop: !self.no_backdrop,
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} expects a number, got {:?}", name, value))
}

fn parse_pointer(value: &str) -> anyhow::Result<egui::Pos2> {
    let (x, y) = value
        .split_once(',')
        .with_context(|| format!("--pointer expects X,Y, got {:?}", value))?;
    Ok(egui::Pos2::new(
        parse_number(x.trim(), "--pointer")?,
        parse_number(y.trim(), "--pointer")?,
    ))
}

fn run_preview(config: AppConfig) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(INITIAL_SIZE)
            .with_title("Particle Field")
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Particle Field",
        options,
        Box::new(move |cc| Box::new(ParticleFieldApp::new(cc, config))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to start preview window: {}", e))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse(std::env::args().skip(1))?;
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("Failed to load config {}", path))?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);

    if let Some(path) = &args.snapshot {
        return export_snapshot(&config, &args.snapshot_options(), path);
    }

    run_preview(config)
}
