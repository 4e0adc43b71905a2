pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod input;
pub mod mapping;

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use config::{Config, SourceKind};
use device::{ControlClass, EventStream, FeedbackSink, Layout, NullSink, RawControl};
use engine::{Effect, Effects, Engine, KeyPhase};
use error::TransportError;
use input::{DryRunInjector, Injector, KeystrokeSender};
use mapping::{ControlId, KeyCombo, MappingTable};

const INTRO_STEP: usize = 4;
const INTRO_FRAME: Duration = Duration::from_millis(7);

/// Command-line choices that affect how the app is wired up
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Log keystrokes instead of sending them
    pub dry_run: bool,
    /// Read this joystick device regardless of `[source]`
    pub joystick: Option<PathBuf>,
}

/// Main application struct
pub struct App {
    engine: Engine,
    layout: Layout,
    events: EventStream,
    sink: Box<dyn FeedbackSink>,
    injector: Box<dyn Injector>,
    /// Keys the injector cannot produce, reported once at startup
    unsupported: BTreeSet<String>,
    intro: bool,
    #[cfg(feature = "midi")]
    _midi: Option<device::midi::MidiSurface>,
}

impl App {
    /// Validate the configuration, connect to the surface and set up injection
    pub fn new(config: &Config, options: &Options) -> Result<Self> {
        let table = Arc::new(config.table()?);
        let layout = config.layout()?;
        let (tx, events) = mpsc::unbounded_channel();

        let mut source = config.source.clone();
        if let Some(path) = &options.joystick {
            source.kind = SourceKind::Joystick;
            source.path = path.clone();
        }

        let injector: Box<dyn Injector> = if options.dry_run {
            info!("Dry run: keystrokes will only be logged");
            Box::new(DryRunInjector)
        } else {
            Box::new(KeystrokeSender::new()?)
        };

        let mut app = match source.kind {
            SourceKind::Joystick => {
                // The reader thread runs until the device goes away
                let _reader = device::joystick::spawn(
                    &source.path,
                    layout.clone(),
                    source.axis_threshold,
                    tx,
                )?;
                Self::with_parts(table, layout, events, Box::new(NullSink), injector)
            }
            #[cfg(feature = "midi")]
            SourceKind::Midi => {
                let (surface, feedback) = device::midi::MidiSurface::connect(
                    &source.device,
                    source.channel,
                    layout.clone(),
                    tx,
                )?;
                let sink: Box<dyn FeedbackSink> = match feedback {
                    Some(feedback) => Box::new(feedback),
                    None => Box::new(NullSink),
                };
                let mut app = Self::with_parts(table, layout, events, sink, injector);
                app.intro = source.intro;
                app._midi = Some(surface);
                app
            }
            #[cfg(not(feature = "midi"))]
            SourceKind::Midi => {
                anyhow::bail!(
                    "this build has no MIDI support; rebuild with `--features midi` \
                     or use a joystick source"
                );
            }
        };

        if options.dry_run {
            app.intro = false;
        }
        Ok(app)
    }

    /// Assemble an app from already-connected parts
    pub fn with_parts(
        table: Arc<MappingTable>,
        layout: Layout,
        events: EventStream,
        sink: Box<dyn FeedbackSink>,
        injector: Box<dyn Injector>,
    ) -> Self {
        let unsupported: BTreeSet<String> = table
            .keys()
            .into_iter()
            .filter(|(_, key)| !injector.supports(key))
            .map(|(name, _)| name)
            .collect();
        for name in &unsupported {
            error!(
                "Key '{}' cannot be injected on this system; bindings using it are skipped",
                name
            );
        }

        Self {
            engine: Engine::new(table),
            layout,
            events,
            sink,
            injector,
            unsupported,
            intro: false,
            #[cfg(feature = "midi")]
            _midi: None,
        }
    }

    /// Play the intro animation when connecting
    pub fn set_intro(&mut self, intro: bool) {
        self.intro = intro;
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run the main application loop until shutdown or until the surface goes away
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if self.intro {
            self.play_intro().await;
        } else {
            let effects = self.engine.refresh();
            self.write_feedback(&effects);
        }

        info!("Running - keystrokes will be sent to focused window");

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            // Shutdown is only observed between events, never halfway through one
            let next = tokio::select! {
                next = self.events.recv() => next,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    continue;
                }
            };

            match next {
                Some(Ok(event)) => {
                    debug!("{:?}", event);
                    let effects = self.engine.handle(&event);
                    self.apply(effects).await;
                }
                Some(Err(e)) => {
                    error!("{}", e);
                    return Err(e.into());
                }
                None => return Err(TransportError::Closed.into()),
            }
        }
    }

    /// Apply effects in order
    async fn apply(&mut self, effects: Effects) {
        for effect in effects {
            match effect {
                Effect::Key { combo, phase } => self.inject(&combo, phase),
                Effect::Pause(duration) => tokio::time::sleep(duration).await,
                Effect::RunCommand(argv) => run_command(&argv),
                Effect::Intro => self.play_intro().await,
                Effect::SetValue { .. } | Effect::Feedback { .. } => {
                    self.write_feedback(std::slice::from_ref(&effect))
                }
            }
        }
    }

    fn inject(&mut self, combo: &KeyCombo, phase: KeyPhase) {
        if combo
            .keys()
            .iter()
            .any(|key| self.unsupported.contains(key.name()))
        {
            debug!("Skipping {}: not supported by the injector", combo);
            return;
        }

        let result = match phase {
            KeyPhase::Click => self.injector.click(combo),
            KeyPhase::Press => self.injector.press(combo),
            KeyPhase::Release => self.injector.release(combo),
        };
        if let Err(e) = result {
            warn!("{}", e);
        }
    }

    /// Write LED and knob effects to the surface; failures are not fatal
    fn write_feedback(&mut self, effects: &[Effect]) {
        for effect in effects {
            let result = match effect {
                Effect::SetValue { control, value } => self.sink.set_value(control, *value),
                Effect::Feedback { led, on } => self.sink.set_feedback(led, *on),
                _ => Ok(()),
            };
            if let Err(e) = result {
                warn!("Feedback failed: {}", e);
            }
        }
    }

    /// Knobs and lights of the surface that the mapping uses
    fn intro_targets(&self) -> (Vec<ControlId>, Vec<ControlId>) {
        let mut knobs = Vec::new();
        let mut lights = Vec::new();
        for control in self.engine.table().controls() {
            match self.layout.raw_for(control) {
                Some(raw @ RawControl::Cc(_))
                    if self.layout.resolve(raw).1 == ControlClass::AbsoluteRotary =>
                {
                    knobs.push(control.clone())
                }
                Some(RawControl::Note(_)) => lights.push(control.clone()),
                _ => {}
            }
        }
        (knobs, lights)
    }

    /// Sweep every knob up and down while a light chases across the buttons,
    /// then centre the knobs and restore the mode's LEDs
    async fn play_intro(&mut self) {
        let (knobs, lights) = self.intro_targets();
        info!("Playing intro animation...");

        let sweep = (0..127)
            .step_by(INTRO_STEP)
            .chain((1..=128).rev().step_by(INTRO_STEP));
        let mut lit: Option<usize> = None;

        for value in sweep {
            let position = value.min(127) as u8;
            for knob in &knobs {
                if let Err(e) = self.sink.set_value(knob, position) {
                    debug!("Intro: {}", e);
                }
            }

            if !lights.is_empty() && value % 16 == 0 {
                let next = (value / 16) % lights.len();
                if let Some(prev) = lit.replace(next) {
                    self.intro_light(&lights[prev], false);
                }
                self.intro_light(&lights[next], true);
            }

            tokio::time::sleep(INTRO_FRAME).await;
        }

        if let Some(prev) = lit {
            self.intro_light(&lights[prev], false);
        }

        let mut effects = self.engine.recenter(&knobs);
        effects.extend(self.engine.refresh());
        self.write_feedback(&effects);
        info!("Intro animation complete");
    }

    fn intro_light(&mut self, led: &ControlId, on: bool) {
        if let Err(e) = self.sink.set_feedback(led, on) {
            debug!("Intro: {}", e);
        }
    }

    /// Turn off every LED the mapping lit
    pub fn shutdown(&mut self) {
        info!("Shutting down surface-keys...");
        let leds: Vec<ControlId> = self.engine.table().feedback_leds().iter().cloned().collect();
        for led in &leds {
            if let Err(e) = self.sink.set_feedback(led, false) {
                debug!("Failed to clear LED {}: {}", led, e);
            }
        }
        info!("Shutdown complete");
    }
}

/// Start an external program without waiting for it
fn run_command(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    match tokio::process::Command::new(program).args(args).spawn() {
        Ok(child) => debug!("Started '{}' (pid {:?})", program, child.id()),
        Err(e) => warn!("Command '{}' failed: {}", program, e),
    }
}
