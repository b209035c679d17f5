//! Radio player controller
//!
//! `RadioPlayer` owns one playback session: the media element, the lazily
//! built audio graph, the equalizer model, the reconnection timer and the
//! optional spectrum renderer. Every public action snapshots the session,
//! mutates it, and publishes whatever notifications the change implies.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, AudioGraph, ContextState, EqBand, Equalizer};
use crate::config::audio::DEFAULT_VOLUME;
use crate::config::PlayerConfig;
use crate::error::{MediaError, PlayerError, Result};
use crate::media::{MediaElement, MediaEvent};
use crate::visual::spectrum::{FrequencySource, SpectrumFrame, SpectrumRenderer};

use super::reconnect::ReconnectPolicy;
use super::state::{EventBus, PlaybackSession, PlayerEvent, SessionPhase};

/// Default renderer canvas height, in the front-end's units
const DEFAULT_CANVAS_HEIGHT: f32 = 100.0;

/// Where the processing graph is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    /// Not built yet; built on first play
    Absent,
    Ready,
    /// Building failed; playback continues without EQ and visualizer
    Degraded,
    Closed,
}

enum GraphSlot {
    Absent,
    Ready(AudioGraph),
    Degraded,
    Closed,
}

pub struct RadioPlayer<M: MediaElement> {
    config: PlayerConfig,
    element: M,
    backend: Box<dyn AudioBackend>,
    graph: GraphSlot,
    session: PlaybackSession,
    /// Last non-zero volume, restored on unmute
    remembered_volume: f32,
    equalizer: Equalizer,
    reconnect: ReconnectPolicy,
    /// Tag of the newest play request
    generation: u64,
    /// Play request whose outcome is still awaited
    pending_play: Option<u64>,
    renderer: Option<SpectrumRenderer>,
    events: Arc<EventBus>,
    unmounted: bool,
}

impl<M: MediaElement> RadioPlayer<M> {
    /// Create the session and point the element at the configured stream.
    ///
    /// No audio graph is built here; that waits for the first `play()`.
    pub fn mount(config: PlayerConfig, mut element: M, backend: Box<dyn AudioBackend>) -> Result<Self> {
        config.validate()?;

        let volume = config.initial_volume.clamp(0.0, 1.0);
        let session = PlaybackSession {
            volume,
            is_muted: volume == 0.0,
            ..PlaybackSession::default()
        };

        element.set_volume(volume);
        element.load(&config.media_source());

        let renderer = config
            .show_visualizer
            .then(|| SpectrumRenderer::new(DEFAULT_CANVAS_HEIGHT));
        let reconnect = ReconnectPolicy::new(config.reconnect_delay(), config.max_reconnect_attempts);

        info!(
            "mounted player for {} ({} / {})",
            config.stream_url, config.station, config.title
        );

        Ok(Self {
            config,
            element,
            backend,
            graph: GraphSlot::Absent,
            session,
            remembered_volume: if volume > 0.0 { volume } else { DEFAULT_VOLUME },
            equalizer: Equalizer::new(),
            reconnect,
            generation: 0,
            pending_play: None,
            renderer,
            events: Arc::new(EventBus::new()),
            unmounted: false,
        })
    }

    // === Accessors ===

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Current session state
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn snapshot(&self) -> PlaybackSession {
        self.session.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    pub fn bands(&self) -> &[EqBand] {
        self.equalizer.bands()
    }

    /// Notification bus; subscribe to receive `PlayerEvent`s
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn element(&self) -> &M {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut M {
        &mut self.element
    }

    pub fn graph(&self) -> Option<&AudioGraph> {
        match &self.graph {
            GraphSlot::Ready(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn graph_status(&self) -> GraphStatus {
        match self.graph {
            GraphSlot::Absent => GraphStatus::Absent,
            GraphSlot::Ready(_) => GraphStatus::Ready,
            GraphSlot::Degraded => GraphStatus::Degraded,
            GraphSlot::Closed => GraphStatus::Closed,
        }
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.reconnect
    }

    pub fn renderer(&self) -> Option<&SpectrumRenderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut SpectrumRenderer> {
        self.renderer.as_mut()
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    // === Actions ===

    pub fn play(&mut self) {
        if self.unmounted {
            return;
        }
        let prev = self.snapshot();
        self.start_play();
        self.publish(&prev);
    }

    /// Stop playback. Always safe; in-flight play requests are disowned.
    pub fn pause(&mut self) {
        if self.unmounted {
            return;
        }
        let prev = self.snapshot();

        self.generation += 1;
        self.pending_play = None;
        self.reconnect.cancel();
        self.element.pause();

        self.session.phase = if self.session.phase == SessionPhase::Playing {
            SessionPhase::Paused
        } else {
            SessionPhase::Idle
        };
        self.session.is_playing = false;
        self.session.is_loading = false;
        debug!("paused ({})", self.session.phase);

        self.publish(&prev);
    }

    pub fn toggle(&mut self) {
        if self.session.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Set the master volume, clamped to [0, 1]. Zero counts as muted.
    pub fn set_volume(&mut self, volume: f32) {
        if self.unmounted {
            return;
        }
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.session.volume = volume;
        self.session.is_muted = volume == 0.0;
        if volume > 0.0 {
            self.remembered_volume = volume;
        }
        self.apply_output_level();
    }

    pub fn toggle_mute(&mut self) {
        if self.unmounted {
            return;
        }
        if self.session.is_muted {
            let restore = if self.remembered_volume > 0.0 {
                self.remembered_volume
            } else {
                DEFAULT_VOLUME
            };
            self.session.volume = restore;
            self.session.is_muted = false;
        } else {
            if self.session.volume > 0.0 {
                self.remembered_volume = self.session.volume;
            }
            self.session.is_muted = true;
        }
        self.apply_output_level();
    }

    /// Set one band's gain (clamped to ±12 dB) and apply it right away
    pub fn set_eq_band_gain(&mut self, index: usize, gain_db: f32) -> Result<f32> {
        if self.unmounted {
            return Err(PlayerError::Unmounted);
        }
        let stored = self.equalizer.set_gain(index, gain_db)?;
        if let GraphSlot::Ready(graph) = &self.graph {
            graph.set_band_gain(index, stored)?;
        }
        debug!("eq band {} set to {} dB", index, stored);
        Ok(stored)
    }

    /// Flatten all five bands at once
    pub fn reset_eq(&mut self) {
        if self.unmounted {
            return;
        }
        self.equalizer.reset();
        if let GraphSlot::Ready(graph) = &self.graph {
            for stage in graph.filters() {
                stage.set_gain_db(0.0);
            }
        }
        debug!("eq reset");
    }

    /// Record a user gesture. With `auto_play`, the first one starts playback.
    ///
    /// Returns true when this call started playback.
    pub fn interact(&mut self) -> bool {
        if self.unmounted || self.session.has_interacted {
            return false;
        }
        self.session.has_interacted = true;
        if self.config.auto_play && !self.session.is_playing {
            info!("first interaction, starting autoplay");
            self.play();
            return true;
        }
        false
    }

    // === Event pump ===

    /// Apply one lifecycle event from the media element
    pub fn handle_event(&mut self, event: MediaEvent) {
        if self.unmounted {
            return;
        }
        let prev = self.snapshot();
        self.apply_event(event);
        self.publish(&prev);
    }

    /// Drain and apply every pending element event. Returns how many were applied.
    pub fn poll_events(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.element.poll_event() {
            self.handle_event(event);
            count += 1;
        }
        count
    }

    /// Drive time-based behaviour: fires a due reconnection attempt
    pub fn tick(&mut self, now: Instant) {
        if self.unmounted || !self.reconnect.fire_due(now) {
            return;
        }
        info!("reconnecting (attempt {})", self.reconnect.attempts());
        let prev = self.snapshot();
        self.session.error = None;
        self.start_play();
        self.publish(&prev);
    }

    /// Next spectrum frame for a canvas of the given height
    pub fn render_frame(&mut self, canvas_height: f32) -> Option<SpectrumFrame> {
        let playing = self.session.is_playing;
        let analyser = match &self.graph {
            GraphSlot::Ready(graph) => Some(graph.analyser() as &dyn FrequencySource),
            _ => None,
        };
        let renderer = self.renderer.as_mut()?;
        renderer.set_canvas_height(canvas_height);
        renderer.sync(playing);
        renderer.next_frame(analyser)
    }

    /// Tear the session down. Later calls do nothing.
    pub fn unmount(&mut self) {
        if self.unmounted {
            return;
        }
        self.unmounted = true;
        let prev = self.snapshot();

        self.reconnect.cancel();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.stop();
        }
        if let GraphSlot::Ready(mut graph) = std::mem::replace(&mut self.graph, GraphSlot::Closed) {
            if let Err(e) = graph.close() {
                warn!("failed to close audio graph: {}", e);
            }
        }
        self.element.pause();
        self.element.detach();

        self.pending_play = None;
        self.session.is_playing = false;
        self.session.is_loading = false;
        self.publish(&prev);
        info!("player unmounted");
    }

    // === Internals ===

    fn start_play(&mut self) {
        self.session.has_interacted = true;
        self.reconnect.cancel();
        self.session.phase = SessionPhase::Loading;
        self.session.is_loading = true;

        self.ensure_graph();

        let resumed = match &mut self.graph {
            GraphSlot::Ready(graph) if graph.context_state() == ContextState::Suspended => graph.resume(),
            _ => Ok(()),
        };
        if let Err(e) = resumed {
            warn!("could not resume audio context: {}", e);
            self.pending_play = None;
            self.fail(MediaError::Other(Some(e.to_string())));
            return;
        }

        self.generation += 1;
        self.pending_play = Some(self.generation);
        debug!("play request #{}", self.generation);
        self.element.play(self.generation);
    }

    /// Build the graph once; a failure leaves playback running without it
    fn ensure_graph(&mut self) {
        if !matches!(self.graph, GraphSlot::Absent) {
            return;
        }
        self.graph = match self.build_graph() {
            Ok(graph) => GraphSlot::Ready(graph),
            Err(e) => {
                warn!("audio graph unavailable, continuing without EQ and visualizer: {}", e);
                GraphSlot::Degraded
            }
        };
    }

    fn build_graph(&mut self) -> Result<AudioGraph> {
        let context = self.backend.create_context()?;
        let graph = AudioGraph::build(context, self.equalizer.bands(), self.session.effective_volume())?;
        self.element.route_through(graph.tap())?;
        Ok(graph)
    }

    fn apply_output_level(&mut self) {
        let level = self.session.effective_volume();
        self.element.set_volume(level);
        if let GraphSlot::Ready(graph) = &self.graph {
            graph.set_gain(level);
        }
    }

    /// Whether the user currently wants audio
    fn wants_playback(&self) -> bool {
        matches!(
            self.session.phase,
            SessionPhase::Loading | SessionPhase::Playing
        )
    }

    fn apply_event(&mut self, event: MediaEvent) {
        debug!("element event: {}", event);
        match event {
            MediaEvent::LoadStart => {
                self.session.is_loading = true;
            }
            MediaEvent::CanPlay => {
                self.session.error = None;
                self.session.is_loading = false;
            }
            MediaEvent::Waiting | MediaEvent::Stalled => {
                if self.wants_playback() {
                    self.session.is_loading = true;
                }
            }
            MediaEvent::Playing => {
                if self.wants_playback() {
                    self.mark_playing();
                } else {
                    debug!("ignoring playing event in phase {}", self.session.phase);
                }
            }
            MediaEvent::Ended => {
                self.session.is_playing = false;
                self.session.is_loading = false;
                if self.wants_playback() {
                    self.session.phase = SessionPhase::Idle;
                }
            }
            MediaEvent::Error(error) => self.fail(error),
            MediaEvent::PlayResolved { generation } => {
                if self.pending_play == Some(generation) {
                    self.pending_play = None;
                    self.mark_playing();
                } else {
                    debug!("discarding stale play outcome #{}", generation);
                }
            }
            MediaEvent::PlayRejected { generation, error } => {
                if self.pending_play == Some(generation) {
                    self.pending_play = None;
                    self.fail(error);
                } else {
                    debug!("discarding stale play rejection #{}: {}", generation, error);
                }
            }
        }
    }

    fn mark_playing(&mut self) {
        self.session.phase = SessionPhase::Playing;
        self.session.is_playing = true;
        self.session.is_loading = false;
        self.session.error = None;
        self.reconnect.reset_attempts();
    }

    fn fail(&mut self, error: MediaError) {
        warn!("playback failed: {}", error);
        self.session.error = Some(error.to_string());
        self.session.is_playing = false;
        self.session.is_loading = false;
        self.session.phase = SessionPhase::Error;

        if error.is_network() {
            if self.reconnect.schedule(Instant::now()) {
                info!("retrying in {:?}", self.reconnect.delay());
            } else {
                warn!(
                    "giving up after {} reconnection attempts",
                    self.reconnect.attempts()
                );
            }
        }
    }

    fn publish(&self, prev: &PlaybackSession) {
        for event in self.events.publish(prev, &self.session) {
            match event {
                PlayerEvent::Error(msg) => warn!("player error: {}", msg),
                other => debug!("player event: {:?}", other),
            }
        }
    }
}

impl<M: MediaElement> Drop for RadioPlayer<M> {
    fn drop(&mut self) {
        self.unmount();
    }
}
