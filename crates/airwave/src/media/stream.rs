//! Native media element
//!
//! `StreamElement` runs playback on a dedicated engine thread, accepting
//! commands over crossbeam channels and reporting lifecycle events back.
//! Connecting (HTTP request plus format probe) happens on a short-lived
//! worker so the engine loop never blocks on the network. Once connected, the
//! response body is pulled by the read-ahead producer in `media::buffer`, so
//! the audio thread only ever reads queued bytes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use rodio::{DeviceSinkBuilder, Player};
use tracing::{debug, info, warn};

use crate::audio::decoder::{EndOfInput, ErrorSlot, SymphoniaSource};
use crate::audio::GraphTap;
use crate::config::network::{CONNECT_TIMEOUT_SECS, OPEN_TIMEOUT_SECS, USER_AGENT};
use crate::config::timeouts::ENGINE_TICK_MS;
use crate::error::{MediaError, PlayerError, Result};

use super::buffer::spawn_producer;
use super::element::MediaElement;
use super::types::{MediaEvent, MediaSource, Preload};
use super::watchdog::{FlowSignal, StallWatchdog};

enum ElementCommand {
    Load(MediaSource),
    Play { generation: u64 },
    Pause,
    SetVolume(f32),
    Route(GraphTap),
    Detach,
    Shutdown,
}

type ConnectResult = std::result::Result<SymphoniaSource, MediaError>;

/// A connect worker in flight
struct PendingConnect {
    rx: Receiver<ConnectResult>,
    cancel: Arc<AtomicBool>,
    started: Instant,
    /// Play request waiting on this connection, if any
    generation: Option<u64>,
}

impl PendingConnect {
    fn abandon(self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// A source handed to the sink
struct ActivePlayback {
    error_slot: ErrorSlot,
    frames: Arc<AtomicU64>,
    cancel: Arc<AtomicBool>,
    watchdog: StallWatchdog,
    paused: bool,
}

/// Streaming media element backed by reqwest, symphonia and rodio
pub struct StreamElement {
    cmd_tx: Sender<ElementCommand>,
    event_rx: Receiver<MediaEvent>,
    thread: Option<JoinHandle<()>>,
}

impl StreamElement {
    /// Spawn the engine thread.
    ///
    /// Blocks until the audio output is open (or fails to open).
    pub fn new() -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded::<ElementCommand>(16);
        let (event_tx, event_rx) = event_channel();
        let (init_tx, init_rx) = bounded::<std::result::Result<(), String>>(1);

        let thread = thread::Builder::new()
            .name("stream-element".to_string())
            .spawn(move || Engine::run(cmd_rx, event_tx, init_tx))
            .map_err(|e| PlayerError::Output(format!("Failed to spawn engine thread: {}", e)))?;

        init_rx
            .recv()
            .map_err(|_| PlayerError::Output("Engine thread terminated during init".to_string()))?
            .map_err(PlayerError::Output)?;

        Ok(Self {
            cmd_tx,
            event_rx,
            thread: Some(thread),
        })
    }

    fn send(&self, cmd: ElementCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    fn shutdown_inner(&mut self) {
        let _ = self.cmd_tx.send(ElementCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl MediaElement for StreamElement {
    fn load(&mut self, source: &MediaSource) {
        self.send(ElementCommand::Load(source.clone()));
    }

    fn play(&mut self, generation: u64) {
        self.send(ElementCommand::Play { generation });
    }

    fn pause(&mut self) {
        self.send(ElementCommand::Pause);
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(ElementCommand::SetVolume(volume));
    }

    fn route_through(&mut self, tap: GraphTap) -> Result<()> {
        self.cmd_tx
            .send(ElementCommand::Route(tap))
            .map_err(|_| PlayerError::Output("Engine thread is gone".to_string()))
    }

    fn detach(&mut self) {
        self.send(ElementCommand::Detach);
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.event_rx.try_recv().ok()
    }
}

impl Drop for StreamElement {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

/// Events flow to an owner that may stop polling (or never start), so the
/// engine must never block on this channel
fn event_channel() -> (Sender<MediaEvent>, Receiver<MediaEvent>) {
    unbounded()
}

/// State owned by the engine thread
struct Engine {
    sink: Player,
    events: Sender<MediaEvent>,
    source: Option<MediaSource>,
    tap: Option<GraphTap>,
    volume: f32,
    pending: Option<PendingConnect>,
    /// Connected and probed, waiting for a play request
    prefetched: Option<(SymphoniaSource, Arc<AtomicBool>)>,
    active: Option<ActivePlayback>,
}

impl Engine {
    fn run(
        cmd_rx: Receiver<ElementCommand>,
        event_tx: Sender<MediaEvent>,
        init_tx: Sender<std::result::Result<(), String>>,
    ) {
        // Output stream is created on this thread (cpal streams may be !Send)
        let mut stream = match DeviceSinkBuilder::open_default_sink() {
            Ok(s) => s,
            Err(e) => {
                let _ = init_tx.send(Err(format!("Failed to open audio output: {}", e)));
                return;
            }
        };
        stream.log_on_drop(false);

        // `stream` must be declared before the engine so the sink drops first
        let mut engine = Engine {
            sink: Player::connect_new(stream.mixer()),
            events: event_tx,
            source: None,
            tap: None,
            volume: 1.0,
            pending: None,
            prefetched: None,
            active: None,
        };
        let _ = init_tx.send(Ok(()));

        loop {
            match cmd_rx.recv_timeout(Duration::from_millis(ENGINE_TICK_MS)) {
                Ok(ElementCommand::Shutdown) => {
                    engine.stop_all();
                    break;
                }
                Ok(cmd) => engine.handle(cmd),
                Err(RecvTimeoutError::Timeout) => engine.tick(Instant::now()),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn emit(&self, event: MediaEvent) {
        debug!("media event: {}", event);
        let _ = self.events.send(event);
    }

    fn handle(&mut self, cmd: ElementCommand) {
        match cmd {
            ElementCommand::Load(source) => {
                self.stop_all();
                info!("loading {}", source.url);
                let preload = source.preload;
                self.source = Some(source);
                if preload == Preload::Auto {
                    self.start_connect(None);
                }
            }
            ElementCommand::Play { generation } => self.play(generation),
            ElementCommand::Pause => self.pause(),
            ElementCommand::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
                self.sink.set_volume(self.volume);
            }
            ElementCommand::Route(tap) => {
                debug!("routing playback through {:?}", tap);
                self.tap = Some(tap);
            }
            ElementCommand::Detach => {
                self.stop_all();
                self.source = None;
                self.tap = None;
            }
            ElementCommand::Shutdown => {}
        }
    }

    fn play(&mut self, generation: u64) {
        if let Some(active) = self.active.as_mut() {
            if active.paused {
                self.sink.play();
                active.paused = false;
                active.watchdog.rearm(Instant::now());
            }
            self.emit(MediaEvent::PlayResolved { generation });
            self.emit(MediaEvent::Playing);
            return;
        }

        if let Some((source, cancel)) = self.prefetched.take() {
            self.start_playback(source, cancel);
            self.emit(MediaEvent::PlayResolved { generation });
            self.emit(MediaEvent::Playing);
            return;
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.generation = Some(generation);
            self.emit(MediaEvent::Waiting);
            return;
        }

        if self.source.is_none() {
            self.emit(MediaEvent::PlayRejected {
                generation,
                error: MediaError::SrcNotSupported,
            });
            return;
        }
        self.start_connect(Some(generation));
    }

    fn pause(&mut self) {
        // A live stream has nothing to resume into while connecting; drop it
        if let Some(pending) = self.pending.take() {
            if let Some(generation) = pending.generation {
                self.emit(MediaEvent::PlayRejected {
                    generation,
                    error: MediaError::Aborted,
                });
            }
            pending.abandon();
        }
        if let Some(active) = self.active.as_mut() {
            if !active.paused {
                self.sink.pause();
                active.paused = true;
            }
        }
    }

    fn start_connect(&mut self, generation: Option<u64>) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let cancel = Arc::new(AtomicBool::new(false));
        match spawn_connect(source, cancel.clone()) {
            Ok(rx) => {
                self.pending = Some(PendingConnect {
                    rx,
                    cancel,
                    started: Instant::now(),
                    generation,
                });
                self.emit(MediaEvent::LoadStart);
            }
            Err(e) => {
                warn!("could not start connect worker: {}", e);
                self.fail(generation, MediaError::Other(Some(e.to_string())));
            }
        }
    }

    fn start_playback(&mut self, source: SymphoniaSource, cancel: Arc<AtomicBool>) {
        let error_slot = source.error_slot();
        let frames = source.frame_counter();
        info!(
            "playback started: {} {} ch @ {} Hz",
            source.codec_name(),
            rodio::Source::channels(&source),
            rodio::Source::sample_rate(&source)
        );

        match &self.tap {
            Some(tap) => self.sink.append(tap.connect(source)),
            None => self.sink.append(source),
        }
        self.sink.set_volume(self.volume);
        self.sink.play();

        self.active = Some(ActivePlayback {
            error_slot,
            frames,
            cancel,
            watchdog: StallWatchdog::new(Instant::now()),
            paused: false,
        });
    }

    /// Report a failure against the waiting play request, or as a plain error
    fn fail(&self, generation: Option<u64>, error: MediaError) {
        match generation {
            Some(generation) => self.emit(MediaEvent::PlayRejected { generation, error }),
            None => self.emit(MediaEvent::Error(error)),
        }
    }

    fn stop_all(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abandon();
        }
        if let Some((_, cancel)) = self.prefetched.take() {
            cancel.store(true, Ordering::SeqCst);
        }
        if let Some(active) = self.active.take() {
            active.cancel.store(true, Ordering::SeqCst);
        }
        self.sink.stop();
    }

    fn tick(&mut self, now: Instant) {
        self.poll_pending(now);
        self.poll_active(now);
    }

    fn poll_pending(&mut self, now: Instant) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };
        let outcome = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => {
                if now.duration_since(pending.started) < Duration::from_secs(OPEN_TIMEOUT_SECS) {
                    return;
                }
                warn!("stream did not open within {}s", OPEN_TIMEOUT_SECS);
                Err(MediaError::Network)
            }
            Err(TryRecvError::Disconnected) => {
                Err(MediaError::Other(Some("Connect worker exited".to_string())))
            }
        };
        let Some(pending) = self.pending.take() else {
            return;
        };

        match outcome {
            Ok(source) => {
                self.emit(MediaEvent::CanPlay);
                match pending.generation {
                    Some(generation) => {
                        self.start_playback(source, pending.cancel);
                        self.emit(MediaEvent::PlayResolved { generation });
                        self.emit(MediaEvent::Playing);
                    }
                    None => self.prefetched = Some((source, pending.cancel)),
                }
            }
            Err(error) => {
                pending.cancel.store(true, Ordering::SeqCst);
                warn!("stream failed to open: {}", error);
                self.fail(pending.generation, error);
            }
        }
    }

    fn poll_active(&mut self, now: Instant) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.paused {
            return;
        }

        if self.sink.empty() {
            let fault = active.error_slot.lock().ok().and_then(|mut e| e.take());
            self.active = None;
            match fault {
                Some(error) => {
                    warn!("stream ended with error: {}", error);
                    self.emit(MediaEvent::Error(error));
                }
                None => {
                    info!("stream ended");
                    self.emit(MediaEvent::Ended);
                }
            }
            return;
        }

        let frames = active.frames.load(Ordering::Relaxed);
        match active.watchdog.update(frames, now) {
            Some(FlowSignal::Stalled) => {
                warn!("no audio decoded for a while, stream stalled");
                self.emit(MediaEvent::Stalled);
            }
            Some(FlowSignal::Recovered) => {
                info!("stream recovered");
                self.emit(MediaEvent::Playing);
            }
            None => {}
        }
    }
}

fn spawn_connect(source: MediaSource, cancel: Arc<AtomicBool>) -> Result<Receiver<ConnectResult>> {
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("stream-connect".to_string())
        .spawn(move || {
            let result = connect(&source, cancel.clone());
            if !cancel.load(Ordering::SeqCst) {
                let _ = tx.send(result);
            }
        })
        .map_err(|e| PlayerError::Output(format!("Failed to spawn connect thread: {}", e)))?;
    Ok(rx)
}

/// Open the stream and probe its format
fn connect(source: &MediaSource, cancel: Arc<AtomicBool>) -> ConnectResult {
    let url = source.request_url()?;
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(None)
        .build()
        .map_err(|e| MediaError::Other(Some(e.to_string())))?;

    debug!("connecting to {}", url);
    let response = client.get(url).send().map_err(classify_request_error)?;
    let status = response.status();
    if !status.is_success() {
        warn!("stream request returned {}", status);
        return Err(MediaError::SrcNotSupported);
    }

    let hint = content_type_hint(response.headers()).or_else(|| source.extension_hint());
    let end = end_of_input(response.content_length());
    debug!("stream format hint {:?}, end of input {:?}", hint, end);
    let reader =
        spawn_producer(response, cancel).map_err(|e| MediaError::Other(Some(e.to_string())))?;
    SymphoniaSource::with_end(reader, hint.as_deref(), end).map_err(classify_open_error)
}

/// A response without a length is a live feed: its body only stops when the
/// connection does
fn end_of_input(content_length: Option<u64>) -> EndOfInput {
    match content_length {
        Some(_) => EndOfInput::Finished,
        None => EndOfInput::Interrupted,
    }
}

fn classify_request_error(e: reqwest::Error) -> MediaError {
    warn!("{}", PlayerError::Network(e));
    MediaError::Network
}

fn classify_open_error(e: PlayerError) -> MediaError {
    warn!("{}", e);
    match e {
        PlayerError::Io(_) => MediaError::Network,
        _ => MediaError::SrcNotSupported,
    }
}

/// Container hint from the response's content type
fn content_type_hint(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/aac" | "audio/aacp" | "audio/x-aac" => "aac",
        "audio/mp4" | "audio/x-m4a" => "mp4",
        "audio/ogg" | "application/ogg" | "audio/vorbis" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => return None,
    };
    Some(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::tests::make_wav;
    use reqwest::header::HeaderValue;
    use std::io::{self, Read, Write};
    use std::net::TcpListener;

    fn headers(content_type: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        map
    }

    /// Serve one HTTP response on a local port and return the URL
    fn serve_once(status: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut conn, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = conn.read(&mut request);
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    content_type,
                    body.len()
                );
                let _ = conn.write_all(head.as_bytes());
                let _ = conn.write_all(&body);
            }
        });
        format!("http://{}/live", addr)
    }

    /// Serve a 200 response with no Content-Length, then close the connection
    /// mid-body the way a dropped live feed does
    fn serve_unsized(content_type: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut conn, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = conn.read(&mut request);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
                    content_type
                );
                let _ = conn.write_all(head.as_bytes());
                let _ = conn.write_all(&body);
            }
        });
        format!("http://{}/live", addr)
    }

    /// WAV header promising a second of audio, followed by only part of it
    fn cut_off_wav() -> Vec<u8> {
        let mut wav = make_wav(44100, 1, &[100; 44100]);
        wav.truncate(44 + 20_000);
        wav
    }

    fn wait_for(element: &mut StreamElement, timeout_ms: u64) -> Vec<MediaEvent> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            while let Some(evt) = element.poll_event() {
                seen.push(evt);
            }
            thread::sleep(Duration::from_millis(25));
        }
        seen
    }

    /// Element if audio hardware is available
    fn try_element() -> Option<StreamElement> {
        StreamElement::new().ok()
    }

    // --- Helpers ---

    #[test]
    fn content_type_hints() {
        assert_eq!(content_type_hint(&headers("audio/mpeg")), Some("mp3".into()));
        assert_eq!(
            content_type_hint(&headers("audio/aacp; charset=binary")),
            Some("aac".into())
        );
        assert_eq!(content_type_hint(&headers("Audio/OGG")), Some("ogg".into()));
        assert_eq!(content_type_hint(&headers("text/html")), None);
        assert_eq!(content_type_hint(&HeaderMap::new()), None);
    }

    #[test]
    fn io_failure_while_opening_is_network_class() {
        let err = classify_open_error(PlayerError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert_eq!(err, MediaError::Network);
        assert!(err.is_network());
    }

    #[test]
    fn unrecognized_format_is_not_supported() {
        let err = classify_open_error(PlayerError::Decode("Probe error".into()));
        assert_eq!(err, MediaError::SrcNotSupported);
    }

    #[test]
    fn unsized_response_is_live() {
        assert_eq!(end_of_input(None), EndOfInput::Interrupted);
        assert_eq!(end_of_input(Some(0)), EndOfInput::Finished);
        assert_eq!(end_of_input(Some(4096)), EndOfInput::Finished);
    }

    #[test]
    fn event_channel_never_blocks_engine() {
        let (tx, rx) = event_channel();
        assert!(tx.capacity().is_none());
        for generation in 0..10_000 {
            tx.send(MediaEvent::PlayResolved { generation }).unwrap();
        }
        assert_eq!(rx.len(), 10_000);
        assert_eq!(rx.try_recv().unwrap(), MediaEvent::PlayResolved { generation: 0 });
    }

    #[test]
    fn connect_rejects_bad_url_without_network() {
        let cancel = Arc::new(AtomicBool::new(false));
        let result = connect(&MediaSource::new("ftp://radio/live"), cancel);
        assert!(matches!(result, Err(MediaError::SrcNotSupported)));
    }

    #[test]
    fn connect_refused_is_network_error() {
        // bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let source = MediaSource::new(format!("http://127.0.0.1:{}/live", port));
        let result = connect(&source, Arc::new(AtomicBool::new(false)));
        assert!(matches!(result, Err(MediaError::Network)));
    }

    #[test]
    fn connect_http_error_is_not_supported() {
        let url = serve_once("404 Not Found", "text/plain", b"nope".to_vec());
        let result = connect(&MediaSource::new(url), Arc::new(AtomicBool::new(false)));
        assert!(matches!(result, Err(MediaError::SrcNotSupported)));
    }

    #[test]
    fn connect_opens_served_wav() {
        let wav = make_wav(44100, 2, &[0; 4410]);
        let url = serve_once("200 OK", "audio/wav", wav);
        let source = connect(&MediaSource::new(url), Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(rodio::Source::channels(&source).get(), 2);
    }

    #[test]
    fn dropped_live_feed_ends_with_network_error() {
        let url = serve_unsized("audio/wav", cut_off_wav());
        let mut source =
            connect(&MediaSource::new(url), Arc::new(AtomicBool::new(false))).unwrap();
        let slot = source.error_slot();
        while source.next().is_some() {}
        assert_eq!(*slot.lock().unwrap(), Some(MediaError::Network));
    }

    #[test]
    fn sized_body_ends_cleanly() {
        let url = serve_once("200 OK", "audio/wav", make_wav(44100, 1, &[100; 4410]));
        let mut source =
            connect(&MediaSource::new(url), Arc::new(AtomicBool::new(false))).unwrap();
        let slot = source.error_slot();
        let decoded = source.by_ref().count();
        assert!(decoded > 0);
        assert!(slot.lock().unwrap().is_none());
    }

    // --- Engine (skipped without audio hardware) ---

    #[test]
    fn create_and_drop() {
        let Some(element) = try_element() else { return };
        drop(element);
    }

    #[test]
    fn play_without_source_is_rejected() {
        let Some(mut element) = try_element() else { return };
        element.play(1);
        let events = wait_for(&mut element, 300);
        assert_eq!(
            events,
            vec![MediaEvent::PlayRejected {
                generation: 1,
                error: MediaError::SrcNotSupported
            }]
        );
    }

    #[test]
    fn play_served_stream_runs_to_end() {
        let Some(mut element) = try_element() else { return };
        let samples: Vec<i16> = (0..4410).map(|i| ((i as f32 * 0.1).sin() * 8000.0) as i16).collect();
        let url = serve_once("200 OK", "audio/wav", make_wav(44100, 1, &samples));
        element.load(&MediaSource::new(url));
        element.play(7);
        let events = wait_for(&mut element, 2000);
        assert_eq!(events.first(), Some(&MediaEvent::LoadStart));
        assert!(events.contains(&MediaEvent::CanPlay));
        assert!(events.contains(&MediaEvent::PlayResolved { generation: 7 }));
        assert!(events.contains(&MediaEvent::Playing));
        assert_eq!(events.last(), Some(&MediaEvent::Ended));
    }

    #[test]
    fn live_feed_cut_reports_error_not_end() {
        let Some(mut element) = try_element() else { return };
        let url = serve_unsized("audio/wav", cut_off_wav());
        element.load(&MediaSource::new(url));
        element.play(4);
        let events = wait_for(&mut element, 2000);
        assert!(events.contains(&MediaEvent::PlayResolved { generation: 4 }));
        assert_eq!(events.last(), Some(&MediaEvent::Error(MediaError::Network)));
        assert!(!events.contains(&MediaEvent::Ended));
    }

    #[test]
    fn unpolled_element_still_drops_promptly() {
        let Some(mut element) = try_element() else { return };
        // nobody reads events; each play with no source emits a rejection
        for generation in 0..200 {
            element.play(generation);
        }
        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            drop(element);
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn pause_while_connecting_aborts_request() {
        let Some(mut element) = try_element() else { return };
        // accepts but never answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/live", listener.local_addr().unwrap());
        element.load(&MediaSource::new(url));
        element.play(3);
        element.pause();
        let events = wait_for(&mut element, 300);
        assert!(events.contains(&MediaEvent::PlayRejected {
            generation: 3,
            error: MediaError::Aborted
        }));
        drop(listener);
    }

    #[test]
    fn detach_discards_source() {
        let Some(mut element) = try_element() else { return };
        element.load(&MediaSource::new("http://127.0.0.1:9/live"));
        element.detach();
        element.play(2);
        let events = wait_for(&mut element, 300);
        assert!(events.contains(&MediaEvent::PlayRejected {
            generation: 2,
            error: MediaError::SrcNotSupported
        }));
    }
}
