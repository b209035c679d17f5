//! Airwave CLI: terminal live radio player

use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clap::Parser;

use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use airwave::audio::SoftwareBackend;
use airwave::media::StreamElement;
use airwave::player::{PlayerEvent, RadioPlayer, SessionPhase};
use airwave::visual::equalizer::format_gain;
use airwave::visual::{BarTier, EqualizerSurface, SpectrumFrame};
use airwave::PlayerConfig;

#[derive(Parser)]
#[command(name = "airwave", about = "Terminal live radio player", version)]
struct Cli {
    /// Stream URL to play
    #[arg(required_unless_present = "config")]
    url: Option<String>,

    /// Load player settings from a JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initial volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Start playing on the first key press
    #[arg(long)]
    autoplay: bool,

    #[arg(long)]
    no_visualizer: bool,

    #[arg(long)]
    no_equalizer: bool,

    /// Where to write logs; the terminal is taken by the UI
    #[arg(long, value_name = "FILE", default_value = "airwave.log")]
    log_file: PathBuf,
}

const SPECTRUM_COLUMNS: usize = 64;
const VOLUME_STEP: f32 = 0.05;

type Player = RadioPlayer<StreamElement>;

struct App {
    spectrum: Vec<u64>,
    /// Colour of the loudest bar in the last frame
    peak_tier: BarTier,
    eq: EqualizerSurface,
    last_event: Option<String>,
    running: bool,
}

impl App {
    fn new() -> Self {
        Self {
            spectrum: vec![0; SPECTRUM_COLUMNS],
            peak_tier: BarTier::Low,
            eq: EqualizerSurface::new(),
            last_event: None,
            running: true,
        }
    }
}

fn build_config(cli: &Cli) -> Result<PlayerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PlayerConfig::load_from(path)?,
        None => PlayerConfig::new(cli.url.clone().unwrap_or_default()),
    };
    if let Some(url) = &cli.url {
        config.stream_url = url.clone();
    }
    if let Some(volume) = cli.volume {
        config.initial_volume = volume;
    }
    if cli.autoplay {
        config.auto_play = true;
    }
    if cli.no_visualizer {
        config.show_visualizer = false;
    }
    if cli.no_equalizer {
        config.show_equalizer = false;
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("airwave=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&cli.log_file)?;

    let element = match StreamElement::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Audio error: {}", e);
            std::process::exit(1);
        }
    };
    let mut player = RadioPlayer::mount(config, element, Box::new(SoftwareBackend::default()))?;
    let player_events = player.events().subscribe();
    let mut app = App::new();

    // Silence stderr while the TUI is up: ALSA/PulseAudio write diagnostics
    // there which corrupt the ratatui display.
    let saved_stderr = unsafe { libc::dup(2) };
    {
        let devnull = std::fs::File::open("/dev/null")?;
        unsafe { libc::dup2(devnull.as_raw_fd(), 2) };
    }

    // Enter TUI
    terminal::enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(33); // ~30fps
    let mut last_tick = Instant::now();

    while app.running {
        terminal.draw(|f| draw_ui(f, &app, &player))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(key.code, &mut app, &mut player);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
            player.poll_events();
            player.tick(last_tick);
            drain_notifications(&player_events, &mut app);
            update_spectrum(&mut app, &mut player);
        }
    }

    // Tear down while still in alternate screen
    // (rodio prints "Dropping OutputStream..." to stderr on drop)
    player.unmount();
    drop(player);
    info!("exiting");

    // Restore terminal
    terminal::disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    // Restore stderr
    if saved_stderr >= 0 {
        unsafe {
            libc::dup2(saved_stderr, 2);
            libc::close(saved_stderr);
        }
    }

    Ok(())
}

fn handle_key(code: KeyCode, app: &mut App, player: &mut Player) {
    // Any key counts as a gesture; with autoplay the first one starts playback
    let started = player.interact();
    let show_eq = player.config().show_equalizer;

    match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.running = false;
        }
        KeyCode::Char(' ') | KeyCode::Char('p') => {
            if !started {
                player.toggle();
            }
        }
        KeyCode::Char('m') => player.toggle_mute(),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let volume = player.session().volume;
            player.set_volume(volume + VOLUME_STEP);
        }
        KeyCode::Char('-') => {
            let volume = player.session().volume;
            player.set_volume(volume - VOLUME_STEP);
        }
        KeyCode::Left if show_eq => app.eq.select_prev(),
        KeyCode::Right if show_eq => app.eq.select_next(),
        KeyCode::Up if show_eq => {
            if let Err(e) = app.eq.raise(player) {
                warn!("eq change failed: {}", e);
            }
        }
        KeyCode::Down if show_eq => {
            if let Err(e) = app.eq.lower(player) {
                warn!("eq change failed: {}", e);
            }
        }
        KeyCode::Char('r') if show_eq => app.eq.reset(player),
        _ => {}
    }
}

fn drain_notifications(rx: &Receiver<PlayerEvent>, app: &mut App) {
    while let Ok(event) = rx.try_recv() {
        app.last_event = Some(match event {
            PlayerEvent::Play => "play".to_string(),
            PlayerEvent::Pause => "pause".to_string(),
            PlayerEvent::Error(msg) => format!("error: {}", msg),
        });
    }
}

fn update_spectrum(app: &mut App, player: &mut Player) {
    match player.render_frame(100.0) {
        Some(SpectrumFrame::Bars(bars)) => {
            let per_column = (bars.len() / SPECTRUM_COLUMNS).max(1);
            for (column, chunk) in app.spectrum.iter_mut().zip(bars.chunks(per_column)) {
                let peak = chunk.iter().map(|b| b.height).fold(0.0f32, f32::max);
                *column = peak.round() as u64;
            }
            app.peak_tier = bars
                .iter()
                .map(|b| b.tier)
                .max_by_key(|t| match t {
                    BarTier::Low => 0,
                    BarTier::Mid => 1,
                    BarTier::High => 2,
                })
                .unwrap_or(BarTier::Low);
        }
        Some(SpectrumFrame::Clear) => {
            app.spectrum.fill(0);
            app.peak_tier = BarTier::Low;
        }
        None => {}
    }
}

fn draw_ui(f: &mut Frame, app: &App, player: &Player) {
    let area = f.area();

    let outer = Block::default()
        .title(format!(" Airwave v{} ", env!("CARGO_PKG_VERSION")))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let config = player.config();
    let mut constraints = vec![Constraint::Length(5)];
    if config.show_visualizer {
        constraints.push(Constraint::Length(8));
    }
    if config.show_equalizer {
        constraints.push(Constraint::Length(7));
    }
    constraints.push(Constraint::Length(2));
    let chunks = Layout::vertical(constraints).split(inner);

    let mut next = 0;
    draw_metadata(f, app, player, chunks[next]);
    next += 1;
    if config.show_visualizer {
        draw_spectrum(f, app, chunks[next]);
        next += 1;
    }
    if config.show_equalizer {
        draw_equalizer(f, app, player, chunks[next]);
        next += 1;
    }
    draw_help(f, player, chunks[next]);
}

fn status_line(player: &Player) -> (String, Color) {
    let session = player.session();
    match session.phase {
        SessionPhase::Error => (
            session
                .error
                .clone()
                .unwrap_or_else(|| "Error".to_string()),
            Color::Red,
        ),
        SessionPhase::Loading => ("Connecting...".to_string(), Color::Yellow),
        SessionPhase::Playing if session.is_loading => ("Buffering...".to_string(), Color::Yellow),
        SessionPhase::Playing => ("Playing".to_string(), Color::Green),
        SessionPhase::Paused => ("Paused".to_string(), Color::DarkGray),
        SessionPhase::Idle if !session.has_interacted && player.config().auto_play => {
            ("Press any key to start".to_string(), Color::DarkGray)
        }
        SessionPhase::Idle => ("Stopped".to_string(), Color::DarkGray),
    }
}

fn draw_metadata(f: &mut Frame, app: &App, player: &Player, area: Rect) {
    let config = player.config();
    let (status, status_color) = status_line(player);
    let retry = if player.reconnect_pending() {
        format!("  (reconnecting in {}s)", player.reconnect_policy().delay().as_secs())
    } else {
        String::new()
    };
    let max_url_len = area.width.saturating_sub(9) as usize;
    let url_display = truncate_str(&config.stream_url, max_url_len);

    let text = vec![
        Line::from(vec![
            Span::styled("  Station: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&config.station, Style::default().fg(Color::White).bold()),
        ]),
        Line::from(vec![
            Span::styled("  Title: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&config.title, Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::styled("  URL: ", Style::default().fg(Color::DarkGray)),
            Span::styled(url_display, Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(vec![
            Span::styled("  Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(status, Style::default().fg(status_color)),
            Span::styled(retry, Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::styled("  Last event: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                app.last_event.as_deref().unwrap_or("---"),
                Style::default().fg(Color::White),
            ),
        ]),
    ];
    f.render_widget(Paragraph::new(text), area);
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max > 3 {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.chars().take(max).collect()
    }
}

fn draw_spectrum(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Spectrum ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    let color = match app.peak_tier {
        BarTier::Low => Color::Cyan,
        BarTier::Mid => Color::Yellow,
        BarTier::High => Color::Red,
    };
    let sparkline = Sparkline::default()
        .block(block)
        .data(&app.spectrum)
        .max(100)
        .style(Style::default().fg(color));

    f.render_widget(sparkline, area);
}

fn draw_equalizer(f: &mut Frame, app: &App, player: &Player, area: Rect) {
    let block = Block::default()
        .title(" Equalizer ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    const TRACK: usize = 24;
    let lines: Vec<Line> = app
        .eq
        .sliders(player.bands())
        .into_iter()
        .map(|slider| {
            let knob = (slider.fraction * (TRACK - 1) as f32).round() as usize;
            let track: String = (0..TRACK)
                .map(|i| if i == knob { '●' } else { '─' })
                .collect();
            let (marker, style) = if slider.selected {
                ("> ", Style::default().fg(Color::Cyan).bold())
            } else {
                ("  ", Style::default().fg(Color::White))
            };
            Line::from(vec![
                Span::styled(format!("{}{:>6} ", marker, slider.label), style),
                Span::styled(track, style),
                Span::styled(
                    format!(" {:>7}", format_gain(slider.gain_db)),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_help(f: &mut Frame, player: &Player, area: Rect) {
    let session = player.session();
    let vol_display = if session.is_muted {
        "MUTE".to_string()
    } else {
        format!("{}%", (session.volume * 100.0).round() as u32)
    };

    let mut spans = vec![
        Span::styled("  'space' ", Style::default().fg(Color::Yellow)),
        Span::raw("play/pause  |  "),
        Span::styled("'m' ", Style::default().fg(Color::Yellow)),
        Span::raw("mute  |  "),
        Span::styled("'+'/'-' ", Style::default().fg(Color::Yellow)),
        Span::raw("volume  |  "),
    ];
    if player.config().show_equalizer {
        spans.push(Span::styled("arrows ", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw("eq  |  "));
        spans.push(Span::styled("'r' ", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw("flat  |  "));
    }
    spans.push(Span::styled("'q' ", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw("quit  |  "));
    spans.push(Span::styled(
        format!("Vol: {}", vol_display),
        Style::default().fg(Color::Cyan).bold(),
    ));

    f.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Left), area);
}
