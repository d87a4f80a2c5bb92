mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use parcel_map::config::EngineConfig;
use parcel_map::data;
use parcel_map::map::BaseMap;
use parcel_map::style::{StyleConfig, StyleWatcher};
use ratatui::DefaultTerminal;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Browse land parcels on a terminal map
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// GeoJSON FeatureCollection of parcels
    #[arg(long)]
    parcels: PathBuf,

    /// Segment style rules (JSON), reloaded when the file changes
    #[arg(long)]
    styles: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding coastline and border GeoJSON
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Write logs here; the terminal belongs to the UI
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    // Load everything before the terminal is taken over so errors stay readable
    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let parcels = data::load_parcels(&args.parcels)
        .with_context(|| format!("loading parcels from {}", args.parcels.display()))?;
    let (styles, watcher) = match &args.styles {
        Some(path) => (StyleConfig::load(path)?, Some(StyleWatcher::new(path)?)),
        None => (StyleConfig::builtin(), None),
    };

    let mut basemap = BaseMap::new();
    if args.data_dir.exists() {
        data::load_basemap(&mut basemap, &args.data_dir);
    }
    // Fall back to simple world if no data loaded
    if !basemap.has_data() {
        data::builtin_world(&mut basemap);
    }
    info!(parcels = parcels.len(), "starting viewer");

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let size = terminal.size()?;
    let mut app = App::new(
        size.width as usize,
        size.height as usize,
        config,
        styles,
        watcher,
        basemap,
        parcels,
        Instant::now(),
    );
    let result = run(&mut terminal, &mut app);

    app.controller.teardown();
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Mouse: hover, click to select, drag to pan, scroll to zoom
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Moved => app.set_mouse_pos(mouse.column, mouse.row),
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.begin_drag(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(mouse.column, mouse.row),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            let now = Instant::now();
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') => app.quit(),
                    KeyCode::Esc => app.back(now),

                    KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                    KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                    KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                    KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                    KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                    KeyCode::Char('m') => app.toggle_map_type(),
                    KeyCode::Char('f') => app.cycle_filter(now),
                    KeyCode::Char('n') => app.select_next(now),
                    KeyCode::Char('p') => app.select_prev(now),
                    KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(now),
                    _ => {}
                },
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
