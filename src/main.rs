mod animation;
mod color;
mod config;
mod data;
mod engine;
mod filter;
mod geometry;
mod map_draw;
mod matcher;
mod projection;
mod selection;
mod state;
mod topology;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{fs::File, io, sync::Mutex, time::Instant};
use tracing_subscriber::EnvFilter;

use config::Config;
use data::StatsTable;
use state::{AppState, GeometryState};

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

fn init_logging(config: &Config) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("creating log file {}", config.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(&config)?;

    let table = StatsTable::load(&config.stats)?;
    if table.is_empty() {
        tracing::warn!(path = %config.stats.display(), "statistics file has no records");
    }
    let loader = geometry::spawn_loader(config.geometry_source())?;
    let mut state = AppState::new(table, GeometryState::Loading(loader), config.year, config.engine_config());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut state, &config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "exiting on error");
    }
    result
}

fn run(terminal: &mut Tui, state: &mut AppState, config: &Config) -> Result<()> {
    let tick = config.tick();
    let mut last = Instant::now();

    loop {
        if state.needs_redraw() {
            terminal.draw(|f| ui::draw(f, state))?;
            state.mark_drawn();
        }

        if event::poll(tick)? {
            match event::read()? {
                Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => {
                    if state.handle_key(code) {
                        tracing::info!("quit requested");
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => state.handle_mouse(mouse),
                Event::Resize(..) => state.request_redraw(),
                _ => {}
            }
        }

        let now = Instant::now();
        state.tick(now - last);
        last = now;
    }
}
