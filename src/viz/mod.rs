//! Terminal visualization for exhale
//!
//! Drains the relay on a fixed tick into a rolling history and plots it.
//! Holds no pipeline state; the only thing it can do to a run is cancel it.

mod capture;
mod waveform;

pub use capture::LogCapture;
pub use waveform::Waveform;

use std::collections::VecDeque;
use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use crate::config::VizConfig;
use crate::engine::{CancellationToken, RelayReceiver};

/// Fixed-size rolling window of recent values
pub struct History {
    values: VecDeque<f64>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest when full
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent N values, oldest first
    pub fn recent(&self, count: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(count);
        self.values.iter().skip(skip).copied().collect()
    }

    /// Most recent value
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }
}

/// Display state owned by the consumer thread
pub struct VizState {
    pub title: String,
    pub history: History,
    pub y_min: f64,
    pub y_max: f64,
    pub dropped: u64,
    pub finished: bool,
    /// Log lines shown in a pane while the terminal is taken over
    pub log: Option<LogCapture>,
}

impl VizState {
    pub fn new(title: impl Into<String>, config: &VizConfig) -> Self {
        Self {
            title: title.into(),
            history: History::new(config.history),
            y_min: config.y_min,
            y_max: config.y_max,
            dropped: 0,
            finished: false,
            log: None,
        }
    }

    /// Route captured log output into the display
    pub fn with_log(mut self, log: LogCapture) -> Self {
        self.log = Some(log);
        self
    }

    /// Move everything queued on the relay into the history
    pub fn absorb(&mut self, relay: &RelayReceiver) -> usize {
        let mut count = 0;
        for value in relay.drain() {
            self.history.push(value);
            count += 1;
        }
        self.dropped = relay.dropped();
        count
    }
}

/// Run the visualization TUI until the operator quits, `token` is
/// cancelled, or `finished` reports the pipeline has stopped.
///
/// The terminal is restored on every exit, and log lines captured while it
/// was taken over are replayed to stderr afterwards.
pub fn run_viz(
    relay: RelayReceiver,
    mut state: VizState,
    tick: Duration,
    token: &CancellationToken,
    finished: impl Fn() -> bool,
) -> Result<()> {
    if let Some(log) = &state.log {
        log.start();
    }

    let result = show(&relay, &mut state, tick, token, finished);

    if let Some(log) = &state.log {
        for line in log.finish() {
            eprintln!("{}", line);
        }
    }
    result
}

fn show(
    relay: &RelayReceiver,
    state: &mut VizState,
    tick: Duration,
    token: &CancellationToken,
    finished: impl Fn() -> bool,
) -> Result<()> {
    enable_raw_mode()?;
    let result = open_terminal()
        .and_then(|mut terminal| viz_loop(&mut terminal, relay, state, tick, token, finished));

    // Cleanup, each step regardless of the others
    let raw = disable_raw_mode();
    let leave = execute!(std::io::stdout(), LeaveAlternateScreen);
    result?;
    raw?;
    leave?;
    Ok(())
}

fn open_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn viz_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    relay: &RelayReceiver,
    state: &mut VizState,
    tick: Duration,
    token: &CancellationToken,
    finished: impl Fn() -> bool,
) -> Result<()> {
    let mut next_tick = Instant::now();

    while !token.is_cancelled() {
        state.absorb(relay);
        state.finished = finished();
        if state.finished {
            break;
        }

        terminal.draw(|f| draw_ui(f, state))?;

        // Handle input until the next redraw
        next_tick += tick;
        let wait = next_tick.saturating_duration_since(Instant::now());
        if event::poll(wait)? {
            if let Event::Key(key) = event::read()? {
                match (key.code, key.modifiers) {
                    (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => token.cancel(),
                    (KeyCode::Char('c'), KeyModifiers::CONTROL) => token.cancel(),
                    _ => {}
                }
            }
        }
        if next_tick < Instant::now() {
            next_tick = Instant::now();
        }
    }

    Ok(())
}

fn draw_ui(f: &mut Frame, state: &VizState) {
    let area = f.area();

    // Layout: plot on top, log pane when capturing, status at bottom
    let log_height = if state.log.is_some() { LOG_PANE_LINES + 2 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),               // Plot
            Constraint::Length(log_height),   // Log
            Constraint::Length(3),            // Status
        ])
        .split(area);

    draw_waveform(f, chunks[0], state);
    if let Some(log) = &state.log {
        draw_log(f, chunks[1], log);
    }
    draw_status(f, chunks[2], state);
}

const LOG_PANE_LINES: u16 = 4;

fn draw_log(f: &mut Frame, area: Rect, log: &LogCapture) {
    let lines: Vec<Line> = log
        .recent(LOG_PANE_LINES as usize)
        .into_iter()
        .map(Line::from)
        .collect();

    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(" Log "));

    f.render_widget(paragraph, area);
}

fn draw_waveform(f: &mut Frame, area: Rect, state: &VizState) {
    let samples = state.history.recent(state.history.capacity());

    let waveform = Waveform::new(&samples)
        .range(state.y_min, state.y_max)
        .style(Style::default().fg(Color::Cyan))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", state.title)),
        );

    f.render_widget(waveform, area);
}

fn draw_status(f: &mut Frame, area: Rect, state: &VizState) {
    let amplitude = state
        .history
        .last()
        .map(|v| format!("{:+.3}", v))
        .unwrap_or_else(|| "-".to_string());

    let text = Line::from(vec![
        Span::raw("  Amplitude: "),
        Span::styled(amplitude, Style::default().fg(Color::Green)),
        Span::raw("  |  Samples shown: "),
        Span::raw(state.history.len().to_string()),
        Span::raw("  |  Dropped: "),
        Span::styled(
            state.dropped.to_string(),
            Style::default().fg(if state.dropped > 0 { Color::Yellow } else { Color::Green }),
        ),
        Span::raw("  |  q: quit"),
    ]);

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(paragraph, area);
}
