//! Counter - Minimal statecast example
//!
//! Two subscribers share one store:
//! - **A** (counter panel): renders the count and a loading marker while its
//!   own dispatches are in flight
//! - **B** (activity feed): lists every update it hears about
//!
//! Keys: k/Up = +1 from A, j/Down = -1 from A, r = reset (only A hears it),
//! b = +1 from B (A updates silently), q = quit

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Flex, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use statecast::debug::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
use statecast::{
    Action, ActionEnvelop, Completion, DestScope, Outcome, SharedActionLog, Store, StoreConfig,
    Subscriber, SubscriberExt,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Counter - statecast example
#[derive(Parser, Debug)]
#[command(name = "counter")]
#[command(about = "A counter TUI demonstrating scoped dispatch")]
struct Args {
    /// Initial count
    #[arg(long, default_value_t = 0)]
    start: i32,

    /// Write tracing output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Comma-separated action name globs to keep in the action log
    #[arg(long)]
    log_include: Option<String>,

    /// Comma-separated action name globs to drop from the action log
    #[arg(long)]
    log_exclude: Option<String>,
}

// ============================================================================
// State - What the app knows
// ============================================================================

#[derive(Clone, Debug, PartialEq, Default)]
struct AppState {
    count: i32,
    last: Option<Outcome<i32, String>>,
}

// ============================================================================
// Actions - What can happen
// ============================================================================

#[derive(Action, Clone, Debug, PartialEq)]
#[action(success = "i32", failure = "String")]
enum AppAction {
    Appeared,
    Increment,
    Decrement,
    Reset,
}

// ============================================================================
// Reducer - How state changes (pure, failures are data)
// ============================================================================

fn reducer(state: &AppState, action: &AppAction) -> AppState {
    match action {
        AppAction::Appeared => state.clone(),
        AppAction::Increment => AppState {
            count: state.count + 1,
            last: Some(Outcome::Succeeded(state.count + 1)),
        },
        AppAction::Decrement if state.count == 0 => AppState {
            count: 0,
            last: Some(Outcome::Failed("already at zero".to_string())),
        },
        AppAction::Decrement => AppState {
            count: state.count - 1,
            last: Some(Outcome::Succeeded(state.count - 1)),
        },
        AppAction::Reset => AppState {
            count: 0,
            last: Some(Outcome::Succeeded(0)),
        },
    }
}

// ============================================================================
// Subscribers
// ============================================================================

#[derive(Default)]
struct PanelView {
    count: i32,
    loading: bool,
    status: String,
}

/// Subscriber "A": the counter itself.
struct CounterPanel {
    view: Mutex<PanelView>,
    redraw: mpsc::UnboundedSender<()>,
}

impl CounterPanel {
    fn new(count: i32, redraw: mpsc::UnboundedSender<()>) -> Self {
        Self {
            view: Mutex::new(PanelView {
                count,
                ..Default::default()
            }),
            redraw,
        }
    }
}

impl Subscriber<AppState, AppAction> for CounterPanel {
    fn subscription_name(&self) -> &str {
        "A"
    }

    fn state_did_update(
        &self,
        _source: &ActionEnvelop<AppAction>,
        _old: &Arc<AppState>,
        new: &Arc<AppState>,
        completion: Completion,
    ) {
        {
            let mut view = self.view.lock();
            view.count = new.count;
            view.status = match &new.last {
                Some(Outcome::Failed(reason)) => reason.clone(),
                _ => String::new(),
            };
        }
        let _ = self.redraw.send(());

        // keep the loading marker up long enough to see it
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            completion.complete();
        });
    }

    fn did_start_loading(&self, silent: bool) {
        if !silent {
            self.view.lock().loading = true;
            let _ = self.redraw.send(());
        }
    }

    fn did_finish_loading(&self, _state: &Arc<AppState>, silent: bool) {
        if !silent {
            self.view.lock().loading = false;
            let _ = self.redraw.send(());
        }
    }

    fn is_action_silent(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Appeared)
    }
}

/// Subscriber "B": a feed of recent updates.
struct ActivityFeed {
    lines: Mutex<VecDeque<String>>,
    redraw: mpsc::UnboundedSender<()>,
}

const FEED_LEN: usize = 5;

impl Subscriber<AppState, AppAction> for ActivityFeed {
    fn subscription_name(&self) -> &str {
        "B"
    }

    fn state_did_update(
        &self,
        source: &ActionEnvelop<AppAction>,
        old: &Arc<AppState>,
        new: &Arc<AppState>,
        completion: Completion,
    ) {
        let line = format!(
            "{} from {}: {} -> {}",
            source.action().name(),
            source.emitter(),
            old.count,
            new.count
        );
        {
            let mut lines = self.lines.lock();
            if lines.len() == FEED_LEN {
                lines.pop_back();
            }
            lines.push_front(line);
        }
        let _ = self.redraw.send(());
        completion.complete();
    }
}

// ============================================================================
// Main - Setup terminal, run event loop, cleanup
// ============================================================================

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_file_logging(path)?;
    }

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &args).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn init_file_logging(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .try_init();
    Ok(())
}

/// Forward crossterm events into the app loop until cancelled.
fn spawn_event_poller(
    tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(16)) => {
                    while event::poll(Duration::from_millis(10)).unwrap_or(false) {
                        let Ok(evt) = event::read() else { continue };
                        if tx.send(evt).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    })
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    args: &Args,
) -> io::Result<()> {
    let (redraw_tx, mut redraw_rx) = mpsc::unbounded_channel::<()>();

    // Store = state + reducer + action log
    let filter = ActionLoggerConfig::new(args.log_include.as_deref(), args.log_exclude.as_deref());
    let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::new(50, filter));
    let log = logger.log();
    let initial = AppState {
        count: args.start,
        last: None,
    };
    let store = Store::with_middleware(initial, reducer, StoreConfig::default(), logger)
        .map_err(io::Error::other)?;

    let panel = Arc::new(CounterPanel::new(args.start, redraw_tx.clone()));
    let feed = Arc::new(ActivityFeed {
        lines: Mutex::new(VecDeque::with_capacity(FEED_LEN)),
        redraw: redraw_tx,
    });
    store.subscribe(&panel).map_err(io::Error::other)?;
    store.subscribe(&feed).map_err(io::Error::other)?;

    // the view is on screen
    report(panel.dispatch_to_store(AppAction::Appeared, &store));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let cancel_token = CancellationToken::new();
    let _handle = spawn_event_poller(event_tx, cancel_token.clone());

    let mut should_render = true;

    loop {
        if should_render {
            terminal.draw(|frame| render(frame, &panel, &feed, log.as_ref()))?;
            should_render = false;
        }

        tokio::select! {
            Some(evt) = event_rx.recv() => {
                match evt {
                    Event::Key(key) => match key.code {
                        KeyCode::Char('k') | KeyCode::Up => {
                            report(panel.dispatch_to_store(AppAction::Increment, &store));
                        }
                        KeyCode::Char('j') | KeyCode::Down => {
                            report(panel.dispatch_to_store(AppAction::Decrement, &store));
                        }
                        KeyCode::Char('r') => {
                            report(panel.dispatch_with(
                                AppAction::Reset,
                                &store,
                                DestScope::Emitter,
                                None,
                            ));
                        }
                        KeyCode::Char('b') => {
                            report(feed.dispatch_to_store(AppAction::Increment, &store));
                        }
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => {}
                    },
                    Event::Resize(..) => should_render = true,
                    _ => {}
                }
            }

            Some(()) = redraw_rx.recv() => {
                should_render = true;
            }
        }
    }

    cancel_token.cancel();
    store.shutdown();
    Ok(())
}

fn report(result: Result<(), statecast::StoreError>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "dispatch failed");
    }
}

fn render(
    frame: &mut ratatui::Frame,
    panel: &CounterPanel,
    feed: &ActivityFeed,
    log: Option<&SharedActionLog>,
) {
    let area = frame.area();

    let [_, center, feed_area, log_area, help_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(5),
        Constraint::Length(FEED_LEN as u16 + 2),
        Constraint::Length(5),
        Constraint::Length(1),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(30),
        Constraint::Fill(1),
    ])
    .flex(Flex::Center)
    .areas(center);

    // Counter (A)
    let (text, border) = {
        let view = panel.view.lock();
        let marker = if view.loading { " …" } else { "" };
        let mut text = format!("{}{}", view.count, marker);
        if !view.status.is_empty() {
            text.push('\n');
            text.push_str(&view.status);
        }
        let border = if view.loading { Color::Yellow } else { Color::Cyan };
        (text, border)
    };
    let block = Block::default()
        .title(" Counter (A) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(block),
        center,
    );

    // Activity feed (B)
    let lines: Vec<String> = feed.lines.lock().iter().cloned().collect();
    frame.render_widget(
        Paragraph::new(lines.join("\n"))
            .block(Block::default().title(" Activity (B) ").borders(Borders::ALL)),
        feed_area,
    );

    // Action log
    let recent = log
        .map(|log| {
            log.lock()
                .recent(3)
                .map(|entry| {
                    format!(
                        "#{} {} by {} [{}]",
                        entry.sequence, entry.summary, entry.emitter, entry.scope
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    frame.render_widget(
        Paragraph::new(recent)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title(" Action log ").borders(Borders::ALL)),
        log_area,
    );

    let help = Paragraph::new("k/Up: +1  j/Down: -1  r: reset (A only)  b: +1 from B  q: quit")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area);
}
