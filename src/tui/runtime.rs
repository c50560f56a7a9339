use anyhow::{Context as _, Result};
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

use crate::config::Config;
use crate::store::IssueStore;

use super::app::{App, AppOptions, Effect, Msg};
use super::effects::{self, EffectContext};
use super::form::FieldId;
use super::{editor, ui, update};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Async worker threads; store calls go to tokio's blocking pool.
const WORKERS: usize = 2;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run_tui(config: Config, store: Arc<dyn IssueStore>, options: AppOptions) -> Result<()> {
    let config_file = config.load_file();
    let mut app = App::new(config.clone(), config_file, options);
    let ctx = EffectContext {
        store,
        session: app.session.clone(),
        config,
    };
    let mut executor = Executor::new(ctx)?;

    let mut terminal = setup_terminal()?;
    let size = terminal.size()?;
    app.area = Rect::new(0, 0, size.width, size.height);
    tracing::info!(session = %app.session, width = size.width, height = size.height, "monitor started");

    if let Some(effect) = app.init() {
        executor.submit(effect);
    }
    let outcome = event_loop(&mut terminal, &mut app, &mut executor);

    restore_terminal(&mut terminal)?;
    executor.shutdown();
    tracing::info!("monitor stopped");
    outcome
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

fn event_loop(terminal: &mut Tui, app: &mut App, executor: &mut Executor) -> Result<()> {
    let mut last_refresh = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(POLL_INTERVAL)? {
            let msg = match event::read()? {
                Event::Key(key) => Some(Msg::Key(key)),
                Event::Mouse(mouse) => Some(Msg::Mouse(mouse)),
                Event::Resize(w, h) => Some(Msg::Resize(w, h)),
                _ => None,
            };
            if let Some(msg) = msg {
                process(terminal, app, msg, executor)?;
            }
        }

        while let Some(msg) = executor.try_recv() {
            process(terminal, app, msg, executor)?;
        }

        if app.should_quit {
            break;
        }

        if last_refresh.elapsed() >= app.refresh {
            process(terminal, app, Msg::Tick, executor)?;
            last_refresh = Instant::now();
        }

        app.clear_old_status();
    }
    Ok(())
}

/// Apply a message and route its effects: the editor runs here, the rest on the executor.
fn process(terminal: &mut Tui, app: &mut App, msg: Msg, executor: &mut Executor) -> Result<()> {
    let mut queue = VecDeque::from([msg]);
    while let Some(msg) = queue.pop_front() {
        let Some(effect) = update::update(app, msg) else {
            continue;
        };
        for effect in effect.flatten() {
            match effect {
                Effect::OpenEditor { field, text } => queue.push_back(run_editor(terminal, field, &text)?),
                other => executor.submit(other),
            }
        }
    }
    Ok(())
}

/// Hand the terminal to `$EDITOR` and take it back afterwards.
fn run_editor(terminal: &mut Tui, field: FieldId, text: &str) -> Result<Msg> {
    restore_terminal(terminal)?;
    let result = editor::edit_text(text).map_err(|e| e.to_string());
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen, EnableMouseCapture)?;
    terminal.clear()?;
    if let Err(error) = &result {
        tracing::warn!(field = field.title(), error = %error, "external editor failed");
    }
    Ok(Msg::EditorFinished { field, result })
}

/// Runs effects off the UI thread and queues the messages they produce.
pub struct Executor {
    runtime: Runtime,
    ctx: EffectContext,
    tx: UnboundedSender<Msg>,
    rx: UnboundedReceiver<Msg>,
    preview: Option<AbortHandle>,
}

impl Executor {
    pub fn new(ctx: EffectContext) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKERS)
            .thread_name("tdmon-worker")
            .enable_all()
            .build()
            .context("failed to start the effect runtime")?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            runtime,
            ctx,
            tx,
            rx,
            preview: None,
        })
    }

    pub fn submit(&mut self, effect: Effect) {
        for effect in effect.flatten() {
            match effect {
                Effect::ScheduleQueryPreview { token, delay } => {
                    if let Some(pending) = self.preview.take() {
                        pending.abort();
                    }
                    let tx = self.tx.clone();
                    let task = self.runtime.spawn(async move {
                        tokio::time::sleep(delay).await;
                        tx.send(Msg::QueryPreviewTick { token }).ok();
                    });
                    self.preview = Some(task.abort_handle());
                }
                other => {
                    let tx = self.tx.clone();
                    let ctx = self.ctx.clone();
                    self.runtime.spawn_blocking(move || {
                        for msg in effects::execute(other, &ctx) {
                            if tx.send(msg).is_err() {
                                tracing::debug!("monitor gone, dropping effect result");
                                return;
                            }
                        }
                    });
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Msg> {
        self.rx.try_recv().ok()
    }

    /// Stop without waiting on store calls still in flight.
    pub fn shutdown(self) {
        self.runtime.shutdown_background();
    }
}
