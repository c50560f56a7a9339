#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use tempfile::TempDir;

use tdmon::config::Config;
use tdmon::issue::{Issue, Status};
use tdmon::store::{IssueStore, JsonStore};
use tdmon::tui::app::{App, AppOptions, Effect, Msg};
use tdmon::tui::effects::{self, EffectContext};
use tdmon::tui::update::update;

pub const SESSION: &str = "ses_test";

/// Config with the base dir and database both inside the temp dir.
pub fn test_config(tmp: &TempDir) -> Config {
    Config::new(tmp.path().join(".tdmon"), tmp.path().join(".todos"))
}

/// A fresh database seeded with `issues`.
pub fn test_store(config: &Config, issues: &[Issue]) -> Arc<JsonStore> {
    let store = JsonStore::init(&config.data_dir).unwrap();
    for issue in issues {
        store.insert_issue(issue.clone()).unwrap();
    }
    Arc::new(store)
}

pub fn issue(id: &str, title: &str, status: Status) -> Issue {
    let mut issue = Issue::new(id, title);
    issue.status = status;
    issue
}

/// An app on an 80x24 terminal.
pub fn test_app(config: &Config) -> App {
    App::new(
        config.clone(),
        config.load_file(),
        AppOptions {
            session: SESSION.to_string(),
            embedded: false,
            refresh: Duration::from_secs(2),
        },
    )
}

/// Wires an app to a seeded store and runs the startup fetch.
pub struct Harness {
    pub app: App,
    pub ctx: EffectContext,
    pub store: Arc<JsonStore>,
    _tmp: TempDir,
}

impl Harness {
    pub fn new(issues: &[Issue]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp);
        let store = test_store(&config, issues);
        let dyn_store: Arc<dyn IssueStore> = store.clone();
        let ctx = EffectContext {
            store: dyn_store,
            session: SESSION.to_string(),
            config: config.clone(),
        };
        let mut harness = Self {
            app: test_app(&config),
            ctx,
            store,
            _tmp: tmp,
        };
        if let Some(effect) = harness.app.init() {
            harness.run(effect);
        }
        harness
    }

    /// Feed a message and execute every effect it leads to, synchronously.
    pub fn send(&mut self, msg: Msg) {
        if let Some(effect) = update(&mut self.app, msg) {
            self.run(effect);
        }
    }

    pub fn run(&mut self, effect: Effect) {
        let mut pending = effect.flatten();
        while !pending.is_empty() {
            let effect = pending.remove(0);
            if matches!(effect, Effect::OpenEditor { .. } | Effect::CopyToClipboard(_)) {
                continue;
            }
            for msg in effects::execute(effect, &self.ctx) {
                if let Some(next) = update(&mut self.app, msg) {
                    pending.extend(next.flatten());
                }
            }
        }
    }

    pub fn press(&mut self, code: KeyCode) {
        self.send(Msg::Key(key(code)));
    }

    pub fn type_str(&mut self, text: &str) {
        for c in text.chars() {
            self.press(KeyCode::Char(c));
        }
    }
}

pub fn key(code: KeyCode) -> KeyEvent {
    let mods = match code {
        KeyCode::Char(c) if c.is_ascii_uppercase() => KeyModifiers::SHIFT,
        _ => KeyModifiers::NONE,
    };
    KeyEvent::new(code, mods)
}

pub fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
}

pub fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
    MouseEvent {
        kind,
        column,
        row,
        modifiers: KeyModifiers::NONE,
    }
}

pub fn click(column: u16, row: u16) -> MouseEvent {
    mouse(MouseEventKind::Down(MouseButton::Left), column, row)
}
