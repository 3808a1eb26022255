// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Text;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tracing::warn;

use coda_core::{ConversationStore, UiEvent};

use crate::editor::{Editor, EditorAction, Mode};
use crate::pipeline::INSTRUCTION_QUEUE_CAPACITY;

/// Redraw cadence while idle; also bounds how stale the status line can be.
const TICK_MS: u64 = 50;

/// Outcome of one submitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    /// Forwarded to the worker.
    Queued,
    /// Consumed locally (command or blank line).
    Handled,
    /// The session should end.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Exit,
}

/// The interactive terminal application: single-threaded renderer, input
/// dispatch, and the consumer side of the UI queue.
pub struct App {
    editor: Editor,
    transcript: Vec<String>,
    status: String,
    /// Model identifier shown in the status pane; static per session.
    model: String,
    /// Tool executions completed this session, from [`UiEvent::Stats`].
    tools_completed: usize,
    /// True from submitting an instruction until the worker reports ready
    /// or cancelled.
    busy: bool,
    /// First Ctrl+C while idle arms the exit confirmation; any other key
    /// disarms it.
    exit_armed: bool,
    interrupt: Arc<AtomicBool>,
    store: Arc<ConversationStore>,
    instruction_tx: mpsc::Sender<String>,
    ui_rx: mpsc::Receiver<UiEvent>,
}

impl App {
    pub fn new(
        store: Arc<ConversationStore>,
        interrupt: Arc<AtomicBool>,
        instruction_tx: mpsc::Sender<String>,
        ui_rx: mpsc::Receiver<UiEvent>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            editor: Editor::new(),
            transcript: Vec::new(),
            status: "ready".into(),
            model: model.into(),
            tools_completed: 0,
            busy: false,
            exit_armed: false,
            interrupt,
            store,
            instruction_tx,
            ui_rx,
        }
    }

    /// Run the event loop until exit.  The terminal is restored on every
    /// path out, including panics (guard below).
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        let _guard = RestoreGuard;
        let result = self.event_loop(&mut terminal).await;
        // Explicit restore for the normal path; the guard covers unwinding.
        restore_terminal();
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let mut events = EventStream::new();
        loop {
            terminal.draw(|f| self.draw(f)).context("drawing frame")?;

            tokio::select! {
                maybe_event = events.next() => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                            if self.handle_key(key).await == LoopControl::Exit {
                                break;
                            }
                        }
                        // Resize: the next draw picks up the new geometry.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e).context("terminal event stream"),
                        None => break,
                    }
                }
                ui_event = self.ui_rx.recv() => {
                    if let Some(ev) = ui_event {
                        self.apply_ui_event(ev);
                        // Drain whatever else is queued before redrawing.
                        while let Ok(ev) = self.ui_rx.try_recv() {
                            self.apply_ui_event(ev);
                        }
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(TICK_MS)) => {}
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) -> LoopControl {
        match self.editor.handle_key(key) {
            EditorAction::Interrupt => self.on_ctrl_c(),
            EditorAction::Eof => LoopControl::Exit,
            EditorAction::Submit(text) => {
                self.exit_armed = false;
                match self.submit(text).await {
                    SubmitAction::Exit => LoopControl::Exit,
                    SubmitAction::Queued | SubmitAction::Handled => LoopControl::Continue,
                }
            }
            EditorAction::None => {
                self.exit_armed = false;
                LoopControl::Continue
            }
        }
    }

    /// Ctrl+C: cancel running work, or (when idle) arm/confirm exit.
    fn on_ctrl_c(&mut self) -> LoopControl {
        let queued = INSTRUCTION_QUEUE_CAPACITY - self.instruction_tx.capacity();
        let work_in_progress =
            self.busy || queued > 0 || self.interrupt.load(Ordering::SeqCst);
        if work_in_progress {
            self.interrupt.store(true, Ordering::SeqCst);
            self.status = "cancelling…".into();
            return LoopControl::Continue;
        }
        if self.exit_armed {
            return LoopControl::Exit;
        }
        self.exit_armed = true;
        self.status = "press Ctrl+C again to exit".into();
        LoopControl::Continue
    }

    async fn submit(&mut self, text: String) -> SubmitAction {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SubmitAction::Handled;
        }
        match trimmed {
            "exit" | "quit" | "/exit" | "/quit" => SubmitAction::Exit,
            "/clear" => {
                self.store.clear();
                self.transcript.clear();
                self.status = "conversation cleared".into();
                SubmitAction::Handled
            }
            _ => {
                self.transcript.push(format!("> {trimmed}"));
                self.busy = true;
                // May block briefly when the worker is behind; that
                // back-pressure is the queue bound doing its job.
                if self.instruction_tx.send(text).await.is_err() {
                    warn!("instruction queue closed; worker is gone");
                    self.status = "worker unavailable".into();
                    self.busy = false;
                    return SubmitAction::Handled;
                }
                SubmitAction::Queued
            }
        }
    }

    /// Status pane text: activity, model name, and the cumulative count of
    /// completed tool executions.
    fn status_line(&self) -> String {
        format!("{} | {} | {} tools run", self.status, self.model, self.tools_completed)
    }

    fn apply_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::AddLine(text) => {
                for line in text.lines() {
                    self.transcript.push(line.to_string());
                }
            }
            UiEvent::Status(s) => {
                if s == "ready" || s == "cancelled" {
                    self.busy = false;
                }
                self.status = s;
            }
            UiEvent::Stats { tools_completed } => self.tools_completed = tools_completed,
            UiEvent::Error(e) => {
                self.transcript.push(format!("[Error] {e}"));
                self.busy = false;
            }
            UiEvent::Clear => self.transcript.clear(),
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let input_lines = self.editor.text().lines().count().max(1) as u16;
        let [transcript_area, status_area, input_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(input_lines + 2),
        ])
        .areas(frame.area());

        // Transcript: tail that fits the pane.
        let visible = transcript_area.height as usize;
        let skip = self.transcript.len().saturating_sub(visible);
        let body = self.transcript[skip..].join("\n");
        frame.render_widget(
            Paragraph::new(Text::raw(body)).wrap(Wrap { trim: false }),
            transcript_area,
        );

        // Status line: current activity plus the session counters.
        frame.render_widget(
            Paragraph::new(self.status_line())
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::DIM)),
            status_area,
        );

        // Input box with the editor mode in the title.
        let mode = match self.editor.mode() {
            Mode::Insert => "INSERT",
            Mode::Normal => "NORMAL",
        };
        frame.render_widget(
            Paragraph::new(self.editor.text())
                .block(Block::default().borders(Borders::ALL).title(mode)),
            input_area,
        );
        let (row, col) = self.editor.cursor_row_col();
        frame.set_cursor_position((
            input_area.x + 1 + col as u16,
            input_area.y + 1 + row as u16,
        ));
    }
}

// ── Terminal lifecycle ────────────────────────────────────────────────────────

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("creating terminal")
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen);
}

/// Restores the terminal when dropped, so a panic in the event loop does
/// not leave the user's shell in raw mode.
struct RestoreGuard;

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
