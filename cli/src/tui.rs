//! Full-screen chat session.
//!
//! A raw-mode ratatui loop over three vertical regions: transcript, input
//! box, footer. Enter submits the input line to the query engine; the loop
//! blocks on the answer (queries against a local model are the long pole,
//! and there is nothing else to interact with while one runs). Esc or
//! Ctrl-C quits.

use std::io::{Stdout, stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use sage_engine::QueryEngine;
use sage_index::Store;
use sage_types::{ChatRole, ChatTurn};

use crate::footer::Footer;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// RAII wrapper for terminal state with guaranteed cleanup on drop.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        let terminal = match Terminal::new(CrosstermBackend::new(out)) {
            Ok(t) => t,
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen);
                return Err(err.into());
            }
        };

        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

struct ChatState {
    transcript: Vec<ChatTurn>,
    input: String,
    status: Option<String>,
    footer: Footer,
}

impl ChatState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            input: String::new(),
            status: None,
            footer: Footer::new(),
        }
    }
}

/// Run the chat session until the user quits.
pub async fn run(engine: &QueryEngine, store: &mut Store) -> Result<()> {
    let mut session = TerminalSession::new()?;
    let mut state = ChatState::new();

    loop {
        session.terminal.draw(|frame| draw(frame, &state))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Esc => break,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char(c) => state.input.push(c),
            KeyCode::Backspace => {
                state.input.pop();
            }
            KeyCode::Enter => {
                let question = state.input.trim().to_string();
                if question.is_empty() {
                    continue;
                }
                state.input.clear();

                state.status = Some("thinking...".to_string());
                session.terminal.draw(|frame| draw(frame, &state))?;

                submit(engine, store, &mut state, &question).await;
                state.status = None;
            }
            _ => {}
        }
    }

    Ok(())
}

async fn submit(engine: &QueryEngine, store: &mut Store, state: &mut ChatState, question: &str) {
    let history = state.transcript.clone();
    state.transcript.push(ChatTurn::user(question));

    match engine.answer(store, question, &history).await {
        Ok(outcome) => {
            state.transcript.push(ChatTurn::assistant(outcome.response));
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "query failed");
            state
                .transcript
                .push(ChatTurn::assistant(format!("Error: {err:#}")));
        }
    }
}

fn draw(frame: &mut ratatui::Frame<'_>, state: &ChatState) {
    let [transcript_area, input_area, footer_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let mut lines: Vec<Line<'_>> = Vec::new();
    for turn in &state.transcript {
        let label = match turn.role {
            ChatRole::User => "You",
            ChatRole::Assistant => "Sage",
        };
        lines.push(Line::from(Span::raw(format!("{label}:"))));
        for text_line in turn.content.lines() {
            lines.push(Line::from(format!("  {text_line}")));
        }
        lines.push(Line::default());
    }
    if let Some(status) = &state.status {
        lines.push(Line::from(status.clone()));
    }

    // Keep the tail of the transcript visible.
    let visible = transcript_area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Sage"))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        transcript_area,
    );

    frame.render_widget(
        Paragraph::new(state.input.as_str())
            .block(Block::default().borders(Borders::ALL).title("Ask")),
        input_area,
    );

    frame.render_widget(&state.footer, footer_area);
}
