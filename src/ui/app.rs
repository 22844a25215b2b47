use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use std::io;
use std::time::Duration;

use usagewatch_core::monitor::MonitorHandle;
use usagewatch_core::state::StatusSnapshot;

use crate::config::Settings;
use crate::runner;

use super::components::UsagePanel;

/// Terminal popup driving a background orchestrator
pub struct App {
    settings: Settings,
    snapshot: StatusSnapshot,
    /// Footer message replacing the key hints
    notice: Option<String>,
    running: bool,
}

impl App {
    /// Create a new application
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            snapshot: StatusSnapshot::default(),
            notice: None,
            running: true,
        }
    }

    /// Run the application
    pub async fn run(&mut self) -> Result<()> {
        // Fail before touching the terminal if the source is misconfigured
        let handle = runner::build_orchestrator(&self.settings)?
            .spawn(runner::interval(&self.settings));
        self.snapshot = handle.snapshot();

        // Setup terminal
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal, &handle).await;

        // Restore terminal
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        terminal.show_cursor()?;

        handle.shutdown().await;
        result
    }

    async fn main_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        handle: &MonitorHandle,
    ) -> Result<()> {
        let mut updates = handle.subscribe();

        while self.running {
            terminal.draw(|frame| {
                let area = frame.area();
                let panel = Rect {
                    height: area.height.min(UsagePanel::HEIGHT),
                    ..area
                };
                UsagePanel::render(
                    frame,
                    panel,
                    &self.snapshot,
                    self.notice.as_deref(),
                    self.settings.ui.color,
                );
            })?;

            // Handle events with timeout
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers, handle);
                    }
                }
            }

            // Apply completed cycles
            if updates.has_changed().unwrap_or(false) {
                self.snapshot = updates.borrow_and_update().clone();
                self.notice = None;
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, handle: &MonitorHandle) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false
            }
            KeyCode::Char('r') => {
                self.notice = Some(if handle.scrape_now() {
                    " Scraping...".to_string()
                } else {
                    " Scrape already pending".to_string()
                });
            }
            _ => {}
        }
    }
}
