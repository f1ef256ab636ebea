use std::path::PathBuf;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossbeam_channel::Receiver;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use quality_core::{CompletedReport, LogEnvelope, PendingReport, ReportClient, UserEvent, ViewerSession};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

use crate::map_view::MapViewport;
use crate::ui::{draw_ui, map_inner, UiState};

pub struct ViewerApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    session: ViewerSession,
    viewport: MapViewport,
    client: ReportClient,
    job_sender: UnboundedSender<PendingReport>,
    completed_receiver: UnboundedReceiver<CompletedReport>,
    log_receiver: Receiver<LogEnvelope>,
    export_dir: PathBuf,
}

impl ViewerApp {
    pub fn new(
        session: ViewerSession,
        client: ReportClient,
        job_sender: UnboundedSender<PendingReport>,
        completed_receiver: UnboundedReceiver<CompletedReport>,
        log_receiver: Receiver<LogEnvelope>,
        export_dir: PathBuf,
    ) -> Result<Self> {
        let mut stdout = std::io::stdout();
        crossterm::execute!(stdout, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        let viewport = MapViewport::from_bounds(session.layers().bounds());
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            session,
            viewport,
            client,
            job_sender,
            completed_receiver,
            log_receiver,
            export_dir,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now() - Duration::from_secs(1);

        loop {
            while let Ok(completed) = self.completed_receiver.try_recv() {
                self.session.finish_submit(completed);
            }

            while let Ok(envelope) = self.log_receiver.try_recv() {
                self.ui_state.push_log(envelope.summary());
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.terminal.draw(|frame| {
                    draw_ui(frame, &self.ui_state, &self.session, &self.viewport)
                })?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse)?,
                    _ => {}
                }
            }
        }

        self.terminal.show_cursor()?;
        crossterm::execute!(std::io::stdout(), DisableMouseCapture)?;
        crossterm::terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Returns `false` when the viewer should quit.
    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
            KeyCode::Char('t') => {
                self.session.handle(UserEvent::NextTopic);
            }
            KeyCode::Char('T') => {
                self.session.handle(UserEvent::PreviousTopic);
            }
            KeyCode::Char('g') => self.submit(),
            KeyCode::Char('x') => {
                if !self.session.cancel_pending() {
                    self.ui_state.push_log("No request in flight");
                }
            }
            KeyCode::Char('e') => {
                // Failures land in the session notice.
                let _ = self.session.export(&self.export_dir);
            }
            KeyCode::Char('c') => {
                self.session.handle(UserEvent::ClearSelection);
            }
            KeyCode::Char(digit @ '1'..='9') => {
                let layer = digit as usize - '1' as usize;
                self.session.handle(UserEvent::ToggleLayer(layer));
            }
            KeyCode::Left => self.move_pointer(-1, 0)?,
            KeyCode::Right => self.move_pointer(1, 0)?,
            KeyCode::Up => self.move_pointer(0, -1)?,
            KeyCode::Down => self.move_pointer(0, 1)?,
            KeyCode::Enter => {
                if let Some((column, row)) = self.ui_state.pointer {
                    self.click_at(column, row)?;
                }
            }
            _ => {}
        }
        Ok(true)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                self.hover_at(mouse.column, mouse.row)?
            }
            MouseEventKind::Down(MouseButton::Left) => self.click_at(mouse.column, mouse.row)?,
            _ => {}
        }
        Ok(())
    }

    fn map_area(&self) -> Result<Rect> {
        Ok(map_inner(self.terminal.size()?))
    }

    fn hover_at(&mut self, column: u16, row: u16) -> Result<()> {
        let area = self.map_area()?;
        match self.viewport.cell_to_geo(area, column, row) {
            Some((lon, lat)) => {
                self.ui_state.pointer = Some((column, row));
                self.session.handle(UserEvent::PointerMoved { lon, lat });
            }
            None => {
                if self.ui_state.pointer.take().is_some() {
                    self.session.handle(UserEvent::PointerLeft);
                }
            }
        }
        Ok(())
    }

    fn click_at(&mut self, column: u16, row: u16) -> Result<()> {
        let area = self.map_area()?;
        if let Some((lon, lat)) = self.viewport.cell_to_geo(area, column, row) {
            self.session.handle(UserEvent::MapClicked { lon, lat });
        }
        Ok(())
    }

    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()> {
        let area = self.map_area()?;
        if area.width == 0 || area.height == 0 {
            return Ok(());
        }
        let (column, row) = self
            .ui_state
            .pointer
            .unwrap_or((area.x + area.width / 2, area.y + area.height / 2));
        let column = (i32::from(column) + dx).clamp(
            i32::from(area.x),
            i32::from(area.x + area.width - 1),
        );
        let row = (i32::from(row) + dy).clamp(
            i32::from(area.y),
            i32::from(area.y + area.height - 1),
        );
        // Clamped into the map area, so both fit in u16.
        self.hover_at(column as u16, row as u16)
    }

    fn submit(&mut self) {
        let Ok(pending) = self.session.begin_submit(&self.client) else {
            return;
        };
        let request_id = pending.request_id();
        if self.job_sender.send(pending).is_err() {
            // The unsent request was dropped with the error, releasing its guard.
            error!(target: "quality::report", request_id, "report.dispatch_failed");
            self.session.abandon_pending();
        } else {
            info!(target: "quality::report", request_id, "report.dispatched");
        }
    }
}
