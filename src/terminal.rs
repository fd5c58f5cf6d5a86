// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based camera viewer
//!
//! Renders the filtered feed to the terminal using Unicode half-block
//! characters for improved vertical resolution.

use crate::app::{
    CaptureLoop, Command, CommandSource, KeyInput, LoopEvent, PresentationSurface,
    build_capture_loop,
};
use crate::backends::camera::types::{CameraFrame, SourceSpec};
use crate::app::filters::IDENTITY;
use crate::config::Config;

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::cell::RefCell;
use std::io::{self, stdout};
use std::rc::Rc;
use std::time::Duration;
use tracing::{error, info};

/// How long one input poll may wait
const INPUT_POLL: Duration = Duration::from_millis(16);

/// Run the terminal camera viewer
pub fn run(config: &Config, source: &SourceSpec) -> Result<(), Box<dyn std::error::Error>> {
    // Open the camera before touching the terminal so errors print normally
    let mut capture = build_capture_loop(config, source)?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;

    let input = Rc::new(RefCell::new(KeyInput::new()));
    let mut keyboard = KeyboardCommands {
        input: Rc::clone(&input),
    };
    let mut surface = TerminalSurface::new(terminal, &capture, input);
    let outcome = capture.run(&mut surface, &mut keyboard);
    info!(?outcome, "Terminal viewer finished");

    // Restore terminal
    let mut terminal = surface.terminal;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(e) = surface.draw_error {
        return Err(e.into());
    }
    Ok(())
}

/// Commands from the keyboard, one poll per tick
struct KeyboardCommands {
    input: Rc<RefCell<KeyInput>>,
}

impl CommandSource for KeyboardCommands {
    fn poll_command(&mut self) -> Option<Command> {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => self.input.borrow_mut().handle(&key),
                Ok(_) => None,
                Err(e) => {
                    error!(error = %e, "Failed to read terminal event");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                error!(error = %e, "Failed to poll terminal events");
                None
            }
        }
    }
}

struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    frame_widget: FrameWidget,
    filter: String,
    filter_names: Vec<String>,
    recording: bool,
    show_help: bool,
    status_message: String,
    input: Rc<RefCell<KeyInput>>,
    draw_error: Option<io::Error>,
}

impl TerminalSurface {
    fn new(
        terminal: Terminal<CrosstermBackend<io::Stdout>>,
        capture: &CaptureLoop,
        input: Rc<RefCell<KeyInput>>,
    ) -> Self {
        Self {
            terminal,
            frame_widget: FrameWidget::new(),
            filter: IDENTITY.to_string(),
            filter_names: capture.filters().names().map(str::to_string).collect(),
            recording: false,
            show_help: false,
            status_message: build_status_message(),
            input,
            draw_error: None,
        }
    }

    fn draw(&mut self) {
        let status_line = if let Some(line) = self.input.borrow().prompt() {
            build_prompt_message(line)
        } else if self.show_help {
            build_help_message(&self.filter_names)
        } else {
            format!("[{}] {}", self.filter, self.status_message)
        };
        let recording = self.recording;
        let frame_widget = &self.frame_widget;

        let result = self.terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            f.render_widget(frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            let status = StatusBar {
                message: &status_line,
                recording,
            };
            f.render_widget(status, status_area);
        });

        if let Err(e) = result
            && self.draw_error.is_none()
        {
            error!(error = %e, "Failed to draw terminal frame");
            self.draw_error = Some(e);
        }
    }
}

impl PresentationSurface for TerminalSurface {
    fn present(&mut self, frame: &CameraFrame, recording: bool) {
        self.recording = recording;
        self.frame_widget.update_frame(frame.clone());
        self.draw();
    }

    fn notify(&mut self, event: &LoopEvent) {
        match event {
            LoopEvent::FilterSelected(name) => self.filter = name.clone(),
            LoopEvent::RecordingStarted(_) => self.recording = true,
            LoopEvent::RecordingStopped(_) => self.recording = false,
            LoopEvent::HelpToggled => {
                self.show_help = !self.show_help;
                self.draw();
                return;
            }
            _ => {}
        }
        self.status_message = event.to_string();
        self.draw();
    }
}

fn build_status_message() -> String {
    "p: photo | r: record | 0-8/f: filter | s: source | h: help | q: quit".to_string()
}

fn build_prompt_message(line: &str) -> String {
    format!("Source: {}_  (Enter: open, Esc: cancel)", line)
}

fn build_help_message(filters: &[String]) -> String {
    let listing: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}:{}", i, name))
        .collect();
    format!("{} | h: close help", listing.join("  "))
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    frame: Option<CameraFrame>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: CameraFrame) {
        self.frame = Some(frame);
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.width() > 0 && f.height() > 0)
        else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        let (display_width, display_height) =
            fit_half_blocks(frame.dimensions(), (area.width, area.height));
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        // Scale factors
        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height as f64 * 2.0);

        // Each terminal cell represents 2 vertical pixels:
        // - Upper half (▀) colored with fg
        // - Lower half colored with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Cells (columns, rows) that fit `frame` into `area` at its aspect ratio
fn fit_half_blocks(frame: (u32, u32), area: (u16, u16)) -> (u16, u16) {
    let frame_aspect = frame.0 as f64 / frame.1 as f64;
    let term_width = area.0 as f64;
    let term_height = area.1 as f64 * 2.0; // *2 because half-blocks

    if term_width / term_height > frame_aspect {
        // Terminal is wider - fit to height
        let h = term_height;
        let w = h * frame_aspect;
        (w as u16, (h / 2.0) as u16)
    } else {
        // Terminal is taller - fit to width
        let w = term_width;
        let h = w / frame_aspect;
        (w as u16, (h / 2.0) as u16)
    }
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let px = frame.image.get_pixel(x, y);
    Color::Rgb(px[0], px[1], px[2])
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    recording: bool,
}

const REC_BADGE: &str = " ● REC ";

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let mut x = area.x;
        let mut width = area.width as usize;
        if self.recording && width > REC_BADGE.chars().count() {
            buf.set_string(
                x,
                area.y,
                REC_BADGE,
                ratatui::style::Style::default()
                    .fg(Color::White)
                    .bg(Color::Red),
            );
            let badge = REC_BADGE.chars().count();
            x += badge as u16;
            width -= badge;
        }

        // Render text, truncated on a char boundary
        let text: String = self.message.chars().take(width).collect();

        buf.set_string(
            x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_ratio() {
        // 4:3 frame in an 80x24 terminal: limited by height (48 pixel rows)
        assert_eq!(fit_half_blocks((640, 480), (80, 24)), (64, 24));
        // Wide frame in a tall terminal: limited by width
        assert_eq!(fit_half_blocks((200, 50), (40, 40)), (40, 5));
    }

    #[test]
    fn frame_renders_half_blocks() {
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        let mut widget = FrameWidget::new();
        widget.update_frame(CameraFrame::solid(4, 4, [10, 20, 30]));
        (&widget).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn status_bar_shows_rec_badge() {
        let area = Rect::new(0, 0, 30, 1);
        let mut buf = Buffer::empty(area);
        StatusBar {
            message: "Grayscale",
            recording: true,
        }
        .render(area, &mut buf);

        assert_eq!(buf[(1, 0)].symbol(), "●");
        assert_eq!(buf[(1, 0)].bg, Color::Red);
        assert_eq!(buf[(7, 0)].symbol(), "G");
    }

    #[test]
    fn prompt_shows_typed_source() {
        let message = build_prompt_message("rtsp://cam");
        assert!(message.starts_with("Source: rtsp://cam_"));
        assert!(build_status_message().contains("s: source"));
    }

    #[test]
    fn help_lists_filters_by_index() {
        let names = vec!["None".to_string(), "Grayscale".to_string()];
        assert!(build_help_message(&names).starts_with("0:None  1:Grayscale"));
    }
}
