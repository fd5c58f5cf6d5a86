// SPDX-License-Identifier: GPL-3.0-only

//! User commands driving the capture loop

use crate::backends::camera::types::SourceSpec;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Which filter to switch to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSelector {
    /// Position in the registry listing
    Index(usize),
    /// Registered name; unknown names behave as the identity
    Name(String),
    /// The entry after the current one, wrapping around
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    SelectFilter(FilterSelector),
    ToggleRecord,
    CapturePhoto,
    ChangeSource(SourceSpec),
    ToggleHelp,
}

impl Command {
    /// Terminal key binding, `None` for unbound keys
    ///
    /// `q`/`Esc`/Ctrl+C quit, `p` photo, `r` record, `0`-`9` filter by index,
    /// `f` next filter, `h` help. `s` is handled by [`KeyInput`], which
    /// opens a prompt for a new source.
    pub fn from_key(key: &KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Command::Quit);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
            KeyCode::Char('p') => Some(Command::CapturePhoto),
            KeyCode::Char('r') => Some(Command::ToggleRecord),
            KeyCode::Char('f') => Some(Command::SelectFilter(FilterSelector::Next)),
            KeyCode::Char('h') => Some(Command::ToggleHelp),
            KeyCode::Char(c) if c.is_ascii_digit() => Some(Command::SelectFilter(
                FilterSelector::Index(c as usize - '0' as usize),
            )),
            _ => None,
        }
    }
}

/// Keyboard state for the terminal viewer
///
/// Outside the source prompt keys map through [`Command::from_key`]. After
/// `s` typed characters collect into a line; Enter switches to the source
/// it names and Esc discards it.
#[derive(Debug, Default)]
pub struct KeyInput {
    prompt: Option<String>,
}

impl KeyInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line typed so far while the source prompt is open
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn handle(&mut self, key: &KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.prompt = None;
            return Some(Command::Quit);
        }

        let Some(line) = self.prompt.as_mut() else {
            if key.code == KeyCode::Char('s') && !ctrl {
                self.prompt = Some(String::new());
                return None;
            }
            return Command::from_key(key);
        };

        match key.code {
            KeyCode::Enter => {
                let line = std::mem::take(line);
                self.prompt = None;
                if line.trim().is_empty() {
                    None
                } else {
                    Some(Command::ChangeSource(SourceSpec::parse(&line)))
                }
            }
            KeyCode::Esc => {
                self.prompt = None;
                None
            }
            KeyCode::Backspace => {
                line.pop();
                None
            }
            KeyCode::Char(c) if !ctrl => {
                line.push(c);
                None
            }
            _ => None,
        }
    }
}

/// Supplies at most one pending command per loop iteration
pub trait CommandSource {
    fn poll_command(&mut self) -> Option<Command>;
}

/// Replays a fixed list of commands, one per poll
///
/// `None` entries stand for iterations without input.
#[derive(Debug, Default)]
pub struct ScriptedCommands {
    queue: std::collections::VecDeque<Option<Command>>,
}

impl ScriptedCommands {
    pub fn new(script: impl IntoIterator<Item = Option<Command>>) -> Self {
        Self {
            queue: script.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl CommandSource for ScriptedCommands {
    fn poll_command(&mut self) -> Option<Command> {
        self.queue.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn key_bindings() {
        assert_eq!(Command::from_key(&press(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(
            Command::from_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(
            Command::from_key(&press(KeyCode::Char('p'))),
            Some(Command::CapturePhoto)
        );
        assert_eq!(
            Command::from_key(&press(KeyCode::Char('r'))),
            Some(Command::ToggleRecord)
        );
        assert_eq!(
            Command::from_key(&press(KeyCode::Char('3'))),
            Some(Command::SelectFilter(FilterSelector::Index(3)))
        );
        assert_eq!(
            Command::from_key(&press(KeyCode::Char('f'))),
            Some(Command::SelectFilter(FilterSelector::Next))
        );
        assert_eq!(Command::from_key(&press(KeyCode::Char('x'))), None);
        assert_eq!(Command::from_key(&press(KeyCode::Char('c'))), None);
    }

    fn type_line(input: &mut KeyInput, text: &str) {
        for c in text.chars() {
            assert_eq!(input.handle(&press(KeyCode::Char(c))), None);
        }
    }

    #[test]
    fn source_prompt_switches_source() {
        let mut input = KeyInput::new();
        assert_eq!(input.handle(&press(KeyCode::Char('s'))), None);
        assert_eq!(input.prompt(), Some(""));

        // Bound keys are plain text inside the prompt
        type_line(&mut input, "test:32x24");
        assert_eq!(input.prompt(), Some("test:32x24"));

        assert_eq!(
            input.handle(&press(KeyCode::Enter)),
            Some(Command::ChangeSource(SourceSpec::TestPattern {
                width: 32,
                height: 24
            }))
        );
        assert_eq!(input.prompt(), None);
        assert_eq!(input.handle(&press(KeyCode::Char('q'))), Some(Command::Quit));
    }

    #[test]
    fn source_prompt_edits_and_cancels() {
        let mut input = KeyInput::new();
        input.handle(&press(KeyCode::Char('s')));
        type_line(&mut input, "23");
        input.handle(&press(KeyCode::Backspace));
        assert_eq!(
            input.handle(&press(KeyCode::Enter)),
            Some(Command::ChangeSource(SourceSpec::Device(2)))
        );

        input.handle(&press(KeyCode::Char('s')));
        type_line(&mut input, "rtsp://cam/live");
        assert_eq!(input.handle(&press(KeyCode::Esc)), None);
        assert_eq!(input.prompt(), None);

        // An empty line closes the prompt without a command
        input.handle(&press(KeyCode::Char('s')));
        assert_eq!(input.handle(&press(KeyCode::Enter)), None);
        assert_eq!(input.prompt(), None);
    }

    #[test]
    fn ctrl_c_quits_from_prompt() {
        let mut input = KeyInput::new();
        input.handle(&press(KeyCode::Char('s')));
        assert_eq!(
            input.handle(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(input.prompt(), None);
    }

    #[test]
    fn releases_are_ignored() {
        let mut key = press(KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        assert_eq!(Command::from_key(&key), None);
    }

    #[test]
    fn script_yields_in_order() {
        let mut script = ScriptedCommands::new([None, Some(Command::ToggleRecord), Some(Command::Quit)]);
        assert_eq!(script.poll_command(), None);
        assert_eq!(script.poll_command(), Some(Command::ToggleRecord));
        assert_eq!(script.poll_command(), Some(Command::Quit));
        assert!(script.is_empty());
        assert_eq!(script.poll_command(), None);
    }
}
