use std::{
    env,
    io::{self, BufRead, IsTerminal, Stdout, Write},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal, TerminalOptions, Viewport,
};
use railbook_core::{
    picker::{suggest, MAX_SUGGESTIONS},
    stations::title_case,
    BookingError, PlainPicker, StationPicker,
};
use tracing::{debug, warn};

const VIEWPORT_HEIGHT: u16 = MAX_SUGGESTIONS as u16 + 3;

/// True when the raw-mode picker can drive this terminal.
pub fn rich_input_available(enabled: bool) -> bool {
    enabled
        && io::stdin().is_terminal()
        && io::stdout().is_terminal()
        && env::var_os("TERM").map_or(cfg!(windows), |term| term != "dumb")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PickerAction {
    Continue,
    Accept(String),
    Abort,
}

#[derive(Debug, Default)]
struct PickerState {
    input: String,
    selected: usize,
    /// Set once Up or Down moved the highlight since the last edit.
    browsing: bool,
}

impl PickerState {
    fn matches<'a>(&self, candidates: &'a [String]) -> Vec<&'a String> {
        if self.input.trim().is_empty() {
            return candidates.iter().take(MAX_SUGGESTIONS).collect();
        }
        suggest(&self.input, candidates)
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .collect()
    }

    fn reset_highlight(&mut self) {
        self.selected = 0;
        self.browsing = false;
    }

    fn handle_key(&mut self, key: KeyEvent, candidates: &[String]) -> PickerAction {
        let matches = self.matches(candidates);
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return PickerAction::Abort;
            }
            KeyCode::Esc => {
                self.input.clear();
                self.reset_highlight();
            }
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                self.browsing = true;
            }
            KeyCode::Down => {
                if self.selected + 1 < matches.len() {
                    self.selected += 1;
                }
                self.browsing = true;
            }
            KeyCode::Tab => {
                if let Some(candidate) = matches.get(self.selected) {
                    self.input = candidate.to_string();
                    self.reset_highlight();
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.reset_highlight();
            }
            KeyCode::Enter => {
                let typed = self.input.trim();
                if typed.is_empty() {
                    return PickerAction::Continue;
                }
                let exact = candidates
                    .iter()
                    .find(|candidate| candidate.eq_ignore_ascii_case(typed));
                let highlighted = matches.get(self.selected).filter(|_| self.browsing);
                let chosen = match (exact, highlighted) {
                    (Some(candidate), _) => candidate.clone(),
                    (None, Some(candidate)) => candidate.to_string(),
                    (None, None) => typed.to_string(),
                };
                return PickerAction::Accept(title_case(&chosen));
            }
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.input.push(ch);
                    self.reset_highlight();
                }
            }
            _ => {}
        }
        PickerAction::Continue
    }
}

/// Inline terminal region that restores cooked mode when dropped.
struct InlineTerminal {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl InlineTerminal {
    fn open() -> io::Result<Self> {
        enable_raw_mode()?;
        let terminal = Terminal::with_options(
            CrosstermBackend::new(io::stdout()),
            TerminalOptions {
                viewport: Viewport::Inline(VIEWPORT_HEIGHT),
            },
        );
        match terminal {
            Ok(terminal) => Ok(Self { terminal }),
            Err(err) => {
                let _ = disable_raw_mode();
                Err(err)
            }
        }
    }

    fn run(&mut self, prompt: &str, candidates: &[String]) -> io::Result<PickerAction> {
        let mut state = PickerState::default();
        loop {
            self.terminal
                .draw(|frame| draw(frame, prompt, candidates, &state))?;
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match state.handle_key(key, candidates) {
                    PickerAction::Continue => {}
                    done => return Ok(done),
                }
            }
        }
    }
}

impl Drop for InlineTerminal {
    fn drop(&mut self) {
        let _ = self.terminal.clear();
        if let Err(err) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {err}");
        }
        let _ = self.terminal.show_cursor();
    }
}

fn draw(frame: &mut Frame, prompt: &str, candidates: &[String], state: &PickerState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(frame.size());

    let input = Paragraph::new(Line::from(vec![
        Span::styled(prompt, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(state.input.as_str()),
    ]));
    frame.render_widget(input, rows[0]);

    let matches = state.matches(candidates);
    let items: Vec<ListItem> = if matches.is_empty() {
        vec![ListItem::new(Line::from("  No matching stations, Enter keeps the typed name"))]
    } else {
        matches
            .iter()
            .map(|station| ListItem::new(Line::from(format!("  {station}"))))
            .collect()
    };
    let mut list_state = ListState::default();
    if state.browsing && !matches.is_empty() {
        list_state.select(Some(state.selected.min(matches.len() - 1)));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Up/Down move  Tab complete  Enter accept  Esc clear"),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    frame.render_stateful_widget(list, rows[1], &mut list_state);
}

/// Station picker used by the shell: the inline picker where the terminal
/// allows it, the line-based prompt otherwise.
pub struct ShellPicker<'a, R, W> {
    rich: bool,
    plain: PlainPicker<&'a mut R, &'a mut W>,
}

impl<'a, R: BufRead, W: Write> ShellPicker<'a, R, W> {
    pub fn new(rich: bool, input: &'a mut R, output: &'a mut W) -> Self {
        Self {
            rich,
            plain: PlainPicker::new(input, output),
        }
    }
}

impl<R: BufRead, W: Write> StationPicker for ShellPicker<'_, R, W> {
    fn pick(&mut self, prompt: &str, candidates: &[String]) -> railbook_core::Result<String> {
        if self.rich && !candidates.is_empty() {
            match InlineTerminal::open() {
                Ok(mut inline) => {
                    let action = inline.run(prompt, candidates)?;
                    drop(inline);
                    return match action {
                        PickerAction::Accept(station) => {
                            println!("{prompt}{station}");
                            debug!(station = %station, "Station picked");
                            Ok(station)
                        }
                        _ => Err(BookingError::Io(io::Error::new(
                            io::ErrorKind::Interrupted,
                            "station selection aborted",
                        ))),
                    };
                }
                Err(err) => {
                    warn!("Inline picker unavailable, using plain prompts: {err}");
                    self.rich = false;
                }
            }
        }
        self.plain.pick(prompt, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations() -> Vec<String> {
        ["Agra", "Delhi", "Mumbai", "New Delhi"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn press(state: &mut PickerState, code: KeyCode, candidates: &[String]) -> PickerAction {
        state.handle_key(KeyEvent::new(code, KeyModifiers::NONE), candidates)
    }

    fn type_text(state: &mut PickerState, text: &str, candidates: &[String]) {
        for ch in text.chars() {
            press(state, KeyCode::Char(ch), candidates);
        }
    }

    #[test]
    fn enter_accepts_highlighted_match() {
        let all = stations();
        let mut state = PickerState::default();
        type_text(&mut state, "del", &all);
        press(&mut state, KeyCode::Down, &all);
        assert_eq!(
            press(&mut state, KeyCode::Enter, &all),
            PickerAction::Accept("New Delhi".to_string())
        );
    }

    #[test]
    fn exact_text_wins_over_highlight() {
        let all = stations();
        let mut state = PickerState::default();
        type_text(&mut state, "delhi", &all);
        press(&mut state, KeyCode::Down, &all);
        assert_eq!(
            press(&mut state, KeyCode::Enter, &all),
            PickerAction::Accept("Delhi".to_string())
        );
    }

    #[test]
    fn typed_text_wins_until_the_highlight_moves() {
        let all = stations();
        let mut state = PickerState::default();
        type_text(&mut state, "mum", &all);
        assert_eq!(
            press(&mut state, KeyCode::Enter, &all),
            PickerAction::Accept("Mum".to_string())
        );

        press(&mut state, KeyCode::Up, &all);
        assert_eq!(
            press(&mut state, KeyCode::Enter, &all),
            PickerAction::Accept("Mumbai".to_string())
        );
    }

    #[test]
    fn unmatched_text_is_title_cased() {
        let all = stations();
        let mut state = PickerState::default();
        type_text(&mut state, "goa junction", &all);
        assert_eq!(
            press(&mut state, KeyCode::Enter, &all),
            PickerAction::Accept("Goa Junction".to_string())
        );
    }

    #[test]
    fn tab_completes_and_esc_clears() {
        let all = stations();
        let mut state = PickerState::default();
        type_text(&mut state, "mum", &all);
        press(&mut state, KeyCode::Tab, &all);
        assert_eq!(state.input, "Mumbai");
        press(&mut state, KeyCode::Esc, &all);
        assert!(state.input.is_empty());
        assert_eq!(press(&mut state, KeyCode::Enter, &all), PickerAction::Continue);
    }

    #[test]
    fn selection_stays_within_matches() {
        let all = stations();
        let mut state = PickerState::default();
        type_text(&mut state, "agr", &all);
        press(&mut state, KeyCode::Down, &all);
        press(&mut state, KeyCode::Down, &all);
        assert_eq!(state.selected, 0);
        press(&mut state, KeyCode::Up, &all);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn ctrl_c_aborts() {
        let all = stations();
        let mut state = PickerState::default();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(state.handle_key(key, &all), PickerAction::Abort);
    }
}
