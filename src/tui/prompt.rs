//! Terminal prompts drawn in an inline ratatui viewport.

use anyhow::Result;
use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame, Terminal, TerminalOptions, Viewport,
};
use std::io;

use super::Prompter;

/// Most list rows shown at once.
const MAX_VISIBLE_ROWS: usize = 10;

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, title: &str, options: &[String]) -> Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }
        run_prompt(SelectState {
            title,
            options,
            cursor: 0,
        })
    }

    fn multi_select(
        &mut self,
        title: &str,
        options: &[String],
        preselected: &[bool],
    ) -> Result<Option<Vec<usize>>> {
        if options.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let checked = (0..options.len())
            .map(|i| preselected.get(i).copied().unwrap_or(false))
            .collect();
        run_prompt(MultiSelectState {
            title,
            options,
            checked,
            cursor: 0,
        })
    }

    fn confirm(&mut self, title: &str) -> Result<Option<bool>> {
        run_prompt(ConfirmState { title, yes: true })
    }

    fn input(
        &mut self,
        title: &str,
        description: &str,
        placeholder: &str,
    ) -> Result<Option<String>> {
        run_prompt(InputState {
            title,
            description,
            placeholder,
            value: String::new(),
        })
    }
}

/// Result of handling one key press.
enum Step<T> {
    Continue,
    Done(T),
}

trait PromptState {
    type Output;

    fn title(&self) -> &str;
    fn height(&self) -> u16;
    fn render(&self, frame: &mut Frame);
    fn handle_key(&mut self, key: KeyEvent) -> Step<Self::Output>;
    /// Answer echoed to the scrollback once the prompt closes.
    fn summary(&self, output: &Self::Output) -> String;
}

/// Leaves raw mode even when drawing fails.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn is_cancel(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn run_prompt<P: PromptState>(mut state: P) -> Result<Option<P::Output>> {
    let raw = RawModeGuard::enable()?;
    let mut terminal = Terminal::with_options(
        CrosstermBackend::new(io::stdout()),
        TerminalOptions {
            viewport: Viewport::Inline(state.height()),
        },
    )?;

    let outcome = loop {
        terminal.draw(|frame| state.render(frame))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if is_cancel(&key) {
            break None;
        }
        if let Step::Done(output) = state.handle_key(key) {
            break Some(output);
        }
    };

    terminal.clear()?;
    drop(terminal);
    drop(raw);

    let answer = match &outcome {
        Some(output) => state.summary(output).cyan().to_string(),
        None => "cancelled".dimmed().to_string(),
    };
    println!("{} {} {}", "?".green().bold(), state.title().bold(), answer);

    Ok(outcome)
}

fn title_line(title: &str) -> Line<'_> {
    Line::from(vec![
        Span::styled("? ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
    ])
}

fn help_line(text: &str) -> Paragraph<'_> {
    Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray)))
}

fn list_height(len: usize) -> u16 {
    // title + rows + help
    (len.min(MAX_VISIBLE_ROWS) + 2) as u16
}

/// Title row, list area, help row.
fn list_layout(frame: &Frame) -> [ratatui::layout::Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());
    [chunks[0], chunks[1], chunks[2]]
}

fn highlight_style() -> Style {
    Style::default()
        .fg(Color::Magenta)
        .add_modifier(Modifier::BOLD)
}

fn move_cursor(cursor: usize, len: usize, code: KeyCode) -> usize {
    match code {
        KeyCode::Up | KeyCode::Char('k') => cursor.checked_sub(1).unwrap_or(len - 1),
        KeyCode::Down | KeyCode::Char('j') => (cursor + 1) % len,
        KeyCode::Home => 0,
        KeyCode::End => len - 1,
        _ => cursor,
    }
}

struct SelectState<'a> {
    title: &'a str,
    options: &'a [String],
    cursor: usize,
}

impl PromptState for SelectState<'_> {
    type Output = usize;

    fn title(&self) -> &str {
        self.title
    }

    fn height(&self) -> u16 {
        list_height(self.options.len())
    }

    fn render(&self, frame: &mut Frame) {
        let [title_area, list_area, help_area] = list_layout(frame);
        frame.render_widget(Paragraph::new(title_line(self.title)), title_area);

        let items: Vec<ListItem> = self
            .options
            .iter()
            .map(|o| ListItem::new(o.as_str()))
            .collect();
        let list = List::new(items)
            .highlight_symbol("› ")
            .highlight_style(highlight_style());
        let mut state = ListState::default().with_selected(Some(self.cursor));
        frame.render_stateful_widget(list, list_area, &mut state);

        frame.render_widget(help_line("↑/↓ move • enter select • esc cancel"), help_area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Step<usize> {
        match key.code {
            KeyCode::Enter => Step::Done(self.cursor),
            code => {
                self.cursor = move_cursor(self.cursor, self.options.len(), code);
                Step::Continue
            }
        }
    }

    fn summary(&self, output: &usize) -> String {
        self.options[*output].clone()
    }
}

struct MultiSelectState<'a> {
    title: &'a str,
    options: &'a [String],
    checked: Vec<bool>,
    cursor: usize,
}

impl PromptState for MultiSelectState<'_> {
    type Output = Vec<usize>;

    fn title(&self) -> &str {
        self.title
    }

    fn height(&self) -> u16 {
        list_height(self.options.len())
    }

    fn render(&self, frame: &mut Frame) {
        let [title_area, list_area, help_area] = list_layout(frame);
        frame.render_widget(Paragraph::new(title_line(self.title)), title_area);

        let items: Vec<ListItem> = self
            .options
            .iter()
            .zip(&self.checked)
            .map(|(option, checked)| {
                let mark = if *checked {
                    Span::styled("[x] ", Style::default().fg(Color::Green))
                } else {
                    Span::raw("[ ] ")
                };
                ListItem::new(Line::from(vec![mark, Span::raw(option.as_str())]))
            })
            .collect();
        let list = List::new(items)
            .highlight_symbol("› ")
            .highlight_style(highlight_style());
        let mut state = ListState::default().with_selected(Some(self.cursor));
        frame.render_stateful_widget(list, list_area, &mut state);

        frame.render_widget(
            help_line("space toggle • a all • enter apply • esc cancel"),
            help_area,
        );
    }

    fn handle_key(&mut self, key: KeyEvent) -> Step<Vec<usize>> {
        match key.code {
            KeyCode::Enter => Step::Done(
                self.checked
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| **c)
                    .map(|(i, _)| i)
                    .collect(),
            ),
            KeyCode::Char(' ') => {
                self.checked[self.cursor] = !self.checked[self.cursor];
                Step::Continue
            }
            KeyCode::Char('a') => {
                let all = self.checked.iter().all(|c| *c);
                self.checked.iter_mut().for_each(|c| *c = !all);
                Step::Continue
            }
            code => {
                self.cursor = move_cursor(self.cursor, self.options.len(), code);
                Step::Continue
            }
        }
    }

    fn summary(&self, output: &Vec<usize>) -> String {
        match output.len() {
            0 => "none".to_string(),
            n => format!("{} selected", n),
        }
    }
}

struct ConfirmState<'a> {
    title: &'a str,
    yes: bool,
}

impl PromptState for ConfirmState<'_> {
    type Output = bool;

    fn title(&self) -> &str {
        self.title
    }

    fn height(&self) -> u16 {
        2
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(frame.area());

        let choice = |label: &'static str, active: bool| {
            if active {
                Span::styled(format!(" {} ", label), highlight_style().add_modifier(Modifier::REVERSED))
            } else {
                Span::styled(format!(" {} ", label), Style::default().fg(Color::DarkGray))
            }
        };

        let mut line = title_line(self.title);
        line.spans.push(Span::raw("  "));
        line.spans.push(choice("Yes", self.yes));
        line.spans.push(Span::raw(" "));
        line.spans.push(choice("No", !self.yes));
        frame.render_widget(Paragraph::new(line), chunks[0]);
        frame.render_widget(help_line("←/→ choose • y/n • enter confirm • esc cancel"), chunks[1]);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Step<bool> {
        match key.code {
            KeyCode::Enter => Step::Done(self.yes),
            KeyCode::Char('y') | KeyCode::Char('Y') => Step::Done(true),
            KeyCode::Char('n') | KeyCode::Char('N') => Step::Done(false),
            KeyCode::Left
            | KeyCode::Right
            | KeyCode::Tab
            | KeyCode::Char('h')
            | KeyCode::Char('l') => {
                self.yes = !self.yes;
                Step::Continue
            }
            _ => Step::Continue,
        }
    }

    fn summary(&self, output: &bool) -> String {
        if *output { "Yes" } else { "No" }.to_string()
    }
}

struct InputState<'a> {
    title: &'a str,
    description: &'a str,
    placeholder: &'a str,
    value: String,
}

impl PromptState for InputState<'_> {
    type Output = String;

    fn title(&self) -> &str {
        self.title
    }

    fn height(&self) -> u16 {
        3
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        frame.render_widget(Paragraph::new(title_line(self.title)), chunks[0]);
        frame.render_widget(help_line(self.description), chunks[1]);

        let prefix = Span::styled("› ", highlight_style());
        let body = if self.value.is_empty() {
            Span::styled(self.placeholder, Style::default().fg(Color::DarkGray))
        } else {
            Span::raw(self.value.as_str())
        };
        frame.render_widget(Paragraph::new(Line::from(vec![prefix, body])), chunks[2]);

        let cursor_x = chunks[2].x + 2 + self.value.chars().count() as u16;
        frame.set_cursor_position((cursor_x.min(chunks[2].right().saturating_sub(1)), chunks[2].y));
    }

    fn handle_key(&mut self, key: KeyEvent) -> Step<String> {
        match key.code {
            KeyCode::Enter => Step::Done(self.value.clone()),
            KeyCode::Backspace => {
                self.value.pop();
                Step::Continue
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value.push(c);
                Step::Continue
            }
            _ => Step::Continue,
        }
    }

    fn summary(&self, output: &String) -> String {
        output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn options(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_wraps_around() {
        let opts = options(&["a", "b", "c"]);
        let mut state = SelectState {
            title: "Pick",
            options: &opts,
            cursor: 0,
        };
        state.handle_key(key(KeyCode::Up));
        assert_eq!(state.cursor, 2);
        state.handle_key(key(KeyCode::Down));
        assert_eq!(state.cursor, 0);
        assert!(matches!(state.handle_key(key(KeyCode::Enter)), Step::Done(0)));
    }

    #[test]
    fn test_multi_select_toggle_and_apply() {
        let opts = options(&["a", "b", "c"]);
        let mut state = MultiSelectState {
            title: "Toggle",
            options: &opts,
            checked: vec![true, false, false],
            cursor: 0,
        };
        state.handle_key(key(KeyCode::Char(' ')));
        state.handle_key(key(KeyCode::Down));
        state.handle_key(key(KeyCode::Down));
        state.handle_key(key(KeyCode::Char(' ')));

        match state.handle_key(key(KeyCode::Enter)) {
            Step::Done(chosen) => assert_eq!(chosen, vec![2]),
            Step::Continue => panic!("enter should finish"),
        }

        state.handle_key(key(KeyCode::Char('a')));
        assert!(state.checked.iter().all(|c| *c));
    }

    #[test]
    fn test_confirm_keys() {
        let mut state = ConfirmState {
            title: "Sure?",
            yes: true,
        };
        state.handle_key(key(KeyCode::Right));
        assert!(matches!(state.handle_key(key(KeyCode::Enter)), Step::Done(false)));
        assert!(matches!(state.handle_key(key(KeyCode::Char('y'))), Step::Done(true)));
    }

    #[test]
    fn test_input_editing() {
        let mut state = InputState {
            title: "URL",
            description: "",
            placeholder: "",
            value: String::new(),
        };
        for c in "abcd".chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
        state.handle_key(key(KeyCode::Backspace));
        match state.handle_key(key(KeyCode::Enter)) {
            Step::Done(value) => assert_eq!(value, "abc"),
            Step::Continue => panic!("enter should finish"),
        }
    }

    #[test]
    fn test_cancel_keys() {
        assert!(is_cancel(&key(KeyCode::Esc)));
        assert!(is_cancel(&KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL
        )));
        assert!(!is_cancel(&key(KeyCode::Char('c'))));
    }
}
