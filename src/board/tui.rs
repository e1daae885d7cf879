//! Terminal UI for the odds board.
//!
//! Handles terminal setup, the event loop, and rendering of the three
//! views: balanced lines, milestones, and specials.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs},
    Frame, Terminal,
};
use serde_json::Value;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::reducer::spawn_reducer;
use super::sse::{self, SseClient};
use super::state::{BoardState, CycleDirection, MARKET_TYPES};

pub type BoardTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Tab views on the board.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Balanced,
    Milestones,
    Specials,
}

impl Tab {
    pub fn all() -> &'static [Tab] {
        &[Tab::Balanced, Tab::Milestones, Tab::Specials]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Balanced => "BALANCED LINES",
            Tab::Milestones => "MILESTONES",
            Tab::Specials => "SPECIALS",
        }
    }

    fn next(&self) -> Tab {
        match self {
            Tab::Balanced => Tab::Milestones,
            Tab::Milestones => Tab::Specials,
            Tab::Specials => Tab::Balanced,
        }
    }

    fn prev(&self) -> Tab {
        match self {
            Tab::Balanced => Tab::Specials,
            Tab::Milestones => Tab::Balanced,
            Tab::Specials => Tab::Milestones,
        }
    }
}

/// Short column labels for the balanced-lines table.
const MARKET_LABELS: &[&str] = &[
    "PTS", "REB", "AST", "BLK", "STL", "TO", "3PT", "PRA", "PR", "PA", "BS", "RA",
];

pub struct BoardApp {
    pub running: bool,
    pub tab: Tab,
    pub state: Arc<Mutex<BoardState>>,
    pub base_url: String,

    // Balanced-tab cell cursor.
    pub selected_row: usize,
    pub selected_col: usize,

    // Milestones-tab active market index into MARKET_TYPES.
    pub active_market: usize,

    // Specials-tab group cursor.
    pub selected_group: usize,
}

impl BoardApp {
    pub fn new(base_url: String, state: Arc<Mutex<BoardState>>) -> Self {
        Self {
            running: true,
            tab: Tab::Balanced,
            state,
            base_url,
            selected_row: 0,
            selected_col: 0,
            active_market: 0,
            selected_group: 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::Char('1') => self.tab = Tab::Balanced,
            KeyCode::Char('2') => self.tab = Tab::Milestones,
            KeyCode::Char('3') => self.tab = Tab::Specials,
            KeyCode::Char('f') => sse::request_clear(&self.base_url),
            _ => match self.tab {
                Tab::Balanced => self.handle_balanced_key(key.code),
                Tab::Milestones => self.handle_milestones_key(key.code),
                Tab::Specials => self.handle_specials_key(key.code),
            },
        }
    }

    fn handle_balanced_key(&mut self, code: KeyCode) {
        let player_count = self.state.lock().players_sorted().len();
        match code {
            KeyCode::Left => self.selected_col = self.selected_col.saturating_sub(1),
            KeyCode::Right => {
                self.selected_col = (self.selected_col + 1).min(MARKET_TYPES.len() - 1)
            }
            KeyCode::Up => self.selected_row = self.selected_row.saturating_sub(1),
            KeyCode::Down => {
                self.selected_row = (self.selected_row + 1).min(player_count.saturating_sub(1))
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.cycle_selected(CycleDirection::Up),
            KeyCode::Char('-') | KeyCode::Char('_') => self.cycle_selected(CycleDirection::Down),
            _ => {}
        }
    }

    fn cycle_selected(&mut self, direction: CycleDirection) {
        let mut state = self.state.lock();
        let player_key = state
            .players_sorted()
            .get(self.selected_row)
            .map(|(key, _)| (*key).clone());
        if let Some(player_key) = player_key {
            let market = MARKET_TYPES[self.selected_col];
            state.cycle_line(&player_key, market, direction);
        }
    }

    fn handle_milestones_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Left => self.active_market = self.active_market.saturating_sub(1),
            KeyCode::Right => {
                self.active_market = (self.active_market + 1).min(MARKET_TYPES.len() - 1)
            }
            _ => {}
        }
    }

    fn handle_specials_key(&mut self, code: KeyCode) {
        let group_count = self.state.lock().specials_by_market().len();
        match code {
            KeyCode::Up => self.selected_group = self.selected_group.saturating_sub(1),
            KeyCode::Down => {
                self.selected_group = (self.selected_group + 1).min(group_count.saturating_sub(1))
            }
            KeyCode::Enter => {
                let market = self
                    .state
                    .lock()
                    .specials_by_market()
                    .get(self.selected_group)
                    .map(|(market, _)| market.clone());
                if let Some(market) = market {
                    self.state.lock().toggle_accordion(&market);
                }
            }
            _ => {}
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(f.size());

        self.render_header(f, chunks[0]);
        self.render_tabs(f, chunks[1]);
        match self.tab {
            Tab::Balanced => self.render_balanced(f, chunks[2]),
            Tab::Milestones => self.render_milestones(f, chunks[2]),
            Tab::Specials => self.render_specials(f, chunks[2]),
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let state = self.state.lock();
        let status = if state.sse_connected {
            Span::styled("● SSE connected", Style::default().fg(Color::Green))
        } else {
            Span::styled("● SSE disconnected", Style::default().fg(Color::Red))
        };
        let fixture = state
            .fixture_id()
            .map(display_value)
            .unwrap_or_else(|| "-".to_string());
        let line = Line::from(vec![
            Span::styled(
                "ODDS BOARD ",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            status,
            Span::raw(format!(
                "  ({} connections)  fixture: {}",
                state.connection_count, fixture
            )),
        ]);
        let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        f.render_widget(header, area);
    }

    fn render_tabs(&self, f: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Tab::all().iter().map(|t| Line::from(t.title())).collect();
        let index = Tab::all().iter().position(|t| *t == self.tab).unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(index)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(tabs, area);
    }

    fn render_balanced(&self, f: &mut Frame, area: Rect) {
        let state = self.state.lock();
        let players = state.players_sorted();

        if players.is_empty() {
            let empty = Paragraph::new("No player data available. Waiting for a snapshot...")
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(empty, area);
            return;
        }

        let mut header_cells = vec![Cell::from("Player")];
        header_cells.extend(MARKET_LABELS.iter().map(|l| Cell::from(*l)));
        let header = Row::new(header_cells)
            .style(Style::default().add_modifier(Modifier::BOLD))
            .height(1);

        let rows: Vec<Row> = players
            .iter()
            .enumerate()
            .map(|(row_idx, (player_key, player))| {
                let mut cells = vec![Cell::from(format!(
                    "{} ({})",
                    player.name(),
                    player.team_name()
                ))];
                for (col_idx, market) in MARKET_TYPES.iter().enumerate() {
                    let selected =
                        row_idx == self.selected_row && col_idx == self.selected_col;
                    cells.push(balanced_cell(&state, player_key, market, selected));
                }
                Row::new(cells).height(2)
            })
            .collect();

        let mut widths = vec![Constraint::Length(22)];
        widths.extend(std::iter::repeat(Constraint::Length(11)).take(MARKET_TYPES.len()));

        let table = Table::new(rows, widths).header(header).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" +/- cycles the balance line, arrows move, f flushes "),
        );
        f.render_widget(table, area);
    }

    fn render_milestones(&self, f: &mut Frame, area: Rect) {
        let state = self.state.lock();
        let market = MARKET_TYPES[self.active_market];
        let milestones = state.milestone_lines(market);
        let players = state.players_sorted();

        let title = format!(" {} (←/→ to switch market) ", market);
        if milestones.is_empty() || players.is_empty() {
            let empty = Paragraph::new("No milestone data available for this market.")
                .block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(empty, area);
            return;
        }

        let mut header_cells = vec![Cell::from("Player")];
        header_cells.extend(
            milestones
                .iter()
                .map(|m| Cell::from(format!("TO REACH {}", m))),
        );
        let header = Row::new(header_cells)
            .style(Style::default().add_modifier(Modifier::BOLD))
            .height(1);

        let rows: Vec<Row> = players
            .iter()
            .map(|(_, player)| {
                let mut cells = vec![Cell::from(format!(
                    "{} ({})",
                    player.name(),
                    player.team_name()
                ))];
                for milestone in &milestones {
                    cells.push(match state.milestone_cell(player, market, milestone) {
                        Some(record) => {
                            let odds = display_opt(record.milestone_over_odds.as_ref());
                            let settlement =
                                display_opt(record.milestone_over_settlement.as_ref());
                            let text = format!("{} [{}]", odds, settlement);
                            if record.suspended() {
                                Cell::from(text).style(Style::default().fg(Color::Red))
                            } else {
                                Cell::from(text)
                            }
                        }
                        None => Cell::from("N/A"),
                    });
                }
                Row::new(cells).height(1)
            })
            .collect();

        let mut widths = vec![Constraint::Length(22)];
        widths.extend(std::iter::repeat(Constraint::Length(14)).take(milestones.len()));

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(table, area);
    }

    fn render_specials(&self, f: &mut Frame, area: Rect) {
        let state = self.state.lock();
        let grouped = state.specials_by_market();

        if grouped.is_empty() {
            let empty = Paragraph::new("No specials data received yet.")
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(empty, area);
            return;
        }

        let mut lines: Vec<Line> = Vec::new();
        for (idx, (market, selections)) in grouped.iter().enumerate() {
            let open = state.open_accordions.contains(market);
            let marker = if open { "▼" } else { "▶" };
            let style = if idx == self.selected_group {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            lines.push(Line::from(Span::styled(
                format!("{} {} ({})", marker, market, selections.len()),
                style,
            )));

            if open {
                for special in selections {
                    let name = special
                        .get("selection_name")
                        .map(display_value)
                        .unwrap_or_else(|| "N/A".to_string());
                    let odds = special
                        .get("odds")
                        .map(display_value)
                        .unwrap_or_else(|| "N/A".to_string());
                    let probability = special
                        .get("probability")
                        .map(display_value)
                        .unwrap_or_else(|| "N/A".to_string());
                    let status = special
                        .get("status")
                        .map(display_value)
                        .unwrap_or_else(|| "N/A".to_string());
                    let suspended = special
                        .get("is_suspended")
                        .and_then(Value::as_i64)
                        .map(|v| v == 1)
                        .unwrap_or(false);
                    let row = format!(
                        "    {}  odds {}  prob {}  status {}",
                        name, odds, probability, status
                    );
                    if suspended {
                        lines.push(Line::from(vec![
                            Span::raw(row),
                            Span::styled("  SUSPENDED", Style::default().fg(Color::Red)),
                        ]));
                    } else {
                        lines.push(Line::from(row));
                    }
                }
            }
        }

        let body = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" ↑/↓ select, Enter toggles "),
        );
        f.render_widget(body, area);
    }
}

fn balanced_cell(
    state: &BoardState,
    player_key: &str,
    market: &str,
    selected: bool,
) -> Cell<'static> {
    let Some(line) = state.current_line(player_key, market) else {
        return Cell::from("N/A");
    };
    let record = state.current_cell(player_key, market);

    let over = record
        .and_then(|r| r.balance_line_over_odds.as_ref())
        .map(display_value)
        .unwrap_or_else(|| "N/A".to_string());
    let under = record
        .and_then(|r| r.balance_line_under_odds.as_ref())
        .map(display_value)
        .unwrap_or_else(|| "N/A".to_string());
    let text = format!("{}\nO {} U {}", line, over, under);

    let mut style = Style::default();
    if record.map(|r| r.balanced()).unwrap_or(false) {
        style = style.fg(Color::Green);
    }
    if record.map(|r| r.suspended()).unwrap_or(false) {
        style = style.fg(Color::Red);
    }
    if selected {
        style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
    }
    Cell::from(text).style(style)
}

/// Compact rendering of a loosely-typed JSON scalar.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

fn display_opt(value: Option<&Value>) -> String {
    value.map(display_value).unwrap_or_else(|| "N/A".to_string())
}

/// Initialize terminal for the TUI
pub fn init_terminal() -> io::Result<BoardTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore terminal to normal state
pub fn restore_terminal(terminal: &mut BoardTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Drive the whole board: SSE consumer, reducer, status poller, render loop.
pub async fn run(base_url: String) -> anyhow::Result<()> {
    let state = Arc::new(Mutex::new(BoardState::new()));
    let (tx, rx) = mpsc::unbounded_channel();

    let reducer = spawn_reducer(rx, state.clone());
    let sse_task = tokio::spawn(SseClient::new(base_url.clone(), tx, state.clone()).run());
    let status_task = tokio::spawn(sse::poll_status(base_url.clone(), state.clone()));

    let mut terminal = init_terminal()?;
    let mut app = BoardApp::new(base_url, state);
    let result = run_event_loop(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    sse_task.abort();
    status_task.abort();
    reducer.abort();

    result.map_err(Into::into)
}

/// Main event loop: render, poll keys, tick.
fn run_event_loop(terminal: &mut BoardTerminal, app: &mut BoardApp) -> io::Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    while app.running {
        terminal.draw(|f| app.render(f))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    Ok(())
}
