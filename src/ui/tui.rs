//! Ratatui-based inventory browser wired to the search engine.

use anyhow::Result;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::crossterm::{ExecutableCommand, execute};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use serde::{Deserialize, Serialize};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::SearchEngine;
use crate::model::types::{GroupId, Inventory, Item, ItemId, ItemKind};
use crate::storage::SqliteCatalog;
use crate::ui::components::theme::{ThemePalette, kbd_style};
use crate::ui::listing::{RowLine, detail_item, visible_groups, visible_rows};
use crate::ui::shortcuts;
use crate::view::surface::{ViewFrame, ViewModel};

const TICK: Duration = Duration::from_millis(16);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FocusRegion {
    Items,
    Groups,
    Detail,
}

impl FocusRegion {
    fn next(self) -> Self {
        match self {
            FocusRegion::Items => FocusRegion::Groups,
            FocusRegion::Groups => FocusRegion::Detail,
            FocusRegion::Detail => FocusRegion::Items,
        }
    }
}

/// Engine call requested by a key press.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Action {
    None,
    Search(String),
    Submit(String),
    Reset,
    Rerun,
    Select(Option<ItemId>),
    Toggle(GroupId),
    Quit,
}

#[derive(Serialize, Deserialize, Default)]
struct TuiStatePersisted {
    theme: Option<String>,
    last_query: Option<String>,
}

struct App {
    query: String,
    focus: FocusRegion,
    item_cursor: usize,
    group_cursor: usize,
    theme_dark: bool,
    status: String,
}

impl App {
    fn new(persisted: TuiStatePersisted) -> Self {
        Self {
            query: persisted.last_query.unwrap_or_default(),
            focus: FocusRegion::Items,
            item_cursor: 0,
            group_cursor: 0,
            theme_dark: persisted.theme.as_deref() != Some("light"),
            status: String::new(),
        }
    }

    fn persisted(&self) -> TuiStatePersisted {
        TuiStatePersisted {
            theme: Some(if self.theme_dark { "dark" } else { "light" }.into()),
            last_query: (!self.query.is_empty()).then(|| self.query.clone()),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, frame: &ViewFrame, inventory: &Inventory) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => Action::Quit,
            KeyCode::F(10) => Action::Quit,
            KeyCode::Char('r') if ctrl => Action::Rerun,
            KeyCode::F(2) => {
                self.theme_dark = !self.theme_dark;
                Action::None
            }
            KeyCode::Esc => {
                self.query.clear();
                self.item_cursor = 0;
                Action::Reset
            }
            KeyCode::Enter => Action::Submit(self.query.clone()),
            KeyCode::Tab => {
                self.focus = self.focus.next();
                Action::None
            }
            KeyCode::Up | KeyCode::Down => {
                let down = key.code == KeyCode::Down;
                match self.focus {
                    FocusRegion::Items => {
                        let rows = visible_rows(frame, inventory);
                        self.item_cursor = step(self.item_cursor, rows.len(), down);
                        Action::Select(rows.get(self.item_cursor).map(|row| row.item.id))
                    }
                    FocusRegion::Groups => {
                        let len = visible_groups(frame, inventory).len();
                        self.group_cursor = step(self.group_cursor, len, down);
                        Action::None
                    }
                    FocusRegion::Detail => Action::None,
                }
            }
            KeyCode::Char(' ') if self.focus == FocusRegion::Groups => {
                visible_groups(frame, inventory)
                    .get(self.group_cursor)
                    .map_or(Action::None, |line| Action::Toggle(line.group.id))
            }
            KeyCode::Backspace => {
                if self.query.pop().is_some() {
                    Action::Search(self.query.clone())
                } else {
                    Action::None
                }
            }
            KeyCode::Char(c) if !ctrl => {
                self.query.push(c);
                self.item_cursor = 0;
                Action::Search(self.query.clone())
            }
            _ => Action::None,
        }
    }
}

fn step(cursor: usize, len: usize, down: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let cursor = cursor.min(len - 1);
    if down {
        (cursor + 1).min(len - 1)
    } else {
        cursor.saturating_sub(1)
    }
}

fn state_path_for(data_dir: &Path) -> PathBuf {
    data_dir.join("tui_state.json")
}

fn load_state(path: &Path) -> TuiStatePersisted {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn save_state(path: &Path, state: &TuiStatePersisted) {
    if let Ok(body) = serde_json::to_string_pretty(state) {
        let _ = std::fs::write(path, body);
    }
}

pub fn footer_legend() -> String {
    format!(
        "type to search | {} submit | {} clear | {} move | {} toggle group | {} pane | {} rerun | {} theme | {} quit",
        shortcuts::SUBMIT,
        shortcuts::CLEAR,
        shortcuts::NAV,
        shortcuts::TOGGLE_GROUP,
        shortcuts::TAB_FOCUS,
        shortcuts::RERUN,
        shortcuts::THEME,
        shortcuts::QUIT,
    )
}

fn kind_tag(item: &Item, palette: ThemePalette) -> Span<'static> {
    match item.kind {
        ItemKind::Ingredient => Span::styled("ING ", Style::default().fg(palette.ingredient)),
        ItemKind::Product => Span::styled("PRD ", Style::default().fg(palette.product)),
    }
}

fn row_line(row: &RowLine<'_>, palette: ThemePalette) -> Line<'static> {
    let mut spans = vec![
        kind_tag(row.item, palette),
        Span::raw(row.item.name.clone()),
        Span::styled(format!("  {}", row.item.code), palette.hint_style()),
    ];
    if row.item.flagged {
        spans.push(Span::styled(" ⚑", Style::default().fg(palette.flagged)));
    }
    let line = Line::from(spans);
    if row.faded {
        line.style(palette.faded())
    } else {
        line
    }
}

fn detail_lines(item: &Item, palette: ThemePalette) -> Vec<Line<'static>> {
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<10}"), palette.hint_style()),
            Span::raw(value),
        ])
    };
    let mut lines = vec![
        Line::from(Span::styled(item.name.clone(), palette.title())),
        field("kind", item.kind.as_str().to_string()),
        field("code", item.code.clone()),
    ];
    if let Some(supplier) = &item.supplier {
        lines.push(field("supplier", supplier.clone()));
    }
    if let Some(quantity) = item.quantity {
        lines.push(field("quantity", quantity.to_string()));
    }
    if let Some(cost) = item.unit_cost {
        lines.push(field("unit cost", format!("{cost:.2}")));
    }
    for date in &item.dates {
        lines.push(field("date", date.format("%Y-%m-%d").to_string()));
    }
    if item.flagged {
        lines.push(Line::from(Span::styled("flagged", palette.warning())));
    }
    lines
}

fn draw(f: &mut Frame, app: &App, view: &ViewFrame, inventory: &Inventory) {
    let palette = ThemePalette::for_mode(app.theme_dark);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // search bar
            Constraint::Min(0),    // panes
            Constraint::Length(1), // footer
        ])
        .split(f.area());
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(chunks[1]);

    let bar = Paragraph::new(Line::from(vec![
        Span::styled("> ", kbd_style(palette)),
        Span::raw(app.query.clone()),
    ]))
    .block(
        Block::default()
            .title(Span::styled("Search", palette.title()))
            .title_bottom(Span::styled(app.status.clone(), palette.hint_style()))
            .borders(Borders::ALL)
            .border_style(palette.border_style(true)),
    );
    f.render_widget(bar, chunks[0]);

    let items_block = Block::default()
        .title(Span::styled("Items", palette.title()))
        .borders(Borders::ALL)
        .border_style(palette.border_style(app.focus == FocusRegion::Items));
    let rows = visible_rows(view, inventory);
    if view.empty_state {
        let empty = Paragraph::new(Span::styled(
            format!("No items match \"{}\"", app.query),
            palette.hint_style(),
        ))
        .block(items_block)
        .wrap(Wrap { trim: true });
        f.render_widget(empty, panes[0]);
    } else {
        let list = List::new(
            rows.iter()
                .map(|row| ListItem::new(row_line(row, palette)))
                .collect::<Vec<_>>(),
        )
        .block(items_block)
        .highlight_style(palette.selected());
        let mut state = ListState::default();
        if !rows.is_empty() {
            state.select(Some(app.item_cursor.min(rows.len() - 1)));
        }
        f.render_stateful_widget(list, panes[0], &mut state);
    }

    let groups = visible_groups(view, inventory);
    let mut group_items = Vec::new();
    let mut selected_line = None;
    for (idx, line) in groups.iter().enumerate() {
        if idx == app.group_cursor.min(groups.len().saturating_sub(1)) {
            selected_line = Some(group_items.len());
        }
        let marker = if line.expanded { "▾ " } else { "▸ " };
        let header = Line::from(vec![
            Span::styled(marker, kbd_style(palette)),
            Span::raw(line.group.name.clone()),
            Span::styled(format!(" {}", line.label), palette.hint_style()),
        ]);
        group_items.push(ListItem::new(if line.faded {
            header.style(palette.faded())
        } else {
            header
        }));
        for child in &line.children {
            let mut child_line = row_line(child, palette);
            child_line.spans.insert(0, Span::raw("    "));
            group_items.push(ListItem::new(child_line));
        }
    }
    let mut group_state = ListState::default();
    group_state.select(selected_line);
    f.render_stateful_widget(
        List::new(group_items)
            .block(
                Block::default()
                    .title(Span::styled("Products", palette.title()))
                    .borders(Borders::ALL)
                    .border_style(palette.border_style(app.focus == FocusRegion::Groups)),
            )
            .highlight_style(palette.selected()),
        panes[1],
        &mut group_state,
    );

    let detail_block = Block::default()
        .title(Span::styled("Detail", palette.title()))
        .borders(Borders::ALL)
        .border_style(palette.border_style(app.focus == FocusRegion::Detail));
    let detail = match detail_item(view, inventory) {
        Some(row) => {
            let lines = detail_lines(row.item, palette);
            let paragraph = Paragraph::new(lines);
            if row.faded {
                paragraph.style(palette.faded())
            } else {
                paragraph
            }
        }
        None => Paragraph::new(Span::styled("Select an item", palette.hint_style())),
    };
    f.render_widget(detail.block(detail_block).wrap(Wrap { trim: true }), panes[2]);

    f.render_widget(
        Paragraph::new(Span::styled(footer_legend(), palette.hint_style())),
        chunks[2],
    );
}

/// Run the interactive browser over the database at `db_path`. UI state is
/// persisted under `data_dir`.
pub async fn run_tui(db_path: PathBuf, data_dir: PathBuf, once: bool) -> Result<()> {
    if once
        && dotenvy::var("TUI_HEADLESS")
            .map(|v| v == "1")
            .unwrap_or(false)
    {
        return run_tui_headless(db_path).await;
    }

    let catalog = Arc::new(SqliteCatalog::open(&db_path)?);
    let view = Arc::new(ViewModel::new());
    let engine = SearchEngine::new(EngineConfig::from_env(), catalog, view.clone());
    engine.load().await?;

    std::fs::create_dir_all(&data_dir)?;
    let state_path = state_path_for(&data_dir);
    let mut app = App::new(load_state(&state_path));
    if !app.query.is_empty() {
        engine.submit(&app.query);
    }
    info!(db = %db_path.display(), "tui started");

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut app, &engine, &view, once).await;
    teardown_terminal()?;
    save_state(&state_path, &app.persisted());
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    engine: &SearchEngine,
    view: &ViewModel,
    once: bool,
) -> Result<()> {
    let mut drawn: Option<u64> = None;
    let mut needs_draw = true;
    loop {
        let frame = view.frame();
        let inventory = engine.inventory();
        if needs_draw || drawn != Some(frame.version) {
            terminal.draw(|f| draw(f, app, &frame, &inventory))?;
            drawn = Some(frame.version);
            needs_draw = false;
        }
        if once {
            return Ok(());
        }

        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                needs_draw = true;
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            needs_draw = true;
            match app.handle_key(key, &frame, &inventory) {
                Action::Quit => return Ok(()),
                Action::Search(query) => engine.search(&query),
                Action::Submit(query) => {
                    engine.submit(&query);
                }
                Action::Reset => {
                    engine.reset();
                }
                Action::Rerun => {
                    engine.rerun();
                }
                Action::Select(item) => engine.select(item),
                Action::Toggle(group) => match engine.toggle_group(group).await {
                    Ok(expanded) => {
                        app.status = format!(
                            "{} {}",
                            if expanded { "expanded" } else { "collapsed" },
                            group
                        );
                    }
                    Err(err) => {
                        warn!(error = %err, %group, "toggle failed");
                        app.status = format!("toggle failed: {err}");
                    }
                },
                Action::None => {}
            }
        }
        tokio::time::sleep(TICK).await;
    }
}

async fn run_tui_headless(db_path: PathBuf) -> Result<()> {
    let catalog = Arc::new(SqliteCatalog::open(&db_path)?);
    let view = Arc::new(ViewModel::new());
    let engine = SearchEngine::new(EngineConfig::instant(), catalog, view);
    engine.load().await?;
    engine.wait_idle().await;
    Ok(())
}

fn teardown_terminal() -> Result<()> {
    let mut stdout = io::stdout();
    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Group;
    use crate::view::surface::{Element, ElementState};
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn fixture() -> (ViewFrame, Inventory) {
        let inventory = Inventory {
            items: vec![
                Item::new(1, ItemKind::Ingredient, "Sugar"),
                Item::new(2, ItemKind::Ingredient, "Flour"),
                Item::new(3, ItemKind::Product, "Cake"),
            ],
            groups: vec![Group {
                id: GroupId(3),
                name: "Cake".into(),
                members: vec![ItemId(1), ItemId(2)],
                collapsed: true,
            }],
        };
        let mut frame = ViewFrame::default();
        for id in [1, 2, 3] {
            frame.elements.insert(Element::Row(ItemId(id)), ElementState::SHOWN);
        }
        frame.elements.insert(Element::Group(GroupId(3)), ElementState::SHOWN);
        (frame, inventory)
    }

    #[test]
    fn state_roundtrip_persists_theme_and_query() {
        let dir = TempDir::new().unwrap();
        let path = state_path_for(dir.path());
        let mut app = App::new(TuiStatePersisted::default());
        app.theme_dark = false;
        app.query = "sugar".into();
        save_state(&path, &app.persisted());

        let restored = App::new(load_state(&path));
        assert!(!restored.theme_dark);
        assert_eq!(restored.query, "sugar");
    }

    #[test]
    fn missing_state_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let app = App::new(load_state(&dir.path().join("absent.json")));
        assert!(app.theme_dark);
        assert!(app.query.is_empty());
    }

    #[test]
    fn typing_searches_and_esc_resets() {
        let (frame, inv) = fixture();
        let mut app = App::new(TuiStatePersisted::default());
        assert_eq!(
            app.handle_key(key(KeyCode::Char('s')), &frame, &inv),
            Action::Search("s".into())
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Char('u')), &frame, &inv),
            Action::Search("su".into())
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Backspace), &frame, &inv),
            Action::Search("s".into())
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Enter), &frame, &inv),
            Action::Submit("s".into())
        );
        assert_eq!(app.handle_key(key(KeyCode::Esc), &frame, &inv), Action::Reset);
        assert!(app.query.is_empty());
        assert_eq!(app.handle_key(key(KeyCode::Backspace), &frame, &inv), Action::None);
    }

    #[test]
    fn arrows_select_visible_rows() {
        let (frame, inv) = fixture();
        let mut app = App::new(TuiStatePersisted::default());
        assert_eq!(
            app.handle_key(key(KeyCode::Down), &frame, &inv),
            Action::Select(Some(ItemId(2)))
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Down), &frame, &inv),
            Action::Select(Some(ItemId(3)))
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Down), &frame, &inv),
            Action::Select(Some(ItemId(3)))
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Up), &frame, &inv),
            Action::Select(Some(ItemId(2)))
        );
    }

    #[test]
    fn space_toggles_group_only_in_group_pane() {
        let (frame, inv) = fixture();
        let mut app = App::new(TuiStatePersisted::default());
        assert_eq!(
            app.handle_key(key(KeyCode::Char(' ')), &frame, &inv),
            Action::Search(" ".into())
        );
        app.query.clear();
        assert_eq!(app.handle_key(key(KeyCode::Tab), &frame, &inv), Action::None);
        assert_eq!(app.focus, FocusRegion::Groups);
        assert_eq!(
            app.handle_key(key(KeyCode::Char(' ')), &frame, &inv),
            Action::Toggle(GroupId(3))
        );
    }

    #[test]
    fn control_keys_quit_and_rerun() {
        let (frame, inv) = fixture();
        let mut app = App::new(TuiStatePersisted::default());
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl('r'), &frame, &inv), Action::Rerun);
        assert_eq!(app.handle_key(ctrl('c'), &frame, &inv), Action::Quit);
        assert_eq!(app.handle_key(key(KeyCode::F(10)), &frame, &inv), Action::Quit);
        assert!(app.query.is_empty());
    }

    #[test]
    fn draw_renders_rows_and_empty_state() {
        use ratatui::backend::TestBackend;

        let (mut frame, inv) = fixture();
        let app = App::new(TuiStatePersisted::default());
        let mut terminal = Terminal::new(TestBackend::new(120, 20)).unwrap();
        terminal.draw(|f| draw(f, &app, &frame, &inv)).unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Sugar"));
        assert!(text.contains("▸ Cake"));

        frame.empty_state = true;
        terminal.draw(|f| draw(f, &app, &frame, &inv)).unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("No items match"));
    }

    fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }
}
