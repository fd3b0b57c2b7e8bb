use anyhow::Result;
use bitjita_sync::{CanonicalItemRecord, ItemKind, SkillCategory, SkillSummary};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Containers,
    Ledger,
    Skills,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterType {
    None,
    Kind(ItemKind),
    ByContainer(String),
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Containers => Page::Ledger,
            Page::Ledger => Page::Skills,
            Page::Skills => Page::Containers,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Containers => Page::Skills,
            Page::Ledger => Page::Containers,
            Page::Skills => Page::Ledger,
        }
    }
}

pub struct App {
    pub username: String,
    pub records: Vec<CanonicalItemRecord>,
    pub filtered_records: Vec<CanonicalItemRecord>,
    pub skills: Option<SkillSummary>,
    pub state: TableState,
    pub containers_state: TableState,
    pub skills_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub active_filter: FilterType,
}

impl App {
    pub fn new(username: &str, records: Vec<CanonicalItemRecord>, skills: Option<SkillSummary>) -> Self {
        let mut state = TableState::default();
        if !records.is_empty() {
            state.select(Some(0));
        }

        let mut containers_state = TableState::default();
        containers_state.select(Some(0));

        let mut skills_state = TableState::default();
        skills_state.select(Some(0));

        let filtered_records = records.clone();

        Self {
            username: username.to_string(),
            records,
            filtered_records,
            skills,
            state,
            containers_state,
            skills_state,
            current_page: Page::Ledger,
            show_detail: false,
            active_filter: FilterType::None,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_record(&self) -> Option<&CanonicalItemRecord> {
        self.state.selected().and_then(|i| self.filtered_records.get(i))
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.filtered_records = match &filter {
            FilterType::None => self.records.clone(),
            FilterType::Kind(kind) => self
                .records
                .iter()
                .filter(|r| r.kind == *kind)
                .cloned()
                .collect(),
            FilterType::ByContainer(container_id) => self
                .records
                .iter()
                .filter(|r| &r.container_id == container_id)
                .cloned()
                .collect(),
        };
        self.active_filter = filter;

        if !self.filtered_records.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(FilterType::None);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    /// (container id, container name, distinct lines, total quantity), biggest first
    pub fn container_summary(&self) -> Vec<(String, String, usize, u64)> {
        let mut order: Vec<String> = Vec::new();
        let mut summary: HashMap<String, (String, usize, u64)> = HashMap::new();

        for record in &self.records {
            let entry = summary.entry(record.container_id.clone()).or_insert_with(|| {
                order.push(record.container_id.clone());
                (record.container_name.clone(), 0, 0)
            });
            entry.1 += 1;
            entry.2 += record.quantity;
        }

        let mut result: Vec<_> = order
            .into_iter()
            .filter_map(|id| {
                summary
                    .remove(&id)
                    .map(|(name, lines, quantity)| (id, name, lines, quantity))
            })
            .collect();

        result.sort_by(|a, b| b.3.cmp(&a.3));
        result
    }

    pub fn selected_container(&self) -> Option<String> {
        self.containers_state
            .selected()
            .and_then(|i| self.container_summary().get(i).map(|c| c.0.clone()))
    }

    fn active_len(&self) -> usize {
        match self.current_page {
            Page::Ledger => self.filtered_records.len(),
            Page::Containers => self.container_summary().len(),
            Page::Skills => self.skills.as_ref().map(|s| s.levels.len()).unwrap_or(0),
        }
    }

    fn active_state(&mut self) -> &mut TableState {
        match self.current_page {
            Page::Ledger => &mut self.state,
            Page::Containers => &mut self.containers_state,
            Page::Skills => &mut self.skills_state,
        }
    }

    pub fn next(&mut self) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let state = self.active_state();
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let state = self.active_state();
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let state = self.active_state();
        let i = match state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let state = self.active_state();
        let i = state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn stats(&self) -> LedgerViewStats {
        let mut stats = LedgerViewStats::default();

        for record in &self.records {
            match record.kind {
                ItemKind::Item => stats.item_count += 1,
                ItemKind::Cargo => stats.cargo_count += 1,
                ItemKind::Sell => stats.sell_count += 1,
                ItemKind::Buy => stats.buy_count += 1,
            }
            stats.total_quantity += record.quantity;
        }

        stats
    }
}

#[derive(Default)]
pub struct LedgerViewStats {
    pub item_count: usize,
    pub cargo_count: usize,
    pub sell_count: usize,
    pub buy_count: usize,
    pub total_quantity: u64,
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter if app.current_page == Page::Containers => {
                    if let Some(container_id) = app.selected_container() {
                        app.apply_filter(FilterType::ByContainer(container_id));
                        app.current_page = Page::Ledger;
                    }
                }
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Ledger;
                }
                KeyCode::Char('1') => app.apply_filter(FilterType::Kind(ItemKind::Item)),
                KeyCode::Char('2') => app.apply_filter(FilterType::Kind(ItemKind::Cargo)),
                KeyCode::Char('3') => app.apply_filter(FilterType::Kind(ItemKind::Sell)),
                KeyCode::Char('4') => app.apply_filter(FilterType::Kind(ItemKind::Buy)),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.active_state().select(Some(0)),
                KeyCode::End => {
                    let len = app.active_len();
                    if len > 0 {
                        app.active_state().select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Ledger {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_ledger(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Containers => render_containers(f, chunks[1], app),
            Page::Ledger => render_ledger(f, chunks[1], app),
            Page::Skills => render_skills(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn kind_color(kind: ItemKind) -> Color {
    match kind {
        ItemKind::Item => Color::White,
        ItemKind::Cargo => Color::Cyan,
        ItemKind::Sell => Color::Green,
        ItemKind::Buy => Color::Yellow,
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();

    let pages = [
        (Page::Containers, "Containers"),
        (Page::Ledger, "Ledger"),
        (Page::Skills, "Skills"),
    ];

    let mut tab_spans = vec![Span::styled(
        format!(" {} ", app.username),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    tab_spans.push(Span::raw(" │ "));

    for (i, (page, name)) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(*name, style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Lines: {}  Qty: {}", app.records.len(), stats.total_quantity),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("cargo {}", stats.cargo_count),
        Style::default().fg(kind_color(ItemKind::Cargo)),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("sell {}", stats.sell_count),
        Style::default().fg(kind_color(ItemKind::Sell)),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("buy {}", stats.buy_count),
        Style::default().fg(kind_color(ItemKind::Buy)),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["Item", "Rarity", "Tier", "Qty", "Container", "Type"]);

    let rows = app.filtered_records.iter().map(|record| {
        let color = kind_color(record.kind);
        let cells = vec![
            Cell::from(truncate(&record.item_name, 30)),
            Cell::from(record.rarity.clone()),
            Cell::from(record.tier.map(|t| t.to_string()).unwrap_or_default()),
            Cell::from(record.quantity.to_string()),
            Cell::from(truncate(&record.container_name, 30)),
            Cell::from(record.kind.as_str()).style(Style::default().fg(color)),
        ];
        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(32),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Inventory Ledger "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_containers(f: &mut Frame, area: Rect, app: &mut App) {
    let summary = app.container_summary();
    let header = header_row(&["Container", "ID", "Lines", "Quantity"]);

    let rows = summary.iter().map(|(id, name, lines, quantity)| {
        Row::new(vec![
            Cell::from(truncate(name, 40)),
            Cell::from(id.clone()),
            Cell::from(lines.to_string()),
            Cell::from(quantity.to_string()).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(42),
            Constraint::Length(22),
            Constraint::Length(8),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Containers - Enter to filter the ledger "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.containers_state);
}

fn render_skills(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(summary) = &app.skills else {
        let empty = Paragraph::new("  No skill data for this player").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Skills "),
        );
        f.render_widget(empty, area);
        return;
    };

    let header = header_row(&["Skill", "Category", "Level", "Experience"]);

    let rows = summary.levels.iter().map(|skill| {
        let color = match skill.category {
            SkillCategory::Profession => Color::Cyan,
            SkillCategory::Adventure => Color::Magenta,
            SkillCategory::None => Color::White,
        };
        Row::new(vec![
            Cell::from(skill.name.clone()),
            Cell::from(skill.category.as_str()).style(Style::default().fg(color)),
            Cell::from(skill.level.to_string()),
            Cell::from(skill.experience.to_string()),
        ])
        .height(1)
    });

    let title = format!(
        " Skills - Total Lvl {} | Total Exp {} ",
        summary.total_level, summary.total_exp
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.skills_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.filtered_records.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.active_filter != FilterType::None {
        let filter_name = match &app.active_filter {
            FilterType::Kind(kind) => kind.as_str().to_string(),
            FilterType::ByContainer(id) => format!("container {}", id),
            FilterType::None => String::new(),
        };
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", filter_name),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("1-4", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" item/cargo/sell/buy | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn detail_line<'a>(label: &'a str, value: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("  {}: ", label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Item Details ");

    let Some(record) = app.selected_record() else {
        f.render_widget(Paragraph::new("No item selected").block(block), area);
        return;
    };

    let tier = record.tier.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string());
    let quantity = record.quantity.to_string();

    let content = vec![
        Line::from(""),
        detail_line("Item", &record.item_name),
        detail_line("Item ID", &record.item_id),
        Line::from(vec![
            Span::styled("  Type: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(record.kind.as_str(), Style::default().fg(kind_color(record.kind))),
        ]),
        detail_line("Rarity", &record.rarity),
        detail_line("Tag", &record.tag),
        detail_line("Tier", &tier),
        detail_line("Quantity", &quantity),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  LOCATION",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        detail_line("Container", &record.container_name),
        detail_line("Container ID", &record.container_id),
        detail_line("Claim", &record.claim_name),
        detail_line("Region", &record.region_id),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}
