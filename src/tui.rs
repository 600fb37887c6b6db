use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::Datelike;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table, Tabs, Wrap};

use crate::app::{AppService, StatusSink};
use crate::curated::{EnvHourView, LocationWiki, RunLogEntry, SourceRunEntry};
use crate::domain::{FetchSummary, MacroAnnualFact};
use crate::export;
use crate::scheduler::{JobOutcome, Scheduler};

const LOGS_MAX: usize = 200;
const ENV_TABLE_HOURS: usize = 24;
const SPARK_POINTS: usize = 48;
const MACRO_YEARS: i32 = 15;
const ENV_COLUMNS: &[&str] = &[
    "temp_c",
    "wind_kph",
    "precip_mm",
    "pm2_5",
    "pm10",
    "european_aqi",
    "us_aqi",
];
const SPARK_SERIES: &[&str] = &["european_aqi", "pm2_5", "temp_c", "wind_kph"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Environment,
    MacroCompare,
    DataOps,
}

impl Tab {
    fn index(self) -> usize {
        match self {
            Tab::Environment => 0,
            Tab::MacroCompare => 1,
            Tab::DataOps => 2,
        }
    }

    fn next(self) -> Self {
        match self {
            Tab::Environment => Tab::MacroCompare,
            Tab::MacroCompare => Tab::DataOps,
            Tab::DataOps => Tab::Environment,
        }
    }
}

struct SharedState {
    status: String,
    logs: VecDeque<String>,
    fetching: bool,
    dirty: bool,
    last_summary: Option<FetchSummary>,
}

struct DashSink {
    shared: Arc<Mutex<SharedState>>,
}

impl StatusSink for DashSink {
    fn status(&self, message: &str) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.status = message.to_string();
            push_log(&mut shared.logs, message);
        }
    }
}

pub struct Dashboard {
    service: Arc<AppService>,
    shared: Arc<Mutex<SharedState>>,
    tab: Tab,
    location_idx: usize,
    indicator_idx: usize,
    series_idx: usize,
    scheduler: Option<Scheduler>,
    raw_ok: bool,
    raw_checked: Instant,
    env_hours: Vec<EnvHourView>,
    env_series: Vec<(String, f64)>,
    wiki: Option<LocationWiki>,
    macro_series: Vec<MacroAnnualFact>,
    macro_latest: Vec<MacroAnnualFact>,
    runs: Vec<RunLogEntry>,
    source_runs: Vec<SourceRunEntry>,
}

impl Dashboard {
    pub fn new(service: Arc<AppService>) -> Self {
        let raw_ok = service.raw_store_available();
        Self {
            service,
            shared: Arc::new(Mutex::new(SharedState {
                status: "Ready".to_string(),
                logs: VecDeque::new(),
                fetching: false,
                dirty: false,
                last_summary: None,
            })),
            tab: Tab::Environment,
            location_idx: 0,
            indicator_idx: 0,
            series_idx: 0,
            scheduler: None,
            raw_ok,
            raw_checked: Instant::now(),
            env_hours: Vec::new(),
            env_series: Vec::new(),
            wiki: None,
            macro_series: Vec::new(),
            macro_latest: Vec::new(),
            runs: Vec::new(),
            source_runs: Vec::new(),
        }
    }

    pub fn run(&mut self) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        self.reload_data();

        let result = self.event_loop(&mut terminal);

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> miette::Result<()> {
        loop {
            self.refresh_if_dirty();
            terminal
                .draw(|frame| draw_ui(frame, self))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(150)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                self.tab = self.tab.next();
            }
            KeyCode::Char('1') => self.tab = Tab::Environment,
            KeyCode::Char('2') => self.tab = Tab::MacroCompare,
            KeyCode::Char('3') => self.tab = Tab::DataOps,
            KeyCode::Left => self.cycle_selection(-1),
            KeyCode::Right => self.cycle_selection(1),
            KeyCode::Char('v') => {
                self.series_idx = (self.series_idx + 1) % SPARK_SERIES.len();
                self.reload_data();
            }
            KeyCode::Char('f') => self.spawn_fetch(),
            KeyCode::Char('s') => self.toggle_scheduler(),
            KeyCode::Char('e') => self.export_current(),
            KeyCode::Char('r') => self.reload_data(),
            _ => {}
        }
        false
    }

    fn cycle_selection(&mut self, step: isize) {
        match self.tab {
            Tab::Environment => {
                let count = self.service.config().locations.len();
                if count > 0 {
                    self.location_idx = wrap_index(self.location_idx, step, count);
                }
            }
            Tab::MacroCompare => {
                let count = self.service.config().macro_indicators.len();
                if count > 0 {
                    self.indicator_idx = wrap_index(self.indicator_idx, step, count);
                }
            }
            Tab::DataOps => {}
        }
        self.reload_data();
    }

    fn spawn_fetch(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            if shared.fetching {
                return;
            }
            shared.fetching = true;
        }
        let service = self.service.clone();
        let shared = self.shared.clone();
        thread::spawn(move || {
            let sink = DashSink {
                shared: shared.clone(),
            };
            let outcome = service.fetch_all(&sink);
            if let Ok(mut state) = shared.lock() {
                state.fetching = false;
                state.dirty = true;
                match outcome {
                    Ok(summary) => {
                        state.last_summary = Some(summary);
                    }
                    Err(err) => {
                        state.status = format!("Fetch failed: {err}");
                        let message = state.status.clone();
                        push_log(&mut state.logs, &message);
                    }
                }
            }
        });
    }

    fn toggle_scheduler(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
            self.set_status("Scheduler stopped");
            return;
        }
        if !self.service.raw_store_available() {
            self.set_status("Scheduler disabled: raw landing store unavailable");
            return;
        }

        let interval = Duration::from_secs(self.service.config().refresh_interval_secs);
        let service = self.service.clone();
        let shared = self.shared.clone();
        let scheduler = Scheduler::start(interval, move || {
            if !service.raw_store_available() {
                return JobOutcome::Unhealthy;
            }
            let sink = DashSink {
                shared: shared.clone(),
            };
            match service.fetch_all(&sink) {
                Ok(summary) => {
                    if let Ok(mut state) = shared.lock() {
                        state.last_summary = Some(summary);
                        state.dirty = true;
                    }
                    JobOutcome::Ran
                }
                Err(crate::error::EcoError::FetchBusy) => JobOutcome::Busy,
                Err(err) => {
                    if let Ok(mut state) = shared.lock() {
                        state.status = format!("Scheduled fetch failed: {err}");
                    }
                    JobOutcome::Ran
                }
            }
        });
        self.scheduler = Some(scheduler);
        self.set_status(&format!(
            "Scheduler started (every {}s)",
            interval.as_secs()
        ));
    }

    fn export_current(&mut self) {
        let result = match self.tab {
            Tab::Environment | Tab::DataOps => {
                let Some(location) = self.current_location_key() else {
                    return;
                };
                let path = Utf8PathBuf::from(format!("ecopulse_env_{location}.csv"));
                export::export_env_csv(self.service.curated(), &location, &path)
                    .map(|rows| (rows, path))
            }
            Tab::MacroCompare => {
                let Some(indicator) = self.current_indicator_code() else {
                    return;
                };
                let path = Utf8PathBuf::from(format!("ecopulse_macro_{indicator}.csv"));
                export::export_macro_csv(self.service.curated(), &indicator, &path)
                    .map(|rows| (rows, path))
            }
        };
        match result {
            Ok((rows, path)) => self.set_status(&format!("Exported {rows} rows to {path}")),
            Err(err) => self.set_status(&format!("Export failed: {err}")),
        }
    }

    fn refresh_if_dirty(&mut self) {
        let dirty = self
            .shared
            .lock()
            .map(|mut shared| std::mem::take(&mut shared.dirty))
            .unwrap_or(false);
        if dirty {
            self.reload_data();
        }
        if self.raw_checked.elapsed() > Duration::from_secs(30) {
            self.raw_ok = self.service.raw_store_available();
            self.raw_checked = Instant::now();
        }
    }

    fn reload_data(&mut self) {
        let store = self.service.curated();
        if let Some(location) = self.current_location_key() {
            self.env_hours = store
                .latest_env_hours(&location, ENV_TABLE_HOURS)
                .unwrap_or_default();
            self.env_series = store
                .env_series(&location, self.current_series_code(), SPARK_POINTS)
                .unwrap_or_default();
            self.wiki = store.location_wiki(&location).unwrap_or_default();
        }
        if let Some(indicator) = self.current_indicator_code() {
            let end_year = chrono::Utc::now().year();
            self.macro_series = store
                .macro_series(&indicator, end_year - MACRO_YEARS, end_year)
                .unwrap_or_default();
            self.macro_latest = store.macro_latest(&indicator).unwrap_or_default();
        }
        self.runs = store.recent_runs(6).unwrap_or_default();
        self.source_runs = store.recent_source_runs(9).unwrap_or_default();
    }

    fn current_location_key(&self) -> Option<String> {
        self.service
            .config()
            .locations
            .get(self.location_idx)
            .map(|location| location.key.to_string())
    }

    fn current_indicator_code(&self) -> Option<String> {
        self.service
            .config()
            .macro_indicators
            .get(self.indicator_idx)
            .map(|indicator| indicator.code.clone())
    }

    fn current_series_code(&self) -> &'static str {
        SPARK_SERIES[self.series_idx % SPARK_SERIES.len()]
    }

    fn set_status(&self, message: &str) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.status = message.to_string();
            push_log(&mut shared.logs, message);
        }
    }
}

fn wrap_index(current: usize, step: isize, count: usize) -> usize {
    let count = count as isize;
    ((current as isize + step).rem_euclid(count)) as usize
}

fn push_log(logs: &mut VecDeque<String>, message: &str) {
    if logs.len() >= LOGS_MAX {
        logs.pop_front();
    }
    logs.push_back(format!(
        "[{}] {message}",
        chrono::Utc::now().format("%H:%M:%S")
    ));
}

fn draw_ui(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_tabs(frame, dashboard, chunks[0]);
    match dashboard.tab {
        Tab::Environment => draw_environment(frame, dashboard, chunks[1]),
        Tab::MacroCompare => draw_macro(frame, dashboard, chunks[1]),
        Tab::DataOps => draw_data_ops(frame, dashboard, chunks[1]),
    }
    draw_status(frame, dashboard, chunks[2]);
}

fn draw_tabs(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, area: Rect) {
    let titles = ["Environment", "Macro Compare", "Data Ops"]
        .into_iter()
        .map(Line::from)
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(dashboard.tab.index())
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("EcoPulse"));
    frame.render_widget(tabs, area);
}

fn draw_environment(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(6),
            Constraint::Length(5),
            Constraint::Length(4),
        ])
        .split(area);

    let location_name = dashboard
        .service
        .config()
        .locations
        .get(dashboard.location_idx)
        .map(|location| format!("{} ({})", location.name, location.key))
        .unwrap_or_else(|| "no locations configured".to_string());

    let kpis = dashboard.env_hours.first();
    let kpi_line = match kpis {
        Some(hour) => {
            let mut spans = vec![Span::styled(
                format!("{}  ", hour.ts_utc),
                Style::default().fg(Color::DarkGray),
            )];
            for code in ENV_COLUMNS {
                let value = hour
                    .values
                    .get(*code)
                    .map(|value| format!("{value:.1}"))
                    .unwrap_or_else(|| "-".to_string());
                spans.push(Span::raw(format!("{code}: ")));
                spans.push(Span::styled(
                    format!("{value}  "),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            }
            Line::from(spans)
        }
        None => Line::from("no curated readings yet, press f to fetch"),
    };
    let kpi = Paragraph::new(vec![kpi_line])
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Latest: {location_name} (←/→ switch)")),
        );
    frame.render_widget(kpi, chunks[0]);

    let header = Row::new(
        std::iter::once("hour (UTC)")
            .chain(ENV_COLUMNS.iter().copied())
            .map(Cell::from)
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = dashboard.env_hours.iter().map(|hour| {
        let mut cells = vec![Cell::from(hour.ts_utc.clone())];
        for code in ENV_COLUMNS {
            let value = hour
                .values
                .get(*code)
                .map(|value| format!("{value:.1}"))
                .unwrap_or_else(|| "-".to_string());
            cells.push(Cell::from(value));
        }
        Row::new(cells)
    });
    let mut widths = vec![Constraint::Length(17)];
    widths.extend(std::iter::repeat_n(Constraint::Min(8), ENV_COLUMNS.len()));
    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Recent hours (last {ENV_TABLE_HOURS})")),
    );
    frame.render_widget(table, chunks[1]);

    let spark_values = normalize_series(&dashboard.env_series);
    let sparkline = Sparkline::default()
        .data(&spark_values)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(format!(
            "{} over {} readings (v to change series)",
            dashboard.current_series_code(),
            dashboard.env_series.len()
        )));
    frame.render_widget(sparkline, chunks[2]);

    let wiki_text = dashboard
        .wiki
        .as_ref()
        .and_then(|wiki| {
            wiki.title
                .as_ref()
                .map(|title| format!("{title}: {}", wiki.summary.as_deref().unwrap_or("")))
        })
        .unwrap_or_else(|| "no encyclopedia summary yet".to_string());
    let wiki = Paragraph::new(wiki_text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("About"));
    frame.render_widget(wiki, chunks[3]);
}

fn draw_macro(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(6)])
        .split(area);

    let indicator = dashboard
        .service
        .config()
        .macro_indicators
        .get(dashboard.indicator_idx);
    let title = indicator
        .map(|indicator| format!("{}: {} (←/→ switch)", indicator.code, indicator.name))
        .unwrap_or_else(|| "no indicators configured".to_string());

    let latest_rows = dashboard.macro_latest.iter().map(|fact| {
        Row::new(vec![
            Cell::from(region_name(dashboard, &fact.region_code)),
            Cell::from(fact.year.to_string()),
            Cell::from(
                fact.value
                    .map(|value| format!("{value:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ])
    });
    let latest = Table::new(
        latest_rows,
        [
            Constraint::Min(20),
            Constraint::Length(6),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(["region", "year", "value"]).style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(latest, chunks[0]);

    let regions = &dashboard.service.config().regions;
    let mut by_year: BTreeMap<i32, BTreeMap<&str, f64>> = BTreeMap::new();
    for fact in &dashboard.macro_series {
        if let Some(value) = fact.value {
            by_year
                .entry(fact.year)
                .or_default()
                .insert(fact.region_code.as_str(), value);
        }
    }
    let header = Row::new(
        std::iter::once("year".to_string())
            .chain(regions.iter().map(|region| region.code.clone()))
            .map(Cell::from)
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = by_year.iter().rev().map(|(year, values)| {
        let mut cells = vec![Cell::from(year.to_string())];
        for region in regions {
            let value = values
                .get(region.code.as_str())
                .map(|value| format!("{value:.2}"))
                .unwrap_or_else(|| "-".to_string());
            cells.push(Cell::from(value));
        }
        Row::new(cells)
    });
    let mut widths = vec![Constraint::Length(6)];
    widths.extend(std::iter::repeat_n(Constraint::Min(9), regions.len()));
    let series = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Last {MACRO_YEARS} years")),
    );
    frame.render_widget(series, chunks[1]);
}

fn draw_data_ops(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(5),
            Constraint::Length(8),
        ])
        .split(area);

    let (fetching, last_summary) = dashboard
        .shared
        .lock()
        .map(|shared| (shared.fetching, shared.last_summary.clone()))
        .unwrap_or((false, None));
    let scheduler_line = match &dashboard.scheduler {
        Some(scheduler) if scheduler.running() => format!(
            "scheduler: running (every {}s)",
            scheduler.interval().as_secs()
        ),
        Some(_) => "scheduler: disabled (store unhealthy)".to_string(),
        None => "scheduler: stopped".to_string(),
    };
    let last_fetch_line = match &last_summary {
        Some(summary) => format!(
            "last fetch: {} ({} payloads, {} curated rows){}",
            summary.finished_at_utc,
            summary.total_items(),
            summary.total_curated_rows(),
            if summary.ok { "" } else { " (with failures)" }
        ),
        None => "last fetch: none this session".to_string(),
    };
    let health = Paragraph::new(vec![
        Line::from(format!(
            "raw landing store: {}",
            if dashboard.raw_ok { "ok" } else { "unavailable" }
        )),
        Line::from(scheduler_line),
        Line::from(format!(
            "fetch state: {}",
            if fetching { "Fetching" } else { "Idle" }
        )),
        Line::from(last_fetch_line),
    ])
    .block(Block::default().borders(Borders::ALL).title("Health"));
    frame.render_widget(health, chunks[0]);

    let rows = dashboard.source_runs.iter().map(|run| {
        Row::new(vec![
            Cell::from(run.source.clone()),
            Cell::from(run.started_at_utc.clone()),
            Cell::from(if run.ok { "ok" } else { "failed" }),
            Cell::from(run.item_count.to_string()),
            Cell::from(run.message.clone().unwrap_or_default()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(27),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Min(20),
        ],
    )
    .header(
        Row::new(["source", "started", "ok", "items", "message"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Recent source runs"),
    );
    frame.render_widget(table, chunks[1]);

    let run_lines = dashboard
        .runs
        .iter()
        .map(|run| {
            Line::from(format!(
                "{}  {}  {}",
                run.started_at_utc,
                if run.ok { "ok" } else { "failed" },
                run.message.as_deref().unwrap_or("")
            ))
        })
        .collect::<Vec<_>>();
    let runs = Paragraph::new(run_lines)
        .block(Block::default().borders(Borders::ALL).title("Fetch runs"));
    frame.render_widget(runs, chunks[2]);
}

fn draw_status(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, area: Rect) {
    let (status, fetching) = dashboard
        .shared
        .lock()
        .map(|shared| (shared.status.clone(), shared.fetching))
        .unwrap_or_else(|_| ("status unavailable".to_string(), false));
    let indicator = if fetching { " [fetching]" } else { "" };
    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{status}{indicator}"),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            "   f fetch · s scheduler · e export · v series · Tab view · q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}

fn region_name(dashboard: &Dashboard, code: &str) -> String {
    dashboard
        .service
        .config()
        .regions
        .iter()
        .find(|region| region.code == code)
        .map(|region| format!("{} ({})", region.name, region.code))
        .unwrap_or_else(|| code.to_string())
}

fn normalize_series(series: &[(String, f64)]) -> Vec<u64> {
    let values: Vec<f64> = series.iter().map(|(_, value)| *value).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let span = (max - min).max(f64::EPSILON);
    values
        .iter()
        .map(|value| (((value - min) / span) * 100.0).round() as u64 + 1)
        .collect()
}
