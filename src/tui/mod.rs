//! TUI module - Terminal dashboard with ratatui

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Tabs},
};
use std::io::{stdout, Stdout};

use crate::db::{Database, Log, Plan};
use crate::metrics::{best_set, exercise_series, unique_exercise_names, Metric, ProgressTrend};

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Logs,
    Plans,
    Progress,
}

impl View {
    const ALL: [View; 3] = [View::Logs, View::Plans, View::Progress];

    fn title(&self) -> &'static str {
        match self {
            View::Logs => "Logs",
            View::Plans => "Plans",
            View::Progress => "Progress",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    fn next(&self) -> View {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

/// App state for TUI
pub struct App {
    db: Database,
    logs: Vec<Log>,
    plans: Vec<Plan>,
    names: Vec<String>,
    view: View,
    selected: ListState,
    metric: Metric,
    should_quit: bool,
}

impl App {
    pub fn new(db: Database) -> Result<Self> {
        let mut app = Self {
            db,
            logs: Vec::new(),
            plans: Vec::new(),
            names: Vec::new(),
            view: View::Logs,
            selected: ListState::default(),
            metric: Metric::Weight,
            should_quit: false,
        };
        app.refresh()?;
        Ok(app)
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            if let Err(e) = self.handle_events() {
                restore_terminal()?;
                return Err(e);
            }
        }

        restore_terminal()?;
        Ok(())
    }

    /// Re-read everything from the store
    fn refresh(&mut self) -> Result<()> {
        self.logs = self.db.list_logs()?;
        self.plans = self.db.list_plans()?;
        self.names = unique_exercise_names(&self.logs);

        let selected = match self.selected.selected() {
            _ if self.names.is_empty() => None,
            Some(i) => Some(i.min(self.names.len() - 1)),
            None => Some(0),
        };
        self.selected.select(selected);
        Ok(())
    }

    fn selected_exercise(&self) -> Option<&str> {
        self.selected
            .selected()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let tabs = Tabs::new(View::ALL.iter().map(|v| v.title()))
            .select(self.view.index())
            .highlight_style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL).title("liftlog"));
        frame.render_widget(tabs, chunks[0]);

        match self.view {
            View::Logs => self.render_logs(frame, chunks[1]),
            View::Plans => self.render_plans(frame, chunks[1]),
            View::Progress => self.render_progress(frame, chunks[1]),
        }

        // Footer
        let footer = Paragraph::new("q: quit | tab: switch view | r: refresh | ↑/↓: exercise | m: metric")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[2]);
    }

    fn render_logs(&self, frame: &mut Frame, area: Rect) {
        let rows: Vec<Row> = self
            .logs
            .iter()
            .rev()
            .map(|log| {
                let exercises = log
                    .exercises
                    .iter()
                    .map(|e| {
                        let best = best_set(log, &e.name);
                        format!("{} {}x{}", e.name, best.weight, best.reps)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Row::new(vec![
                    Cell::from(log.date.format("%Y-%m-%d %H:%M").to_string()),
                    Cell::from(log.plan_title.clone()),
                    Cell::from(exercises),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(17),
                Constraint::Length(20),
                Constraint::Min(20),
            ],
        )
        .header(Row::new(vec!["Date", "Plan", "Best sets"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title("Sessions"));

        frame.render_widget(table, area);
    }

    fn render_plans(&self, frame: &mut Frame, area: Rect) {
        let rows: Vec<Row> = self
            .plans
            .iter()
            .flat_map(|plan| {
                plan.exercises.iter().enumerate().map(move |(i, e)| {
                    let title = if i == 0 { plan.title.clone() } else { String::new() };
                    Row::new(vec![
                        Cell::from(title),
                        Cell::from(e.name.clone()),
                        Cell::from(format!("{} x {}", e.goal_sets, e.goal_reps)),
                    ])
                })
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(20),
                Constraint::Length(24),
                Constraint::Min(10),
            ],
        )
        .header(Row::new(vec!["Plan", "Exercise", "Goal"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title("Plans"));

        frame.render_widget(table, area);
    }

    fn render_progress(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(28), Constraint::Min(20)])
            .split(area);

        let items: Vec<ListItem> = self.names.iter().map(|n| ListItem::new(n.as_str())).collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Exercises"))
            .highlight_style(Style::default().fg(Color::Cyan).bold())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, columns[0], &mut self.selected);

        let Some(exercise) = self.selected_exercise() else {
            let empty = Paragraph::new("No sessions logged yet")
                .block(Block::default().borders(Borders::ALL).title(self.metric.label()));
            frame.render_widget(empty, columns[1]);
            return;
        };

        let mut series = exercise_series(&self.logs, exercise, self.metric);
        series.sort_by_key(|p| p.date);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(3)])
            .split(columns[1]);

        let rows: Vec<Row> = series
            .iter()
            .map(|p| {
                Row::new(vec![
                    Cell::from(p.date.format("%Y-%m-%d").to_string()),
                    Cell::from(format!("{:.1}", p.value)),
                ])
            })
            .collect();
        let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(10)])
            .header(Row::new(vec!["Date", "Value"]).style(Style::default().bold()))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} - {}", exercise, self.metric.label())),
            );
        frame.render_widget(table, right[0]);

        let trend = ProgressTrend::fit(&series)
            .map(|t| t.summary("kg"))
            .unwrap_or_else(|| "Trend: need at least 3 sessions".to_string());
        let trend = Paragraph::new(trend).block(Block::default().borders(Borders::ALL));
        frame.render_widget(trend, right[1]);
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => self.should_quit = true,
                        KeyCode::Char('r') => self.refresh()?,
                        KeyCode::Tab => self.view = self.view.next(),
                        KeyCode::Char('m') => {
                            self.metric = match self.metric {
                                Metric::Weight => Metric::OneRepMax,
                                Metric::OneRepMax => Metric::Weight,
                            };
                        }
                        KeyCode::Down if !self.names.is_empty() => {
                            let i = self.selected.selected().map_or(0, |i| (i + 1) % self.names.len());
                            self.selected.select(Some(i));
                        }
                        KeyCode::Up if !self.names.is_empty() => {
                            let i = self.selected.selected().map_or(0, |i| {
                                (i + self.names.len() - 1) % self.names.len()
                            });
                            self.selected.select(Some(i));
                        }
                        _ => {}
                    }
                }
        Ok(())
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LogExercise, NewLog, SetEntry};
    use chrono::Utc;

    fn app_with_logs(names: &[&str]) -> App {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            db.append_log(NewLog {
                plan_title: "Any".to_string(),
                date: Utc::now(),
                exercises: vec![LogExercise {
                    name: name.to_string(),
                    sets: vec![SetEntry::new("100", "5")],
                }],
            })
            .unwrap();
        }
        App::new(db).unwrap()
    }

    #[test]
    fn test_view_cycles() {
        assert_eq!(View::Logs.next(), View::Plans);
        assert_eq!(View::Plans.next(), View::Progress);
        assert_eq!(View::Progress.next(), View::Logs);
    }

    #[test]
    fn test_refresh_selects_first_exercise() {
        let app = app_with_logs(&["Squat", "Bench Press"]);
        assert_eq!(app.names, vec!["Bench Press", "Squat"]);
        assert_eq!(app.selected_exercise(), Some("Bench Press"));
    }

    #[test]
    fn test_refresh_empty_store() {
        let app = app_with_logs(&[]);
        assert_eq!(app.selected_exercise(), None);
    }
}
