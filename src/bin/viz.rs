/// cpusim live dashboard — attach to any running prediction at any time.
///
/// Run in a separate terminal:
///   cargo run --bin viz
///
/// Polls /tmp/cpusim_live.json every 200ms and renders a live TUI dashboard:
///
///     ┌ header: machine / workload / status ───────────────────────┐
///     │ model counters (one bar each) │ Prediction: time, cycles … │
///     │ task-graph panel (after a graph replay has run)            │
///     │ q/esc: quit  …footer…                                      │
///
/// Press q or Esc to quit. The predictor keeps running unaffected.
use cpusim::report::{read_report, LiveReport};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::{io, time::Duration};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let report = read_report();
        terminal.draw(|f| render(f, report.as_ref()))?;

        // Non-blocking: poll for 200ms, then redraw regardless
        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top-level layout
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, report: Option<&LiveReport>) {
    let area = f.area();
    let has_graph = report.map(|r| r.last_graph.is_some()).unwrap_or(false);

    // Graph panel height: 2 borders + blank + one row per instruction class.
    // Minimum 6, capped at 12.
    let graph_height = if has_graph {
        let classes = report
            .and_then(|r| r.last_graph.as_ref())
            .map(|g| g.class_mix.len())
            .unwrap_or(0);
        (classes as u16 + 4).clamp(6, 12)
    } else {
        0
    };

    let rows = if has_graph {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),            // header
                Constraint::Min(8),               // counters + prediction
                Constraint::Length(graph_height), // graph panel
                Constraint::Length(1),            // footer
            ])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // header
                Constraint::Min(0),    // counters + prediction
                Constraint::Length(1), // footer
            ])
            .split(area)
    };

    render_header(f, rows[0], report);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(rows[1]);

    render_counters(f, cols[0], report);
    render_prediction(f, cols[1], report);

    if has_graph {
        render_graph(f, rows[2], report.unwrap());
        render_footer(f, rows[3]);
    } else {
        render_footer(f, rows[2]);
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, area: Rect, report: Option<&LiveReport>) {
    let block = Block::default()
        .title(Span::styled(
            " ⚡ cpusim live monitor ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (machine, workload, status) = report
        .map(|r| (r.machine.as_str(), r.workload.as_str(), r.status.as_str()))
        .unwrap_or(("—", "—", "idle"));

    let status_color = match status {
        "running" => Color::Green,
        "complete" => Color::Cyan,
        _ => Color::DarkGray,
    };

    let spans = vec![
        Span::styled("  machine: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            machine,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   workload: ", Style::default().fg(Color::DarkGray)),
        Span::styled(workload, Style::default().fg(Color::Cyan)),
        Span::styled("   status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            status.to_uppercase(),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
    ];

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ---------------------------------------------------------------------------
// Model counters
// ---------------------------------------------------------------------------

fn render_counters(f: &mut Frame, area: Rect, report: Option<&LiveReport>) {
    let block = Block::default()
        .title(" Model Counters ")
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    match report {
        None => {
            let msg = Paragraph::new(vec![
                Line::raw(""),
                Line::from(Span::styled(
                    "  No prediction running.",
                    Style::default().fg(Color::DarkGray),
                )),
                Line::from(Span::styled(
                    "  Start cpusim to see live data.",
                    Style::default().fg(Color::DarkGray),
                )),
            ]);
            f.render_widget(msg, inner);
        }
        Some(r) => {
            // Largest counter scales the bars.
            let peak = r.stats.iter().map(|(_, v)| v).fold(0.0_f64, f64::max);
            let bar_width = (inner.width as usize).saturating_sub(36).max(8);

            let mut lines: Vec<Line> = vec![Line::raw("")];
            for (key, value) in r.stats.iter() {
                let filled = if peak > 0.0 {
                    ((value / peak) * bar_width as f64).round() as usize
                } else {
                    0
                };
                let color = if key.ends_with("cycles") {
                    Color::Green
                } else {
                    Color::Blue
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("  {key:<22}"), Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        "█".repeat(filled.min(bar_width)),
                        Style::default().fg(color),
                    ),
                    Span::raw(format!(" {value:.2e}")),
                ]));
            }
            f.render_widget(Paragraph::new(lines), inner);
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction panel
// ---------------------------------------------------------------------------

fn render_prediction(f: &mut Frame, area: Rect, report: Option<&LiveReport>) {
    let block = Block::default().title(" Prediction ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // thread efficiency gauge
            Constraint::Length(1), // spacer
            Constraint::Length(2), // L1 hit gauge
            Constraint::Length(1), // spacer
            Constraint::Min(0),    // text stats
        ])
        .split(inner);

    match report {
        None => {
            let msg = Paragraph::new(Line::from(Span::styled(
                "  awaiting snapshot",
                Style::default().fg(Color::DarkGray),
            )));
            f.render_widget(msg, rows[4]);
        }
        Some(r) => {
            // Thread efficiency gauge
            let eff_pct = (r.thread_efficiency * 100.0).clamp(0.0, 100.0) as u16;
            let eff_color = match eff_pct {
                0..=33 => Color::Red,
                34..=66 => Color::Yellow,
                _ => Color::Green,
            };
            let eff_gauge = Gauge::default()
                .block(Block::default().title("Thread efficiency"))
                .gauge_style(Style::default().fg(eff_color))
                .percent(eff_pct)
                .label(format!("{:.1}%", r.thread_efficiency * 100.0));
            f.render_widget(eff_gauge, rows[0]);

            // L1 hit gauge over the float loads that left the registers
            let hits = r.stats.get("L1_float_hits");
            let misses = r.stats.get("L1_float_misses");
            let hit_frac = if hits + misses > 0.0 {
                hits / (hits + misses)
            } else {
                0.0
            };
            let hit_gauge = Gauge::default()
                .block(Block::default().title("L1 float hits"))
                .gauge_style(Style::default().fg(Color::Blue))
                .percent((hit_frac * 100.0).clamp(0.0, 100.0) as u16)
                .label(format!("{:.1}%", hit_frac * 100.0));
            f.render_widget(hit_gauge, rows[2]);

            // Text stats
            let text = vec![
                Line::from(vec![
                    Span::styled("Predicted:  ", Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        format!("{:.3} ms", r.predicted_time_s * 1.0e3),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(vec![
                    Span::styled("Cycles:     ", Style::default().fg(Color::DarkGray)),
                    Span::raw(format!("{:.3e}", r.cycles)),
                ]),
                Line::from(vec![
                    Span::styled("Clock:      ", Style::default().fg(Color::DarkGray)),
                    Span::raw(format!("{:.2} GHz", r.clockspeed / 1.0e9)),
                ]),
                Line::from(vec![
                    Span::styled("Records:    ", Style::default().fg(Color::DarkGray)),
                    Span::raw(r.tasklist_len.to_string()),
                ]),
                Line::raw(""),
                Line::from(vec![
                    Span::styled("RAM:        ", Style::default().fg(Color::DarkGray)),
                    Span::raw(format!("{:.2e} accesses", r.stats.get("RAM accesses"))),
                ]),
            ];
            f.render_widget(Paragraph::new(text), rows[4]);
        }
    }
}

// ---------------------------------------------------------------------------
// Task-graph panel  (only shown after a graph replay)
// ---------------------------------------------------------------------------

fn render_graph(f: &mut Frame, area: Rect, r: &LiveReport) {
    let g = match &r.last_graph {
        Some(g) => g,
        None => return,
    };

    let title = format!(
        " Task graph: {} ({} vertices)  retired in {:.3e} s ",
        g.name, g.vertices, g.total_time_s,
    );
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    // One row per instruction class, bar scaled to the largest class.
    let peak = g.class_mix.iter().map(|(_, n)| *n).max().unwrap_or(1).max(1);
    let mut lines: Vec<Line> = vec![Line::raw("")];
    for (class, count) in &g.class_mix {
        let filled = (count * 24) / peak;
        lines.push(Line::from(vec![
            Span::styled(format!("  {class:<10}"), Style::default().fg(Color::DarkGray)),
            Span::styled("█".repeat(filled), Style::default().fg(Color::Magenta)),
            Span::raw(format!(" {count}")),
        ]));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer(f: &mut Frame, area: Rect) {
    let text = Paragraph::new(Span::styled(
        "  q / esc: quit    auto-refreshes every 200ms    reads /tmp/cpusim_live.json",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(text, area);
}
