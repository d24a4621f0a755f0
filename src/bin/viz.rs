/// mosaicsim live visualizer. Attach to any running simulation or sweep.
///
/// Run in a separate terminal:
///   cargo run --bin viz
///
/// Polls /tmp/mosaicsim_live.json every 200ms and renders a live TUI dashboard:
///
///     ┌ header: profile / objective / status / progress ───────────┐
///     │ effective GFLOPS per size     │ cycle breakdown + resources │
///     │ q/esc: quit  …footer…                                       │
///
/// Press q or Esc to quit. The simulation keeps running unaffected.
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use mosaicsim::metrics::{LiveMetrics, METRICS_PATH, SweepPoint, read_metrics};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Gauge, Paragraph},
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

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let metrics = read_metrics();
        terminal.draw(|f| render(f, metrics.as_ref()))?;

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

fn render(f: &mut Frame, metrics: Option<&LiveMetrics>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // chart + breakdown
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, rows[0], metrics);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(rows[1]);

    render_chart(f, cols[0], metrics);
    render_breakdown(f, cols[1], metrics);
    render_footer(f, rows[2]);
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let block = Block::default()
        .title(Span::styled(
            " ▦ mosaicsim live monitor ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (profile, objective, status) = metrics
        .map(|m| (m.profile.as_str(), m.objective.as_str(), m.status.as_str()))
        .unwrap_or(("—", "—", "idle"));
    let progress = metrics
        .map(|m| format!("{}/{}", m.points.len(), m.sizes_total))
        .unwrap_or_else(|| "—".to_string());

    let status_color = match status {
        "running" => Color::Green,
        "complete" => Color::Cyan,
        "failed" => Color::Red,
        _ => Color::DarkGray,
    };

    let spans = vec![
        Span::styled("  profile: ", Style::default().fg(Color::DarkGray)),
        Span::styled(profile, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("   objective: ", Style::default().fg(Color::DarkGray)),
        Span::styled(objective, Style::default().fg(Color::Cyan)),
        Span::styled("   status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(status.to_uppercase(), Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::styled("   sizes: ", Style::default().fg(Color::DarkGray)),
        Span::raw(progress),
    ];

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ---------------------------------------------------------------------------
// Throughput chart
// ---------------------------------------------------------------------------

fn render_chart(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let title = metrics
        .filter(|m| m.peak_tflops > 0.0)
        .map(|m| format!(" Effective GFLOPS per size (peak {:.0}) ", m.peak_tflops * 1000.0))
        .unwrap_or_else(|| " Effective GFLOPS per size ".to_string());
    let block = Block::default().title(title).borders(Borders::ALL);

    let points: &[SweepPoint] = metrics.map(|m| m.points.as_slice()).unwrap_or(&[]);
    if points.is_empty() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(
            Paragraph::new(Span::styled("  no sizes simulated yet", Style::default().fg(Color::DarkGray))),
            inner,
        );
        return;
    }

    // Keep the most recent bars that fit (bar 5 wide + 1 gap)
    let fits = ((area.width as usize).saturating_sub(2) / 6).max(1);
    let shown = &points[points.len().saturating_sub(fits)..];
    let data: Vec<(&str, u64)> = shown
        .iter()
        .map(|p| (p.label.as_str(), (p.tflops * 1000.0).round() as u64))
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(data.as_slice())
        .bar_width(5)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    f.render_widget(chart, area);
}

// ---------------------------------------------------------------------------
// Cycle breakdown panel
// ---------------------------------------------------------------------------

fn share(part: u64, total: u64) -> u16 {
    if total == 0 { 0 } else { ((part as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u16 }
}

fn render_breakdown(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let block = Block::default().title(" Latest size ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // compute gauge
            Constraint::Length(2), // reduce gauge
            Constraint::Length(2), // exchange gauge
            Constraint::Length(1), // spacer
            Constraint::Min(0),    // text stats
        ])
        .split(inner);

    let Some(m) = metrics else {
        let msg = Paragraph::new(vec![
            Line::raw(""),
            Line::from(Span::styled("  No simulation running.", Style::default().fg(Color::DarkGray))),
            Line::from(Span::styled("  Start mosaicsim to see live data.", Style::default().fg(Color::DarkGray))),
        ]);
        f.render_widget(msg, inner);
        return;
    };

    if let Some(p) = m.latest() {
        let gauges = [
            ("Compute", p.compute, Color::Blue),
            ("Reduce", p.reduce, Color::Green),
            ("Exchange", p.exchange, Color::Red),
        ];
        for (row, (title, cycles, color)) in gauges.into_iter().enumerate() {
            let gauge = Gauge::default()
                .block(Block::default().title(title))
                .gauge_style(Style::default().fg(color))
                .percent(share(cycles, p.cycles))
                .label(format!("{} cycles", cycles));
            f.render_widget(gauge, rows[row]);
        }
    }

    let mut text = Vec::new();
    if let Some(p) = m.latest() {
        text.push(Line::from(vec![
            Span::styled("Size:       ", Style::default().fg(Color::DarkGray)),
            Span::styled(p.label.clone(), Style::default().fg(Color::Yellow)),
        ]));
        text.push(Line::from(vec![
            Span::styled("Cycles:     ", Style::default().fg(Color::DarkGray)),
            Span::raw(p.cycles.to_string()),
        ]));
        text.push(Line::from(vec![
            Span::styled("TFLOPS:     ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:.4}", p.tflops), Style::default().fg(Color::Green)),
        ]));
        text.push(Line::from(vec![
            Span::styled("PEs:        ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{} / {}", p.n_procs, m.max_procs)),
        ]));
        text.push(Line::from(vec![
            Span::styled("Mem/PE:     ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{} / {} KB", p.mem_kb, m.max_proc_mem_kb)),
        ]));
    }
    if let Some(error) = &m.error {
        text.push(Line::raw(""));
        text.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    f.render_widget(Paragraph::new(text), rows[4]);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer(f: &mut Frame, area: Rect) {
    let text = Paragraph::new(Span::styled(
        format!("  q / esc: quit    auto-refreshes every 200ms    reads {}", METRICS_PATH),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(text, area);
}
