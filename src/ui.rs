/*
 * This file is part of micctl.
 *
 * Copyright (C) 2025 micctl contributors
 *
 * micctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * micctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with micctl. If not, see <https://www.gnu.org/licenses/>.
 */

use std::time::Instant;

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{thermal_summary, App, FieldKind};

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

pub fn ui(f: &mut Frame, app: &App) {
    let size = f.area();
    let now = Instant::now();

    // header | info panels | settings + logs | advice | status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(11),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(size);

    render_header(f, app, chunks[0]);
    render_info_panels(f, app, chunks[1]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[2]);
    render_settings(f, app, middle[0], now);
    render_logs(f, app, middle[1]);

    render_advice(f, app, chunks[3]);
    render_status_bar(f, app, chunks[4]);

    if let Some(action) = app.confirm {
        let area = centered_rect(50, 25, size);
        let block = panel(" Confirm ").border_style(Style::default().fg(Color::Yellow));
        let question = match action {
            crate::client::DeviceAction::FactoryReset => "Reset to defaults and reboot?",
            _ => "Restart device now?",
        };
        let body = Paragraph::new(vec![
            Line::from(question),
            Line::from(""),
            Line::from("y / Enter confirm   |   n / Esc cancel").style(Style::default().fg(Color::Gray)),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(Clear, area);
        f.render_widget(body, area);
    }

    if let Some(banner) = app.restarting {
        let area = centered_rect(50, 20, size);
        let body = Paragraph::new(vec![
            Line::from(banner.message()),
            Line::from(""),
            Line::from("Waiting for the device to answer...").style(Style::default().fg(Color::Gray)),
        ])
        .alignment(Alignment::Center)
        .block(panel(" Restarting ").border_style(Style::default().fg(Color::Cyan)));
        f.render_widget(Clear, area);
        f.render_widget(body, area);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(area);

    let text = match &app.status {
        Some(s) => format!(
            " micctl  |  firmware {}  |  {}  |  up {} ",
            s.fw_version, s.ip, s.uptime
        ),
        None => " micctl  |  no data yet ".to_string(),
    };
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::Yellow)),
        cols[0],
    );

    let (label, color) = if app.connected {
        ("connected", Color::Green)
    } else {
        ("offline", Color::Red)
    };
    f.render_widget(
        Paragraph::new(label)
            .alignment(Alignment::Right)
            .style(Style::default().fg(color)),
        cols[1],
    );
}

fn render_info_panels(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    let status_lines: Vec<Line> = match &app.status {
        Some(s) => vec![
            Line::from(format!("WiFi RSSI:    {} dBm", s.wifi_rssi)),
            Line::from(format!("WiFi TX:      {:.1} dBm", s.wifi_tx_dbm)),
            Line::from(format!("Free heap:    {} kB (min {})", s.free_heap_kb, s.min_free_heap_kb)),
            Line::from(format!("RTSP server:  {}", if s.rtsp_server_enabled { "on" } else { "off" })),
            Line::from(format!(
                "Client:       {}",
                if s.client.is_empty() { "-" } else { &s.client }
            )),
            Line::from(format!("Streaming:    {}", yes_no(s.streaming))),
            Line::from(format!("Packet rate:  {} pkt/s", s.current_rate_pkt_s)),
            Line::from(format!("Last connect: {}", s.last_rtsp_connect)),
            Line::from(format!("Last stream:  {}", s.last_stream_start)),
        ],
        None => vec![Line::from("-")],
    };
    f.render_widget(Paragraph::new(status_lines).block(panel(" Status ")), cols[0]);

    render_audio_panel(f, app, cols[1]);
    render_thermal_panel(f, app, cols[2]);
}

fn render_audio_panel(f: &mut Frame, app: &App, area: Rect) {
    let block = panel(" Audio ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(a) = &app.audio else {
        f.render_widget(Paragraph::new("-"), inner);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let mut lines = vec![
        Line::from(format!("Latency:  {:.1} ms", a.latency_ms)),
        Line::from(format!("Profile:  {}", a.profile)),
        Line::from(format!(
            "HPF:      {} @ {} Hz",
            if a.hp_enable { "on" } else { "off" },
            a.hp_cutoff_hz
        )),
    ];
    if let Some(shift) = a.i2s_shift {
        lines.push(Line::from(format!("Shift:    {} bits", shift)));
    }
    if let Some(p) = &app.perf {
        lines.push(Line::from(format!(
            "Recommended min rate: {} pkt/s",
            p.recommended_min_rate
        )));
    }
    f.render_widget(Paragraph::new(lines), rows[0]);

    let level_color = if a.clip {
        Color::Red
    } else if a.peak_pct >= 80.0 {
        Color::Yellow
    } else {
        Color::Green
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(level_color))
        .ratio((a.peak_pct as f64 / 100.0).clamp(0.0, 1.0))
        .label(format!("{:.0}%  {:.1} dBFS", a.peak_pct, a.peak_dbfs));
    f.render_widget(gauge, rows[1]);

    let clip_text = if a.clip {
        Span::styled(
            format!("CLIPPING ({} total)", a.clip_count),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(format!("OK ({} clips)", a.clip_count), Style::default().fg(Color::Gray))
    };
    f.render_widget(Paragraph::new(Line::from(clip_text)), rows[2]);
}

fn render_thermal_panel(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = match &app.thermal {
        Some(t) => {
            let summary_color = if t.latched_persist || t.latched {
                Color::Red
            } else if t.sensor_fault || !t.protection_enabled {
                Color::Yellow
            } else {
                Color::Green
            };
            let mut lines = vec![
                Line::from(Span::styled(thermal_summary(t), Style::default().fg(summary_color))),
                Line::from(format!(
                    "Current:  {}",
                    t.current_c
                        .map(|c| format!("{:.1} C", c))
                        .unwrap_or_else(|| "n/a".to_string())
                )),
                Line::from(format!("Peak:     {:.1} C", t.max_c)),
                Line::from(format!("Limit:    {} C", t.shutdown_c)),
                Line::from(format!("CPU:      {} MHz", t.cpu_mhz)),
            ];
            if t.last_reason.is_empty() {
                lines.push(Line::from("No shutdown recorded yet."));
            } else {
                lines.push(Line::from(format!(
                    "Last trip {:.1} C ({})",
                    t.last_trip_c, t.last_trip_since
                )));
                lines.push(Line::from(t.last_reason.clone()));
            }
            if t.manual_restart {
                lines.push(Line::from(Span::styled(
                    "Press c to acknowledge and re-enable streaming",
                    Style::default().fg(Color::Yellow),
                )));
            }
            lines
        }
        None => vec![Line::from("-")],
    };
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: true }).block(panel(" Thermal ")),
        area,
    );
}

fn render_settings(f: &mut Frame, app: &App, area: Rect, now: Instant) {
    let items: Vec<ListItem> = app
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let sel = if i == app.selected { "> " } else { "  " };
            let hint = match field.kind {
                FieldKind::Toggle(_) => " [space]",
                FieldKind::Number => "",
            };
            let style = if app.guard.is_locked(field.key, now) {
                Style::default().fg(Color::Cyan)
            } else if app.is_dirty(field.key, now) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{: <27} {}{}", sel, field.label, field.value, hint)).style(style)
        })
        .collect();

    let mut state = ListState::default();
    if !app.fields.is_empty() {
        state.select(Some(app.selected.min(app.fields.len() - 1)));
    }
    let list = List::new(items)
        .block(panel(" Settings ").border_style(Style::default().fg(Color::Cyan)))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_logs(f: &mut Frame, app: &App, area: Rect) {
    // Show the tail that fits
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<&str> = app.logs.lines().collect();
    let start = lines.len().saturating_sub(visible);
    let text: Vec<Line> = lines[start..].iter().map(|l| Line::from(*l)).collect();
    f.render_widget(Paragraph::new(text).block(panel(" Logs ")), area);
}

fn render_advice(f: &mut Frame, app: &App, area: Rect) {
    let tips = app.advice();
    let text = if tips.is_empty() {
        "Settings look good.".to_string()
    } else {
        tips.join(" ")
    };
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Yellow))
            .block(panel(" Advice ")),
        area,
    );
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    f.render_widget(Paragraph::new(app.message.as_str()), cols[0]);
    f.render_widget(
        Paragraph::new("↑/↓ field  Enter set  s/x server  a audio  c clear latch  R reboot  F defaults  q quit")
            .alignment(Alignment::Right)
            .style(Style::default().fg(Color::Gray)),
        cols[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DeviceAction;
    use crate::test_utils::test_app;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_dashboard_shows_fields_and_status() {
        let (app, _device) = test_app();
        let screen = render(&app);
        assert!(screen.contains("Sample Rate (Hz)"));
        assert!(screen.contains("48000"));
        assert!(screen.contains("Protection ready"));
        assert!(screen.contains("connected"));
    }

    #[test]
    fn test_confirm_popup_rendered() {
        let (mut app, _device) = test_app();
        app.request_action(DeviceAction::FactoryReset, Instant::now());
        assert!(render(&app).contains("Reset to defaults and reboot?"));
    }
}
