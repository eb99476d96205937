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

use std::io::stdout;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;

use micctl::app::App;
use micctl::client::HttpDevice;
use micctl::config::{config_path, load_console_config, save_console_config};
use micctl::events::handle_key_event;
use micctl::logger;
use micctl::ui::ui;

#[derive(Parser, Debug)]
#[command(name = "micctl")]
#[command(author, version, about = "Terminal console for the micctl network microphone")]
struct Cli {
    /// Device base URL, overrides the config file
    #[arg(short, long)]
    url: Option<String>,

    /// Poll interval in milliseconds, overrides the config file
    #[arg(short, long)]
    interval: Option<u64>,

    /// Append a JSON-lines event log next to the config file
    #[arg(long)]
    logging: bool,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_console_config();
    if let Some(url) = cli.url {
        config.device_url = url;
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_ms = interval;
    }

    if cli.save {
        save_console_config(&config)?;
        println!("Wrote config to {}", config_path().display());
        return Ok(());
    }

    if cli.logging {
        match logger::init_logging() {
            Some(path) => eprintln!("Logging events to {}", path.display()),
            None => eprintln!("Event log unavailable, continuing without it"),
        }
        logger::log_event("startup", serde_json::json!({
            "device_url": config.device_url,
            "poll_interval_ms": config.poll_interval_ms,
        }));
    }

    let device = HttpDevice::new(&config.device_url)?;

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, App::new(Box::new(device), config.poll_interval()));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
        if logger::is_enabled() {
            logger::log_event("fatal_error", serde_json::json!({ "error": err.to_string() }));
        }
        std::process::exit(1);
    }

    logger::log_event("shutdown", serde_json::json!({}));
    Ok(())
}

/// Upper bound on a single input wait so the restart probe stays responsive
const MAX_INPUT_WAIT: Duration = Duration::from_millis(500);

fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    mut app: App,
) -> anyhow::Result<()> {
    app.refresh();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = app
            .refresh_interval
            .saturating_sub(app.last_refresh.elapsed())
            .min(MAX_INPUT_WAIT);
        if event::poll(timeout).unwrap_or(false) {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press && handle_key_event(&mut app, key_event)? {
                    return Ok(());
                }
            }
        }

        if app.last_refresh.elapsed() >= app.refresh_interval || app.restarting.is_some() {
            app.refresh();
        }
    }
}
