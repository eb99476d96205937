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

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use crate::client::DeviceAction;

/// Main event handler. Returns true when the console should exit.
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> anyhow::Result<bool> {
    handle_key_event_at(app, key_event, Instant::now())
}

pub fn handle_key_event_at(app: &mut App, key_event: KeyEvent, now: Instant) -> anyhow::Result<bool> {
    let KeyEvent { code, modifiers, .. } = key_event;

    if is_quit(code, modifiers) {
        return Ok(true);
    }

    // Nothing to talk to while the device restarts
    if app.restarting.is_some() {
        return Ok(false);
    }

    if app.confirm.is_some() {
        handle_confirm_popup(app, code, now);
        return Ok(false);
    }

    handle_global_events(app, code, now);
    Ok(false)
}

fn is_quit(code: KeyCode, modifiers: KeyModifiers) -> bool {
    matches!(code, KeyCode::Char('q'))
        || (modifiers.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')))
}

fn handle_confirm_popup(app: &mut App, code: KeyCode, now: Instant) {
    match code {
        KeyCode::Char('y') | KeyCode::Enter => app.confirm_pending(now),
        KeyCode::Char('n') | KeyCode::Esc => app.cancel_pending(),
        _ => {}
    }
}

fn handle_global_events(app: &mut App, code: KeyCode, now: Instant) {
    match code {
        KeyCode::Up => app.select_prev(),
        KeyCode::Down | KeyCode::Tab => app.select_next(),
        KeyCode::Enter => app.submit_selected(now),
        KeyCode::Backspace => app.backspace(now),
        KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => app.toggle_selected(now),
        KeyCode::Char('s') => app.request_action(DeviceAction::ServerStart, now),
        KeyCode::Char('x') => app.request_action(DeviceAction::ServerStop, now),
        KeyCode::Char('a') => app.request_action(DeviceAction::ResetAudio, now),
        KeyCode::Char('c') => app.request_action(DeviceAction::ClearThermalLatch, now),
        KeyCode::Char('R') => app.request_action(DeviceAction::Reboot, now),
        KeyCode::Char('F') => app.request_action(DeviceAction::FactoryReset, now),
        KeyCode::Char('r') => app.refresh_at(now),
        KeyCode::Char(c) => {
            app.type_char(c, now);
        }
        _ => {}
    }
}
