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

//! Opt-in JSON-lines event log of console activity (`--logging`)

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};

use crate::config::config_dir;

const FALLBACK_LOG_PATH: &str = "/tmp/micctl_events.jsonl";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

pub fn default_log_path() -> PathBuf {
    config_dir().join("events.jsonl")
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Start logging to the default location, or /tmp when that is not writable.
/// Returns the path in use.
pub fn init_logging() -> Option<PathBuf> {
    let primary = default_log_path();
    if init_logging_at(&primary).is_ok() {
        return Some(primary);
    }
    let fallback = PathBuf::from(FALLBACK_LOG_PATH);
    init_logging_at(&fallback).ok().map(|_| fallback)
}

pub fn init_logging_at(path: &Path) -> io::Result<()> {
    let file = open_append(path)?;
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }
    Ok(())
}

pub fn is_enabled() -> bool {
    LOG_FILE.lock().map(|g| g.is_some()).unwrap_or(false)
}

/// No-op until logging was initialized
pub fn log_event(event: &str, data: Value) {
    let Ok(mut guard) = LOG_FILE.lock() else {
        return;
    };
    let Some(file) = guard.as_mut() else {
        return;
    };
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    });
    let _ = writeln!(file, "{}", line);
}

#[cfg(test)]
pub(crate) fn shutdown_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = None;
    }
}
