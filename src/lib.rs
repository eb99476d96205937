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

//! micctl - terminal console for a network microphone
//!
//! Polls the device's status endpoints, shows every runtime setting as an
//! editable field and drives the device actions (stream start/stop, audio
//! restart, thermal latch acknowledgement, reboot, factory reset).

pub mod app;
pub mod client;
pub mod config;
pub mod events;
pub mod logger;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
