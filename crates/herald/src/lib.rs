// Herald
// Copyright (C) 2025 Throneless Tech

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

pub mod adapters;
pub mod channels;
pub mod context;
pub mod cooldown;
pub mod data;
pub mod db;
pub mod detect;
pub mod dispatch;
pub mod entity;
pub mod permission;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod subscription;
pub mod utils;

pub use context::EntityContext;
pub use herald_common::error::{HeraldError, Result};
