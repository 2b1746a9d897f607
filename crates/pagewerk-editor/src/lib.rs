// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk editor — command-driven annotation editing over one open document.

pub mod bake_service;
pub mod controller;
pub mod session;

pub use bake_service::BakeService;
pub use controller::{EditorCommand, EditorEvent, InteractionController, InteractionState, PointerId};
pub use session::{BakeSnapshot, EditorSession, SharedSession};
