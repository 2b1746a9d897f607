// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagewerk-bridge — Host collaborator abstractions.
//
// Defines the traits the editor consumes (document source, text entry,
// signature capture, sharing), a filesystem document source, and the stub
// bridge used when no interactive host is attached.

pub mod fs;
pub mod stub;
pub mod traits;

pub use fs::FileSystemSource;
pub use stub::StubBridge;
pub use traits::{DocumentSource, PlatformBridge, ShareTarget, SignatureCapture, TextEntry};

/// Bridge implementation for the current build.
///
/// Hosts that provide real text entry or signature capture pass their own
/// `PlatformBridge` to the editor instead.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    Box::new(stub::StubBridge)
}
