// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background bake — runs the bake engine on the blocking pool so the
// interaction loop keeps responding. At most one bake runs at a time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pagewerk_core::config::BakeConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::Annotation;
use pagewerk_document::{BakeEngine, BakeReport};
use tracing::{error, info, instrument};

/// Clears the in-flight flag when the bake ends, however it ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cheaply cloneable handle; clones share the in-flight flag.
#[derive(Debug, Clone)]
pub struct BakeService {
    engine: Arc<BakeEngine>,
    in_flight: Arc<AtomicBool>,
}

impl BakeService {
    pub fn new(config: BakeConfig) -> Self {
        Self {
            engine: Arc::new(BakeEngine::new(config)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a bake is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Bake a snapshot of `annotations` onto the PDF at `original_path` and
    /// write it to `output_path`.
    ///
    /// Returns `BakeInProgress` without doing anything if another bake has
    /// not finished yet.
    #[instrument(skip(self, annotations), fields(
        original = %original_path.display(),
        output = %output_path.display(),
        annotations = annotations.len(),
    ))]
    pub async fn bake(
        &self,
        original_path: PathBuf,
        annotations: Vec<Annotation>,
        output_path: PathBuf,
    ) -> Result<BakeReport> {
        self.run(move |engine| engine.bake_to_path(&original_path, &annotations, &output_path))
            .await
    }

    /// Bake `annotations` onto the bytes a document was opened from. Unlike
    /// [`bake`](Self::bake), `output_path` may be the document's own file.
    #[instrument(skip(self, original, annotations), fields(
        output = %output_path.display(),
        annotations = annotations.len(),
    ))]
    pub async fn bake_bytes(
        &self,
        original: Arc<[u8]>,
        annotations: Vec<Annotation>,
        output_path: PathBuf,
    ) -> Result<BakeReport> {
        self.run(move |engine| engine.bake_bytes_to_path(&original, &annotations, &output_path))
            .await
    }

    async fn run<F>(&self, job: F) -> Result<BakeReport>
    where
        F: FnOnce(&BakeEngine) -> Result<BakeReport> + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PagewerkError::BakeInProgress);
        }
        let guard = InFlight(Arc::clone(&self.in_flight));
        let engine = Arc::clone(&self.engine);

        let outcome = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            job(&engine)
        })
        .await;

        match outcome {
            Ok(Ok(report)) => {
                info!(bytes = report.output_bytes, "document saved");
                Ok(report)
            }
            Ok(Err(err)) => {
                error!(%err, "bake failed");
                Err(err)
            }
            Err(join) => {
                error!(%join, "bake task did not complete");
                Err(PagewerkError::BakeFailed(format!("bake task aborted: {}", join)))
            }
        }
    }
}

impl Default for BakeService {
    fn default() -> Self {
        Self::new(BakeConfig::default())
    }
}
