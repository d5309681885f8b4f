// src/services/archive.rs

use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::SimpleFileOptions};

use crate::{
    errors::{PayrollError, PayrollResult},
    models::Bulletin,
    services::render::DocumentRenderer,
};

/// Limits for rendering a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Documents rendered at the same time.
    pub concurrency: usize,
    /// A render still running after this long counts as failed.
    pub render_timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            render_timeout: Duration::from_secs(30),
        }
    }
}

/// What happened to each bulletin handed to `write_archive`, in batch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveReport {
    pub rendered: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
    /// Never started because the batch was cancelled.
    pub cancelled: Vec<Uuid>,
}

impl ArchiveReport {
    pub fn failure_for(&self, id: Uuid) -> Option<&str> {
        self.failed
            .iter()
            .find(|(failed, _)| *failed == id)
            .map(|(_, reason)| reason.as_str())
    }
}

fn archive_error(e: ZipError) -> PayrollError {
    PayrollError::Archive(e.to_string())
}

/// Renders `bulletins` and streams each document into a ZIP written to
/// `sink` as soon as it is ready.
///
/// Up to `settings.concurrency` renders run at once; results are written
/// back in batch order. Once `cancel` fires no new render is started, but
/// renders already running finish and are archived. A bulletin that fails
/// to render is reported and left out of the archive; the rest carry on.
pub async fn write_archive<W: Write + Seek>(
    renderer: Arc<dyn DocumentRenderer>,
    bulletins: &[Bulletin],
    sink: W,
    settings: BatchSettings,
    cancel: &CancellationToken,
) -> PayrollResult<(W, ArchiveReport)> {
    // Fixed timestamp and compression so the archive is reproducible.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut zip = ZipWriter::new(sink);
    let mut report = ArchiveReport::default();
    let mut names = HashSet::new();
    let render_timeout = settings.render_timeout;

    // Each render owns its bulletin and renderer handle so the stream is
    // `Send + 'static` and can live inside spawned tasks and handlers.
    let stop = cancel.clone();
    let mut renders = stream::iter(bulletins.to_vec())
        .take_while(move |_| future::ready(!stop.is_cancelled()))
        .map(move |bulletin| {
            let renderer = Arc::clone(&renderer);
            async move {
                let outcome =
                    tokio::time::timeout(render_timeout, renderer.render(&bulletin)).await;
                (bulletin, outcome)
            }
        })
        .buffered(settings.concurrency.max(1))
        .boxed();

    let mut started = 0;
    while let Some((bulletin, outcome)) = renders.next().await {
        started += 1;
        let document = match outcome {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                warn!(bulletin_id = %bulletin.id, error = %e, "Bulletin left out of archive");
                report.failed.push((bulletin.id, e.to_string()));
                continue;
            }
            Err(_) => {
                warn!(bulletin_id = %bulletin.id, "Rendering timed out");
                report.failed.push((
                    bulletin.id,
                    format!("rendering timed out after {render_timeout:?}"),
                ));
                continue;
            }
        };

        let name = bulletin.document_name();
        if !names.insert(name.clone()) {
            report
                .failed
                .push((bulletin.id, format!("archive already holds {name}")));
            continue;
        }
        zip.start_file(name, options).map_err(archive_error)?;
        zip.write_all(&document)
            .map_err(|e| archive_error(ZipError::Io(e)))?;
        report.rendered.push(bulletin.id);
    }
    drop(renders);

    report
        .cancelled
        .extend(bulletins[started..].iter().map(|b| b.id));
    if !report.cancelled.is_empty() {
        info!(
            cancelled = report.cancelled.len(),
            "Batch cancelled before all bulletins were rendered"
        );
    }

    let sink = zip.finish().map_err(archive_error)?;
    Ok((sink, report))
}

/// `write_archive` into memory.
pub async fn render_archive(
    renderer: Arc<dyn DocumentRenderer>,
    bulletins: &[Bulletin],
    settings: BatchSettings,
    cancel: &CancellationToken,
) -> PayrollResult<(Vec<u8>, ArchiveReport)> {
    let (cursor, report) =
        write_archive(renderer, bulletins, Cursor::new(Vec::new()), settings, cancel).await?;
    Ok((cursor.into_inner(), report))
}
