use crate::intake::resolve::resolve;
use crate::intake::{IntakeEvent, IntakeOptions, IntakeProgress, IntakeRecord};
use async_stream::stream;
use futures::Stream;
use futures::future::join_all;
use imgbatch_storage::FsHandle;
use std::path::PathBuf;

/// Streams [`IntakeEvent`]s while resolving `paths` chunk by chunk.
///
/// Each chunk of `options.batch_size` paths is resolved concurrently, and the
/// next chunk only starts once every lookup of the current one has finished.
/// Unsupported paths are skipped without a lookup, and paths whose metadata
/// cannot be read are logged and left out; neither affects the rest of the
/// chunk. Both still count towards progress.
///
/// An empty `paths` yields nothing at all.
pub fn ingest(fs: FsHandle, paths: Vec<PathBuf>, options: IntakeOptions) -> impl Stream<Item = IntakeEvent> {
    stream!({
        if paths.is_empty() {
            return;
        }
        let total = paths.len();
        let batch_size = options.batch_size.max(1);
        tracing::info!(total, batch_size, "Starting intake");
        yield IntakeEvent::Started { total };

        let mut current = 0;
        let mut accepted = 0;
        for chunk in paths.chunks(batch_size) {
            // join_all keeps the results in the order of the chunk.
            let lookups = chunk
                .iter()
                .filter(|path| {
                    let supported = imgbatch_format::is_supported(path);
                    if !supported {
                        tracing::debug!(path = %path.display(), "Skipping unsupported file");
                    }
                    supported
                })
                .map(|path| resolve(&*fs, path, options.timeout));
            let records: Vec<IntakeRecord> = join_all(lookups)
                .await
                .into_iter()
                .filter_map(|result| match result {
                    Ok(record) => Some(record),
                    Err(err) => {
                        tracing::warn!(error = ?err, "Excluding unreadable file");
                        None
                    },
                })
                .collect();
            current += chunk.len();
            accepted += records.len();
            tracing::debug!(current, total, accepted = records.len(), "Intake chunk complete");
            if !records.is_empty() {
                yield IntakeEvent::Batch(records);
            }
            yield IntakeEvent::Progress(IntakeProgress { current, total });
        }

        tracing::info!(total, accepted, "Intake complete");
        yield IntakeEvent::Complete { accepted, total };
    })
}
