use crate::batch::error::{ErrorKind, Result};
use crate::batch::file::process_file;
use crate::batch::ledger::RunLedger;
use crate::batch::{BatchEvent, BatchOptions, BatchProgress, BatchRunner};
use crate::tracker::TrackedFiles;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use time::UtcDateTime;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Directory name for one run's backups: start time in milliseconds, then
/// the process id and a per-process sequence number so that runs starting
/// in the same millisecond never share a directory.
fn run_dir_name(started: UtcDateTime) -> String {
    let millis = started.unix_timestamp_nanos() / 1_000_000;
    format!("{millis}-{}-{}", std::process::id(), RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn process<'a>(
    runner: &'a BatchRunner,
    tracker: &'a TrackedFiles,
    options: &'a BatchOptions,
) -> impl Stream<Item = Result<BatchEvent>> + 'a {
    stream!({
        if let Err(err) = options.validate() {
            yield Err(err);
            return;
        }

        // Claim the pending files up front so none of them can be removed,
        // or picked up by another run, while this one is queued.
        let files = tracker.claim_pending();
        // Declared before the futures that borrow it, so it is dropped after them.
        let ledger = RunLedger::new(runner, tracker, options, &files);
        let total = files.len();
        yield Ok(BatchEvent::Started(total));
        if total == 0 {
            ledger.close();
            yield Ok(BatchEvent::Complete(None));
            return;
        }

        let run_dir = runner.backup_dir.join(run_dir_name(UtcDateTime::now()));
        tracing::info!(total, mode = %options.operation_mode, overwrite = options.overwrite, "Starting batch run");

        let mut queue: VecDeque<_> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| process_file(runner, tracker, &ledger, options, &run_dir, index, file))
            .collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(queue.drain(..runner.max_concurrency.min(queue.len())));

        let mut progress =
            BatchProgress { current: 0, total, success_count: 0, failed_count: 0, current_file: None };
        while let Some(processed) = processing.next().await {
            // Refill in submission order.
            if let Some(next) = queue.pop_front() {
                processing.push(next);
            }
            let totals = ledger.record(&processed);
            progress.current += 1;
            progress.success_count = totals.success as usize;
            progress.failed_count = totals.failed as usize;
            progress.current_file = Some(processed.result.path.clone());
            yield Ok(BatchEvent::Processed(processed.result));
            yield Ok(BatchEvent::Progress(progress.clone()));
        }

        let appended = runner.history.append(ledger.entry()).await.or_raise(|| ErrorKind::History);
        ledger.close();
        match appended {
            Ok(entry) => {
                tracing::info!(
                    entry = %entry.id,
                    success = entry.success_count,
                    failed = entry.failed_count,
                    saved_bytes = entry.saved_bytes(),
                    "Batch run complete"
                );
                yield Ok(BatchEvent::Complete(Some(entry)));
            },
            Err(err) => {
                yield Err(err);
            },
        }
    })
}
