use foldersort_config::{Config, HandlerKind};
use foldersort_convert::{ConverterHandle, MockConverter};
use foldersort_triage::{CancellationToken, Pipeline, StatsCollector, WatchAdapter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(300);

async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..50 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rapid_events_for_one_path_run_once() {
    let root = tempfile::tempdir().unwrap();
    let config = Config::for_root(root.path());
    let converter: ConverterHandle = Arc::new(MockConverter::new());
    let (sender, collector) = StatsCollector::channel();
    let pipeline = Arc::new(Pipeline::from_config(&config, &converter).await.with_telemetry(sender));
    let cancel = CancellationToken::new();
    let watching = WatchAdapter::new(pipeline.clone(), root.path(), DEBOUNCE).start(cancel.clone()).await.unwrap();

    // Two add-events for the same path well inside the quiet period.
    let source = root.path().join("report.pdf");
    std::fs::write(&source, b"draft").unwrap();
    std::fs::remove_file(&source).unwrap();
    std::fs::write(&source, b"final").unwrap();

    assert!(wait_until(|| !source.exists()).await, "file was never handled");
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert!(!source.exists());
    assert_eq!(count_files(&root.path().join("Documents")), 1);

    cancel.cancel();
    watching.stopped().await;
    drop(pipeline);
    let stats = collector.run().await;
    assert_eq!(stats.get(HandlerKind::Document).handled, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_output_folders_are_not_reprocessed() {
    let root = tempfile::tempdir().unwrap();
    let config = Config::for_root(root.path());
    let converter: ConverterHandle = Arc::new(MockConverter::new());
    let pipeline = Arc::new(Pipeline::from_config(&config, &converter).await);
    std::fs::create_dir(root.path().join("Archives")).unwrap();
    std::fs::create_dir(root.path().join("Dropbox")).unwrap();
    let cancel = CancellationToken::new();
    let watching = WatchAdapter::new(pipeline.clone(), root.path(), DEBOUNCE).start(cancel.clone()).await.unwrap();

    // Dropped straight into an output folder: left alone.
    let stray = root.path().join("Archives").join("stray.zip");
    std::fs::write(&stray, b"zip").unwrap();
    // Dropped into a plain subfolder: handled.
    std::fs::write(root.path().join("Dropbox").join("nested.7z"), b"7z").unwrap();

    let nested = root.path().join("Dropbox").join("nested.7z");
    assert!(wait_until(|| !nested.exists()).await, "nested file was never handled");
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert!(stray.exists());
    assert_eq!(count_files(&root.path().join("Archives")), 2);

    cancel.cancel();
    watching.stopped().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_drops_pending_timers() {
    let root = tempfile::tempdir().unwrap();
    let config = Config::for_root(root.path());
    let converter: ConverterHandle = Arc::new(MockConverter::new());
    let pipeline = Arc::new(Pipeline::from_config(&config, &converter).await);
    let cancel = CancellationToken::new();
    let watching =
        WatchAdapter::new(pipeline, root.path(), Duration::from_secs(30)).start(cancel.clone()).await.unwrap();

    let source = root.path().join("late.pdf");
    std::fs::write(&source, b"pdf").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), watching.stopped()).await.unwrap();
    assert!(source.exists());
}
