use super::*;
use crate::plugin::builtin::default_registry;
use crate::plugin::ChapterData;
use crate::queue::QueueState;
use std::path::Path;
use std::sync::mpsc::Receiver;

struct FixedProbe(Option<u64>);

impl FreeSpaceProbe for FixedProbe {
    fn free_bytes(&self, _path: &Path) -> Option<u64> {
        self.0
    }
}

fn context(root: &Path) -> (Arc<TaskContext>, Receiver<UiEvent>) {
    let mut config = UmdConfig::default();
    config.download.max_retries = 0;
    config.download.connect_timeout_secs = 2;
    config.download.download_dir = Some(root.to_path_buf());
    let (hooks, rx) = event_channel();
    let ctx = TaskContext::new(config, default_registry(), Arc::new(hooks));
    (Arc::new(ctx), rx)
}

fn count_start_end(events: &[UiEvent]) -> (usize, usize) {
    let starts = events
        .iter()
        .filter(|e| matches!(e, UiEvent::Started { .. }))
        .count();
    let ends = events
        .iter()
        .filter(|e| matches!(e, UiEvent::Ended { .. }))
        .count();
    (starts, ends)
}

#[test]
fn cancelled_before_start_reports_cancelled() {
    let root = tempfile::tempdir().unwrap();
    let (ctx, rx) = context(root.path());
    ctx.queue.add_item(1, "http://127.0.0.1:9/c.json", None);
    let task = DownloadTask::new(1, "http://127.0.0.1:9/c.json", None, Arc::clone(&ctx));
    task.cancel_token().cancel();

    assert_eq!(task.run(), TaskOutcome::Cancelled);
    let item = ctx.queue.get_item(1).unwrap();
    assert_eq!(item.state, QueueState::Cancelled);
    assert_eq!(item.status, "Cancelled");
    let s = ctx.queue.stats();
    assert_eq!(s.total, s.pending + s.active + s.completed);

    drop(task);
    drop(ctx);
    let events: Vec<UiEvent> = rx.iter().collect();
    assert_eq!(count_start_end(&events), (1, 1));
    assert!(matches!(events.last(), Some(UiEvent::Ended { id: 1, .. })));
}

#[test]
fn unreachable_page_fails_with_network_error() {
    let root = tempfile::tempdir().unwrap();
    let (ctx, rx) = context(root.path());
    let url = "http://127.0.0.1:9/chapter.json";
    ctx.queue.add_item(2, url, Some("Chapter 2"));
    let task = DownloadTask::new(2, url, Some("Chapter 2".into()), Arc::clone(&ctx));

    let outcome = task.run();
    let TaskOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(
        message.starts_with("Network error after 1 attempts: "),
        "{message}"
    );
    assert!(message.ends_with("(127.0.0.1)"), "{message}");

    let item = ctx.queue.get_item(2).unwrap();
    assert_eq!(item.state, QueueState::Error);
    assert_eq!(item.error_message.as_deref(), Some(message.as_str()));
    assert_eq!(ctx.queue.stats().failed, 1);

    drop(task);
    drop(ctx);
    let events: Vec<UiEvent> = rx.iter().collect();
    assert_eq!(count_start_end(&events), (1, 1));
    assert!(events.contains(&UiEvent::Status {
        id: 2,
        status: "Starting download…".into(),
        state: Some(QueueState::Running),
    }));
    assert!(events.contains(&UiEvent::ResetProgress { id: 2, maximum: 1 }));
}

#[test]
fn chapter_dir_is_created_under_root() {
    let root = tempfile::tempdir().unwrap();
    let (ctx, _rx) = context(root.path());
    let task = DownloadTask::new(3, "https://example.com/c.json", None, ctx);
    let chapter = ChapterData {
        title: "Series: Part/2".into(),
        chapter: "Chapter 3".into(),
        image_urls: vec![],
    };
    let dir = task.prepare_dir(&chapter).unwrap();
    let real_root = std::fs::canonicalize(root.path()).unwrap();
    assert_eq!(dir.parent(), Some(real_root.as_path()));
    assert!(dir.is_dir());
    let name = dir.file_name().unwrap().to_string_lossy().into_owned();
    assert!(!name.contains('/'));
    assert!(name.ends_with("Chapter 3"), "{name}");
}

#[test]
fn unwritable_root_cannot_prepare_dir() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();
    let (ctx, _rx) = context(&blocker);
    let task = DownloadTask::new(4, "https://example.com/c.json", None, ctx);
    let err = task.prepare_dir(&ChapterData::default()).unwrap_err();
    assert_eq!(err.to_string(), "Unable to prepare download directory.");
}

#[test]
fn preflight_rejects_low_disk() {
    let root = tempfile::tempdir().unwrap();
    let (ctx, _rx) = context(root.path());
    let ctx = Arc::new(
        Arc::try_unwrap(ctx)
            .ok()
            .unwrap()
            .with_probe(Arc::new(FixedProbe(Some(12 * 1024 * 1024)))),
    );
    let task = DownloadTask::new(5, "https://example.com/c.json", None, ctx);
    let err = task.preflight_disk(root.path(), 10, "S — 1").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Insufficient disk space: 12.0 MB free, 148.0 MB required."
    );
}

#[test]
fn unknown_free_space_passes_preflight() {
    let root = tempfile::tempdir().unwrap();
    let (ctx, _rx) = context(root.path());
    let ctx = Arc::new(
        Arc::try_unwrap(ctx)
            .ok()
            .unwrap()
            .with_probe(Arc::new(FixedProbe(None))),
    );
    let task = DownloadTask::new(6, "https://example.com/c.json", None, ctx);
    assert!(task.preflight_disk(root.path(), 10_000, "S — 1").is_ok());
}

#[test]
fn panic_payloads_become_text() {
    let err = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
    assert_eq!(panic_message(&*err), "boom 1");
    let err = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
    assert_eq!(panic_message(&*err), "panic with non-string payload");
}
