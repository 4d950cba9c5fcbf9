//! End-to-end storage scenarios run against every backend.

use pastecat::{AppError, BackendKind, ByteSize, Config, PasteId, StoreContext};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);

fn config(backend: BackendKind, dir: &Path) -> Config {
    Config {
        backend,
        data_dir: dir.display().to_string(),
        lifetime: HOUR,
        max_size: ByteSize(ByteSize::MB),
        ..Config::default()
    }
}

fn each_backend(mut check: impl FnMut(BackendKind, &Path)) {
    for backend in [BackendKind::Fs, BackendKind::Mmap, BackendKind::Mem] {
        let dir = TempDir::new().expect("temp dir");
        check(backend, dir.path());
    }
}

fn read_paste(ctx: &StoreContext, id: &PasteId) -> String {
    let mut content = String::new();
    ctx.get(id)
        .expect("get")
        .read_to_string(&mut content)
        .expect("read");
    content
}

fn age_file(path: &Path, age: Duration) {
    File::options()
        .write(true)
        .open(path)
        .expect("open paste file")
        .set_modified(SystemTime::now() - age)
        .expect("set mtime");
}

#[test]
fn put_then_get_round_trips() {
    each_backend(|backend, dir| {
        let ctx = StoreContext::open(config(backend, dir)).expect("open");
        let id = ctx.put(b"foo").expect("put");
        assert_eq!(id.to_string().len(), 8);
        assert_eq!(PasteId::parse(&id.to_string()).expect("parse"), id);

        let paste = ctx.get(&id).expect("get");
        assert_eq!(paste.size(), 3, "{backend}");
        drop(paste);
        assert_eq!(read_paste(&ctx, &id), "foo", "{backend}");
    });
}

#[test]
fn max_number_is_enforced() {
    each_backend(|backend, dir| {
        let ctx = StoreContext::open(Config {
            max_number: 1,
            ..config(backend, dir)
        })
        .expect("open");
        ctx.put(b"one").expect("first put");
        assert!(
            matches!(ctx.put(b"two"), Err(AppError::ReachedMaxNumber)),
            "{backend}"
        );
        assert_eq!(ctx.store().stats().number, 1, "{backend}");
    });
}

#[test]
fn restart_prunes_and_rearms() {
    for backend in [BackendKind::Fs, BackendKind::Mmap] {
        let dir = TempDir::new().expect("temp dir");
        let (old, fresh) = {
            let ctx = StoreContext::open(config(backend, dir.path())).expect("open");
            (ctx.put(b"old").expect("put"), ctx.put(b"fresh").expect("put"))
        };
        age_file(&dir.path().join(old.shard_path()), Duration::from_secs(90 * 60));
        age_file(&dir.path().join(fresh.shard_path()), Duration::from_secs(10 * 60));

        let ctx = StoreContext::open(config(backend, dir.path())).expect("reopen");
        assert!(!dir.path().join(old.shard_path()).exists(), "{backend}");
        assert!(matches!(ctx.get(&old), Err(AppError::NotFound)), "{backend}");
        assert_eq!(read_paste(&ctx, &fresh), "fresh", "{backend}");
        assert_eq!(ctx.scheduler().pending(), 1, "{backend}");

        let remaining = ctx
            .get(&fresh)
            .expect("get")
            .header()
            .remaining_secs(chrono::Utc::now())
            .expect("finite lifetime");
        assert!((49 * 60..=50 * 60).contains(&remaining), "{backend}: {remaining}");
    }
}

#[test]
fn delete_waits_for_readers() {
    each_backend(|backend, dir| {
        let ctx = Arc::new(StoreContext::open(config(backend, dir)).expect("open"));
        let id = ctx.put(b"in use").expect("put");
        let mut handle = ctx.get(&id).expect("get");

        let (tx, rx) = mpsc::channel();
        let deleter = {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let result = ctx.delete(&id);
                tx.send(()).expect("signal");
                result
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "{backend}");

        let mut content = String::new();
        handle.read_to_string(&mut content).expect("read while deleting");
        assert_eq!(content, "in use", "{backend}");
        handle.close();

        rx.recv_timeout(Duration::from_secs(5)).expect("delete finished");
        deleter.join().expect("join").expect("delete");
        assert!(matches!(ctx.get(&id), Err(AppError::NotFound)), "{backend}");
    });
}

#[test]
fn deleting_missing_id_changes_nothing() {
    each_backend(|backend, dir| {
        let ctx = StoreContext::open(config(backend, dir)).expect("open");
        ctx.put(b"bystander").expect("put");
        let before = ctx.store().stats();
        let missing = PasteId::parse("deadbeef").expect("id");
        assert!(matches!(ctx.delete(&missing), Err(AppError::NotFound)));
        assert_eq!(ctx.store().stats(), before, "{backend}");
    });
}

#[test]
fn concurrent_puts_never_share_ids() {
    each_backend(|backend, dir| {
        let ctx = Arc::new(StoreContext::open(config(backend, dir)).expect("open"));
        let barrier = Arc::new(Barrier::new(8));
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let ctx = Arc::clone(&ctx);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..32)
                        .map(|n| ctx.put(format!("{worker}:{n}").as_bytes()).expect("put"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<PasteId> = workers
            .into_iter()
            .flat_map(|worker| worker.join().expect("join"))
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total, "{backend}");
        assert_eq!(ctx.store().len(), total, "{backend}");
    });
}

#[test]
fn recovery_twice_builds_the_same_index() {
    let dir = TempDir::new().expect("temp dir");
    let ids: Vec<PasteId> = {
        let ctx = StoreContext::open(config(BackendKind::Fs, dir.path())).expect("open");
        (0..5)
            .map(|n| ctx.put(format!("paste {n}").as_bytes()).expect("put"))
            .collect()
    };

    let first = StoreContext::open(config(BackendKind::Fs, dir.path())).expect("first");
    let first_stats = first.store().stats();
    drop(first);
    let second = StoreContext::open(config(BackendKind::Mmap, dir.path())).expect("second");
    assert_eq!(second.store().stats(), first_stats);
    for (n, id) in ids.iter().enumerate() {
        assert_eq!(read_paste(&second, id), format!("paste {n}"));
    }
    assert!(fs::read_dir(dir.path()).expect("list").count() >= 256);
}
