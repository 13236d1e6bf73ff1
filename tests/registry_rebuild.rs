mod common;

use std::fs;

use common::{FakeShare, Script, touch};
use kiosk_signage::config::SmbConfig;
use kiosk_signage::registry::{
    DisplayItem, EnabledOrigins, Origin, Playlist, SourceRegistry, remove_unreadable,
};
use kiosk_signage::remote::{RemoteShare, SharedRemote};
use std::time::SystemTime;
use tempfile::tempdir;

async fn connected_remote(names: &[&str]) -> SharedRemote {
    let (backend, _script) = FakeShare::new(Script::with_files(names));
    let remote = RemoteShare::shared(SmbConfig::default(), Box::new(backend));
    assert!(remote.lock().await.connect().await);
    remote
}

fn origins_of(playlist: &Playlist) -> Vec<(String, Origin)> {
    playlist
        .items()
        .iter()
        .map(|i| (i.name().to_string(), i.origin()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn local_mode_sorts_by_name_and_filters() {
    let tmp = tempdir().unwrap();
    touch(&tmp.path().join("b.png"));
    touch(&tmp.path().join("a.jpg"));
    touch(&tmp.path().join("notes.txt"));
    touch(&tmp.path().join("C.GIF"));
    fs::create_dir(tmp.path().join("nested")).unwrap();
    touch(&tmp.path().join("nested").join("deep.png"));

    let mut registry = SourceRegistry::new(tmp.path());
    let playlist = registry.rebuild(EnabledOrigins::Local, None).await;

    assert_eq!(playlist.names(), vec!["C.GIF", "a.jpg", "b.png"]);
    assert!(playlist.items().iter().all(|i| i.origin() == Origin::Local));
    let b = playlist.get(2).unwrap();
    assert!(b.locator().ends_with("b.png"));
    assert_eq!(registry.current(), playlist);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_local_b_png_a_jpg() {
    let tmp = tempdir().unwrap();
    touch(&tmp.path().join("b.png"));
    touch(&tmp.path().join("a.jpg"));

    let mut registry = SourceRegistry::new(tmp.path());
    let playlist = registry.rebuild(EnabledOrigins::Local, None).await;
    assert_eq!(playlist.names(), vec!["a.jpg", "b.png"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hybrid_interleaves_origins_by_name() {
    let tmp = tempdir().unwrap();
    touch(&tmp.path().join("b.png"));
    let remote = connected_remote(&["a.png"]).await;

    let mut registry = SourceRegistry::new(tmp.path());
    let playlist = registry.rebuild(EnabledOrigins::Both, Some(&remote)).await;

    assert_eq!(
        origins_of(&playlist),
        vec![
            ("a.png".to_string(), Origin::Remote),
            ("b.png".to_string(), Origin::Local),
        ]
    );
    assert_eq!(playlist.get(0).unwrap().locator(), "Display/a.png");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rebuild_is_idempotent() {
    let tmp = tempdir().unwrap();
    for name in ["d.bmp", "a.png", "c.jpeg"] {
        touch(&tmp.path().join(name));
    }
    let remote = connected_remote(&["b.png", "z.gif", "readme.md"]).await;

    let mut registry = SourceRegistry::new(tmp.path());
    let first = registry.rebuild(EnabledOrigins::Both, Some(&remote)).await;
    let second = registry.rebuild(EnabledOrigins::Both, Some(&remote)).await;

    assert_eq!(first, second);
    assert_eq!(
        first.names(),
        vec!["a.png", "b.png", "c.jpeg", "d.bmp", "z.gif"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_and_unavailable_sources_yield_empty_playlist() {
    let tmp = tempdir().unwrap();
    let mut registry = SourceRegistry::new(tmp.path());
    assert!(registry.rebuild(EnabledOrigins::Local, None).await.is_empty());

    let mut missing = SourceRegistry::new(tmp.path().join("does-not-exist"));
    assert!(missing.rebuild(EnabledOrigins::Local, None).await.is_empty());

    // remote enabled but never connected
    let (backend, _script) = FakeShare::new(Script::with_files(&["a.png"]));
    let remote = RemoteShare::shared(SmbConfig::default(), Box::new(backend));
    assert!(
        registry
            .rebuild(EnabledOrigins::Both, Some(&remote))
            .await
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_remote_listing_keeps_local_items() {
    let tmp = tempdir().unwrap();
    touch(&tmp.path().join("local.png"));
    let (backend, script) = FakeShare::new(Script::with_files(&["remote.png"]));
    let remote = RemoteShare::shared(SmbConfig::default(), Box::new(backend));
    assert!(remote.lock().await.connect().await);
    script.lock().unwrap().fail_list = true;

    let mut registry = SourceRegistry::new(tmp.path());
    let playlist = registry.rebuild(EnabledOrigins::Both, Some(&remote)).await;
    assert_eq!(playlist.names(), vec!["local.png"]);
}

#[test]
fn remove_unreadable_keeps_cursor_in_range() {
    for len in 1..6usize {
        let items: Vec<DisplayItem> = (0..len)
            .map(|i| {
                DisplayItem::new(
                    format!("{i}.png"),
                    Origin::Local,
                    format!("/p/{i}.png"),
                    SystemTime::UNIX_EPOCH,
                )
            })
            .collect();
        let playlist = Playlist::from_items(items);
        for index in 0..len {
            let (after, cursor) = remove_unreadable(&playlist, index);
            assert_eq!(after.len(), len - 1);
            assert!(after.is_empty() || cursor.index() < after.len());
            assert!(!after.names().contains(&format!("{index}.png").as_str()));
            if after.is_empty() {
                assert_eq!(cursor.index(), 0);
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn evicted_item_leaves_registry_until_next_rebuild() {
    let tmp = tempdir().unwrap();
    touch(&tmp.path().join("a.png"));
    touch(&tmp.path().join("b.png"));

    let mut registry = SourceRegistry::new(tmp.path());
    let full = registry.rebuild(EnabledOrigins::Local, None).await;
    let a = full.get(0).unwrap().clone();

    let after = registry.evict(&a);
    assert_eq!(after.names(), vec!["b.png"]);
    assert_eq!(registry.current(), after);
    // evicting something already gone is a no-op
    assert_eq!(registry.evict(&a), after);

    let rebuilt = registry.rebuild(EnabledOrigins::Local, None).await;
    assert_eq!(rebuilt, full);
}
