//! Lifecycle operations whose registry commit loses a race to another writer.

use std::sync::Arc;

use packs::lifecycle::UpdateTarget;

use super::fixture::{Contended, CountingFetcher, Harness, TestPack, foreign_entry};

fn contended() -> (Arc<Contended>, Arc<CountingFetcher>, Harness) {
    let backend = Contended::new();
    let fetcher = Arc::new(CountingFetcher::default());
    let harness = Harness::contended(&backend, Arc::clone(&fetcher));
    (backend, fetcher, harness)
}

fn names(harness: &Harness) -> Vec<String> {
    harness.registry().packs.into_keys().collect()
}

#[test]
fn install_conflict_retries_commit_without_refetching() {
    let (backend, fetcher, harness) = contended();
    let pack = TestPack::new("p", "1.0.0").skill("a").agent("b").write();
    backend.before_next_write(|registry| {
        registry.insert("other", foreign_entry("theirs"));
    });

    let outcome = harness.manager.install(&pack.repo(), None).unwrap();

    assert_eq!(outcome.name, "p");
    assert_eq!(fetcher.fetches(), 1);
    assert_eq!(harness.registry_version(), 2);
    assert_eq!(names(&harness), vec!["other", "p"]);
    assert!(harness.managed("skills/a/SKILL.md").is_file());
    assert!(harness.managed("agents/b.md").is_file());
}

#[test]
fn remove_conflict_keeps_competing_entry() {
    let (backend, _fetcher, harness) = contended();
    let pack = TestPack::new("p", "1.0.0").agent("b").write();
    harness.manager.install(&pack.repo(), None).unwrap();
    backend.before_next_write(|registry| {
        registry.insert("other", foreign_entry("theirs"));
    });

    harness.manager.remove("p").unwrap();

    assert_eq!(names(&harness), vec!["other"]);
    assert_eq!(harness.registry_version(), 3);
    assert!(!harness.managed("agents/b.md").exists());
}

#[test]
fn update_conflict_records_refresh_on_top_of_competing_write() {
    let (backend, fetcher, harness) = contended();
    let pack = TestPack::new("p", "1.0.0").agent("b").write();
    harness.manager.install(&pack.repo(), None).unwrap();

    let mut pack = pack;
    pack.version = "2.0.0".to_string();
    let _pack = pack.write();
    backend.before_next_write(|registry| {
        registry.insert("other", foreign_entry("theirs"));
    });

    let report = harness.manager.update(&UpdateTarget::All).unwrap();

    assert_eq!(report.updated.len(), 1);
    assert_eq!(fetcher.fetches(), 2);
    let registry = harness.registry();
    assert_eq!(registry.get("p").unwrap().version, "2.0.0");
    assert!(registry.contains("other"));
    assert_eq!(harness.registry_version(), 3);
}

#[test]
fn update_does_not_resurrect_pack_removed_concurrently() {
    let (backend, _fetcher, harness) = contended();
    let pack = TestPack::new("p", "1.0.0").agent("b").write();
    harness.manager.install(&pack.repo(), None).unwrap();
    backend.before_next_write(|registry| {
        registry.remove("p");
    });

    let report = harness
        .manager
        .update(&UpdateTarget::One("p".to_string()))
        .unwrap();

    assert_eq!(report.updated.len(), 1);
    assert!(harness.registry().is_empty());
    // The competing removal is the last write; the retry found nothing to record.
    assert_eq!(harness.registry_version(), 2);
}
