use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;
use packs::PackError;
use packs::registry::{PackEntry, PackRegistry};
use packs::storage::{FileBackend, MemoryBackend, StorageBackend};

use super::fixture::{REGISTRY_PATH, store};

fn entry(repo: &str) -> PackEntry {
    PackEntry {
        version: "1.0.0".to_string(),
        repo: repo.to_string(),
        installed_at: Utc::now(),
        stacks: Vec::new(),
        skills: vec!["s".to_string()],
        agents: Vec::new(),
        hooks: Vec::new(),
    }
}

#[test]
fn add_entry_then_read_it_back() {
    let backend = Arc::new(MemoryBackend::new());
    let registry = store(&backend);
    let added = entry("github.com/acme/one");

    registry
        .update(|doc| {
            doc.insert("one", added.clone());
            Ok(())
        })
        .unwrap();

    let read = registry.read().unwrap();
    assert_eq!(read.version, 1);
    assert_eq!(read.value.get("one"), Some(&added));
}

#[test]
fn two_writers_at_same_version_exactly_one_wins() {
    let backend = Arc::new(MemoryBackend::new());
    let seed = store(&backend);
    seed.update(|doc| {
        doc.insert("base", entry("base"));
        Ok(())
    })
    .unwrap();
    let start = seed.read().unwrap().version;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|name| {
            let registry = store(&backend);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut snapshot = registry.read().unwrap();
                snapshot.value.insert(name, entry(name));
                barrier.wait();
                (name, registry.write(&snapshot.value, snapshot.version))
            })
        })
        .collect();
    let results: Vec<(&str, Result<u64, PackError>)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(*winners[0].1.as_ref().unwrap(), start + 1);
    let winner = winners[0].0;

    let (loser, err) = results
        .iter()
        .find_map(|(name, r)| r.as_ref().err().map(|e| (*name, e)))
        .unwrap();
    assert!(matches!(err, PackError::VersionConflict { expected, .. } if *expected == start));

    // The loser re-reads, sees the winner's data, and reapplies its change.
    let registry = store(&backend);
    let fresh = registry.read().unwrap();
    assert!(fresh.value.contains(winner));
    assert!(!fresh.value.contains(loser));

    registry
        .update(|doc| {
            doc.insert(loser, entry(loser));
            Ok(())
        })
        .unwrap();
    let merged = registry.read().unwrap();
    assert_eq!(merged.version, start + 2);
    assert!(merged.value.contains("base"));
    assert!(merged.value.contains(winner));
    assert!(merged.value.contains(loser));
}

#[test]
fn concurrent_updates_all_land() {
    let backend = Arc::new(MemoryBackend::new());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let registry = store(&backend);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.update(|doc| {
                    doc.insert(name, entry(name));
                    Ok(())
                })
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let registry: PackRegistry = store(&backend).read().unwrap().value;
    assert_eq!(registry.len(), 2);
    assert_eq!(backend.version(REGISTRY_PATH), 2);
}

#[test]
fn file_backend_compare_and_swap_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileBackend::new(dir.path());
    let second = FileBackend::new(dir.path());
    let doc = serde_json::json!({"packs": {}});

    assert_eq!(first.write(REGISTRY_PATH, &doc, 0).unwrap(), 1);
    let err = second.write(REGISTRY_PATH, &doc, 0).unwrap_err();
    assert!(err.is_conflict());

    let read = second.read(REGISTRY_PATH).unwrap();
    assert_eq!(read.version, 1);
    assert_eq!(second.write(REGISTRY_PATH, &doc, read.version).unwrap(), 2);
    assert!(dir.path().join(REGISTRY_PATH).is_file());
}
