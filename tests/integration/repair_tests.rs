use std::fs;

use packs::installer::{ResourceKind, ResourceRef};

use super::fixture::{Harness, TestPack};

#[test]
fn consistent_workspace_reports_nothing() {
    let harness = Harness::new();
    let pack = TestPack::new("p", "1.0.0").skill("a").agent("b").write();
    harness.manager.install(&pack.repo(), None).unwrap();

    let report = harness.manager.repair(false).unwrap();

    assert!(report.missing.is_empty());
    assert!(report.orphans.is_empty());
    assert!(report.is_healthy());
}

#[test]
fn reports_missing_resources_and_orphans() {
    let harness = Harness::new();
    let pack = TestPack::new("p", "1.0.0").skill("a").agent("b").write();
    harness.manager.install(&pack.repo(), None).unwrap();

    fs::remove_file(harness.managed("agents/b.md")).unwrap();
    fs::write(harness.managed("agents/handmade.md"), "mine").unwrap();
    let version_before = harness.registry_version();

    let report = harness.manager.repair(false).unwrap();

    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].pack, "p");
    assert_eq!(
        report.missing[0].resources,
        vec![ResourceRef::new(ResourceKind::Agent, "b")]
    );
    assert_eq!(
        report.orphans,
        vec![ResourceRef::new(ResourceKind::Agent, "handmade")]
    );
    assert!(report.reinstalled.is_empty());
    assert!(!report.is_healthy());
    assert_eq!(harness.registry_version(), version_before);
}

#[test]
fn skill_without_entry_file_counts_as_missing() {
    let harness = Harness::new();
    let pack = TestPack::new("p", "1.0.0").skill("a").write();
    harness.manager.install(&pack.repo(), None).unwrap();
    fs::remove_file(harness.managed("skills/a/SKILL.md")).unwrap();

    let report = harness.manager.repair(false).unwrap();
    assert_eq!(
        report.missing[0].resources,
        vec![ResourceRef::new(ResourceKind::Skill, "a")]
    );
}

#[test]
fn fix_reinstalls_missing_files_and_leaves_orphans() {
    let harness = Harness::new();
    let pack = TestPack::new("p", "1.0.0").skill("a").agent("b").write();
    harness.manager.install(&pack.repo(), None).unwrap();
    fs::remove_dir_all(harness.managed("skills/a")).unwrap();
    fs::write(harness.managed("agents/handmade.md"), "mine").unwrap();

    let report = harness.manager.repair(true).unwrap();

    assert_eq!(report.reinstalled, vec!["p"]);
    assert!(report.failed.is_empty());
    assert!(report.is_healthy());
    assert!(harness.managed("skills/a/SKILL.md").is_file());
    assert!(harness.managed("agents/handmade.md").is_file());

    let again = harness.manager.repair(false).unwrap();
    assert!(again.missing.is_empty());
}

#[test]
fn fix_collects_failures_per_pack() {
    let harness = Harness::new();
    let good = TestPack::new("good", "1.0.0").agent("g").write();
    let bad = TestPack::new("bad", "1.0.0").agent("x").write();
    harness.manager.install(&good.repo(), None).unwrap();
    harness.manager.install(&bad.repo(), None).unwrap();

    fs::remove_file(harness.managed("agents/g.md")).unwrap();
    fs::remove_file(harness.managed("agents/x.md")).unwrap();
    fs::remove_file(bad.path().join("pack.json")).unwrap();

    let report = harness.manager.repair(true).unwrap();

    assert_eq!(report.reinstalled, vec!["good"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].pack, "bad");
    assert!(harness.managed("agents/g.md").is_file());
    assert!(!report.is_healthy());
}

#[test]
fn fix_counts_renamed_pack_as_failure() {
    let harness = Harness::new();
    let pack = TestPack::new("old-name", "1.0.0").agent("a").write();
    harness.manager.install(&pack.repo(), None).unwrap();
    fs::remove_file(harness.managed("agents/a.md")).unwrap();

    let mut pack = pack;
    pack.name = "new-name".to_string();
    pack.agents = vec!["z".to_string()];
    let _pack = pack.write();

    let report = harness.manager.repair(true).unwrap();

    assert!(report.reinstalled.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].pack, "old-name");
    assert!(report.failed[0].error.contains("new-name"));
    assert!(!report.is_healthy());
    assert!(!harness.managed("agents/a.md").exists());
}
