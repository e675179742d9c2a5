use super::*;
use crate::core::config::ResyncPolicy;
use crate::core::remote::{RemoteLink, RemoteLinkRepository};
use tempfile::{tempdir, TempDir};
use tracing::Span;

fn setup_project() -> (TempDir, Project) {
    let tmp = tempdir().unwrap();
    let project = Project::init(tmp.path()).unwrap();
    (tmp, project)
}

fn write_entity(project: &Project, kind: EntityKind, name: &str, contents: &str) -> PathBuf {
    let path = project.entity_dir(kind).join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn sync(cache: &mut EntityCache, project: &Project, resync: ResyncPolicy) -> SyncStats {
    cache
        .sync_all(project, ProjectFallback::First, resync, Span::none())
        .unwrap()
}

#[test]
fn test_open_creates_schema() {
    let (_tmp, project) = setup_project();
    let cache = EntityCache::open(&project).unwrap();

    assert!(project.root().join(CACHE_FILE).exists());
    let stats = cache.statistics().unwrap();
    assert_eq!(stats.count(EntityKind::Issue), 0);
    assert_eq!(stats.tracked_files, 0);
}

#[test]
fn test_schema_version_mismatch_rebuilds() {
    let (_tmp, project) = setup_project();
    {
        let cache = EntityCache::open(&project).unwrap();
        cache
            .conn()
            .execute_batch(
                "INSERT INTO projects (id, name, status) VALUES ('p', 'P', 'active');
                 DELETE FROM schema_version;
                 INSERT INTO schema_version (version) VALUES (0);",
            )
            .unwrap();
    }

    let cache = EntityCache::open(&project).unwrap();
    assert_eq!(cache.statistics().unwrap().count(EntityKind::Project), 0);
    let version: i32 = cache
        .conn()
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[test]
fn test_sync_all_resolves_across_kinds() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    write_entity(
        &project,
        EntityKind::Milestone,
        "sprint-1.md",
        "---\ntitle: Sprint 1\n---\n",
    );
    write_entity(
        &project,
        EntityKind::Issue,
        "issue-1.md",
        "---\ntitle: First\nmilestone: Sprint 1\n---\n",
    );

    let mut cache = EntityCache::open(&project).unwrap();
    let stats = sync(&mut cache, &project, ResyncPolicy::Always);

    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.synced, 3);
    assert_eq!(stats.failed, 0);

    let issue = cache.get_issue("1").unwrap();
    assert_eq!(issue.project_id, "core");
    assert_eq!(issue.milestone_id.as_deref(), Some("sprint-1"));
    assert_eq!(cache.get_milestone("sprint-1").unwrap().project_id, "core");
    assert_eq!(cache.statistics().unwrap().tracked_files, 3);
}

#[test]
fn test_sync_all_isolates_failures() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Issue, "issue-bad.md", "---\ntitle: [oops\n---\n");
    write_entity(&project, EntityKind::Issue, "issue-bare.md", "no frontmatter\n");
    write_entity(&project, EntityKind::Issue, "issue-ok.md", "---\nproject_id: core\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    let stats = sync(&mut cache, &project, ResyncPolicy::Always);

    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.synced, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(cache.list_ids(EntityKind::Issue).unwrap(), vec!["ok".to_string()]);
}

#[test]
fn test_changed_policy_skips_unchanged_files() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    let issue = write_entity(&project, EntityKind::Issue, "issue-1.md", "---\ntitle: One\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    assert_eq!(sync(&mut cache, &project, ResyncPolicy::Changed).synced, 2);

    let stats = sync(&mut cache, &project, ResyncPolicy::Changed);
    assert_eq!(stats.unchanged, 2);
    assert_eq!(stats.synced, 0);

    fs::write(&issue, "---\ntitle: One, edited\n---\n").unwrap();
    let stats = sync(&mut cache, &project, ResyncPolicy::Changed);
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.synced, 1);
    assert_eq!(cache.get_issue("1").unwrap().title, "One, edited");

    let stats = sync(&mut cache, &project, ResyncPolicy::Always);
    assert_eq!(stats.synced, 2);
    assert_eq!(stats.unchanged, 0);
}

#[test]
fn test_deleted_file_is_pruned() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    let gone = write_entity(&project, EntityKind::Issue, "issue-1.md", "---\ntitle: Gone\n---\n");
    write_entity(&project, EntityKind::Issue, "issue-2.md", "---\ntitle: Stays\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);
    assert_eq!(cache.statistics().unwrap().count(EntityKind::Issue), 2);

    fs::remove_file(&gone).unwrap();
    let stats = sync(&mut cache, &project, ResyncPolicy::Always);

    assert_eq!(stats.removed, 1);
    assert!(cache.get_issue("1").is_none());
    assert!(cache.get_issue("2").is_some());
    assert_eq!(cache.statistics().unwrap().tracked_files, 2);
}

#[test]
fn test_renamed_file_keeps_entity() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    let old = write_entity(
        &project,
        EntityKind::Issue,
        "issue-old.md",
        "---\nid: stable\n---\n",
    );

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);

    fs::rename(&old, project.issues_dir().join("issue-new.md")).unwrap();
    let stats = sync(&mut cache, &project, ResyncPolicy::Always);

    assert_eq!(stats.removed, 1);
    assert!(cache.get_issue("stable").is_some());
}

#[test]
fn test_rebuild_keeps_remote_links() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);
    cache
        .remote_links()
        .link(&RemoteLink::new("1", "github", "101"))
        .unwrap();
    cache
        .conn()
        .execute(
            "INSERT INTO projects (id, name, status) VALUES ('orphan', 'Orphan', 'active')",
            [],
        )
        .unwrap();

    let stats = cache
        .rebuild(&project, ProjectFallback::First, Span::none())
        .unwrap();

    assert_eq!(stats.synced, 1);
    let cache_stats = cache.statistics().unwrap();
    assert_eq!(cache_stats.count(EntityKind::Project), 1);
    assert_eq!(cache_stats.remote_links, 1);
    assert!(cache.get_project("orphan").is_none());
}

#[test]
fn test_clear() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);
    cache.clear().unwrap();

    let stats = cache.statistics().unwrap();
    assert_eq!(stats.count(EntityKind::Project), 0);
    assert_eq!(stats.tracked_files, 0);
}

#[test]
fn test_changed_id_drops_old_row() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    let issue = write_entity(&project, EntityKind::Issue, "issue-1.md", "---\nid: a\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);
    assert_eq!(cache.list_ids(EntityKind::Issue).unwrap(), vec!["a".to_string()]);

    fs::write(&issue, "---\nid: b\n---\n").unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);

    assert_eq!(cache.list_ids(EntityKind::Issue).unwrap(), vec!["b".to_string()]);
    let state = cache.get_sync_state(&issue).unwrap();
    assert_eq!(state.entity, Some((EntityKind::Issue, "b".to_string())));
}

#[test]
fn test_changed_id_keeps_row_claimed_by_another_file() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    let first = write_entity(&project, EntityKind::Issue, "issue-1.md", "---\nid: shared\n---\n");
    write_entity(&project, EntityKind::Issue, "issue-2.md", "---\nid: shared\n---\n");

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);

    fs::write(&first, "---\nid: own\n---\n").unwrap();
    sync(&mut cache, &project, ResyncPolicy::Always);

    assert_eq!(
        cache.list_ids(EntityKind::Issue).unwrap(),
        vec!["own".to_string(), "shared".to_string()]
    );
}

#[test]
fn test_changed_policy_resolves_milestone_added_later() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    write_entity(
        &project,
        EntityKind::Issue,
        "issue-1.md",
        "---\ntitle: First\nmilestone: Sprint 1\n---\n",
    );

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Changed);
    assert_eq!(cache.get_issue("1").unwrap().milestone_id, None);

    write_entity(
        &project,
        EntityKind::Milestone,
        "sprint-1.md",
        "---\ntitle: Sprint 1\n---\n",
    );
    let stats = sync(&mut cache, &project, ResyncPolicy::Changed);

    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.synced, 2);
    assert_eq!(
        cache.get_issue("1").unwrap().milestone_id.as_deref(),
        Some("sprint-1")
    );

    let stats = sync(&mut cache, &project, ResyncPolicy::Changed);
    assert_eq!(stats.unchanged, 3);
}

#[test]
fn test_changed_policy_resyncs_issues_after_milestone_deleted() {
    let (_tmp, project) = setup_project();
    write_entity(&project, EntityKind::Project, "core.md", "---\nname: Core\n---\n");
    let milestone = write_entity(
        &project,
        EntityKind::Milestone,
        "sprint-1.md",
        "---\ntitle: Sprint 1\n---\n",
    );
    write_entity(
        &project,
        EntityKind::Issue,
        "issue-1.md",
        "---\ntitle: First\nmilestone: Sprint 1\n---\n",
    );

    let mut cache = EntityCache::open(&project).unwrap();
    sync(&mut cache, &project, ResyncPolicy::Changed);
    assert!(cache.get_issue("1").unwrap().milestone_id.is_some());

    fs::remove_file(&milestone).unwrap();
    let stats = sync(&mut cache, &project, ResyncPolicy::Changed);

    assert_eq!(stats.removed, 1);
    assert_eq!(stats.synced, 2);
    assert_eq!(cache.get_issue("1").unwrap().milestone_id, None);
}
