use scriptkeeper::archive::{ArchiveContext, VersionArchive};
use scriptkeeper::config::UpdateStatus;
use scriptkeeper::core::KeeperError;
use scriptkeeper::fetcher::{Category, Fetcher, FetcherConfig};
use scriptkeeper::installer::{Installer, InstallerConfig, UpdateStrategy};
use scriptkeeper::manager::{AddRequest, ItemUpdate, ScriptManager};
use scriptkeeper::source::{CommitIdentity, RemoteRef};
use scriptkeeper::test_utils::{FakeRepository, init_test_logging, read_tree, write_tree};
use tempfile::tempdir;

const FIRST: &str = "abcdef1234567890abcdef1234567890abcdef12";
const SECOND: &str = "9876543210fedcba9876543210fedcba98765432";

fn installer(repo: &FakeRepository) -> Installer<FakeRepository> {
    Installer::new(Fetcher::new(repo.clone(), FetcherConfig::default()), InstallerConfig::default())
}

fn files(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(p, c)| ((*p).to_string(), (*c).to_string())).collect()
}

#[tokio::test]
async fn test_overwrite_then_differential_update() {
    init_test_logging(None);
    let repo = FakeRepository::new("acme", "tools");
    repo.commit(FIRST, &[("scripts/utils/a.lua", "X"), ("scripts/utils/b.lua", "Y"), ("README.md", "r")]);

    let temp = tempdir().unwrap();
    let root = temp.path().join("utils");
    let installer = installer(&repo);
    let remote = RemoteRef::parse("https://github.com/acme/tools", "scripts/utils", None).unwrap();

    let first =
        installer.update(&remote, &root, Category::Script, UpdateStrategy::Overwrite).await.unwrap();
    assert_eq!(first.commit.as_str(), FIRST);
    assert_eq!(read_tree(&root), files(&[("a.lua", "X"), ("b.lua", "Y")]));

    repo.commit(
        SECOND,
        &[("scripts/utils/a.lua", "Z"), ("scripts/utils/b.lua", "Y"), ("scripts/utils/c.lua", "W")],
    );
    write_tree(&root, &[("settings.local", "mine")]);

    let archive = VersionArchive::new(&root);
    assert!(archive.archive(&first.commit, ArchiveContext::FromGithub).unwrap());
    let slots = archive.list_versions().unwrap();
    assert_eq!(slots.len(), 1);
    assert!(slots[0].name.ends_with("_abcdef12_from-github"));

    let second = installer
        .update(&remote, &root, Category::Script, UpdateStrategy::Differential)
        .await
        .unwrap();
    let report = second.sync_report.expect("differential update reports a sync");
    assert_eq!((report.updated, report.added, report.unchanged), (1, 1, 1));
    assert_eq!(second.commit.as_str(), SECOND);
    assert_eq!(
        read_tree(&root),
        files(&[("a.lua", "Z"), ("b.lua", "Y"), ("c.lua", "W"), ("settings.local", "mine")])
    );

    let archived = read_tree(&archive.dir().join(&slots[0].name));
    assert_eq!(archived, files(&[("a.lua", "X"), ("b.lua", "Y"), ("settings.local", "mine")]));
}

#[tokio::test]
async fn test_missing_folder_and_empty_folder_differ() {
    let repo = FakeRepository::new("acme", "tools");
    repo.commit(FIRST, &[("scripts/main.lua", "m")]);
    repo.add_empty_dir("emptydir");
    let fetcher = Fetcher::new(repo.clone(), FetcherConfig::default());

    let missing = RemoteRef::parse("https://github.com/acme/tools", "missing", None).unwrap();
    let err = fetcher.fetch_for_category(&missing, Category::Script).await.unwrap_err();
    assert!(matches!(err, KeeperError::FolderNotFound { .. }));

    let empty = RemoteRef::parse("https://github.com/acme/tools", "emptydir", None).unwrap();
    let snapshot = fetcher.fetch_for_category(&empty, Category::Script).await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_manager_lifecycle() {
    let repo = FakeRepository::new("acme", "tools");
    repo.commit(FIRST, &[("pack/inner/main.lua", "v1")]);
    let temp = tempdir().unwrap();
    let manager = ScriptManager::new(installer(&repo), temp.path().join("locks"), 4);

    let (mut record, outcome) = manager
        .add(AddRequest {
            repo_url: "https://github.com/acme/tools/tree/main/pack".to_string(),
            folder: String::new(),
            ref_name: None,
            destination: temp.path().join("scripts"),
            name: Some("pack".to_string()),
            category: Category::Script,
        })
        .await
        .unwrap();
    assert!(outcome.normalized);
    assert_eq!(read_tree(&record.local_path), files(&[("main.lua", "v1")]));

    let status = manager.check(&mut record).await.unwrap();
    assert_eq!(status, UpdateStatus::UpToDate);

    repo.commit(SECOND, &[("pack/inner/main.lua", "v2")]);
    assert_eq!(manager.check(&mut record).await.unwrap(), UpdateStatus::Available);

    let update = manager.update_record(&mut record, UpdateStrategy::Overwrite).await.unwrap();
    assert!(matches!(update, ItemUpdate::Updated { archived: true, .. }));
    assert_eq!(read_tree(&record.local_path), files(&[("main.lua", "v2")]));

    let versions = manager.list_versions(&record).await.unwrap();
    let restored = manager.restore(&mut record, &versions[0].name).await.unwrap();
    assert_eq!(restored.commit, Some(CommitIdentity::new(FIRST).unwrap()));
    assert_eq!(read_tree(&record.local_path), files(&[("main.lua", "v1")]));

    repo.set_offline(true);
    let err = manager.check(&mut record).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(record.update_status, UpdateStatus::CheckFailed);
}
