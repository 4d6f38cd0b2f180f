//! End-to-end orchestration tests
//!
//! Each test builds a throwaway install tree of real bash scripts and runs
//! the orchestrator against it with the system runner.

use bentobox::{
    Category, InstallConfig, InstallPaths, Orchestrator, PostRunResult, PostRunStep, QueueOrder,
    SessionSignal, StepOutcome, SystemRunner, UnitManifest, UnitStatus,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct Tree {
    home: TempDir,
    root: PathBuf,
    log: PathBuf,
}

impl Tree {
    fn new() -> Self {
        let home = TempDir::new().expect("Failed to create temp home");
        let root = home.path().join("omakub");
        let log = home.path().join("order.log");
        fs::create_dir_all(&root).unwrap();
        Self { home, root, log }
    }

    /// Script that appends its unit name to the order log, then runs `body`
    fn script(&self, rel: &str, name: &str, body: &str) -> &Self {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!(
                "#!/bin/bash\necho {} >> {}\n{}\n",
                name,
                self.log.display(),
                body
            ),
        )
        .unwrap();
        self
    }

    fn paths(&self) -> InstallPaths {
        InstallPaths::with_root(self.home.path(), &self.root)
    }

    fn executed(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn marker(&self, name: &str) -> PathBuf {
        self.home.path().join(format!("{}.installed", name))
    }
}

fn manifest(probes: &[(&str, String)]) -> UnitManifest {
    UnitManifest {
        probes: probes
            .iter()
            .map(|(name, cmd)| (name.to_string(), cmd.clone()))
            .collect(),
        post_run: Vec::new(),
        ..UnitManifest::default()
    }
}

fn selecting(apps: &[&str]) -> InstallConfig {
    let mut config = InstallConfig::default();
    config.desktop.optional_apps = apps.iter().map(|s| s.to_string()).collect();
    config
}

fn orchestrator(tree: &Tree, manifest: UnitManifest, session: SessionSignal) -> Orchestrator<SystemRunner> {
    Orchestrator::new(tree.paths(), manifest, SystemRunner, session)
}

#[test]
fn test_mandatory_optional_and_preinstalled_units() {
    let tree = Tree::new();
    tree.script("install/terminal/a.sh", "a", "exit 0")
        .script("install/desktop/optional/app-b.sh", "b", "exit 0")
        .script("install/terminal/c.sh", "c", "exit 0");

    let orch = orchestrator(&tree, manifest(&[("c", "true".to_string())]), SessionSignal::none());
    let outcome = orch.run(&InstallConfig::default()).unwrap();

    assert_eq!(outcome.queue.names(), ["a"]);
    assert_eq!(tree.executed(), vec!["a"]);

    let state = orch.store().load().unwrap().unwrap();
    assert_eq!(state.status_of("a"), Some(UnitStatus::Installed));
    assert_eq!(state.status_of("b"), Some(UnitStatus::Skipped));
    assert_eq!(state.status_of("c"), Some(UnitStatus::AlreadyInstalled));

    assert_eq!(outcome.report.installed, 1);
    assert_eq!(outcome.report.skipped, 1);
    assert_eq!(outcome.report.already_installed, 1);
    assert_eq!(outcome.report.failed, 0);
}

#[test]
fn test_failing_unit_does_not_block_others_or_post_run() {
    let tree = Tree::new();
    tree.script("install/terminal/first.sh", "first", "exit 0")
        .script("install/terminal/second.sh", "second", "exit 3")
        .script("install/terminal/third.sh", "third", "exit 0");
    let post_marker = tree.home.path().join("post-run.done");
    tree.script(
        "install/desktop/set-gnome-theme.sh",
        "theme",
        &format!("touch {}", post_marker.display()),
    );

    let mut manifest = manifest(&[]);
    manifest.post_run = vec![
        PostRunStep::new("Installing fonts", "install/desktop/fonts.sh", 300),
        PostRunStep::new("Applying GNOME theme", "install/desktop/set-gnome-theme.sh", 60),
    ];
    let orch = orchestrator(&tree, manifest, SessionSignal::with_display(":0"));

    let outcome = orch.run(&InstallConfig::default()).unwrap();

    assert_eq!(tree.executed(), vec!["first", "second", "third", "theme"]);
    let state = orch.store().load().unwrap().unwrap();
    assert_eq!(state.status_of("first"), Some(UnitStatus::Installed));
    assert_eq!(state.status_of("second"), Some(UnitStatus::Failed));
    assert_eq!(state.components["second"].error.as_deref(), Some("Exit code: 3"));
    assert_eq!(state.status_of("third"), Some(UnitStatus::Installed));

    assert!(post_marker.exists(), "Post-run hook must still run");
    let PostRunResult::Completed(steps) = &outcome.post_run else {
        panic!("Expected post-run to complete");
    };
    assert_eq!(steps[0].outcome, StepOutcome::Missing);
    assert_eq!(steps[1].outcome, StepOutcome::Succeeded);
    assert_eq!(
        outcome.report.failures,
        vec![("second".to_string(), "Exit code: 3".to_string())]
    );
}

#[test]
fn test_rerun_reclassifies_installed_units() {
    let tree = Tree::new();
    let mut probes = Vec::new();
    for name in ["btop", "lazygit"] {
        tree.script(
            &format!("install/terminal/app-{}.sh", name),
            name,
            &format!("touch {}", tree.marker(name).display()),
        );
        probes.push((name, format!("test -f {}", tree.marker(name).display())));
    }
    tree.script("install/terminal/broken.sh", "broken", "exit 1");

    let orch = orchestrator(&tree, manifest(&probes), SessionSignal::none());
    let first = orch.run(&InstallConfig::default()).unwrap();
    assert_eq!(first.summary.installed, 2);
    assert_eq!(first.summary.failed, 1);

    let second = orch.run(&InstallConfig::default()).unwrap();

    assert_eq!(second.queue.names(), ["broken"], "Only the failed unit is retried");
    let state = orch.store().load().unwrap().unwrap();
    assert_eq!(state.status_of("btop"), Some(UnitStatus::AlreadyInstalled));
    assert_eq!(state.status_of("lazygit"), Some(UnitStatus::AlreadyInstalled));
    assert_eq!(state.status_of("broken"), Some(UnitStatus::Failed));
    assert_eq!(tree.executed(), vec!["btop", "lazygit", "broken", "broken"]);
}

#[test]
fn test_selection_accepts_hyphenated_names() {
    let tree = Tree::new();
    tree.script("install/desktop/optional/app-github-cli.sh", "github_cli", "exit 0")
        .script("install/desktop/optional/app-zoom.sh", "zoom", "exit 0");

    let orch = orchestrator(&tree, manifest(&[]), SessionSignal::none());
    let outcome = orch.run(&selecting(&["github-cli"])).unwrap();

    assert_eq!(outcome.queue.names(), ["github_cli"]);
    let state = orch.store().load().unwrap().unwrap();
    assert_eq!(state.status_of("github_cli"), Some(UnitStatus::Installed));
    assert_eq!(state.status_of("zoom"), Some(UnitStatus::Skipped));
}

#[test]
fn test_scripts_receive_install_root() {
    let tree = Tree::new();
    let seen = tree.home.path().join("root.txt");
    tree.script(
        "install/terminal/env.sh",
        "env",
        &format!("echo -n \"$OMAKUB_PATH\" > {}", seen.display()),
    );

    orchestrator(&tree, manifest(&[]), SessionSignal::none())
        .run(&InstallConfig::default())
        .unwrap();

    assert_eq!(fs::read_to_string(seen).unwrap(), tree.root.display().to_string());
}

#[test]
fn test_action_timeout_is_recorded() {
    let tree = Tree::new();
    tree.script("install/terminal/hang.sh", "hang", "sleep 30")
        .script("install/terminal/quick.sh", "quick", "exit 0");
    let mut manifest = manifest(&[]);
    manifest.timeouts.action_secs = 1;

    let orch = orchestrator(&tree, manifest, SessionSignal::none());
    let start = std::time::Instant::now();
    orch.run(&InstallConfig::default()).unwrap();

    assert!(start.elapsed() < Duration::from_secs(20));
    let state = orch.store().load().unwrap().unwrap();
    assert_eq!(state.status_of("hang"), Some(UnitStatus::Failed));
    assert_eq!(
        state.components["hang"].error.as_deref(),
        Some("Installation timeout (1s)")
    );
    assert_eq!(state.status_of("quick"), Some(UnitStatus::Installed));
}

#[test]
fn test_prerequisite_ordering_from_manifest() {
    let tree = Tree::new();
    tree.script("install/terminal/app-lazygit.sh", "lazygit", "exit 0")
        .script("install/terminal/app-zz-github-cli.sh", "github_cli", "exit 0");

    let mut manifest = manifest(&[]);
    manifest
        .prerequisites
        .insert("lazygit".to_string(), vec!["zz_github_cli".to_string()]);

    let discovery = orchestrator(&tree, manifest.clone(), SessionSignal::none())
        .plan(&InstallConfig::default())
        .unwrap();
    assert_eq!(discovery.queue.names(), ["lazygit", "zz_github_cli"]);

    manifest.ordering = QueueOrder::Prerequisites;
    let ordered = orchestrator(&tree, manifest, SessionSignal::none())
        .plan(&InstallConfig::default())
        .unwrap();
    assert_eq!(ordered.queue.names(), ["zz_github_cli", "lazygit"]);
    assert!(tree.executed().is_empty(), "Planning never runs unit actions");
}

#[test]
fn test_malformed_previous_state_is_replaced() {
    let tree = Tree::new();
    tree.script("install/terminal/a.sh", "a", "exit 0");
    let paths = tree.paths();
    fs::write(&paths.state_file, "{ truncated").unwrap();

    let orch = orchestrator(&tree, manifest(&[]), SessionSignal::none());
    orch.run(&InstallConfig::default()).unwrap();

    let state = orch.store().load().unwrap().unwrap();
    assert_eq!(state.status_of("a"), Some(UnitStatus::Installed));
}

#[test]
fn test_empty_tree_still_runs_post_run() {
    let tree = Tree::new();
    let mut manifest = manifest(&[]);
    manifest.post_run = vec![PostRunStep::new("Installing fonts", "install/desktop/fonts.sh", 300)];

    let outcome = orchestrator(&tree, manifest, SessionSignal::with_display(":0"))
        .run(&InstallConfig::default())
        .unwrap();

    assert!(outcome.queue.is_empty());
    assert!(matches!(outcome.post_run, PostRunResult::Completed(ref steps) if steps.len() == 1));
}

#[test]
fn test_registry_categories_follow_directories() {
    let tree = Tree::new();
    tree.script("install/terminal/app-neovim.sh", "neovim", "exit 0")
        .script("install/desktop/app-vscode.sh", "vscode", "exit 0")
        .script("install/desktop/optional/download-wallpapers.sh", "wallpapers", "exit 0");

    let plan = orchestrator(&tree, manifest(&[]), SessionSignal::none())
        .plan(&InstallConfig::default())
        .unwrap();

    let category = |name: &str| plan.registry.get(name).map(|u| u.category);
    assert_eq!(category("neovim"), Some(Category::Terminal));
    assert_eq!(category("vscode"), Some(Category::Desktop));
    assert_eq!(category("wallpapers"), Some(Category::Optional));
    assert!(!Path::new(&tree.paths().state_file).exists());
}
