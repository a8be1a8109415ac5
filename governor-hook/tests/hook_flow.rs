use governor_devkit::{FakeCpuTree, MockProxmoxServer, StubNode};
use governor_hook::hook::{HookOutcome, Phase};
use governor_hook::{run, HookError, Invocation};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    server: MockProxmoxServer,
    tree: FakeCpuTree,
    config_dir: TempDir,
}

impl Fixture {
    async fn new(extra_config: &str) -> Self {
        let server = MockProxmoxServer::start(
            "root@pam",
            "secret",
            vec![StubNode::online("pve1").with_vm(100, Some("0,2,5"))],
        )
        .await
        .unwrap();
        let tree = FakeCpuTree::with_cores(8, "powersave").unwrap();

        let config_dir = tempfile::tempdir().unwrap();
        let config = format!(
            "user = \"root@pam\"\npassword = \"secret\"\napi_url = \"{}\"\n{}",
            server.base_url(),
            extra_config
        );
        std::fs::write(config_dir.path().join("hook.toml"), config).unwrap();

        Self { server, tree, config_dir }
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("hook.toml")
    }

    fn invocation(&self, vmid: u32, phase: &str) -> Invocation {
        invocation_with(vmid, phase, &self.config_path(), self.tree.root())
    }

    fn governors(&self) -> Vec<String> {
        (0..8).map(|core| self.tree.governor(core).unwrap_or_default()).collect()
    }
}

fn invocation_with(vmid: u32, phase: &str, config_path: &Path, sysfs_root: &Path) -> Invocation {
    Invocation {
        vmid,
        phase: phase.to_string(),
        config_path: config_path.to_path_buf(),
        sysfs_root: sysfs_root.to_path_buf(),
    }
}

fn expected(pinned: &str, other: &str) -> Vec<String> {
    (0..8)
        .map(|core| if [0, 2, 5].contains(&core) { pinned } else { other }.to_string())
        .collect()
}

#[tokio::test]
async fn test_start_sets_pinned_cores_only() {
    let fx = Fixture::new("started_state = \"performance\"\n").await;

    let outcome = run(&fx.invocation(100, "pre-start")).await.unwrap();

    match outcome {
        HookOutcome::Applied { phase, governor, cores } => {
            assert_eq!(phase, Phase::PreStart);
            assert_eq!(governor.as_str(), "performance");
            assert_eq!(cores.into_iter().collect::<Vec<_>>(), vec![0, 2, 5]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(fx.governors(), expected("performance", "powersave"));
}

#[tokio::test]
async fn test_stop_restores_default_governor() {
    let fx = Fixture::new("").await;

    run(&fx.invocation(100, "post-start")).await.unwrap();
    assert_eq!(fx.governors(), expected("performance", "powersave"));

    run(&fx.invocation(100, "post-stop")).await.unwrap();
    assert_eq!(fx.governors(), expected("schedutil", "powersave"));
}

#[tokio::test]
async fn test_unknown_phase_is_noop() {
    let fx = Fixture::new("").await;

    let outcome = run(&fx.invocation(100, "pre-migrate")).await.unwrap();

    assert_eq!(
        outcome,
        HookOutcome::Ignored {
            phase: "pre-migrate".to_string()
        }
    );
    assert!(fx.server.requests().is_empty());
    assert_eq!(fx.governors(), vec!["powersave".to_string(); 8]);
}

#[tokio::test]
async fn test_unknown_phase_skips_config() {
    let tree = FakeCpuTree::with_cores(1, "schedutil").unwrap();
    let missing = Path::new("/nonexistent/hook.toml");

    let outcome = run(&invocation_with(100, "pre-migrate", missing, tree.root())).await;
    assert!(matches!(outcome, Ok(HookOutcome::Ignored { .. })));
}

#[tokio::test]
async fn test_failed_core_reported_others_written() {
    let fx = Fixture::new("").await;
    fx.tree.break_core(5).unwrap();

    let err = run(&fx.invocation(100, "pre-start")).await.unwrap_err();

    match err {
        HookError::GovernorWrite(e) => {
            assert_eq!(e.failed_cores(), vec![5]);
            assert_eq!(e.attempted, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.tree.governor(0).as_deref(), Some("performance"));
    assert_eq!(fx.tree.governor(2).as_deref(), Some("performance"));
}

#[tokio::test]
async fn test_missing_config_fails() {
    let tree = FakeCpuTree::with_cores(1, "schedutil").unwrap();
    let missing = Path::new("/nonexistent/hook.toml");

    let err = run(&invocation_with(100, "pre-start", missing, tree.root()))
        .await
        .unwrap_err();
    assert!(matches!(err, HookError::Config(_)));
}

#[tokio::test]
async fn test_bad_credentials_abort_before_writes() {
    let fx = Fixture::new("").await;
    let config = std::fs::read_to_string(fx.config_path())
        .unwrap()
        .replace("\"secret\"", "\"wrong\"");
    std::fs::write(fx.config_path(), config).unwrap();

    let err = run(&fx.invocation(100, "pre-start")).await.unwrap_err();

    assert!(matches!(err, HookError::Auth(_)));
    assert_eq!(fx.server.requests(), vec!["POST /api2/json/access/ticket".to_string()]);
    assert_eq!(fx.governors(), vec!["powersave".to_string(); 8]);
}

#[tokio::test]
async fn test_unknown_vm_fails() {
    let fx = Fixture::new("").await;

    let err = run(&fx.invocation(555, "pre-stop")).await.unwrap_err();
    assert!(matches!(err, HookError::Api(_)));
    assert_eq!(fx.governors(), vec!["powersave".to_string(); 8]);
}
