// One container per bot decision.
//
// Lifecycle of a request, serialized across all bots:
//   1. copy the bot source into `source_dir` (mounted read-only)
//   2. start the container with memory/cpu ceilings and one published port
//   3. wait for the port, bounded by `connect_timeout`
//   4. make exactly one call, bounded by `call_timeout`
//   5. teardown: save logs, kill, remove, delete the copied source
//
// Step 5 runs on every exit path after step 1. Teardown failures are logged
// and never replace the decision result. If the request future is dropped
// before teardown, `SandboxGuard` removes the container synchronously.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use botblitz_core::config::{BotConfig, SandboxConfig};
use botblitz_core::model::{GameSnapshot, WaiverClaim};

use crate::artifacts::{read_env_file, write_log_artifacts};
use crate::client::{BotClient, HttpBotClient};
use crate::error::SandboxError;
use crate::runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};

/// Where the bot source is mounted inside the container.
pub const MOUNT_TARGET: &str = "/botblitz";
/// File name the decision server expects under `MOUNT_TARGET`.
pub const BOT_FILE_NAME: &str = "bot.py";

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The parts of a bot the sandbox needs.
#[derive(Debug, Clone, PartialEq)]
pub struct BotDescriptor {
    pub id: String,
    pub source_path: PathBuf,
    pub env_path: Option<PathBuf>,
}

impl From<&BotConfig> for BotDescriptor {
    fn from(cfg: &BotConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            source_path: PathBuf::from(&cfg.source_path),
            env_path: cfg.env_path.as_ref().map(PathBuf::from),
        }
    }
}

impl BotDescriptor {
    pub fn source_exists(&self) -> bool {
        self.source_path.is_file()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSettings {
    pub image: String,
    /// Containers are named `<name_prefix>-<bot id>`; the sweep matches on it.
    pub name_prefix: String,
    pub host: String,
    pub port: u16,
    pub memory_mb: u32,
    pub cpus: f64,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    pub source_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl SandboxSettings {
    pub fn from_config(cfg: &SandboxConfig) -> Self {
        Self {
            image: cfg.image.clone(),
            name_prefix: cfg.container_name.clone(),
            host: "127.0.0.1".to_string(),
            port: cfg.port,
            memory_mb: cfg.memory_mb,
            cpus: cfg.cpus,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            call_timeout: Duration::from_secs(cfg.call_timeout_secs),
            source_dir: PathBuf::from(&cfg.source_dir),
            log_dir: PathBuf::from(&cfg.log_dir),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    DraftPick,
    AddDrop,
}

impl DecisionKind {
    /// Artifact label: `draft-pick<N>` or `waivers-week<W>`.
    pub fn label(&self, snapshot: &GameSnapshot) -> String {
        match self {
            DecisionKind::DraftPick => format!("draft-pick{}", snapshot.current_pick),
            DecisionKind::AddDrop => format!("waivers-week{}", snapshot.current_week),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Pick(String),
    Claims(Vec<WaiverClaim>),
}

/// Isolated execution of one bot decision.
#[async_trait]
pub trait BotSandbox: Send + Sync {
    async fn request_draft_pick(
        &self,
        bot: &BotDescriptor,
        snapshot: &GameSnapshot,
    ) -> Result<String, SandboxError>;

    async fn request_claims(
        &self,
        bot: &BotDescriptor,
        snapshot: &GameSnapshot,
    ) -> Result<Vec<WaiverClaim>, SandboxError>;

    /// Remove sandboxes left over from an earlier run.
    async fn sweep(&self) {}
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Poll `host:port` until a TCP connect succeeds or `deadline` passes.
pub async fn wait_for_port(host: &str, port: u16, deadline: Duration) -> Result<(), SandboxError> {
    let probe = async {
        loop {
            match TcpStream::connect((host, port)).await {
                Ok(_) => return,
                Err(e) => {
                    debug!("port {port} not ready: {e}");
                    tokio::time::sleep(PORT_POLL_INTERVAL).await;
                }
            }
        }
    };
    tokio::time::timeout(deadline, probe)
        .await
        .map_err(|_| SandboxError::PortUnreachable {
            port,
            waited: deadline,
        })
}

/// Run `call` under `deadline`, mapping expiry to `SandboxError::Timeout`.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, SandboxError>
where
    F: Future<Output = Result<T, SandboxError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| SandboxError::Timeout { deadline })?
}

/// Docker names allow `[a-zA-Z0-9_.-]`; anything else becomes `-`.
fn container_name(prefix: &str, bot_id: &str) -> String {
    let safe: String = bot_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || "_.-".contains(c) { c } else { '-' })
        .collect();
    format!("{prefix}-{safe}")
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Owns the copied source and the started container until teardown.
struct SandboxGuard<'a, R: ContainerRuntime> {
    runtime: &'a R,
    source_file: PathBuf,
    container: Option<String>,
    armed: bool,
}

impl<'a, R: ContainerRuntime> SandboxGuard<'a, R> {
    fn new(runtime: &'a R, source_file: PathBuf) -> Self {
        Self {
            runtime,
            source_file,
            container: None,
            armed: true,
        }
    }

    fn remove_source(&self) {
        match std::fs::remove_file(&self.source_file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!(
                "failed to delete bot source {}: {e}",
                self.source_file.display()
            ),
        }
    }
}

impl<R: ContainerRuntime> Drop for SandboxGuard<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("sandbox teardown did not run; forcing cleanup");
        if let Some(id) = self.container.take() {
            self.runtime.force_remove_blocking(&id);
        }
        self.remove_source();
    }
}

// ---------------------------------------------------------------------------
// ContainerSandbox
// ---------------------------------------------------------------------------

pub struct ContainerSandbox<R = DockerRuntime, C = HttpBotClient> {
    runtime: R,
    client: C,
    settings: SandboxSettings,
    /// Held for a whole lifecycle; the fixed port allows one sandbox at a time.
    lifecycle: Mutex<()>,
}

impl ContainerSandbox {
    /// Docker runtime plus the HTTP decision client.
    pub fn docker(settings: SandboxSettings) -> Self {
        let client = HttpBotClient::new(settings.host.clone());
        Self::new(DockerRuntime::default(), client, settings)
    }
}

impl<R: ContainerRuntime, C: BotClient> ContainerSandbox<R, C> {
    pub fn new(runtime: R, client: C, settings: SandboxSettings) -> Self {
        Self {
            runtime,
            client,
            settings,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Copy the bot source to `<source_dir>/bot.py`.
    fn materialize(&self, bot: &BotDescriptor) -> Result<PathBuf, SandboxError> {
        let materialize_err = |source: std::io::Error| SandboxError::Materialize {
            path: bot.source_path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.settings.source_dir).map_err(materialize_err)?;
        let target = self.settings.source_dir.join(BOT_FILE_NAME);
        std::fs::copy(&bot.source_path, &target).map_err(materialize_err)?;
        Ok(target)
    }

    fn container_spec(&self, bot: &BotDescriptor, env: Vec<(String, String)>) -> ContainerSpec {
        ContainerSpec {
            name: container_name(&self.settings.name_prefix, &bot.id),
            image: self.settings.image.clone(),
            port: self.settings.port,
            memory_mb: self.settings.memory_mb,
            cpus: self.settings.cpus,
            mount_source: self.settings.source_dir.clone(),
            mount_target: MOUNT_TARGET.to_string(),
            env,
        }
    }

    async fn call(&self, kind: DecisionKind, snapshot: &GameSnapshot) -> Result<Decision, SandboxError> {
        wait_for_port(&self.settings.host, self.settings.port, self.settings.connect_timeout).await?;
        let port = self.settings.port;
        let deadline = self.settings.call_timeout;
        match kind {
            DecisionKind::DraftPick => with_deadline(deadline, self.client.draft_pick(port, snapshot))
                .await
                .map(Decision::Pick),
            DecisionKind::AddDrop => with_deadline(deadline, self.client.add_drop(port, snapshot))
                .await
                .map(Decision::Claims),
        }
    }

    async fn teardown(&self, mut guard: SandboxGuard<'_, R>, label: &str, bot_id: &str) {
        if let Some(id) = guard.container.take() {
            match self.runtime.logs(&id).await {
                Ok(logs) => {
                    match write_log_artifacts(&self.settings.log_dir, label, bot_id, &logs) {
                        Ok((out, err)) => {
                            debug!("saved bot logs to {} and {}", out.display(), err.display())
                        }
                        Err(e) => error!("failed to save logs for {bot_id}: {e}"),
                    }
                }
                Err(e) => error!("failed to collect logs for {bot_id}: {e:#}"),
            }
            if let Err(e) = self.runtime.kill(&id).await {
                error!("failed to kill sandbox {id} for {bot_id}: {e:#}");
            }
            if let Err(e) = self.runtime.remove(&id).await {
                error!("failed to remove sandbox {id} for {bot_id}: {e:#}");
            }
        }
        guard.remove_source();
        guard.armed = false;
    }

    /// Full create, call, teardown cycle for one decision.
    pub async fn run(
        &self,
        bot: &BotDescriptor,
        kind: DecisionKind,
        snapshot: &GameSnapshot,
    ) -> Result<Decision, SandboxError> {
        let _lifecycle = self.lifecycle.lock().await;
        let label = kind.label(snapshot);

        let env = match &bot.env_path {
            Some(path) => read_env_file(path).map_err(|source| SandboxError::Materialize {
                path: path.display().to_string(),
                source,
            })?,
            None => Vec::new(),
        };

        let source_file = self.materialize(bot)?;
        let mut guard = SandboxGuard::new(&self.runtime, source_file);

        let spec = self.container_spec(bot, env);
        let outcome = match self.runtime.start(&spec).await {
            Ok(id) => {
                debug!("started sandbox {id} for {} ({label})", bot.id);
                guard.container = Some(id);
                self.call(kind, snapshot).await
            }
            Err(e) => {
                // A failed run may still leave a named container behind
                guard.container = Some(spec.name.clone());
                Err(e)
            }
        };

        self.teardown(guard, &label, &bot.id).await;
        outcome
    }
}

#[async_trait]
impl<R: ContainerRuntime, C: BotClient> BotSandbox for ContainerSandbox<R, C> {
    async fn request_draft_pick(
        &self,
        bot: &BotDescriptor,
        snapshot: &GameSnapshot,
    ) -> Result<String, SandboxError> {
        match self.run(bot, DecisionKind::DraftPick, snapshot).await? {
            Decision::Pick(player_id) => Ok(player_id),
            Decision::Claims(_) => Err(SandboxError::Remote {
                message: "bot answered a draft request with claims".to_string(),
            }),
        }
    }

    async fn request_claims(
        &self,
        bot: &BotDescriptor,
        snapshot: &GameSnapshot,
    ) -> Result<Vec<WaiverClaim>, SandboxError> {
        match self.run(bot, DecisionKind::AddDrop, snapshot).await? {
            Decision::Claims(claims) => Ok(claims),
            Decision::Pick(_) => Err(SandboxError::Remote {
                message: "bot answered a waiver request with a pick".to_string(),
            }),
        }
    }

    async fn sweep(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        match self.runtime.sweep(&self.settings.name_prefix).await {
            Ok(0) => {}
            Ok(n) => info!("removed {n} leftover sandbox containers"),
            Err(e) => error!("sandbox sweep failed: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ContainerLogs;
    use botblitz_core::model::LeagueSettings;
    use botblitz_core::position::Position;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::net::TcpListener;

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct FakeRuntime {
        calls: StdMutex<Vec<String>>,
        specs: StdMutex<Vec<ContainerSpec>>,
        fail_start: bool,
        fail_kill: bool,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeRuntime {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn start(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
            self.record("start");
            self.specs.lock().unwrap().push(spec.clone());
            if self.fail_start {
                return Err(SandboxError::Launch {
                    message: "image not found".into(),
                });
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            // Yield so a concurrent request would get a chance to interleave
            tokio::task::yield_now().await;
            Ok(format!("cid-{}", spec.name))
        }

        async fn logs(&self, _id: &str) -> anyhow::Result<ContainerLogs> {
            self.record("logs");
            Ok(ContainerLogs {
                stdout: "hello from bot\n".into(),
                stderr: String::new(),
            })
        }

        async fn kill(&self, _id: &str) -> anyhow::Result<()> {
            self.record("kill");
            if self.fail_kill {
                anyhow::bail!("container already exited");
            }
            Ok(())
        }

        async fn remove(&self, id: &str) -> anyhow::Result<()> {
            self.record(format!("remove {id}"));
            if id.starts_with("cid-") {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn sweep(&self, name_prefix: &str) -> anyhow::Result<usize> {
            self.record(format!("sweep {name_prefix}"));
            Ok(2)
        }

        fn force_remove_blocking(&self, id: &str) {
            self.record(format!("force {id}"));
        }
    }

    enum Behavior {
        Pick(&'static str),
        Claims(Vec<WaiverClaim>),
        Fail,
        Hang,
    }

    struct FakeClient {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BotClient for FakeClient {
        async fn draft_pick(&self, _port: u16, _snapshot: &GameSnapshot) -> Result<String, SandboxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Pick(id) => Ok(id.to_string()),
                Behavior::Claims(_) | Behavior::Fail => Err(SandboxError::Remote {
                    message: "bot crashed".into(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("late".into())
                }
            }
        }

        async fn add_drop(
            &self,
            _port: u16,
            _snapshot: &GameSnapshot,
        ) -> Result<Vec<WaiverClaim>, SandboxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Claims(c) => Ok(c.clone()),
                _ => Err(SandboxError::Remote {
                    message: "bot crashed".into(),
                }),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Fixture {
        dir: PathBuf,
        bot: BotDescriptor,
        settings: SandboxSettings,
        _listener: Option<TcpListener>,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    /// Temp dirs, a bot source file, and (optionally) a listener standing in
    /// for the container's published port.
    async fn fixture(name: &str, listening: bool) -> Fixture {
        let dir = std::env::temp_dir().join(format!("botblitz_sandbox_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let source_path = dir.join("my_bot.py");
        std::fs::write(&source_path, "def draft_player(state):\n    return 'p1'\n").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let listener = if listening { Some(listener) } else { None };

        Fixture {
            bot: BotDescriptor {
                id: "bot1".into(),
                source_path,
                env_path: None,
            },
            settings: SandboxSettings {
                image: "py_grpc_server".into(),
                name_prefix: "botblitz-test".into(),
                host: "127.0.0.1".into(),
                port,
                memory_mb: 512,
                cpus: 1.0,
                connect_timeout: Duration::from_millis(300),
                call_timeout: Duration::from_millis(200),
                source_dir: dir.join("mount"),
                log_dir: dir.join("logs"),
            },
            dir,
            _listener: listener,
        }
    }

    fn snapshot() -> GameSnapshot {
        GameSnapshot {
            acting_bot_id: "bot1".into(),
            league: LeagueSettings {
                year: 2024,
                num_teams: 2,
                is_snake_draft: true,
                total_rounds: 1,
                points_per_reception: 1.0,
                slots: vec![Position::Quarterback],
            },
            current_pick: 5,
            current_week: 3,
            bots: Vec::new(),
            players: Vec::new(),
        }
    }

    fn assert_torn_down(fx: &Fixture, runtime: &FakeRuntime) {
        let calls = runtime.calls();
        assert!(calls.iter().any(|c| c.starts_with("remove")), "no remove in {calls:?}");
        assert!(!fx.settings.source_dir.join(BOT_FILE_NAME).exists());
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_pick_runs_full_lifecycle() {
        let fx = fixture("success", true).await;
        let sandbox = ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Pick("p9")),
            fx.settings.clone(),
        );

        let pick = sandbox.request_draft_pick(&fx.bot, &snapshot()).await.unwrap();
        assert_eq!(pick, "p9");
        assert_eq!(
            sandbox.runtime().calls(),
            vec!["start", "logs", "kill", "remove cid-botblitz-test-bot1"]
        );
        assert_torn_down(&fx, sandbox.runtime());

        let stdout = fx.settings.log_dir.join("draft-pick5-bot1.stdout");
        assert_eq!(std::fs::read_to_string(stdout).unwrap(), "hello from bot\n");
        assert!(fx.settings.log_dir.join("draft-pick5-bot1.stderr").exists());

        let specs = sandbox.runtime().specs.lock().unwrap().clone();
        assert_eq!(specs[0].mount_target, MOUNT_TARGET);
        assert_eq!(specs[0].mount_source, fx.settings.source_dir);
        assert_eq!(specs[0].port, fx.settings.port);
        assert_eq!(specs[0].memory_mb, 512);
    }

    #[tokio::test]
    async fn remote_error_still_tears_down() {
        let fx = fixture("remote_error", true).await;
        let sandbox = ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Fail),
            fx.settings.clone(),
        );
        let err = sandbox.request_draft_pick(&fx.bot, &snapshot()).await.unwrap_err();
        assert!(matches!(err, SandboxError::Remote { .. }));
        assert_torn_down(&fx, sandbox.runtime());
        assert!(fx.settings.log_dir.join("draft-pick5-bot1.stdout").exists());
    }

    #[tokio::test]
    async fn slow_bot_times_out_and_tears_down() {
        let fx = fixture("timeout", true).await;
        let sandbox = ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Hang),
            fx.settings.clone(),
        );
        let err = sandbox.request_draft_pick(&fx.bot, &snapshot()).await.unwrap_err();
        match err {
            SandboxError::Timeout { deadline } => assert_eq!(deadline, Duration::from_millis(200)),
            other => panic!("expected Timeout, got: {other:?}"),
        }
        assert_torn_down(&fx, sandbox.runtime());
    }

    #[tokio::test]
    async fn unreachable_port_skips_the_call() {
        let fx = fixture("unreachable", false).await;
        let client = FakeClient::new(Behavior::Pick("p1"));
        let sandbox = ContainerSandbox::new(FakeRuntime::default(), client, fx.settings.clone());
        let err = sandbox.request_draft_pick(&fx.bot, &snapshot()).await.unwrap_err();
        assert!(matches!(err, SandboxError::PortUnreachable { .. }));
        assert_eq!(sandbox.client.calls.load(Ordering::SeqCst), 0);
        assert_torn_down(&fx, sandbox.runtime());
    }

    #[tokio::test]
    async fn launch_failure_removes_named_container_and_source() {
        let fx = fixture("launch_failure", true).await;
        let runtime = FakeRuntime {
            fail_start: true,
            ..Default::default()
        };
        let sandbox = ContainerSandbox::new(runtime, FakeClient::new(Behavior::Pick("p1")), fx.settings.clone());
        let err = sandbox.request_draft_pick(&fx.bot, &snapshot()).await.unwrap_err();
        assert!(matches!(err, SandboxError::Launch { .. }));
        assert!(sandbox
            .runtime()
            .calls()
            .contains(&"remove botblitz-test-bot1".to_string()));
        assert_torn_down(&fx, sandbox.runtime());
    }

    #[tokio::test]
    async fn cleanup_failure_does_not_mask_result() {
        let fx = fixture("kill_fails", true).await;
        let runtime = FakeRuntime {
            fail_kill: true,
            ..Default::default()
        };
        let sandbox = ContainerSandbox::new(runtime, FakeClient::new(Behavior::Pick("p3")), fx.settings.clone());
        let pick = sandbox.request_draft_pick(&fx.bot, &snapshot()).await.unwrap();
        assert_eq!(pick, "p3");
        assert_torn_down(&fx, sandbox.runtime());
    }

    #[tokio::test]
    async fn missing_source_never_starts_a_container() {
        let fx = fixture("missing_source", true).await;
        assert!(fx.bot.source_exists());
        let mut bot = fx.bot.clone();
        bot.source_path = fx.dir.join("nope.py");
        assert!(!bot.source_exists());
        let sandbox = ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Pick("p1")),
            fx.settings.clone(),
        );
        let err = sandbox.request_draft_pick(&bot, &snapshot()).await.unwrap_err();
        assert!(matches!(err, SandboxError::Materialize { .. }));
        assert!(sandbox.runtime().calls().is_empty());
    }

    #[tokio::test]
    async fn claims_use_waiver_label_and_env_file() {
        let fx = fixture("claims", true).await;
        let env_path = fx.dir.join("bot.env");
        std::fs::write(&env_path, "# secrets\nTOKEN=xyz\n").unwrap();
        let mut bot = fx.bot.clone();
        bot.env_path = Some(env_path);

        let claim = WaiverClaim {
            bot_id: "bot1".into(),
            add_player_id: "a".into(),
            drop_player_id: "d".into(),
            bid: 4,
        };
        let sandbox = ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Claims(vec![claim.clone()])),
            fx.settings.clone(),
        );
        let claims = sandbox.request_claims(&bot, &snapshot()).await.unwrap();
        assert_eq!(claims, vec![claim]);
        assert!(fx.settings.log_dir.join("waivers-week3-bot1.stdout").exists());
        let specs = sandbox.runtime().specs.lock().unwrap().clone();
        assert_eq!(specs[0].env, vec![("TOKEN".to_string(), "xyz".to_string())]);
    }

    #[tokio::test]
    async fn one_sandbox_alive_at_a_time() {
        let fx = fixture("serialized", true).await;
        let sandbox = Arc::new(ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Pick("p1")),
            fx.settings.clone(),
        ));
        let snap = snapshot();
        let (a, b) = tokio::join!(
            sandbox.request_draft_pick(&fx.bot, &snap),
            sandbox.request_draft_pick(&fx.bot, &snap)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(sandbox.runtime().max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_uses_name_prefix() {
        let fx = fixture("sweep", true).await;
        let sandbox = ContainerSandbox::new(
            FakeRuntime::default(),
            FakeClient::new(Behavior::Pick("p1")),
            fx.settings.clone(),
        );
        sandbox.sweep().await;
        assert_eq!(sandbox.runtime().calls(), vec!["sweep botblitz-test"]);
    }

    #[test]
    fn dropped_guard_forces_cleanup() {
        let runtime = FakeRuntime::default();
        let dir = std::env::temp_dir().join("botblitz_sandbox_guard");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join(BOT_FILE_NAME);
        std::fs::write(&file, "x").unwrap();
        {
            let mut guard = SandboxGuard::new(&runtime, file.clone());
            guard.container = Some("cid-1".into());
        }
        assert_eq!(runtime.calls(), vec!["force cid-1"]);
        assert!(!file.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(61)).await;
            Ok::<_, SandboxError>(())
        };
        let err = with_deadline(Duration::from_secs(60), slow).await.unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { .. }));

        let fast = async { Ok::<_, SandboxError>(7) };
        assert_eq!(with_deadline(Duration::from_secs(60), fast).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn wait_for_port_sees_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        wait_for_port("127.0.0.1", port, Duration::from_secs(2)).await.unwrap();
    }

    #[test]
    fn container_names_are_sanitized() {
        assert_eq!(container_name("botblitz", "bot 1/x"), "botblitz-bot-1-x");
        assert_eq!(container_name("botblitz", "bot_1.a"), "botblitz-bot_1.a");
    }

    #[test]
    fn settings_from_config_convert_seconds() {
        let cfg = SandboxConfig {
            image: "img".into(),
            container_name: "bb".into(),
            port: 9000,
            memory_mb: 256,
            cpus: 0.5,
            connect_timeout_secs: 10,
            call_timeout_secs: 60,
            source_dir: "/tmp/bb".into(),
            log_dir: "logs/sandbox".into(),
        };
        let s = SandboxSettings::from_config(&cfg);
        assert_eq!(s.connect_timeout, Duration::from_secs(10));
        assert_eq!(s.call_timeout, Duration::from_secs(60));
        assert_eq!(s.name_prefix, "bb");
        assert_eq!(s.source_dir, PathBuf::from("/tmp/bb"));
    }
}
