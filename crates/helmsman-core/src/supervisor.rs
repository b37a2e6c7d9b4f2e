//! Supervision loop.
//!
//! ```text
//! Starting ─► Running ◄──────────────┐
//!               │  probe failed       │ probe ok / relaunched
//!               ▼                     │
//!            Degraded ── streak ─► Restarting
//!               │
//!   interrupt   ▼
//!         ShuttingDown ─► Stopped
//! ```
//!
//! Only the dialogue service is watched. The action and UI services are
//! started once and only touched again at shutdown.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::artifact::{Artifact, ArtifactResolver, BuildStep};
use crate::error::{HelmsmanError, Result};
use crate::launcher::Launch;
use crate::probe::Prober;
use crate::process::{ManagedProcess, Role, Termination};

/// Ceiling for the optional restart backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// SupervisorPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorPolicy {
    pub check_interval: Duration,
    pub probe_timeout: Duration,
    pub failure_threshold: u32,
    pub grace_period: Duration,
    /// Zero restarts immediately on every breach.
    pub restart_backoff: Duration,
    /// `None` restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(8),
            probe_timeout: Duration::from_secs(2),
            failure_threshold: 3,
            grace_period: Duration::from_secs(5),
            restart_backoff: Duration::ZERO,
            max_restarts: None,
        }
    }
}

impl SupervisorPolicy {
    /// Delay before the `n`th back-to-back restart (0-based): base·2ⁿ, capped.
    pub fn backoff_for(&self, n: u32) -> Duration {
        if self.restart_backoff.is_zero() {
            return Duration::ZERO;
        }
        self.restart_backoff
            .saturating_mul(1u32 << n.min(16))
            .min(MAX_BACKOFF)
    }
}

// ---------------------------------------------------------------------------
// SupervisorState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Starting,
    Running,
    Degraded,
    Restarting,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Degraded => "degraded",
            SupervisorState::Restarting => "restarting",
            SupervisorState::ShuttingDown => "shutting_down",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// HealthState
// ---------------------------------------------------------------------------

/// Consecutive probe failures for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthState {
    failures: u32,
    threshold: u32,
}

impl HealthState {
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Count a failure. True when the streak has reached the threshold.
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.failures >= self.threshold
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Outcome of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Healthy,
    Degraded { streak: u32 },
    Restarted,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Owns every managed process and the dialogue health counter.
pub struct Supervisor<L> {
    launcher: L,
    prober: Arc<dyn Prober>,
    policy: SupervisorPolicy,
    state: SupervisorState,
    health: HealthState,
    artifact: Option<Artifact>,
    /// Indexed by [`Role::index`].
    slots: [Option<ManagedProcess>; 3],
    restarts: u32,
    back_to_back: u32,
}

impl<L: Launch> Supervisor<L> {
    pub fn new(launcher: L, prober: Arc<dyn Prober>, policy: SupervisorPolicy) -> Self {
        let health = HealthState::new(policy.failure_threshold);
        Self {
            launcher,
            prober,
            policy,
            state: SupervisorState::Starting,
            health,
            artifact: None,
            slots: [None, None, None],
            restarts: 0,
            back_to_back: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn health(&self) -> HealthState {
        self.health
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn process(&self, role: Role) -> Option<&ManagedProcess> {
        self.slots[role.index()].as_ref()
    }

    /// True if a process is held for `role` and has not exited.
    pub fn is_running(&mut self, role: Role) -> bool {
        self.slots[role.index()]
            .as_mut()
            .is_some_and(|p| p.is_running())
    }

    fn set_state(&mut self, next: SupervisorState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "supervisor");
            self.state = next;
        }
    }

    fn insert(&mut self, process: ManagedProcess) {
        let slot = &mut self.slots[process.role.index()];
        debug_assert!(slot.is_none(), "one live process per role");
        *slot = Some(process);
    }

    /// Launch all roles in dependency order. Readiness timeouts are already
    /// downgraded to warnings by the launchers; only spawn failures surface.
    pub async fn start(&mut self, artifact: Artifact) -> Result<()> {
        self.set_state(SupervisorState::Starting);
        info!(model = %artifact.path.display(), "starting services");
        self.artifact = Some(artifact.clone());

        for role in Role::START_ORDER {
            let process = match role {
                Role::ActionService => self.launcher.start_action().await?,
                Role::DialogueService => self.launcher.start_dialogue(&artifact).await?,
                Role::UiService => self.launcher.start_ui().await?,
            };
            self.insert(process);
        }

        self.health.reset();
        self.set_state(SupervisorState::Running);
        info!("all services started");
        Ok(())
    }

    /// One health check of the dialogue service.
    pub async fn tick(&mut self) -> Result<Tick> {
        let url = self
            .process(Role::DialogueService)
            .and_then(|p| p.ready_url.clone());
        let healthy = match &url {
            Some(url) => self.prober.is_healthy(url, self.policy.probe_timeout).await,
            None => false,
        };

        if healthy {
            if self.health.failures() > 0 {
                info!(role = %Role::DialogueService, "health check recovered");
            }
            self.health.record_success();
            self.back_to_back = 0;
            self.set_state(SupervisorState::Running);
            return Ok(Tick::Healthy);
        }

        let breach = self.health.record_failure();
        let streak = self.health.failures();
        warn!(
            role = %Role::DialogueService,
            url = url.as_deref().unwrap_or("-"),
            streak,
            threshold = self.health.threshold(),
            "health check failed"
        );
        if !breach {
            self.set_state(SupervisorState::Degraded);
            return Ok(Tick::Degraded { streak });
        }

        self.restart_dialogue().await?;
        Ok(Tick::Restarted)
    }

    /// Stop the dialogue service and relaunch it on the same artifact.
    async fn restart_dialogue(&mut self) -> Result<()> {
        if let Some(max) = self.policy.max_restarts {
            if self.restarts >= max {
                error!(restarts = self.restarts, "restart limit reached");
                return Err(HelmsmanError::RestartLimit(self.restarts));
            }
        }
        self.set_state(SupervisorState::Restarting);
        warn!(role = %Role::DialogueService, "unreachable, restarting");

        if let Some(old) = self.slots[Role::DialogueService.index()].take() {
            if let Err(e) = old.terminate(self.policy.grace_period).await {
                warn!(role = %Role::DialogueService, "stop before restart failed: {e}");
            }
        }

        let delay = self.policy.backoff_for(self.back_to_back);
        if !delay.is_zero() {
            info!(delay_secs = delay.as_secs(), "restart backoff");
            sleep(delay).await;
        }

        let artifact = self.artifact.clone().ok_or_else(|| {
            HelmsmanError::RestartFailure(Box::new(HelmsmanError::Config(
                "restart requested before start".into(),
            )))
        })?;
        let process = self
            .launcher
            .start_dialogue(&artifact)
            .await
            .map_err(|e| HelmsmanError::RestartFailure(Box::new(e)))?;
        self.insert(process);

        self.health.reset();
        self.restarts += 1;
        self.back_to_back += 1;
        self.set_state(SupervisorState::Running);
        info!(restarts = self.restarts, "dialogue-service restarted");
        Ok(())
    }

    /// Terminate every held process in reverse start order. Returns how each
    /// one ended, in the order they were stopped.
    pub async fn shutdown(&mut self) -> Vec<(Role, Termination)> {
        self.set_state(SupervisorState::ShuttingDown);
        let mut report = Vec::new();
        for role in Role::START_ORDER.into_iter().rev() {
            let Some(process) = self.slots[role.index()].take() else {
                continue;
            };
            match process.terminate(self.policy.grace_period).await {
                Ok(how) => report.push((role, how)),
                Err(e) => error!(%role, "failed to stop: {e}"),
            }
        }
        self.set_state(SupervisorState::Stopped);
        report
    }

    /// Check health every interval until `interrupt` resolves or a fatal
    /// error occurs, then shut everything down.
    pub async fn run<F>(&mut self, interrupt: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let result = loop {
            tokio::select! {
                _ = interrupt.as_mut() => {
                    info!("interrupt received");
                    break Ok(());
                }
                _ = sleep(self.policy.check_interval) => {}
            }
            // A breaching tick may sit in backoff or a relaunch readiness wait.
            let ticked = tokio::select! {
                ticked = self.tick() => Some(ticked),
                _ = interrupt.as_mut() => None,
            };
            match ticked {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("supervision stopped: {e}");
                    break Err(e);
                }
                None => {
                    info!("interrupt received during health check");
                    break Ok(());
                }
            }
        };
        self.shutdown().await;
        result
    }
}

/// Resolve the artifact, start every service, supervise until `interrupt`.
/// Whatever happens, no managed process outlives this call.
pub async fn orchestrate<B, L, F>(
    resolver: &ArtifactResolver<B>,
    supervisor: &mut Supervisor<L>,
    interrupt: F,
) -> Result<()>
where
    B: BuildStep,
    L: Launch,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    let artifact = tokio::select! {
        resolved = resolver.resolve() => resolved?,
        _ = interrupt.as_mut() => {
            info!("interrupted before startup");
            return Ok(());
        }
    };

    let started = tokio::select! {
        started = supervisor.start(artifact) => Some(started),
        _ = interrupt.as_mut() => None,
    };
    match started {
        Some(Ok(())) => supervisor.run(interrupt).await,
        Some(Err(e)) => {
            error!("startup failed: {e}");
            supervisor.shutdown().await;
            Err(e)
        }
        None => {
            info!("interrupted during startup");
            supervisor.shutdown().await;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(all(test, unix))]
mod supervision_tests {
    use super::*;
    use crate::config::CommandSpec;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    const DIALOGUE_URL: &str = "http://127.0.0.1:5006/status";

    /// Spawns idle shells instead of real services and records every call.
    #[derive(Default)]
    struct FakeLauncher {
        started: Mutex<Vec<Role>>,
        dialogue_artifacts: Mutex<Vec<PathBuf>>,
        /// Dialogue launches beyond this count fail to spawn.
        dialogue_spawn_limit: Option<usize>,
        /// Relaunches spawn, then stall this long before returning.
        relaunch_stall: Option<Duration>,
    }

    impl FakeLauncher {
        fn spawn(&self, role: Role, ready_url: Option<String>) -> Result<ManagedProcess> {
            self.started.lock().unwrap().push(role);
            let spec = CommandSpec::new("sh", &["-c", "sleep 30"]);
            ManagedProcess::spawn(role, &spec, &[], &std::env::temp_dir(), 0, ready_url)
        }

        fn dialogue_starts(&self) -> usize {
            self.dialogue_artifacts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Launch for FakeLauncher {
        async fn start_action(&self) -> Result<ManagedProcess> {
            self.spawn(Role::ActionService, Some("http://127.0.0.1:5055/health".into()))
        }

        async fn start_dialogue(&self, artifact: &Artifact) -> Result<ManagedProcess> {
            let n = {
                let mut seen = self.dialogue_artifacts.lock().unwrap();
                seen.push(artifact.path.clone());
                seen.len()
            };
            if self.dialogue_spawn_limit.is_some_and(|limit| n > limit) {
                return Err(HelmsmanError::Spawn {
                    role: Role::DialogueService,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "rasa vanished"),
                });
            }
            let process = self.spawn(Role::DialogueService, Some(DIALOGUE_URL.into()))?;
            if n > 1 {
                if let Some(stall) = self.relaunch_stall {
                    sleep(stall).await;
                }
            }
            Ok(process)
        }

        async fn start_ui(&self) -> Result<ManagedProcess> {
            self.spawn(Role::UiService, None)
        }
    }

    /// Answers from a script; healthy once the script runs out.
    #[derive(Default)]
    struct ScriptedProber {
        script: Mutex<VecDeque<bool>>,
        probed: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn with(script: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                probed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn is_healthy(&self, url: &str, _timeout: Duration) -> bool {
            self.probed.lock().unwrap().push(url.to_string());
            self.script.lock().unwrap().pop_front().unwrap_or(true)
        }
    }

    struct NoBuild;

    #[async_trait]
    impl BuildStep for NoBuild {
        async fn build(&self) -> Result<()> {
            Err(HelmsmanError::BuildFailure("build disabled".into()))
        }
    }

    fn artifact() -> Artifact {
        Artifact {
            path: PathBuf::from("/srv/bot/models/production.tar.gz"),
            modified: Utc::now(),
        }
    }

    fn fast_policy() -> SupervisorPolicy {
        SupervisorPolicy {
            check_interval: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(50),
            failure_threshold: 3,
            grace_period: Duration::from_secs(2),
            restart_backoff: Duration::ZERO,
            max_restarts: None,
        }
    }

    fn supervisor(
        launcher: FakeLauncher,
        prober: Arc<ScriptedProber>,
        policy: SupervisorPolicy,
    ) -> Supervisor<FakeLauncher> {
        Supervisor::new(launcher, prober, policy)
    }

    fn pid_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    fn pids(sup: &Supervisor<FakeLauncher>) -> Vec<u32> {
        Role::START_ORDER
            .into_iter()
            .filter_map(|r| sup.process(r).and_then(|p| p.pid()))
            .collect()
    }

    #[tokio::test]
    async fn start_launches_in_dependency_order() {
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[]),
            fast_policy(),
        );
        sup.start(artifact()).await.unwrap();

        assert_eq!(sup.state(), SupervisorState::Running);
        assert_eq!(
            *sup.launcher().started.lock().unwrap(),
            vec![Role::ActionService, Role::DialogueService, Role::UiService]
        );
        for role in Role::START_ORDER {
            assert!(sup.is_running(role), "{role} should be running");
        }
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn failure_streak_triggers_exactly_one_restart() {
        let prober = ScriptedProber::with(&[false, false, true, false, false, false]);
        let mut sup = supervisor(FakeLauncher::default(), prober.clone(), fast_policy());
        sup.start(artifact()).await.unwrap();

        let mut ticks = Vec::new();
        for _ in 0..6 {
            ticks.push(sup.tick().await.unwrap());
        }

        assert_eq!(
            ticks,
            vec![
                Tick::Degraded { streak: 1 },
                Tick::Degraded { streak: 2 },
                Tick::Healthy,
                Tick::Degraded { streak: 1 },
                Tick::Degraded { streak: 2 },
                Tick::Restarted,
            ]
        );
        assert_eq!(sup.restarts(), 1);
        assert_eq!(sup.launcher().dialogue_starts(), 2);
        assert_eq!(sup.health().failures(), 0);
        assert_eq!(sup.state(), SupervisorState::Running);
        assert!(prober
            .probed
            .lock()
            .unwrap()
            .iter()
            .all(|u| u == DIALOGUE_URL));
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn degraded_state_between_failures() {
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[false]),
            fast_policy(),
        );
        sup.start(artifact()).await.unwrap();
        sup.tick().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Degraded);
        sup.tick().await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Running);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn restart_reuses_artifact_and_replaces_process() {
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[false, false, false]),
            fast_policy(),
        );
        sup.start(artifact()).await.unwrap();
        let old_pid = sup.process(Role::DialogueService).unwrap().pid().unwrap();

        for _ in 0..3 {
            sup.tick().await.unwrap();
        }

        let new_pid = sup.process(Role::DialogueService).unwrap().pid().unwrap();
        assert_ne!(old_pid, new_pid);
        assert!(!pid_alive(old_pid));
        let seen = sup.launcher().dialogue_artifacts.lock().unwrap().clone();
        assert_eq!(seen, vec![artifact().path, artifact().path]);
        assert_eq!(sup.artifact().unwrap().path, artifact().path);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn restart_spawn_failure_is_fatal() {
        let launcher = FakeLauncher {
            dialogue_spawn_limit: Some(1),
            ..FakeLauncher::default()
        };
        let policy = SupervisorPolicy {
            failure_threshold: 1,
            ..fast_policy()
        };
        let mut sup = supervisor(launcher, ScriptedProber::with(&[false]), policy);
        sup.start(artifact()).await.unwrap();

        let err = sup.tick().await.unwrap_err();
        assert!(matches!(err, HelmsmanError::RestartFailure(_)));
        assert!(sup.process(Role::DialogueService).is_none());
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn restart_limit_stops_supervision() {
        let policy = SupervisorPolicy {
            failure_threshold: 1,
            max_restarts: Some(1),
            ..fast_policy()
        };
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[false, false]),
            policy,
        );
        sup.start(artifact()).await.unwrap();

        assert_eq!(sup.tick().await.unwrap(), Tick::Restarted);
        let err = sup.tick().await.unwrap_err();
        assert!(matches!(err, HelmsmanError::RestartLimit(1)));
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_everything_in_reverse_order() {
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[]),
            fast_policy(),
        );
        sup.start(artifact()).await.unwrap();
        let pids = pids(&sup);
        assert_eq!(pids.len(), 3);

        let report = sup.shutdown().await;

        let order: Vec<Role> = report.iter().map(|(r, _)| *r).collect();
        assert_eq!(
            order,
            vec![Role::UiService, Role::DialogueService, Role::ActionService]
        );
        assert_eq!(sup.state(), SupervisorState::Stopped);
        for role in Role::START_ORDER {
            assert!(!sup.is_running(role));
        }
        for pid in pids {
            assert!(!pid_alive(pid), "pid {pid} still alive");
        }
    }

    #[tokio::test]
    async fn run_returns_after_interrupt_and_cleans_up() {
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[]),
            fast_policy(),
        );
        sup.start(artifact()).await.unwrap();
        let pids = pids(&sup);

        sup.run(sleep(Duration::from_millis(150))).await.unwrap();

        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert_eq!(sup.restarts(), 0);
        for pid in pids {
            assert!(!pid_alive(pid));
        }
    }

    #[tokio::test]
    async fn run_shuts_down_on_fatal_restart_error() {
        let launcher = FakeLauncher {
            dialogue_spawn_limit: Some(1),
            ..FakeLauncher::default()
        };
        let policy = SupervisorPolicy {
            failure_threshold: 2,
            ..fast_policy()
        };
        let mut sup = supervisor(launcher, ScriptedProber::with(&[false, false]), policy);
        sup.start(artifact()).await.unwrap();
        let pids = pids(&sup);

        let err = sup
            .run(sleep(Duration::from_secs(30)))
            .await
            .unwrap_err();

        assert!(matches!(err, HelmsmanError::RestartFailure(_)));
        assert_eq!(sup.state(), SupervisorState::Stopped);
        for pid in pids {
            assert!(!pid_alive(pid));
        }
    }

    #[tokio::test]
    async fn interrupt_during_slow_relaunch_shuts_down_promptly() {
        let launcher = FakeLauncher {
            relaunch_stall: Some(Duration::from_secs(6)),
            ..FakeLauncher::default()
        };
        let policy = SupervisorPolicy {
            failure_threshold: 1,
            ..fast_policy()
        };
        let mut sup = supervisor(launcher, ScriptedProber::with(&[false; 8]), policy);
        sup.start(artifact()).await.unwrap();
        let pids = pids(&sup);

        let started = tokio::time::Instant::now();
        sup.run(sleep(Duration::from_millis(100))).await.unwrap();

        assert!(
            started.elapsed() < Duration::from_secs(3),
            "shutdown took {:?}",
            started.elapsed()
        );
        assert_eq!(sup.launcher().dialogue_starts(), 2);
        assert_eq!(sup.state(), SupervisorState::Stopped);
        for role in Role::START_ORDER {
            assert!(sup.process(role).is_none());
        }
        for pid in pids {
            assert!(!pid_alive(pid));
        }
    }

    fn resolver_in(dir: &Path) -> ArtifactResolver<NoBuild> {
        ArtifactResolver::new(dir, ".tar.gz", "production.tar.gz", NoBuild)
    }

    #[tokio::test]
    async fn orchestrate_aborts_on_build_failure_without_launching() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[]),
            fast_policy(),
        );

        let err = orchestrate(&resolver_in(dir.path()), &mut sup, std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, HelmsmanError::BuildFailure(_)));
        assert!(sup.launcher().started.lock().unwrap().is_empty());
        assert!(!dir.path().join("production.tar.gz").exists());
    }

    #[tokio::test]
    async fn orchestrate_runs_on_resolved_artifact_until_interrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("20240301-120000.tar.gz"), b"model").unwrap();
        let mut sup = supervisor(
            FakeLauncher::default(),
            ScriptedProber::with(&[]),
            fast_policy(),
        );

        orchestrate(
            &resolver_in(dir.path()),
            &mut sup,
            sleep(Duration::from_millis(150)),
        )
        .await
        .unwrap();

        let seen = sup.launcher().dialogue_artifacts.lock().unwrap().clone();
        assert_eq!(seen, vec![dir.path().join("production.tar.gz")]);
        assert_eq!(sup.state(), SupervisorState::Stopped);
    }
}
