//! # LOALシーカー
//!
//! ホストが毎ティック呼び出す入口をまとめたモジュールです。
//!
//! - [`LoalSeeker::initialize`]: シーカー初期化（発射時）。後方半球発射の処理を含む
//! - [`LoalSeeker::seek`]: 毎ティックの捜索・追尾処理
//! - [`LoalSeeker::on_decoy_deployed`]: 追尾中ターゲットのフレア放出通知
//! - [`LoalSeeker::terminal_check`]: 自爆判定の可否
//! - [`LoalSeeker::on_destroyed`]: 誘導弾の破壊通知
//!
//! どの入口もエラーを返さず、失敗はすべて「このティックはLOALの効果なし」に縮退します。

use tracing::{debug, info, warn};

use crate::config::LoalConfig;
use crate::loal::flare_events::IFlareEvents;
use crate::loal::flare_memory::{EvasionRecord, FlareEvasionMemory, ThresholdPolicy};
use crate::loal::registry::{LoalState, SearchRegistry};
use crate::loal::scan::{ScanCandidate, ScanEngine};
use crate::loal::steering;
use crate::loal::terminal_guard::{AllowReason, LoalPhase, SearchWindow, TerminalDecision, TerminalGuard};
use crate::models::common::math_utils;
use crate::models::traits::{IGuidedProjectile, ILineOfSight, ITarget, ITargetRegistry};

/// 発射時のロック状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaunchMode {
    /// 指定目標なしで発射
    NoDesignation,
    /// 指定目標がコーン内にあり、発射時のロックを維持
    LockedAtLaunch,
    /// 指定目標がコーン外のため、ロックなしで発射
    RearHemisphere { off_boresight_deg: f64 },
}

/// LOAL状態を解放した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Destroyed,
    Disabled,
    WindowExpired,
    Reinitialized,
    Terminal(AllowReason),
}

/// 1回のシーク処理の結果
#[derive(Debug, Clone, PartialEq)]
pub enum SeekOutcome {
    /// LOAL管理外
    Unmanaged,
    /// 誘導弾が無効化されたため状態を解放した
    Released,
    /// ロック保持中（ピーク方式なら更新後のピーク値）
    Tracking { peak: Option<f64> },
    /// ロックなしだが捜索中でもない
    Dormant,
    /// 誘導系が停止している
    GuidanceInactive,
    /// 捜索ウィンドウが満了し状態を解放した
    Expired,
    /// 走査間隔に達していない
    Throttled { steered: bool },
    /// 走査したが候補なし
    NoCandidate { steered: bool },
    /// 新たな目標を捕捉した
    Acquired(ScanCandidate),
}

/// 全誘導弾のLOAL処理を受け持つシーカー
#[derive(Debug)]
pub struct LoalSeeker {
    config: LoalConfig,
    registry: SearchRegistry,
    memory: FlareEvasionMemory,
}

impl LoalSeeker {
    pub fn new(config: LoalConfig) -> Self {
        let memory = FlareEvasionMemory::new(ThresholdPolicy::from_config(&config));
        Self {
            config,
            registry: SearchRegistry::new(),
            memory,
        }
    }

    pub fn config(&self) -> &LoalConfig {
        &self.config
    }

    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    /// 誘導弾の現在のLOAL段階
    pub fn phase(&self, projectile: &dyn IGuidedProjectile, now: f64) -> LoalPhase {
        SearchWindow::new(&self.config).phase(self.registry.lookup(&projectile.get_id()), projectile, now)
    }

    /// シーカー初期化
    ///
    /// 捜索ウィンドウを開いたLOAL状態を作成し、指定目標を記録します。
    /// 指定目標がカットオフ角より外にある場合はロックを外して発射させ、
    /// 指定目標は中間誘導のためだけに保持します。
    /// コーン内でロックを維持して発射した場合も、捜索ウィンドウは開いたままになります。
    pub fn initialize(
        &mut self,
        projectile: &mut dyn IGuidedProjectile,
        designated: Option<&dyn ITarget>,
        flare_events: &mut dyn IFlareEvents,
        now: f64,
    ) -> LaunchMode {
        let projectile_id = projectile.get_id();
        self.release(&projectile_id, flare_events, ReleaseReason::Reinitialized);

        let state = self.registry.register(&projectile_id, now);
        let mut mode = LaunchMode::NoDesignation;

        if let Some(target) = designated {
            let target_id = target.get_id();
            state.designate(&target_id);

            let off_boresight_deg = math_utils::off_boresight_deg(
                &projectile.get_position(),
                &projectile.get_forward(),
                &target.get_position(),
            );

            if off_boresight_deg > self.config.off_boresight_cutoff_deg {
                projectile.seeker_mut().clear_lock();
                projectile.set_target(None);
                mode = LaunchMode::RearHemisphere { off_boresight_deg };

                info!(
                    missile_id = %projectile_id,
                    target_id = %target_id,
                    off_boresight_deg = off_boresight_deg,
                    cutoff_deg = self.config.off_boresight_cutoff_deg,
                    "LOAL_REAR_LAUNCH: 指定目標がコーン外のためロックなしで発射しました"
                );
            } else {
                mode = LaunchMode::LockedAtLaunch;
            }
        }

        let launch_lock = projectile
            .seeker()
            .ir_source
            .as_ref()
            .filter(|source| !source.is_decoy)
            .map(|source| source.owner_id.clone());

        match launch_lock {
            // ウィンドウは開いたまま。ロック喪失時はその残り時間で捜索を再開する
            Some(owner_id) => rebind_subscription(state, flare_events, &owner_id),
            None if mode == LaunchMode::LockedAtLaunch => {
                // 指定目標はコーン内だがホスト側でロックが成立していない
                mode = LaunchMode::NoDesignation;
            }
            None => {}
        }

        info!(
            missile_id = %projectile_id,
            launch_mode = ?mode,
            designated_target = ?state.designated_target(),
            searching = state.is_searching(),
            "LOAL_INITIALIZED: シーカーを初期化しました"
        );

        mode
    }

    /// 毎ティックのシーク処理
    pub fn seek(
        &mut self,
        projectile: &mut dyn IGuidedProjectile,
        targets: &dyn ITargetRegistry,
        los: &dyn ILineOfSight,
        flare_events: &mut dyn IFlareEvents,
        now: f64,
    ) -> SeekOutcome {
        let projectile_id = projectile.get_id();
        if !self.registry.contains(&projectile_id) {
            return SeekOutcome::Unmanaged;
        }
        if projectile.is_disabled() {
            self.release(&projectile_id, flare_events, ReleaseReason::Disabled);
            return SeekOutcome::Released;
        }

        let window_expired = {
            let Some(state) = self.registry.lookup_mut(&projectile_id) else {
                return SeekOutcome::Unmanaged;
            };
            drop_stale_subscription(state, projectile, flare_events);

            if projectile.seeker().has_lock() {
                let peak = self.sample_locked_peak(&projectile_id, projectile, targets);
                return SeekOutcome::Tracking { peak };
            }
            if !state.is_searching() {
                return SeekOutcome::Dormant;
            }
            SearchWindow::new(&self.config).is_expired(state, now)
        };

        if window_expired {
            self.release(&projectile_id, flare_events, ReleaseReason::WindowExpired);
            return SeekOutcome::Expired;
        }

        let Some(state) = self.registry.lookup_mut(&projectile_id) else {
            return SeekOutcome::Unmanaged;
        };

        if self.config.sample_designated_peak {
            if let Some(designated) = state.designated_target().and_then(|id| targets.find_target(id)) {
                if !designated.is_disabled() {
                    let ir = designated.ir_signature();
                    self.memory.sample_peak(state, &designated.get_id(), ir);
                }
            }
        }

        if !projectile.is_guidance_active() {
            return SeekOutcome::GuidanceInactive;
        }

        let engine = ScanEngine::new(&self.config);
        if !engine.is_due(state, now) {
            let steered = steering::steer_toward_designated(&self.config, state, projectile, targets).is_some();
            return SeekOutcome::Throttled { steered };
        }

        state.record_scan(now);
        match engine.find_best(projectile, targets, state, los) {
            Some(candidate) => {
                ScanEngine::commit_lock(projectile, &candidate);
                rebind_subscription(state, flare_events, &candidate.target_id);
                let cleared = FlareEvasionMemory::clear_evasion(state, &candidate.target_id);
                let elapsed = state.search_elapsed(now).unwrap_or(0.0);
                state.close_search_window();

                info!(
                    missile_id = %projectile_id,
                    target_id = %candidate.target_id,
                    angle_deg = candidate.angle_deg,
                    distance = candidate.distance,
                    score = candidate.score,
                    ir_signature = candidate.ir_signature,
                    cleared_threshold = ?cleared,
                    search_elapsed = elapsed,
                    "LOAL_ACQUIRED: 発射後ロックで目標を捕捉しました"
                );

                SeekOutcome::Acquired(candidate)
            }
            None => {
                let steered = steering::steer_toward_designated(&self.config, state, projectile, targets).is_some();
                SeekOutcome::NoCandidate { steered }
            }
        }
    }

    /// 追尾中ターゲットのフレア放出通知
    ///
    /// `decoy_routine` はホスト側のデコイ処理で、シーカーのIR放射源をフレアへ移すかどうかを決めます。
    /// 処理前後でIR放射源が変わった場合にのみ回避成立とみなし、再ロック閾値を記録します。
    pub fn on_decoy_deployed<P, F>(
        &mut self,
        projectile: &mut P,
        evader: &dyn ITarget,
        flare_events: &mut dyn IFlareEvents,
        now: f64,
        decoy_routine: F,
    ) -> Option<EvasionRecord>
    where
        P: IGuidedProjectile + ?Sized,
        F: FnOnce(&mut P),
    {
        let pre_source = projectile.seeker().ir_source.clone();
        let pre_target = projectile.seeker().target_id.clone();

        decoy_routine(&mut *projectile);

        let projectile_id = projectile.get_id();
        let state = self.registry.lookup_mut(&projectile_id)?;
        let pre_source = pre_source?;

        let evader_id = evader.get_id();
        let tracked_owner = pre_target.unwrap_or_else(|| pre_source.owner_id.clone());
        if tracked_owner != evader_id {
            return None;
        }
        if projectile.seeker().ir_source.as_ref() == Some(&pre_source) {
            debug!(
                missile_id = %projectile_id,
                target_id = %evader_id,
                "LOAL_DECOY_FAILED: フレアはロックを奪えませんでした"
            );
            return None;
        }

        let current_ir = evader.ir_signature();
        let record = self.memory.record_evasion(state, &evader_id, current_ir, now);

        // デコイへ移った時点で元の目標の追尾は失われる
        if state
            .flare_subscription
            .as_ref()
            .is_some_and(|sub| sub.target_id == evader_id)
        {
            if let Some(subscription) = state.flare_subscription.take() {
                flare_events.unsubscribe(&subscription);
            }
        }

        info!(
            missile_id = %projectile_id,
            target_id = %evader_id,
            policy = ?self.memory.policy(),
            current_ir = current_ir,
            sampled_threshold = record.sampled_threshold,
            stored_threshold = record.stored_threshold,
            from_peak = record.from_peak,
            reopened_search = record.reopened_search,
            "LOAL_EVASION_RECORDED: フレア回避を記録し再ロック閾値を設定しました"
        );

        Some(record)
    }

    /// 自爆判定を許可するか
    ///
    /// 捜索ウィンドウ満了や飛行包絡の破綻で許可した場合は、同時にLOAL状態を解放します。
    /// 解放は一度だけ行われ、以降の呼び出しは管理外として許可を返します。
    pub fn terminal_check(
        &mut self,
        projectile: &dyn IGuidedProjectile,
        flare_events: &mut dyn IFlareEvents,
        now: f64,
    ) -> TerminalDecision {
        let projectile_id = projectile.get_id();
        let decision =
            TerminalGuard::new(&self.config).evaluate(self.registry.lookup(&projectile_id), projectile, now);

        if let TerminalDecision::Allow(reason) = decision {
            if reason.releases_state() {
                self.release(&projectile_id, flare_events, ReleaseReason::Terminal(reason));
            }
        }

        decision
    }

    /// 誘導弾の破壊・無効化通知
    pub fn on_destroyed(&mut self, projectile_id: &str, flare_events: &mut dyn IFlareEvents) -> bool {
        self.release(projectile_id, flare_events, ReleaseReason::Destroyed)
    }

    fn sample_locked_peak(
        &mut self,
        projectile_id: &str,
        projectile: &dyn IGuidedProjectile,
        targets: &dyn ITargetRegistry,
    ) -> Option<f64> {
        let seeker = projectile.seeker();
        let source = seeker.ir_source.as_ref().filter(|source| !source.is_decoy)?;
        if seeker.target_id.as_deref() != Some(source.owner_id.as_str()) {
            return None;
        }
        let target = targets.find_target(&source.owner_id)?;
        if target.is_disabled() {
            return None;
        }

        let state = self.registry.lookup_mut(projectile_id)?;
        self.memory.sample_peak(state, &source.owner_id, target.ir_signature())
    }

    fn release(&mut self, projectile_id: &str, flare_events: &mut dyn IFlareEvents, reason: ReleaseReason) -> bool {
        let Some(state) = self.registry.destroy(projectile_id) else {
            return false;
        };
        if let Some(subscription) = &state.flare_subscription {
            flare_events.unsubscribe(subscription);
        }

        if reason != ReleaseReason::Reinitialized {
            info!(
                missile_id = %projectile_id,
                reason = ?reason,
                evaded_targets = state.evaded_count(),
                "LOAL_RELEASED: LOAL状態を解放しました"
            );
        }
        true
    }
}

/// ロック中の目標と異なる購読を解除する（追尾喪失）
fn drop_stale_subscription(
    state: &mut LoalState,
    projectile: &dyn IGuidedProjectile,
    flare_events: &mut dyn IFlareEvents,
) {
    let tracked_owner = projectile
        .seeker()
        .ir_source
        .as_ref()
        .map(|source| source.owner_id.as_str());
    let stale = state
        .flare_subscription
        .as_ref()
        .is_some_and(|sub| Some(sub.target_id.as_str()) != tracked_owner);

    if stale {
        if let Some(subscription) = state.flare_subscription.take() {
            flare_events.unsubscribe(&subscription);
            debug!(
                missile_id = %state.projectile_id,
                target_id = %subscription.target_id,
                "LOAL_TRACK_LOST: フレアイベント購読を解除しました"
            );
        }
    }
}

/// 新しい目標へ購読を張り替える
///
/// 購読に失敗しても追尾は継続し、その捕捉についてのみフレア回避記憶が更新されなくなります。
fn rebind_subscription(state: &mut LoalState, flare_events: &mut dyn IFlareEvents, target_id: &str) {
    if let Some(existing) = state.flare_subscription.take() {
        if existing.target_id == target_id {
            state.flare_subscription = Some(existing);
            return;
        }
        flare_events.unsubscribe(&existing);
    }

    match flare_events.subscribe(target_id, &state.projectile_id) {
        Ok(subscription) => state.flare_subscription = Some(subscription),
        Err(error) => {
            warn!(
                missile_id = %state.projectile_id,
                target_id = %target_id,
                error = %error,
                "LOAL_SUBSCRIBE_FAILED: フレアイベントを購読できませんでした（追尾は継続）"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loal::flare_events::FlareEventBus;
    use crate::loal::testing::{BlockedSky, FakeProjectile, FakeTarget, FakeTargets, at_angle};
    use crate::models::traits::{ClearSky, IrSourceRef};

    fn bus_for(targets: &FakeTargets) -> FlareEventBus {
        let mut bus = FlareEventBus::new();
        for target in &targets.targets {
            bus.register_target(&target.id);
        }
        bus
    }

    /// フレアがロックを奪うデコイ処理
    fn flare_wins(projectile: &mut FakeProjectile) {
        let owner = projectile.seeker.target_id.clone().unwrap_or_default();
        projectile.seeker.ir_source = Some(IrSourceRef::decoy(format!("{}_FLR1", owner), &owner));
    }

    /// デコイの燃え尽きでロックが外れる
    fn flare_burns_out(projectile: &mut FakeProjectile) {
        projectile.seeker.clear_lock();
    }

    #[test]
    fn test_scenario_a_end_to_end() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(45.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");

        assert_eq!(seeker.initialize(&mut projectile, None, &mut bus, 0.0), LaunchMode::NoDesignation);
        assert!(seeker.registry().is_searching("M1"));

        let outcome = seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.1);
        let SeekOutcome::Acquired(candidate) = outcome else {
            panic!("expected acquisition, got {:?}", outcome);
        };
        assert!((candidate.score - 47.0).abs() < 1e-6);
        assert_eq!(projectile.seeker.target_id.as_deref(), Some("T1"));
        assert!(!projectile.seeker.lock_confirmed);
        assert_eq!(projectile.assigned_targets, vec![Some("T1".to_string())]);

        // 捜索中集合から外れるが状態は残る
        assert!(!seeker.registry().is_searching("M1"));
        assert!(seeker.registry().contains("M1"));
        assert_eq!(bus.subscribers("T1"), vec!["M1".to_string()]);
        assert_eq!(seeker.phase(&projectile, 0.1), LoalPhase::Locked);
    }

    #[test]
    fn test_scan_is_throttled() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(120.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0),
            SeekOutcome::NoCandidate { steered: false }
        );
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.1),
            SeekOutcome::Throttled { steered: false }
        );
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.25),
            SeekOutcome::NoCandidate { steered: false }
        );
        assert_eq!(seeker.registry().lookup("M1").unwrap().last_scan_time(), Some(0.25));
    }

    #[test]
    fn test_scenario_b_reacquire_after_signature_rises() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let mut targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(45.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);
        seeker
            .registry
            .lookup_mut("M1")
            .unwrap()
            .evaded_targets
            .insert("T1".to_string(), 60.0);

        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0),
            SeekOutcome::NoCandidate { steered: false }
        );

        targets.get_mut("T1").ir = 61.0;
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.1),
            SeekOutcome::Throttled { steered: false }
        );
        let outcome = seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.25);
        assert!(matches!(outcome, SeekOutcome::Acquired(ref c) if c.target_id == "T1" && c.ir_signature > 60.0));
        assert_eq!(seeker.registry().lookup("M1").unwrap().evaded_count(), 0);
    }

    #[test]
    fn test_scenario_d_expiry_transitions_once() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::default();
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        assert_eq!(seeker.terminal_check(&projectile, &mut bus, 4.0), TerminalDecision::Suppress);
        assert_eq!(
            seeker.terminal_check(&projectile, &mut bus, 8.1),
            TerminalDecision::Allow(AllowReason::WindowExpired)
        );
        assert!(!seeker.registry().contains("M1"));
        assert_eq!(
            seeker.terminal_check(&projectile, &mut bus, 8.2),
            TerminalDecision::Allow(AllowReason::Unmanaged)
        );
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 8.2),
            SeekOutcome::Unmanaged
        );
    }

    #[test]
    fn test_no_acquisition_after_window() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(10.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 8.05),
            SeekOutcome::Expired
        );
        assert!(projectile.seeker.target_id.is_none());
        assert!(seeker.registry().is_empty());
    }

    #[test]
    fn test_hard_stop_releases_state() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::default();
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        projectile.propulsion_on = false;
        assert_eq!(
            seeker.terminal_check(&projectile, &mut bus, 1.0),
            TerminalDecision::Allow(AllowReason::PropulsionOff)
        );
        assert!(seeker.registry().is_empty());
    }

    #[test]
    fn test_scenario_e_rear_hemisphere_launch_steers() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(120.0, 3000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");

        let mode = seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);
        let LaunchMode::RearHemisphere { off_boresight_deg } = mode else {
            panic!("expected rear hemisphere launch, got {:?}", mode);
        };
        assert!((off_boresight_deg - 120.0).abs() < 1e-6);
        assert!(projectile.seeker.ir_source.is_none());
        assert!(projectile.seeker.target_id.is_none());
        assert!(!projectile.seeker.lock_confirmed);
        assert_eq!(projectile.assigned_targets, vec![None]);
        assert_eq!(
            seeker.registry().lookup("M1").unwrap().designated_target(),
            Some("T1")
        );
        assert_eq!(bus.subscription_count(), 0);

        for tick in 0..6 {
            let now = tick as f64 * 0.05;
            let outcome = seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, now);
            assert!(matches!(
                outcome,
                SeekOutcome::Throttled { steered: true } | SeekOutcome::NoCandidate { steered: true }
            ));
        }
        assert_eq!(projectile.aimpoints.len(), 6);
        assert!(projectile.aimpoints.iter().all(|(p, _)| *p == targets.targets[0].position));
        assert!(projectile.seeker.target_id.is_none());
    }

    #[test]
    fn test_launch_lock_within_cone() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(30.0, 3000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");

        assert_eq!(
            seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0),
            LaunchMode::LockedAtLaunch
        );
        assert_eq!(projectile.seeker.target_id.as_deref(), Some("T1"));
        assert!(seeker.registry().is_searching("M1"));
        assert_eq!(seeker.phase(&projectile, 0.0), LoalPhase::Locked);
        assert_eq!(bus.subscribers("T1"), vec!["M1".to_string()]);
        assert_eq!(
            seeker.terminal_check(&projectile, &mut bus, 0.5),
            TerminalDecision::Allow(AllowReason::NotSearching)
        );
        assert!(seeker.registry().contains("M1"));
    }

    #[test]
    fn test_launch_lock_lost_resumes_search() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let mut targets = FakeTargets::new(vec![
            FakeTarget::new("T1", "red", at_angle(30.0, 3000.0), 50.0),
            FakeTarget::new("T2", "red", at_angle(-20.0, 3000.0), 50.0),
        ]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");
        seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);

        assert!(matches!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.5),
            SeekOutcome::Tracking { .. }
        ));

        // T1が撃墜されロックを失う
        targets.get_mut("T1").disabled = true;
        projectile.seeker.clear_lock();
        assert_eq!(
            seeker.terminal_check(&projectile, &mut bus, 1.0),
            TerminalDecision::Suppress
        );

        let outcome = seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 1.0);
        assert!(matches!(outcome, SeekOutcome::Acquired(ref c) if c.target_id == "T2"));
        assert_eq!(projectile.seeker.target_id.as_deref(), Some("T2"));
        assert!(!seeker.registry().is_searching("M1"));
        assert_eq!(bus.subscribers("T1"), Vec::<String>::new());
        assert_eq!(bus.subscribers("T2"), vec!["M1".to_string()]);
    }

    #[test]
    fn test_launch_lock_lost_after_window_expires() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(30.0, 3000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");
        seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);

        projectile.seeker.clear_lock();
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 9.0),
            SeekOutcome::Expired
        );
        assert!(seeker.registry().is_empty());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_peak_policy_records_max_and_resumes_search() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let mut targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(20.0, 3000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");
        seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);

        for (tick, ir) in [50.0, 80.0, 70.0, 35.0].into_iter().enumerate() {
            targets.get_mut("T1").ir = ir;
            let outcome = seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, tick as f64 * 0.1);
            assert!(matches!(outcome, SeekOutcome::Tracking { peak: Some(_) }));
        }

        let evader = targets.targets[0].clone();
        let record = seeker
            .on_decoy_deployed(&mut projectile, &evader, &mut bus, 1.0, flare_wins)
            .unwrap();
        assert_eq!(record.stored_threshold, 80.0);
        assert!(record.from_peak);
        // 発射時のウィンドウがまだ開いているので開き直しはしない
        assert!(!record.reopened_search);
        assert!(seeker.registry().is_searching("M1"));
        assert_eq!(seeker.registry().lookup("M1").unwrap().search_start_time(), Some(0.0));
        assert_eq!(bus.subscription_count(), 0);

        // フレアを追っている間は捜索しない
        assert!(matches!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 1.1),
            SeekOutcome::Tracking { peak: None }
        ));

        // フレアが燃え尽きたら捜索再開。現在値35ではピーク80を超えない
        flare_burns_out(&mut projectile);
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 1.5),
            SeekOutcome::NoCandidate { steered: true }
        );
        targets.get_mut("T1").ir = 75.0;
        assert!(matches!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 1.75),
            SeekOutcome::NoCandidate { .. }
        ));
        targets.get_mut("T1").ir = 81.0;
        assert!(matches!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 2.0),
            SeekOutcome::Acquired(ref c) if c.target_id == "T1"
        ));
    }

    #[test]
    fn test_instant_policy_uses_evasion_moment() {
        let config = LoalConfig { use_peak_threshold: false, ..LoalConfig::default() };
        let mut seeker = LoalSeeker::new(config);
        let mut targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(20.0, 3000.0), 90.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");
        seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);

        assert!(matches!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0),
            SeekOutcome::Tracking { peak: None }
        ));
        targets.get_mut("T1").ir = 40.0;
        let evader = targets.targets[0].clone();
        let record = seeker
            .on_decoy_deployed(&mut projectile, &evader, &mut bus, 0.5, flare_wins)
            .unwrap();
        assert_eq!(record.stored_threshold, 40.0);
        assert!(!record.from_peak);
    }

    #[test]
    fn test_failed_decoy_records_nothing() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(20.0, 3000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");
        seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);

        let record = seeker.on_decoy_deployed(&mut projectile, &targets.targets[0], &mut bus, 0.5, |_| {});
        assert!(record.is_none());
        assert_eq!(seeker.registry().lookup("M1").unwrap().evaded_count(), 0);
        assert_eq!(bus.subscribers("T1"), vec!["M1".to_string()]);
    }

    #[test]
    fn test_decoy_from_untracked_target_ignored() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![
            FakeTarget::new("T1", "red", at_angle(20.0, 3000.0), 50.0),
            FakeTarget::new("T2", "red", at_angle(-20.0, 3000.0), 50.0),
        ]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue").locked_on("T1");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        let record = seeker.on_decoy_deployed(&mut projectile, &targets.targets[1], &mut bus, 0.5, flare_wins);
        assert!(record.is_none());
    }

    #[test]
    fn test_unregistered_projectile_decoy_runs_routine_only() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(20.0, 3000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M9", "blue").locked_on("T1");

        let record = seeker.on_decoy_deployed(&mut projectile, &targets.targets[0], &mut bus, 0.5, flare_wins);
        assert!(record.is_none());
        assert!(projectile.seeker.ir_source.as_ref().is_some_and(|s| s.is_decoy));
        assert!(seeker.registry().is_empty());
    }

    #[test]
    fn test_subscription_released_on_destroy() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(45.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);
        seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0);
        assert_eq!(bus.subscription_count(), 1);

        assert!(seeker.on_destroyed("M1", &mut bus));
        assert_eq!(bus.subscription_count(), 0);
        assert!(!seeker.on_destroyed("M1", &mut bus));
    }

    #[test]
    fn test_subscription_dropped_on_track_loss() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(45.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);
        seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0);
        assert_eq!(bus.subscription_count(), 1);

        projectile.seeker.clear_lock();
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.5),
            SeekOutcome::Dormant
        );
        assert_eq!(bus.subscription_count(), 0);
        assert!(seeker.registry().lookup("M1").unwrap().flare_subscription.is_none());
    }

    #[test]
    fn test_subscription_failure_keeps_lock() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(45.0, 2000.0), 50.0)]);
        // T1を登録していないバスでは購読に失敗する
        let mut bus = FlareEventBus::new();
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        let outcome = seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0);
        assert!(matches!(outcome, SeekOutcome::Acquired(_)));
        assert_eq!(projectile.seeker.target_id.as_deref(), Some("T1"));
        assert!(seeker.registry().lookup("M1").unwrap().flare_subscription.is_none());
    }

    #[test]
    fn test_disabled_projectile_releases_state() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::default();
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        projectile.disabled = true;
        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.1),
            SeekOutcome::Released
        );
        assert!(seeker.registry().is_empty());
    }

    #[test]
    fn test_guidance_inactive_does_not_scan() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(10.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        projectile.guidance_active = false;
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        assert_eq!(
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0),
            SeekOutcome::GuidanceInactive
        );
        assert!(seeker.registry().lookup("M1").unwrap().last_scan_time().is_none());
    }

    #[test]
    fn test_obstructed_target_not_acquired() {
        let mut seeker = LoalSeeker::new(LoalConfig::default());
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(10.0, 2000.0), 50.0)]);
        let mut bus = bus_for(&targets);
        let mut projectile = FakeProjectile::new("M1", "blue");
        seeker.initialize(&mut projectile, None, &mut bus, 0.0);

        assert_eq!(
            seeker.seek(&mut projectile, &targets, &BlockedSky, &mut bus, 0.0),
            SeekOutcome::NoCandidate { steered: false }
        );
    }

    #[test]
    fn test_designated_peak_sampling_is_opt_in() {
        let targets = FakeTargets::new(vec![FakeTarget::new("T1", "red", at_angle(150.0, 3000.0), 64.0)]);

        for (enabled, expected) in [(false, None), (true, Some(64.0))] {
            let config = LoalConfig { sample_designated_peak: enabled, ..LoalConfig::default() };
            let mut seeker = LoalSeeker::new(config);
            let mut bus = bus_for(&targets);
            let mut projectile = FakeProjectile::new("M1", "blue");
            seeker.initialize(&mut projectile, targets.find_target("T1"), &mut bus, 0.0);
            seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0);

            let state = seeker.registry().lookup("M1").unwrap();
            assert_eq!(state.peak_ir("T1"), expected);
        }
    }

    #[test]
    fn test_cone_and_faction_invariants_over_sweep() {
        let config = LoalConfig { search_angle_deg: 60.0, ..LoalConfig::default() };
        for step in 0..36 {
            let angle = step as f64 * 10.0 - 180.0;
            let mut seeker = LoalSeeker::new(config.clone());
            let targets = FakeTargets::new(vec![
                FakeTarget::new("F1", "blue", at_angle(angle, 1500.0), 90.0),
                FakeTarget::new("H1", "red", at_angle(angle + 5.0, 2500.0), 40.0),
            ]);
            let mut bus = bus_for(&targets);
            let mut projectile = FakeProjectile::new("M1", "blue");
            seeker.initialize(&mut projectile, None, &mut bus, 0.0);

            if let SeekOutcome::Acquired(candidate) =
                seeker.seek(&mut projectile, &targets, &ClearSky, &mut bus, 0.0)
            {
                assert!(candidate.angle_deg <= config.search_angle_deg);
                assert_eq!(candidate.target_id, "H1");
            }
        }
    }
}
