//! # Simulation モジュール
//!
//! LOALコアを駆動するデモ用のシミュレーションエンジンを提供します。
//!
//! 固定時間刻み（Δt）でターゲット機とIRミサイルを進め、
//! ホスト側の各フックからLOALシーカーを呼び出します。
//!
//! ## シミュレーション処理順序
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **ターゲット処理**: 移動、スロットル変更、フレア燃焼
//! 2. **発射処理**: 発射時刻に達したミサイルのシーカー初期化
//! 3. **フレア処理**: 予定されたフレア放出と、追尾中ミサイルへのデコイ判定
//! 4. **ミサイル処理**: 追尾喪失判定、シーク、運動更新、命中判定、自爆判定
//! 5. **後片付け**: 撃破されたターゲットとミサイルのLOAL状態・購読の解放
//!
//! ## 使用例
//!
//! ```no_run
//! use loalsim::config::ScenarioConfig;
//! use loalsim::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/rear_launch.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! engine.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{ConfigError, FlareConfig, ScenarioConfig};
use crate::loal::{FlareEventBus, LaunchMode, LoalSeeker, SeekOutcome, TerminalDecision};
use crate::models::*;
use tracing::{debug, info, trace};

/// 発射待ちのミサイル
#[derive(Debug, Clone)]
pub struct PendingLaunch {
    pub missile: IrMissile,
    pub launch_time: f64,
    pub designated_target: Option<String>,
}

/// 実行統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStats {
    pub missiles_launched: u32,
    pub rear_launches: u32,
    pub acquisitions: u32,
    pub evasions: u32,
    pub windows_expired: u32,
    pub suppressed_terminal: u32,
    pub hits: u32,
    pub self_destructs: u32,
    pub out_of_range: u32,
    pub stalled: u32,
    pub targets_destroyed: u32,
}

impl SimulationStats {
    fn record_seek(&mut self, outcome: &SeekOutcome) {
        match outcome {
            SeekOutcome::Acquired(_) => self.acquisitions += 1,
            SeekOutcome::Expired => self.windows_expired += 1,
            _ => {}
        }
    }

    fn record_end(&mut self, reason: Option<MissileEndReason>) {
        match reason {
            Some(MissileEndReason::Hit) => self.hits += 1,
            Some(MissileEndReason::SelfDestruct) => self.self_destructs += 1,
            Some(MissileEndReason::OutOfRange) => self.out_of_range += 1,
            Some(MissileEndReason::Stalled) => self.stalled += 1,
            None => {}
        }
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,

    pub targets: TargetFleet,
    pub missiles: Vec<IrMissile>,
    pub pending_launches: Vec<PendingLaunch>,
    pub flare_schedule: Vec<FlareConfig>,
    pub terrain: Terrain,

    pub seeker: LoalSeeker,
    pub flare_bus: FlareEventBus,
    pub stats: SimulationStats,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        Self {
            current_time: 0.0,
            dt: scenario.sim.dt_s,
            max_time: scenario.sim.t_max_s,
            step_count: 0,
            targets: TargetFleet::default(),
            missiles: Vec::new(),
            pending_launches: Vec::new(),
            flare_schedule: Vec::new(),
            terrain: Terrain::default(),
            seeker: LoalSeeker::new(scenario.loal.clone()),
            flare_bus: FlareEventBus::new(),
            stats: SimulationStats::default(),
            scenario_config: scenario,
            verbose_level,
        }
    }

    pub fn initialize(&mut self) -> Result<(), ConfigError> {
        self.scenario_config.validate()?;

        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        self.terrain = Terrain::from_config(&self.scenario_config.terrain);

        self.targets = TargetFleet::new(
            self.scenario_config
                .targets
                .iter()
                .map(TargetAircraft::from_config)
                .collect(),
        );
        for aircraft in &self.targets.aircraft {
            self.flare_bus.register_target(&aircraft.id);
        }

        self.pending_launches = self
            .scenario_config
            .missiles
            .iter()
            .map(|config| PendingLaunch {
                missile: IrMissile::from_config(config),
                launch_time: config.launch_time_s,
                designated_target: config.designated_target.clone(),
            })
            .collect();

        self.flare_schedule = self.scenario_config.flares.clone();
        self.flare_schedule.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  ターゲット: {}機", self.targets.aircraft.len());
            info!("  ミサイル: {}発", self.pending_launches.len());
            info!("  フレア: {}発", self.flare_schedule.len());
            info!("  山: {}座", self.terrain.ridges.len());
        }

        Ok(())
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("=== シミュレーション実行開始 ===");

        while self.current_time < self.max_time && !self.is_finished() {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.2}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!("進行状況: {:.1}% ({:.1}/{:.1}秒)", progress, self.current_time, self.max_time);
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.2}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);
        self.print_summary();

        Ok(())
    }

    /// 発射待ちも飛翔中のミサイルもなくなったか
    pub fn is_finished(&self) -> bool {
        self.pending_launches.is_empty() && self.missiles.is_empty()
    }

    pub fn step(&mut self) {
        self.process_targets();
        self.process_launches();
        self.process_flares();
        self.process_missiles();

        // 時刻は加算せずステップ数から求める
        self.step_count += 1;
        self.current_time = self.step_count as f64 * self.dt;
    }

    fn process_targets(&mut self) {
        for aircraft in &mut self.targets.aircraft {
            aircraft.tick(self.dt, self.current_time);
        }
    }

    fn process_launches(&mut self) {
        let now = self.current_time;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_launches)
            .into_iter()
            .partition(|launch| launch.launch_time <= now);
        self.pending_launches = waiting;

        for launch in due {
            let mut missile = launch.missile;
            let designated = launch
                .designated_target
                .as_deref()
                .and_then(|id| self.targets.get(id))
                .filter(|aircraft| aircraft.is_active());

            // 発射母機のシーカーは指定目標を捉えている
            if let Some(target) = designated {
                missile.lock_at_launch(target);
            }

            let mode = self.seeker.initialize(
                &mut missile,
                designated.map(|target| target as &dyn ITarget),
                &mut self.flare_bus,
                now,
            );

            self.stats.missiles_launched += 1;
            if matches!(mode, LaunchMode::RearHemisphere { .. }) {
                self.stats.rear_launches += 1;
            }

            if self.verbose_level > 1 {
                debug!(
                    missile_id = %missile.id,
                    launch_mode = ?mode,
                    launch_time = now,
                    "ミサイル発射"
                );
            }

            self.missiles.push(missile);
        }
    }

    fn process_flares(&mut self) {
        let now = self.current_time;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.flare_schedule)
            .into_iter()
            .partition(|flare| flare.time_s <= now);
        self.flare_schedule = waiting;

        for flare in due {
            let Some(aircraft) = self
                .targets
                .get_mut(&flare.target_id)
                .filter(|aircraft| aircraft.is_active())
            else {
                continue;
            };
            aircraft.deploy_flare(flare.intensity, flare.burn_time_s);

            let subscribers = self.flare_bus.subscribers(&flare.target_id);
            let Some(aircraft) = self.targets.get(&flare.target_id) else {
                continue;
            };

            for missile in self.missiles.iter_mut().filter(|m| m.is_active()) {
                if subscribers.contains(&missile.id) {
                    let record = self.seeker.on_decoy_deployed(
                        missile,
                        aircraft,
                        &mut self.flare_bus,
                        now,
                        |m: &mut IrMissile| {
                            m.apply_decoy(aircraft);
                        },
                    );
                    if record.is_some() {
                        self.stats.evasions += 1;
                    }
                } else {
                    missile.apply_decoy(aircraft);
                }
            }
        }
    }

    fn process_missiles(&mut self) {
        let now = self.current_time;
        let mut hit_targets = Vec::new();

        for missile in self.missiles.iter_mut().filter(|m| m.is_active()) {
            missile.check_track_loss(&self.targets);

            let outcome = self
                .seeker
                .seek(missile, &self.targets, &self.terrain, &mut self.flare_bus, now);
            self.stats.record_seek(&outcome);

            let track = missile.track_point(&self.targets);
            missile.update_kinematics(self.dt, track);

            if let Some(target_id) = missile.check_hit(&self.targets) {
                missile.terminate(MissileEndReason::Hit);
                hit_targets.push(target_id);
                continue;
            }
            if missile.is_out_of_range() {
                missile.terminate(MissileEndReason::OutOfRange);
                continue;
            }
            if missile.speed <= 0.0 {
                missile.terminate(MissileEndReason::Stalled);
                continue;
            }

            if missile.self_destruct_pending() {
                match self.seeker.terminal_check(&*missile, &mut self.flare_bus, now) {
                    TerminalDecision::Allow(reason) => {
                        debug!(
                            missile_id = %missile.id,
                            reason = ?reason,
                            "自爆判定を許可"
                        );
                        missile.terminate(MissileEndReason::SelfDestruct);
                    }
                    TerminalDecision::Suppress => self.stats.suppressed_terminal += 1,
                }
            }
        }

        for target_id in hit_targets {
            if let Some(aircraft) = self.targets.get_mut(&target_id) {
                if aircraft.is_active() {
                    aircraft.destroy();
                    self.stats.targets_destroyed += 1;
                }
            }
            self.flare_bus.retire_target(&target_id);
        }

        let (ended, flying): (Vec<_>, Vec<_>) = std::mem::take(&mut self.missiles)
            .into_iter()
            .partition(|m| !m.is_active());
        self.missiles = flying;

        for missile in ended {
            self.seeker.on_destroyed(&missile.id, &mut self.flare_bus);
            self.stats.record_end(missile.end_reason);
        }
    }

    fn print_summary(&self) {
        let s = &self.stats;
        info!(
            missiles_launched = s.missiles_launched,
            rear_launches = s.rear_launches,
            acquisitions = s.acquisitions,
            evasions = s.evasions,
            windows_expired = s.windows_expired,
            suppressed_terminal = s.suppressed_terminal,
            hits = s.hits,
            self_destructs = s.self_destructs,
            out_of_range = s.out_of_range,
            stalled = s.stalled,
            targets_destroyed = s.targets_destroyed,
            targets_remaining = self.targets.active_count(),
            "SIMULATION_SUMMARY: 実行結果"
        );
    }
}
