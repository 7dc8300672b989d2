use crate::config::{TargetConfig, ThrottleChange};
use crate::models::{
    common::{AgentStatus, Position3D, Velocity3D},
    traits::{ITarget, ITargetRegistry, IrSourceRef},
};
use tracing::{debug, info};

/// フレア放出後の初速に残る母機速度の割合
const FLARE_VELOCITY_RETENTION: f64 = 0.3;

/// 放出済みフレア（デコイIR放射源）
#[derive(Debug, Clone)]
pub struct Flare {
    pub source_id: String,
    pub intensity: f64,
    pub position: Position3D,
    pub velocity: Velocity3D,
    /// 残り燃焼時間（秒）
    pub burn_remaining_s: f64,
}

impl Flare {
    pub fn is_burning(&self) -> bool {
        self.burn_remaining_s > 0.0
    }
}

/// ターゲット機
///
/// 等速直線運動する航空機で、スロットルに比例したエンジンIRを放射します。
/// フレアを放出でき、フレアは燃焼時間が尽きるまでデコイ放射源として存在します。
#[derive(Debug, Clone)]
pub struct TargetAircraft {
    /// ターゲットの一意識別子
    pub id: String,
    /// 所属勢力
    pub faction: String,
    pub position: Position3D,
    pub velocity: Velocity3D,
    /// スロットル100%時のエンジンIR強度
    pub engine_ir: f64,
    /// 現在のスロットル（0.0〜1.0）
    pub throttle: f64,
    /// 未適用のスロットル変更（時刻昇順）
    pub throttle_schedule: Vec<ThrottleChange>,
    pub status: AgentStatus,
    /// 燃焼中のフレア
    pub flares: Vec<Flare>,
    /// これまでの放出数（フレアID採番用）
    pub flares_deployed: u32,
}

impl TargetAircraft {
    /// 新しいターゲット機を作成
    ///
    /// # 引数
    ///
    /// * `id` - ターゲットの一意識別子
    /// * `faction` - 所属勢力
    /// * `position` - 初期位置
    /// * `velocity` - 速度ベクトル（一定）
    /// * `engine_ir` - スロットル100%時のエンジンIR強度
    pub fn new(id: String, faction: String, position: Position3D, velocity: Velocity3D, engine_ir: f64) -> Self {
        Self {
            id,
            faction,
            position,
            velocity,
            engine_ir,
            throttle: 1.0,
            throttle_schedule: Vec::new(),
            status: AgentStatus::Active,
            flares: Vec::new(),
            flares_deployed: 0,
        }
    }

    /// シナリオ設定からターゲット機を作成
    pub fn from_config(config: &TargetConfig) -> Self {
        let mut aircraft = Self::new(
            config.id.clone(),
            config.faction.clone(),
            config.position.into(),
            config.velocity.into(),
            config.engine_ir,
        );
        aircraft.throttle = config.throttle.clamp(0.0, 1.0);
        aircraft.throttle_schedule = config.throttle_changes.clone();
        aircraft
            .throttle_schedule
            .sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        aircraft
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// 1ステップ進める（移動、スロットル変更、フレア燃焼）
    ///
    /// # 引数
    ///
    /// * `dt` - 時間ステップ（秒）
    /// * `current_time` - 現在のシミュレーション時刻（秒）
    pub fn tick(&mut self, dt: f64, current_time: f64) {
        if !self.is_active() {
            return;
        }

        self.position = self.position + self.velocity * dt;

        while self
            .throttle_schedule
            .first()
            .is_some_and(|change| change.time_s <= current_time)
        {
            let change = self.throttle_schedule.remove(0);
            let previous = self.throttle;
            self.throttle = change.throttle.clamp(0.0, 1.0);
            debug!(
                target_id = %self.id,
                previous_throttle = previous,
                throttle = self.throttle,
                ir_signature = self.ir_signature(),
                "TARGET_THROTTLE_CHANGE: スロットルを変更しました"
            );
        }

        for flare in &mut self.flares {
            flare.position = flare.position + flare.velocity * dt;
            flare.burn_remaining_s -= dt;
        }
        self.flares.retain(Flare::is_burning);
    }

    /// フレアを放出する
    ///
    /// # 戻り値
    ///
    /// 放出したフレアのIR放射源参照
    pub fn deploy_flare(&mut self, intensity: f64, burn_time_s: f64) -> IrSourceRef {
        self.flares_deployed += 1;
        let source = IrSourceRef::decoy(format!("{}_FLR{}", self.id, self.flares_deployed), &self.id);

        self.flares.push(Flare {
            source_id: source.source_id.clone(),
            intensity,
            position: self.position,
            velocity: self.velocity * FLARE_VELOCITY_RETENTION,
            burn_remaining_s: burn_time_s,
        });

        info!(
            target_id = %self.id,
            flare_id = %source.source_id,
            intensity = intensity,
            burn_time_s = burn_time_s,
            engine_ir = self.ir_signature(),
            "TARGET_FLARE_DEPLOYED: フレアを放出しました"
        );

        source
    }

    /// 最も強いフレア
    pub fn strongest_flare(&self) -> Option<&Flare> {
        self.flares
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    pub fn find_flare(&self, source_id: &str) -> Option<&Flare> {
        self.flares.iter().find(|flare| flare.source_id == source_id)
    }

    /// 撃破処理
    pub fn destroy(&mut self) {
        if self.is_active() {
            self.status = AgentStatus::Destroyed;
            self.flares.clear();
        }
    }
}

impl ITarget for TargetAircraft {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Position3D {
        self.position
    }

    fn get_velocity(&self) -> Velocity3D {
        self.velocity
    }

    fn get_faction(&self) -> &str {
        &self.faction
    }

    fn is_disabled(&self) -> bool {
        !self.is_active()
    }

    fn ir_signature(&self) -> f64 {
        self.engine_ir * self.throttle
    }

    fn primary_ir_source(&self) -> Option<IrSourceRef> {
        (self.ir_signature() > 0.0).then(|| IrSourceRef::engine(&self.id))
    }
}

/// シナリオ内の全ターゲット機
#[derive(Debug, Clone, Default)]
pub struct TargetFleet {
    pub aircraft: Vec<TargetAircraft>,
}

impl TargetFleet {
    pub fn new(aircraft: Vec<TargetAircraft>) -> Self {
        Self { aircraft }
    }

    pub fn get(&self, id: &str) -> Option<&TargetAircraft> {
        self.aircraft.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TargetAircraft> {
        self.aircraft.iter_mut().find(|a| a.id == id)
    }

    /// IR放射源の現在位置（燃え尽きたフレアや撃破済み機はNone）
    pub fn source_position(&self, source: &IrSourceRef) -> Option<Position3D> {
        let owner = self.get(&source.owner_id).filter(|a| a.is_active())?;
        if source.is_decoy {
            owner.find_flare(&source.source_id).map(|flare| flare.position)
        } else {
            Some(owner.position)
        }
    }

    pub fn active_count(&self) -> usize {
        self.aircraft.iter().filter(|a| a.is_active()).count()
    }
}

impl ITargetRegistry for TargetFleet {
    fn live_targets(&self) -> Vec<&dyn ITarget> {
        self.aircraft
            .iter()
            .filter(|a| a.is_active())
            .map(|a| a as &dyn ITarget)
            .collect()
    }
}
