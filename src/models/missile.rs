use crate::config::MissileConfig;
use crate::models::{
    common::{AgentStatus, Position3D, Vector3D, Velocity3D, math_utils},
    target::{TargetAircraft, TargetFleet},
    traits::{IGuidedProjectile, ITarget, IrSourceRef, SeekerState},
};
use tracing::{debug, info, warn};

/// 追尾点への距離履歴の保持数
const TRACK_HISTORY_LEN: usize = 10;
/// 接近率喪失とみなす距離の連続増加回数
const LOSING_GROUND_TICKS: u32 = 5;
/// 外れ判定の対象となる最接近距離（命中判定距離の倍数）
const MISS_ASSESSMENT_FACTOR: f64 = 5.0;

/// ミサイル終了理由
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissileEndReason {
    /// ターゲットに命中した
    Hit,
    /// 自爆した
    SelfDestruct,
    /// 最大射程に達した
    OutOfRange,
    /// 速度を失った
    Stalled,
}

/// 3次元姿勢
///
/// ミサイルの機首方向をオイラー角で表現します（ロールは扱いません）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude3D {
    /// ピッチ角（度）
    pub pitch: f64,
    /// ヨー角（度）
    pub yaw: f64,
}

impl Attitude3D {
    /// 方向ベクトルから姿勢を計算
    ///
    /// # 引数
    ///
    /// * `direction` - 姿勢計算の基準となる方向ベクトル
    ///
    /// # 戻り値
    ///
    /// 計算された姿勢
    pub fn from_direction(direction: &Vector3D) -> Self {
        let horizontal = (direction.x.powi(2) + direction.y.powi(2)).sqrt();
        let pitch = math_utils::rad_to_deg(direction.z.atan2(horizontal));
        let yaw = if direction.x.abs() > 1e-10 || direction.y.abs() > 1e-10 {
            math_utils::rad_to_deg(direction.y.atan2(direction.x))
        } else {
            0.0
        };
        Self { pitch, yaw }
    }
}

/// IR誘導ミサイル
///
/// シーカーがロックしたIR放射源（または指示された照準点）へ旋回レート制限付きで向かいます。
/// 推進器の燃焼終了後は減速し、最大射程に達すると消滅します。
#[derive(Debug, Clone)]
pub struct IrMissile {
    pub id: String,
    pub faction: String,
    pub position: Position3D,
    /// 機首方向（単位ベクトル）
    pub forward: Vector3D,
    /// 速さ（m/s）
    pub speed: f64,
    pub status: AgentStatus,
    pub seeker: SeekerState,

    /// 誘導系から見た割り当てターゲット
    pub assigned_target: Option<String>,
    /// 指示された照準点（位置, 速度）
    pub aimpoint: Option<(Position3D, Velocity3D)>,

    /// 最大旋回レート（deg/s）
    pub max_turn_rate: f64,
    /// 推進器の燃焼時間（秒）
    pub burn_time: f64,
    /// 燃焼終了後の減速率（m/s²）
    pub coast_decel: f64,
    /// 最大射程（m）
    pub max_range: f64,
    /// 命中判定距離（m）
    pub intercept_radius: f64,
    pub guidance_active: bool,

    /// 追尾点への距離の履歴
    pub track_distance_history: Vec<f64>,
    /// 履歴がどの追尾点のものか
    pub track_key: Option<String>,
    /// 距離増加の連続回数
    pub distance_increase_count: u32,
    pub losing_ground: bool,
    pub missed_target: bool,

    /// 飛翔時間（秒）
    pub flight_time: f64,
    /// 累積飛行距離（m）
    pub total_distance: f64,
    pub end_reason: Option<MissileEndReason>,
}

impl IrMissile {
    /// 新しいミサイルを作成します
    ///
    /// # 引数
    ///
    /// * `id` - ミサイルの一意識別子
    /// * `faction` - 所属勢力
    /// * `position` - 発射位置
    /// * `heading` - 発射時の機首方向（正規化される）
    /// * `speed` - 発射時の速さ（m/s）
    pub fn new(id: String, faction: String, position: Position3D, heading: Vector3D, speed: f64) -> Self {
        Self {
            id,
            faction,
            position,
            forward: heading.normalize(),
            speed,
            status: AgentStatus::Active,
            seeker: SeekerState::default(),
            assigned_target: None,
            aimpoint: None,
            max_turn_rate: 30.0,
            burn_time: 6.0,
            coast_decel: 30.0,
            max_range: 8000.0,
            intercept_radius: 20.0,
            guidance_active: true,
            track_distance_history: Vec::new(),
            track_key: None,
            distance_increase_count: 0,
            losing_ground: false,
            missed_target: false,
            flight_time: 0.0,
            total_distance: 0.0,
            end_reason: None,
        }
    }

    /// シナリオ設定からミサイルを作成
    pub fn from_config(config: &MissileConfig) -> Self {
        let mut missile = Self::new(
            config.id.clone(),
            config.faction.clone(),
            config.position.into(),
            config.heading.into(),
            config.speed_mps,
        );
        missile.max_turn_rate = config.turn_rate_deg_s;
        missile.burn_time = config.burn_time_s;
        missile.coast_decel = config.coast_decel_mps2;
        missile.max_range = config.max_range_m;
        missile.intercept_radius = config.intercept_radius_m;
        missile
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    pub fn attitude(&self) -> Attitude3D {
        Attitude3D::from_direction(&self.forward)
    }

    /// 発射前のロック（発射母機のシーカーが指定目標のエンジンを捉えている状態）
    pub fn lock_at_launch(&mut self, target: &dyn ITarget) {
        let Some(source) = target.primary_ir_source() else {
            return;
        };
        self.seeker.ir_source = Some(source);
        self.seeker.target_id = Some(target.get_id());
        self.seeker.lock_confirmed = true;
        self.assigned_target = Some(target.get_id());

        info!(
            missile_id = %self.id,
            target_id = %target.get_id(),
            launch_position_x = self.position.x,
            launch_position_y = self.position.y,
            launch_position_z = self.position.z,
            yaw_deg = self.attitude().yaw,
            pitch_deg = self.attitude().pitch,
            "MISSILE_LAUNCH_LOCK: 発射時ロックを取得しました"
        );
    }

    /// フレアに対するシーカーのデコイ判定
    ///
    /// 追尾中の機体が放出したフレアのうち最も強いものが機体のIR強度を上回れば、
    /// シーカーはフレアへ乗り換えます。
    ///
    /// # 戻り値
    ///
    /// フレアへ乗り換えた場合はtrue
    pub fn apply_decoy(&mut self, owner: &TargetAircraft) -> bool {
        let tracking_owner_engine = self
            .seeker
            .ir_source
            .as_ref()
            .is_some_and(|source| !source.is_decoy && source.owner_id == owner.id);
        if !tracking_owner_engine {
            return false;
        }

        let Some(flare) = owner.strongest_flare() else {
            return false;
        };
        if flare.intensity <= owner.ir_signature() {
            return false;
        }

        self.seeker.ir_source = Some(IrSourceRef::decoy(flare.source_id.clone(), &owner.id));
        self.seeker.lock_confirmed = false;

        info!(
            missile_id = %self.id,
            target_id = %owner.id,
            flare_id = %flare.source_id,
            flare_intensity = flare.intensity,
            target_ir = owner.ir_signature(),
            "MISSILE_DECOYED: シーカーがフレアに誘引されました"
        );
        true
    }

    /// 追尾中のIR放射源が消えていればロックを外す（フレアの燃え尽き・目標の撃破）
    pub fn check_track_loss(&mut self, fleet: &TargetFleet) -> bool {
        let Some(source) = self.seeker.ir_source.clone() else {
            return false;
        };
        if fleet.source_position(&source).is_some() {
            return false;
        }

        self.seeker.clear_lock();
        self.assigned_target = None;
        debug!(
            missile_id = %self.id,
            source_id = %source.source_id,
            decoy = source.is_decoy,
            "MISSILE_TRACK_LOST: 追尾中の放射源が消失しました"
        );
        true
    }

    /// 現在の追尾点
    ///
    /// ロック中はIR放射源の位置、ロックなしで照準点指示があれば未来位置を予測した点。
    pub fn track_point(&self, fleet: &TargetFleet) -> Option<(String, Position3D)> {
        if let Some(source) = &self.seeker.ir_source {
            return fleet
                .source_position(source)
                .map(|position| (source.source_id.clone(), position));
        }

        let (position, velocity) = self.aimpoint?;
        let time_to_go = if self.speed > 0.0 {
            self.position.distance_3d(&position) / self.speed
        } else {
            0.0
        };
        Some(("AIMPOINT".to_string(), position + velocity * time_to_go))
    }

    /// 運動状態の更新
    ///
    /// 1. 旋回（レート制限） → 2. 速さ更新 → 3. 位置更新 → 4. 接近率評価
    ///
    /// # 引数
    ///
    /// * `dt` - 時間ステップ（秒）
    /// * `track` - 追尾点（キー, 位置）。Noneなら直進
    pub fn update_kinematics(&mut self, dt: f64, track: Option<(String, Position3D)>) {
        if !self.is_active() {
            return;
        }

        if let Some((_, point)) = &track {
            if self.guidance_active {
                let desired = *point - self.position;
                self.forward = math_utils::rotate_towards(&self.forward, &desired, self.max_turn_rate * dt);
            }
        }

        if !self.is_propulsion_on() {
            self.speed = (self.speed - self.coast_decel * dt).max(0.0);
        }

        let previous_position = self.position;
        self.position = self.position + self.forward * (self.speed * dt);
        self.flight_time += dt;
        self.total_distance += previous_position.distance_3d(&self.position);

        self.assess_closure(track);
    }

    /// 追尾点への距離履歴から接近率喪失と外れを判定
    fn assess_closure(&mut self, track: Option<(String, Position3D)>) {
        let Some((key, point)) = track else {
            return;
        };

        if self.track_key.as_deref() != Some(key.as_str()) {
            self.track_key = Some(key);
            self.track_distance_history.clear();
            self.distance_increase_count = 0;
            self.losing_ground = false;
        }

        let distance = self.position.distance_3d(&point);
        if let Some(&previous) = self.track_distance_history.last() {
            if distance > previous {
                self.distance_increase_count += 1;
            } else {
                self.distance_increase_count = 0;
            }
        }

        self.track_distance_history.push(distance);
        if self.track_distance_history.len() > TRACK_HISTORY_LEN {
            self.track_distance_history.remove(0);
        }

        // 照準点への旋回中は距離が開くのが普通なので、ロック中の追尾点だけを評価する
        self.losing_ground = self.seeker.has_lock() && self.distance_increase_count >= LOSING_GROUND_TICKS;

        let closest = self
            .track_distance_history
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if self.seeker.has_lock()
            && self.distance_increase_count > 0
            && closest <= self.intercept_radius * MISS_ASSESSMENT_FACTOR
        {
            self.missed_target = true;
        }
    }

    /// 命中判定
    ///
    /// # 戻り値
    ///
    /// 命中したターゲットのID
    pub fn check_hit(&self, fleet: &TargetFleet) -> Option<String> {
        let source = self.seeker.ir_source.as_ref().filter(|source| !source.is_decoy)?;
        let target = fleet.get(&source.owner_id).filter(|t| t.is_active())?;
        (self.position.distance_3d(&target.position) <= self.intercept_radius).then(|| target.id.clone())
    }

    /// 自爆判定に進むべき状態か
    ///
    /// ロックを失っている、目標を外した、または接近率を失っている場合。
    /// 実際に自爆するかは終末判定ガードが決めます。
    pub fn self_destruct_pending(&self) -> bool {
        !self.seeker.has_lock() || self.missed_target || self.losing_ground
    }

    pub fn is_out_of_range(&self) -> bool {
        self.total_distance >= self.max_range
    }

    /// 飛翔を終了させる
    pub fn terminate(&mut self, reason: MissileEndReason) {
        if !self.is_active() {
            return;
        }
        self.status = match reason {
            MissileEndReason::Hit => AgentStatus::Destroyed,
            MissileEndReason::SelfDestruct => AgentStatus::SelfDestruct,
            MissileEndReason::OutOfRange | MissileEndReason::Stalled => AgentStatus::Inactive,
        };
        self.end_reason = Some(reason);

        match reason {
            MissileEndReason::Hit => info!(
                missile_id = %self.id,
                target_id = ?self.seeker.target_id,
                hit_position_x = self.position.x,
                hit_position_y = self.position.y,
                hit_position_z = self.position.z,
                flight_time = self.flight_time,
                total_distance = self.total_distance,
                "MISSILE_HIT: ミサイルがターゲットに命中しました"
            ),
            _ => warn!(
                missile_id = %self.id,
                reason = ?reason,
                position_x = self.position.x,
                position_y = self.position.y,
                position_z = self.position.z,
                speed = self.speed,
                flight_time = self.flight_time,
                total_distance = self.total_distance,
                "MISSILE_TERMINATED: ミサイルが飛翔を終了しました"
            ),
        }
    }
}

impl IGuidedProjectile for IrMissile {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Position3D {
        self.position
    }

    fn get_forward(&self) -> Velocity3D {
        self.forward
    }

    fn get_velocity(&self) -> Velocity3D {
        self.forward * self.speed
    }

    fn get_speed(&self) -> f64 {
        self.speed
    }

    fn get_faction(&self) -> &str {
        &self.faction
    }

    fn is_disabled(&self) -> bool {
        !self.is_active()
    }

    fn is_guidance_active(&self) -> bool {
        self.guidance_active
    }

    fn is_propulsion_on(&self) -> bool {
        self.flight_time < self.burn_time
    }

    fn max_range(&self) -> f64 {
        self.max_range
    }

    fn is_losing_ground(&self) -> bool {
        self.losing_ground
    }

    fn has_missed_target(&self) -> bool {
        self.missed_target
    }

    fn seeker(&self) -> &SeekerState {
        &self.seeker
    }

    fn seeker_mut(&mut self) -> &mut SeekerState {
        &mut self.seeker
    }

    fn set_target(&mut self, target_id: Option<String>) {
        if target_id.is_some() {
            self.aimpoint = None;
        }
        self.assigned_target = target_id;
    }

    fn set_aimpoint(&mut self, position: Position3D, velocity: Velocity3D) {
        self.aimpoint = Some((position, velocity));
    }
}
