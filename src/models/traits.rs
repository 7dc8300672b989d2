use crate::models::common::*;

/// IR放射源への参照
///
/// 機体のエンジン排気とフレアを区別するために、所有ターゲットとデコイ判定を持ちます。
#[derive(Debug, Clone, PartialEq)]
pub struct IrSourceRef {
    /// 放射源の一意識別子
    pub source_id: String,
    /// 放射源を所有するターゲットのID
    pub owner_id: String,
    /// デコイ（フレア）かどうか
    pub is_decoy: bool,
}

impl IrSourceRef {
    pub fn engine(owner_id: &str) -> Self {
        Self {
            source_id: format!("{}_ENG", owner_id),
            owner_id: owner_id.to_string(),
            is_decoy: false,
        }
    }

    pub fn decoy(source_id: String, owner_id: &str) -> Self {
        Self {
            source_id,
            owner_id: owner_id.to_string(),
            is_decoy: true,
        }
    }
}

/// シーカー状態
///
/// 誘導ループとLOALコアが共有する読み書き可能なフィールド群です。
/// ロック確定フラグは誘導ループ側が立てるもので、コアは下げることしかしません。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeekerState {
    /// 現在ロック中のIR放射源
    pub ir_source: Option<IrSourceRef>,
    /// 現在ロック中のターゲットID
    pub target_id: Option<String>,
    /// 累積追尾誤差
    pub tracking_error: f64,
    /// 幻惑（ダズル）累積量
    pub dazzle: f64,
    /// ロック確定フラグ
    pub lock_confirmed: bool,
}

impl SeekerState {
    /// ロック保持中かどうか（デコイへのロックも含む）
    pub fn has_lock(&self) -> bool {
        self.ir_source.is_some()
    }

    /// ターゲットとIR放射源の参照を外す
    pub fn clear_lock(&mut self) {
        self.ir_source = None;
        self.target_id = None;
        self.lock_confirmed = false;
    }
}

/// LOALコアから見たターゲットのインターフェース
pub trait ITarget {
    /// ターゲットIDの取得
    fn get_id(&self) -> String;

    /// 現在位置の取得
    fn get_position(&self) -> Position3D;

    /// 現在速度の取得
    fn get_velocity(&self) -> Velocity3D;

    /// 所属勢力
    fn get_faction(&self) -> &str;

    /// 撃破・無効化されているかどうか
    fn is_disabled(&self) -> bool;

    /// デコイを除いた全放射源のIR強度合計
    fn ir_signature(&self) -> f64;

    /// 現在の主放射源（放射なしの場合はNone）
    fn primary_ir_source(&self) -> Option<IrSourceRef>;
}

/// 生存ターゲットの列挙と検索
pub trait ITargetRegistry {
    /// 生存中の全ターゲットのスナップショット（列挙順は呼び出し間で安定していること）
    fn live_targets(&self) -> Vec<&dyn ITarget>;

    /// IDによる検索
    fn find_target(&self, target_id: &str) -> Option<&dyn ITarget> {
        self.live_targets()
            .into_iter()
            .find(|target| target.get_id() == target_id)
    }
}

/// LOALコアから見た誘導弾のインターフェース
pub trait IGuidedProjectile {
    /// 誘導弾IDの取得
    fn get_id(&self) -> String;

    /// 現在位置の取得
    fn get_position(&self) -> Position3D;

    /// 機首方向の単位ベクトル
    fn get_forward(&self) -> Velocity3D;

    /// 現在速度の取得
    fn get_velocity(&self) -> Velocity3D;

    /// 現在の速さ（m/s）
    fn get_speed(&self) -> f64 {
        self.get_velocity().magnitude()
    }

    /// 所属勢力
    fn get_faction(&self) -> &str;

    /// 無効化されているかどうか
    fn is_disabled(&self) -> bool;

    /// 誘導系が作動中かどうか
    fn is_guidance_active(&self) -> bool;

    /// 推進器が燃焼中かどうか
    fn is_propulsion_on(&self) -> bool;

    /// 兵装の最大射程（m）
    fn max_range(&self) -> f64;

    /// 予定経路に対して接近率を失っているかどうか
    fn is_losing_ground(&self) -> bool;

    /// 幾何学的に目標を外したと判定されているかどうか
    fn has_missed_target(&self) -> bool;

    /// シーカー状態の参照
    fn seeker(&self) -> &SeekerState;

    /// シーカー状態の可変参照
    fn seeker_mut(&mut self) -> &mut SeekerState;

    /// 追尾対象の指示（誘導系から見えるターゲット割り当て）
    fn set_target(&mut self, target_id: Option<String>);

    /// 照準点の指示
    fn set_aimpoint(&mut self, position: Position3D, velocity: Velocity3D);
}

/// 地形による視線遮蔽判定
pub trait ILineOfSight {
    /// 2点間の直線が地形に遮られているかどうか
    fn is_obstructed(&self, from: &Position3D, to: &Position3D) -> bool;
}

/// 視線判定を行わない（常に見通しあり）
pub struct ClearSky;

impl ILineOfSight for ClearSky {
    fn is_obstructed(&self, _from: &Position3D, _to: &Position3D) -> bool {
        false
    }
}
