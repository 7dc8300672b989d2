//! 候補走査エンジン
//!
//! ロックを持たない誘導弾について、捕捉可能なターゲットを選びます。
//! 安価な判定から順に除外し、残った候補を
//! `score = オフボアサイト角[deg] + 距離[m] * 0.001` で評価して最小のものを選びます。
//! 同点の場合はターゲット列挙順で先に見つかった候補が勝ちます。

use tracing::{debug, trace};

use crate::config::LoalConfig;
use crate::loal::flare_memory::FlareEvasionMemory;
use crate::loal::registry::LoalState;
use crate::models::common::math_utils;
use crate::models::traits::{IGuidedProjectile, ILineOfSight, ITarget, ITargetRegistry, IrSourceRef};

/// 距離の重み（角度が支配的で、距離は同角度時の近距離優先に効く）
pub const DISTANCE_WEIGHT: f64 = 0.001;

/// 候補の評価値（小さいほど良い）
pub fn score(angle_deg: f64, distance: f64) -> f64 {
    angle_deg + distance * DISTANCE_WEIGHT
}

/// 候補から除外された理由
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    SelfTarget,
    Disabled,
    Friendly,
    NoEmission,
    TooClose { distance: f64 },
    OutOfRange { distance: f64 },
    OutsideCone { angle_deg: f64 },
    Evaded { threshold: f64, current: f64 },
    DecoySource,
    Obstructed,
}

/// 全判定を通過した候補
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCandidate {
    pub target_id: String,
    pub ir_source: IrSourceRef,
    pub ir_signature: f64,
    pub angle_deg: f64,
    pub distance: f64,
    pub score: f64,
}

pub struct ScanEngine<'a> {
    config: &'a LoalConfig,
}

impl<'a> ScanEngine<'a> {
    pub fn new(config: &'a LoalConfig) -> Self {
        Self { config }
    }

    /// 走査間隔が経過しているか
    pub fn is_due(&self, state: &LoalState, now: f64) -> bool {
        match state.last_scan_time() {
            Some(last) => now - last >= self.config.scan_interval_s,
            None => true,
        }
    }

    /// 1つのターゲットを判定する
    pub fn evaluate(
        &self,
        projectile: &dyn IGuidedProjectile,
        target: &dyn ITarget,
        state: &LoalState,
        los: &dyn ILineOfSight,
    ) -> Result<ScanCandidate, RejectReason> {
        let target_id = target.get_id();
        if target_id == projectile.get_id() {
            return Err(RejectReason::SelfTarget);
        }
        if target.is_disabled() {
            return Err(RejectReason::Disabled);
        }
        if target.get_faction() == projectile.get_faction() {
            return Err(RejectReason::Friendly);
        }

        let ir_signature = target.ir_signature();
        let Some(ir_source) = target.primary_ir_source() else {
            return Err(RejectReason::NoEmission);
        };
        if ir_signature <= 0.0 {
            return Err(RejectReason::NoEmission);
        }

        let origin = projectile.get_position();
        let target_position = target.get_position();
        let distance = origin.distance_3d(&target_position);
        if distance < self.config.min_range_m {
            return Err(RejectReason::TooClose { distance });
        }
        if distance > projectile.max_range() {
            return Err(RejectReason::OutOfRange { distance });
        }

        let angle_deg =
            math_utils::off_boresight_deg(&origin, &projectile.get_forward(), &target_position);
        if angle_deg > self.config.search_angle_deg {
            return Err(RejectReason::OutsideCone { angle_deg });
        }

        if !FlareEvasionMemory::is_reacquirable(state, &target_id, ir_signature) {
            let threshold = state.evasion_threshold(&target_id).unwrap_or(0.0);
            return Err(RejectReason::Evaded { threshold, current: ir_signature });
        }

        if ir_source.is_decoy {
            return Err(RejectReason::DecoySource);
        }

        if los.is_obstructed(&origin, &target_position) {
            return Err(RejectReason::Obstructed);
        }

        Ok(ScanCandidate {
            target_id,
            ir_source,
            ir_signature,
            angle_deg,
            distance,
            score: score(angle_deg, distance),
        })
    }

    /// 全ターゲットを走査して最良の候補を返す
    pub fn find_best(
        &self,
        projectile: &dyn IGuidedProjectile,
        targets: &dyn ITargetRegistry,
        state: &LoalState,
        los: &dyn ILineOfSight,
    ) -> Option<ScanCandidate> {
        let mut best: Option<ScanCandidate> = None;

        for target in targets.live_targets() {
            match self.evaluate(projectile, target, state, los) {
                Ok(candidate) => {
                    // 厳密な比較で、同点なら先に見つかった候補を残す
                    let better = best
                        .as_ref()
                        .is_none_or(|current| candidate.score < current.score);
                    if better {
                        best = Some(candidate);
                    }
                }
                Err(reason) => {
                    trace!(
                        missile_id = %state.projectile_id,
                        target_id = %target.get_id(),
                        reason = ?reason,
                        "LOAL_SCAN_REJECT: 候補から除外しました"
                    );
                }
            }
        }

        if best.is_none() {
            debug!(
                missile_id = %state.projectile_id,
                "LOAL_SCAN_EMPTY: 捕捉可能な候補がありません"
            );
        }

        best
    }

    /// 候補へのロックを確定させる
    ///
    /// ロック確定フラグは誘導ループ側の確認を待つため、ここでは下げたままにします。
    pub fn commit_lock(projectile: &mut dyn IGuidedProjectile, candidate: &ScanCandidate) {
        let seeker = projectile.seeker_mut();
        seeker.ir_source = Some(candidate.ir_source.clone());
        seeker.target_id = Some(candidate.target_id.clone());
        seeker.tracking_error = 0.0;
        seeker.dazzle = 0.0;
        seeker.lock_confirmed = false;
        projectile.set_target(Some(candidate.target_id.clone()));
    }
}
