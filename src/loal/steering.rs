//! 指定目標への中間誘導
//!
//! 捜索中の誘導弾を、発射時に指定された目標の最新位置・速度へ向けて飛ばします。
//! シーカーコーンの外にいる目標（後方発射など）がウィンドウ満了前にコーンへ入るよう
//! 軌道を寄せるための助言的な指示であり、これ自体がロックを生むことはありません。

use tracing::trace;

use crate::config::LoalConfig;
use crate::loal::registry::LoalState;
use crate::models::traits::{IGuidedProjectile, ITargetRegistry};

/// 照準点指示を出す
///
/// # 戻り値
///
/// 指示を出した場合は指定目標のID
pub fn steer_toward_designated(
    config: &LoalConfig,
    state: &LoalState,
    projectile: &mut dyn IGuidedProjectile,
    targets: &dyn ITargetRegistry,
) -> Option<String> {
    if !config.enable_target_directed_steering {
        return None;
    }
    if !state.is_searching() || projectile.seeker().has_lock() {
        return None;
    }

    let designated_id = state.designated_target()?;
    let designated = targets.find_target(designated_id)?;
    if designated.is_disabled() {
        return None;
    }

    let position = designated.get_position();
    let velocity = designated.get_velocity();
    projectile.set_aimpoint(position, velocity);

    trace!(
        missile_id = %state.projectile_id,
        target_id = %designated_id,
        aim_x = position.x,
        aim_y = position.y,
        aim_z = position.z,
        "LOAL_STEER: 指定目標へ照準点を指示しました"
    );

    Some(designated_id.to_string())
}
