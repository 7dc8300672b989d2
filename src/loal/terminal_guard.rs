//! 捜索ウィンドウと終末判定ガード
//!
//! 状態遷移: `Locked` → `Searching` → `Ballistic`
//!
//! 捜索ウィンドウ中は、ロック済みで漂流するミサイル向けの自爆判定を抑止します。
//! ただし推進停止・接近率喪失・外れ判定・速度不足のいずれかがあれば即座に終末判定を許可し、
//! ウィンドウ満了後も同様に許可します。

use crate::config::LoalConfig;
use crate::loal::registry::LoalState;
use crate::models::traits::IGuidedProjectile;

/// LOAL上の飛翔段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoalPhase {
    /// ロック保持中（誘導は外部に任せる）
    Locked,
    /// 捜索ウィンドウ中
    Searching,
    /// ウィンドウ満了または強制停止条件成立
    Ballistic,
}

/// 終末判定を許可した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// LOAL管理外（未登録・解放済み）
    Unmanaged,
    /// ロック保持中または捜索中でない
    NotSearching,
    WindowExpired,
    PropulsionOff,
    LosingGround,
    MissedTarget,
    UnderSpeed,
}

impl AllowReason {
    /// この理由で許可した場合にLOAL状態を解放すべきか
    pub fn releases_state(&self) -> bool {
        !matches!(self, AllowReason::Unmanaged | AllowReason::NotSearching)
    }
}

/// 終末判定の可否
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalDecision {
    Allow(AllowReason),
    Suppress,
}

impl TerminalDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TerminalDecision::Allow(_))
    }
}

/// 捜索ウィンドウの時間管理
pub struct SearchWindow<'a> {
    config: &'a LoalConfig,
}

impl<'a> SearchWindow<'a> {
    pub fn new(config: &'a LoalConfig) -> Self {
        Self { config }
    }

    /// 捜索ウィンドウ内か（経過時間が捜索時間以下）
    pub fn is_open(&self, state: &LoalState, now: f64) -> bool {
        state
            .search_elapsed(now)
            .is_some_and(|elapsed| elapsed <= self.config.search_duration_s)
    }

    /// 捜索中でウィンドウを超過しているか
    pub fn is_expired(&self, state: &LoalState, now: f64) -> bool {
        state
            .search_elapsed(now)
            .is_some_and(|elapsed| elapsed > self.config.search_duration_s)
    }

    /// 残り時間（捜索中でなければNone）
    pub fn remaining(&self, state: &LoalState, now: f64) -> Option<f64> {
        state
            .search_elapsed(now)
            .map(|elapsed| (self.config.search_duration_s - elapsed).max(0.0))
    }

    /// 現在の飛翔段階
    pub fn phase(&self, state: Option<&LoalState>, projectile: &dyn IGuidedProjectile, now: f64) -> LoalPhase {
        match state {
            None => LoalPhase::Ballistic,
            Some(_) if projectile.seeker().has_lock() => LoalPhase::Locked,
            Some(state) if self.is_open(state, now) => LoalPhase::Searching,
            Some(_) => LoalPhase::Ballistic,
        }
    }
}

pub struct TerminalGuard<'a> {
    config: &'a LoalConfig,
}

impl<'a> TerminalGuard<'a> {
    pub fn new(config: &'a LoalConfig) -> Self {
        Self { config }
    }

    /// 終末（自爆）判定を許可するかを決める
    ///
    /// 状態の解放は呼び出し側が [`AllowReason::releases_state`] を見て行います。
    pub fn evaluate(
        &self,
        state: Option<&LoalState>,
        projectile: &dyn IGuidedProjectile,
        now: f64,
    ) -> TerminalDecision {
        let Some(state) = state else {
            return TerminalDecision::Allow(AllowReason::Unmanaged);
        };
        if projectile.seeker().has_lock() || !state.is_searching() {
            return TerminalDecision::Allow(AllowReason::NotSearching);
        }

        if SearchWindow::new(self.config).is_expired(state, now) {
            return TerminalDecision::Allow(AllowReason::WindowExpired);
        }

        if let Some(reason) = self.hard_stop(projectile) {
            return TerminalDecision::Allow(reason);
        }

        TerminalDecision::Suppress
    }

    /// 捜索中でも自爆判定を通す飛行包絡の破綻条件
    pub fn hard_stop(&self, projectile: &dyn IGuidedProjectile) -> Option<AllowReason> {
        if !projectile.is_propulsion_on() {
            Some(AllowReason::PropulsionOff)
        } else if projectile.is_losing_ground() {
            Some(AllowReason::LosingGround)
        } else if projectile.has_missed_target() {
            Some(AllowReason::MissedTarget)
        } else if projectile.get_speed() < self.config.self_destruct_speed_mps {
            Some(AllowReason::UnderSpeed)
        } else {
            None
        }
    }
}
