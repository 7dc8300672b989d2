//! フレア放出イベントの購読管理
//!
//! 誘導弾はロック獲得時にターゲットのフレア放出イベントを購読し、
//! 追尾対象の変更・追尾喪失・破壊のいずれでも必ず購読を解除します。
//! 解除漏れは破棄済み状態へのコールバックにつながるため、購読はハンドルで明示的に管理します。

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// 購読ハンドル
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlareSubscription {
    pub handle: u64,
    pub target_id: String,
    pub projectile_id: String,
}

/// 購読エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubscriptionError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("target {0} no longer emits flare events")]
    TargetRetired(String),
}

/// ターゲット側のフレア放出イベント購読インターフェース
pub trait IFlareEvents {
    /// ターゲットのフレア放出を購読する
    fn subscribe(
        &mut self,
        target_id: &str,
        projectile_id: &str,
    ) -> Result<FlareSubscription, SubscriptionError>;

    /// 購読を解除する（既に解除済みならfalse）
    fn unsubscribe(&mut self, subscription: &FlareSubscription) -> bool;
}

/// 単一スレッド用のフレアイベントバス
///
/// ホストはフレア放出時に [`FlareEventBus::subscribers`] で通知先の誘導弾を引き、
/// それぞれのシーカーへ回避判定を依頼します。
#[derive(Debug, Default)]
pub struct FlareEventBus {
    next_handle: u64,
    known_targets: HashSet<String>,
    retired_targets: HashSet<String>,
    subscriptions: HashMap<String, Vec<FlareSubscription>>,
}

impl FlareEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// イベント発行元としてターゲットを登録
    pub fn register_target(&mut self, target_id: &str) {
        self.known_targets.insert(target_id.to_string());
    }

    /// ターゲットの撃破などでイベント発行元から外し、全購読を破棄する
    ///
    /// # 戻り値
    ///
    /// 破棄された購読数
    pub fn retire_target(&mut self, target_id: &str) -> usize {
        if self.known_targets.remove(target_id) {
            self.retired_targets.insert(target_id.to_string());
        }
        self.subscriptions
            .remove(target_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// ターゲットを購読している誘導弾IDの一覧（購読順）
    pub fn subscribers(&self, target_id: &str) -> Vec<String> {
        self.subscriptions
            .get(target_id)
            .map(|subs| subs.iter().map(|s| s.projectile_id.clone()).collect())
            .unwrap_or_default()
    }

    /// 有効な購読の総数
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }
}

impl IFlareEvents for FlareEventBus {
    fn subscribe(
        &mut self,
        target_id: &str,
        projectile_id: &str,
    ) -> Result<FlareSubscription, SubscriptionError> {
        if self.retired_targets.contains(target_id) {
            return Err(SubscriptionError::TargetRetired(target_id.to_string()));
        }
        if !self.known_targets.contains(target_id) {
            return Err(SubscriptionError::UnknownTarget(target_id.to_string()));
        }

        self.next_handle += 1;
        let subscription = FlareSubscription {
            handle: self.next_handle,
            target_id: target_id.to_string(),
            projectile_id: projectile_id.to_string(),
        };
        self.subscriptions
            .entry(target_id.to_string())
            .or_default()
            .push(subscription.clone());
        Ok(subscription)
    }

    fn unsubscribe(&mut self, subscription: &FlareSubscription) -> bool {
        let Some(subs) = self.subscriptions.get_mut(&subscription.target_id) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.handle != subscription.handle);
        let removed = subs.len() != before;
        if subs.is_empty() {
            self.subscriptions.remove(&subscription.target_id);
        }
        removed
    }
}
