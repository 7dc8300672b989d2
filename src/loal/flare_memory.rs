//! フレア回避メモリ
//!
//! デコイにロックを奪われたターゲットについて再ロック閾値を記録し、
//! 数秒後に同じターゲットへ安易に再ロックすることを防ぎます。
//!
//! - 瞬時方式: 回避した瞬間のIR強度を閾値とする
//! - ピーク方式: ロック中に観測した最大IR強度を閾値とする（瞬時方式より常に厳しい）

use crate::config::LoalConfig;
use crate::loal::registry::LoalState;

/// 閾値方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdPolicy {
    Instant,
    Peak,
}

impl ThresholdPolicy {
    pub fn from_config(config: &LoalConfig) -> Self {
        if config.use_peak_threshold {
            ThresholdPolicy::Peak
        } else {
            ThresholdPolicy::Instant
        }
    }
}

/// 回避記録の結果
#[derive(Debug, Clone, PartialEq)]
pub struct EvasionRecord {
    pub target_id: String,
    /// 今回算出した閾値
    pub sampled_threshold: f64,
    /// 記録後の閾値（既存の記録より下がることはない）
    pub stored_threshold: f64,
    /// ピーク値を使ったか（falseなら瞬時値へのフォールバック）
    pub from_peak: bool,
    /// この記録で捜索ウィンドウを開き直したか
    pub reopened_search: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FlareEvasionMemory {
    policy: ThresholdPolicy,
}

impl FlareEvasionMemory {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    /// ロック中のターゲットのIR強度を記録する（ピーク方式のみ）
    ///
    /// 呼び出し側はロックを保持している対象についてのみ呼ぶこと。
    ///
    /// # 戻り値
    ///
    /// 更新後のピーク値（瞬時方式ではNone）
    pub fn sample_peak(&self, state: &mut LoalState, target_id: &str, ir: f64) -> Option<f64> {
        if self.policy != ThresholdPolicy::Peak {
            return None;
        }
        let peak = state
            .peak_observed_ir
            .entry(target_id.to_string())
            .or_insert(ir);
        if ir > *peak {
            *peak = ir;
        }
        Some(*peak)
    }

    /// 回避成立時の閾値を算出する
    ///
    /// ピークが一度も記録されていなければ現在値にフォールバックします。
    pub fn relock_threshold(&self, state: &LoalState, target_id: &str, current_ir: f64) -> (f64, bool) {
        match self.policy {
            ThresholdPolicy::Peak => match state.peak_observed_ir.get(target_id) {
                Some(peak) => (*peak, true),
                None => (current_ir, false),
            },
            ThresholdPolicy::Instant => (current_ir, false),
        }
    }

    /// 回避を記録し、捜索ウィンドウを開き直す
    pub fn record_evasion(
        &self,
        state: &mut LoalState,
        target_id: &str,
        current_ir: f64,
        now: f64,
    ) -> EvasionRecord {
        let (sampled, from_peak) = self.relock_threshold(state, target_id, current_ir);

        let stored = state
            .evaded_targets
            .entry(target_id.to_string())
            .or_insert(sampled);
        if sampled > *stored {
            *stored = sampled;
        }
        let stored_threshold = *stored;

        let reopened_search = state.open_search_window(now);

        EvasionRecord {
            target_id: target_id.to_string(),
            sampled_threshold: sampled,
            stored_threshold,
            from_peak,
            reopened_search,
        }
    }

    /// 再捕捉可能かどうか（記録がなければ常に可能、あれば現在値が閾値を厳密に超えること）
    pub fn is_reacquirable(state: &LoalState, target_id: &str, current_ir: f64) -> bool {
        match state.evaded_targets.get(target_id) {
            Some(threshold) => current_ir > *threshold,
            None => true,
        }
    }

    /// 再捕捉時に回避記録を消す
    pub fn clear_evasion(state: &mut LoalState, target_id: &str) -> Option<f64> {
        state.evaded_targets.remove(target_id)
    }
}
