use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::loal::flare_events::FlareSubscription;

/// 誘導弾1発分のLOAL状態
///
/// シーカー初期化時に作成され、誘導弾の破壊・無効化、または捜索ウィンドウの満了で破棄されます。
/// ロック獲得後も捜索中集合から外れるだけで、フレア回避の記憶は保持し続けます。
///
/// ピーク値と再ロック閾値の書き込みは [`FlareEvasionMemory`](crate::loal::FlareEvasionMemory)
/// だけが行います。外部からは読み取りのみ可能です。
///
/// ```compile_fail
/// let mut registry = loalsim::loal::SearchRegistry::new();
/// let state = registry.register("M1", 0.0);
/// state.evaded_targets.insert("T1".to_string(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LoalState {
    /// 誘導弾ID
    pub projectile_id: String,
    /// 現在の捜索ウィンドウの開始時刻（捜索中でなければNone）
    pub(crate) search_start_time: Option<f64>,
    /// 最後に候補走査を行った時刻
    pub(crate) last_scan_time: Option<f64>,
    /// ロック中に観測したターゲットごとの最大IR強度
    pub(crate) peak_observed_ir: HashMap<String, f64>,
    /// フレア回避を許したターゲットごとの再ロック閾値
    pub(crate) evaded_targets: HashMap<String, f64>,
    /// 現在のフレア放出イベント購読
    pub flare_subscription: Option<FlareSubscription>,
    designated_target: Option<String>,
}

impl LoalState {
    fn new(projectile_id: String, now: f64) -> Self {
        Self {
            projectile_id,
            search_start_time: Some(now),
            last_scan_time: None,
            peak_observed_ir: HashMap::new(),
            evaded_targets: HashMap::new(),
            flare_subscription: None,
            designated_target: None,
        }
    }

    /// 発射時に指定された目標
    pub fn designated_target(&self) -> Option<&str> {
        self.designated_target.as_deref()
    }

    /// 指定目標を記録する（一度だけ有効）
    ///
    /// # 戻り値
    ///
    /// 記録できた場合はtrue、既に記録済みの場合はfalse
    pub fn designate(&mut self, target_id: &str) -> bool {
        if self.designated_target.is_some() {
            return false;
        }
        self.designated_target = Some(target_id.to_string());
        true
    }

    pub fn search_start_time(&self) -> Option<f64> {
        self.search_start_time
    }

    pub fn last_scan_time(&self) -> Option<f64> {
        self.last_scan_time
    }

    /// 候補走査を行った時刻を記録する
    pub(crate) fn record_scan(&mut self, now: f64) {
        self.last_scan_time = Some(now);
    }

    /// ロック中に観測した最大IR強度
    pub fn peak_ir(&self, target_id: &str) -> Option<f64> {
        self.peak_observed_ir.get(target_id).copied()
    }

    /// フレア回避を許したターゲットの再ロック閾値
    pub fn evasion_threshold(&self, target_id: &str) -> Option<f64> {
        self.evaded_targets.get(target_id).copied()
    }

    /// 回避記録のあるターゲット数
    pub fn evaded_count(&self) -> usize {
        self.evaded_targets.len()
    }

    /// 捜索中かどうか
    pub fn is_searching(&self) -> bool {
        self.search_start_time.is_some()
    }

    /// 捜索開始からの経過時間
    pub fn search_elapsed(&self, now: f64) -> Option<f64> {
        self.search_start_time.map(|start| now - start)
    }

    /// 捜索ウィンドウを開く（既に開いていれば何もしない）
    ///
    /// # 戻り値
    ///
    /// 新たに開いた場合はtrue
    pub fn open_search_window(&mut self, now: f64) -> bool {
        if self.search_start_time.is_some() {
            return false;
        }
        self.search_start_time = Some(now);
        true
    }

    /// 捜索中集合から外す
    pub fn close_search_window(&mut self) {
        self.search_start_time = None;
    }
}

/// 捜索レジストリ
///
/// 誘導弾IDをキーにLOAL状態を保持するテーブルです。
/// 作成・参照・破棄以外の副作用は持ちません。
#[derive(Debug, Default)]
pub struct SearchRegistry {
    states: HashMap<String, LoalState>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しいLOAL状態を作成し、捜索ウィンドウを現在時刻で開く
    ///
    /// 同じIDの古い状態が残っていた場合は置き換えます。
    pub fn register(&mut self, projectile_id: &str, now: f64) -> &mut LoalState {
        let fresh = LoalState::new(projectile_id.to_string(), now);
        match self.states.entry(projectile_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(fresh);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(fresh),
        }
    }

    pub fn lookup(&self, projectile_id: &str) -> Option<&LoalState> {
        self.states.get(projectile_id)
    }

    pub fn lookup_mut(&mut self, projectile_id: &str) -> Option<&mut LoalState> {
        self.states.get_mut(projectile_id)
    }

    /// 関連する状態をすべて削除する（未登録IDでは何もしない）
    pub fn destroy(&mut self, projectile_id: &str) -> Option<LoalState> {
        self.states.remove(projectile_id)
    }

    pub fn contains(&self, projectile_id: &str) -> bool {
        self.states.contains_key(projectile_id)
    }

    pub fn is_searching(&self, projectile_id: &str) -> bool {
        self.states
            .get(projectile_id)
            .is_some_and(LoalState::is_searching)
    }

    /// 捜索中の誘導弾数
    pub fn active_search_count(&self) -> usize {
        self.states.values().filter(|s| s.is_searching()).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
