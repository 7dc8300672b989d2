//! # LOAL（発射後ロックオン）コア
//!
//! 発射時にロックを持たない、またはフレアでロックを奪われたIR誘導弾に、
//! 限られた捜索ウィンドウの間だけ自律的に目標を探させます。
//!
//! ホストとの境界は [`crate::models::traits`] のインターフェースだけで、
//! コアはホストのエンティティを直接保持しません。

// 誘導弾ごとのLOAL状態
pub mod registry;

// 候補走査
pub mod scan;

// フレア回避メモリ
pub mod flare_memory;

// 指定目標への中間誘導
pub mod steering;

// 捜索ウィンドウと終末判定ガード
pub mod terminal_guard;

// フレア放出イベントの購読
pub mod flare_events;

// ホストが呼び出す入口
pub mod seeker;

#[cfg(test)]
pub(crate) mod testing;

pub use flare_events::{FlareEventBus, FlareSubscription, IFlareEvents, SubscriptionError};
pub use flare_memory::{EvasionRecord, FlareEvasionMemory, ThresholdPolicy};
pub use registry::{LoalState, SearchRegistry};
pub use scan::{RejectReason, ScanCandidate, ScanEngine};
pub use seeker::{LaunchMode, LoalSeeker, ReleaseReason, SeekOutcome};
pub use terminal_guard::{AllowReason, LoalPhase, SearchWindow, TerminalDecision, TerminalGuard};
