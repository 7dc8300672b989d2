//! # loalsim
//!
//! IR誘導弾の発射後ロックオン（LOAL）シミュレーション
//!
//! - [`loal`]: LOALコア（捜索レジストリ、候補走査、フレア回避メモリ、終末判定ガード）
//! - [`models`]: ホスト側モデル（ターゲット機、IRミサイル、地形）とインターフェース
//! - [`simulation`]: コアを駆動するデモ用シミュレーションエンジン

pub mod config;
pub mod loal;
pub mod logging;
pub mod models;
pub mod simulation;
