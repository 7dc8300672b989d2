// 基本的なデータ型と数学ユーティリティ
pub mod common;

// LOALコアとホストの境界となるインターフェース（trait）定義
pub mod traits;

// ホスト側モデルの実装
pub mod target;
pub mod missile;
pub mod terrain;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use target::{Flare, TargetAircraft, TargetFleet};
pub use missile::{Attitude3D, IrMissile, MissileEndReason};
pub use terrain::{Ridge, Terrain};
