//! # Config モジュール
//!
//! LOALシーカーの設定値と、デモ用ホストシミュレーションのシナリオ定義を
//! YAMLファイルから読み込みます。
//!
//! LOALコアが参照するのは [`LoalConfig`] のみで、読み込み後は読み取り専用です。
//! シナリオのその他の項目はホスト側（[`crate::simulation`]）だけが使用します。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::common::Vector3D;

/// LOALシーカー設定
///
/// 全項目にデフォルト値があり、YAMLでは変更したい項目だけを書けば済みます。
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoalConfig {
    /// 捜索コーン半角（度）。発射ゲート角とは独立
    pub search_angle_deg: f64,
    /// 捜索ウィンドウの長さ（秒）
    pub search_duration_s: f64,
    /// 候補走査の最小間隔（秒、シミュレーション時間）
    pub scan_interval_s: f64,
    /// 最小捕捉距離（m）
    pub min_range_m: f64,
    /// true: ピーク閾値方式 / false: 瞬時閾値方式
    pub use_peak_threshold: bool,
    /// 指定目標への中間誘導を行うか
    pub enable_target_directed_steering: bool,
    /// 発射時の後方半球判定に使うカットオフ角（度）
    pub off_boresight_cutoff_deg: f64,
    /// 自爆判定の速度下限（m/s）
    pub self_destruct_speed_mps: f64,
    /// 未ロックの指定目標についてもピークIRを記録するか
    pub sample_designated_peak: bool,
}

impl Default for LoalConfig {
    fn default() -> Self {
        Self {
            search_angle_deg: 90.0,
            search_duration_s: 8.0,
            scan_interval_s: 0.25,
            min_range_m: 50.0,
            use_peak_threshold: true,
            enable_target_directed_steering: true,
            off_boresight_cutoff_deg: 90.0,
            self_destruct_speed_mps: 100.0,
            sample_designated_peak: false,
        }
    }
}

impl LoalConfig {
    /// 設定値の検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.search_angle_deg > 0.0 && self.search_angle_deg <= 180.0) {
            return Err(ConfigError::Validation(format!(
                "search_angle_deg must be in (0, 180], got {}",
                self.search_angle_deg
            )));
        }
        if !(self.off_boresight_cutoff_deg > 0.0 && self.off_boresight_cutoff_deg <= 180.0) {
            return Err(ConfigError::Validation(format!(
                "off_boresight_cutoff_deg must be in (0, 180], got {}",
                self.off_boresight_cutoff_deg
            )));
        }
        if !(self.search_duration_s.is_finite() && self.search_duration_s > 0.0) {
            return Err(ConfigError::Validation("search_duration_s must be a finite positive number".to_string()));
        }
        if !(self.scan_interval_s.is_finite() && self.scan_interval_s > 0.0) {
            return Err(ConfigError::Validation("scan_interval_s must be a finite positive number".to_string()));
        }
        if !(self.min_range_m.is_finite() && self.min_range_m >= 0.0) {
            return Err(ConfigError::Validation("min_range_m must be finite and not negative".to_string()));
        }
        if !(self.self_destruct_speed_mps.is_finite() && self.self_destruct_speed_mps >= 0.0) {
            return Err(ConfigError::Validation(
                "self_destruct_speed_mps must be finite and not negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// シナリオメタデータ
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Vec3Config {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vec3Config> for Vector3D {
    fn from(v: Vec3Config) -> Self {
        Vector3D::new(v.x, v.y, v.z)
    }
}

/// 地形（円錐状の山の集合）
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TerrainConfig {
    #[serde(default)]
    pub ridges: Vec<RidgeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RidgeConfig {
    pub x_m: f64,
    pub y_m: f64,
    pub radius_m: f64,
    pub height_m: f64,
}

/// スロットル変更スケジュール
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleChange {
    pub time_s: f64,
    pub throttle: f64,
}

/// ターゲット機設定
#[derive(Debug, Deserialize, Serialize)]
pub struct TargetConfig {
    pub id: String,
    pub faction: String,
    pub position: Vec3Config,
    pub velocity: Vec3Config,
    /// スロットル100%時のエンジンIR強度
    pub engine_ir: f64,
    #[serde(default = "default_throttle")]
    pub throttle: f64,
    #[serde(default)]
    pub throttle_changes: Vec<ThrottleChange>,
}

fn default_throttle() -> f64 {
    1.0
}

/// 誘導弾設定
#[derive(Debug, Deserialize, Serialize)]
pub struct MissileConfig {
    pub id: String,
    pub faction: String,
    #[serde(default)]
    pub launch_time_s: f64,
    pub position: Vec3Config,
    /// 発射時の機首方向（正規化は読み込み側で行う）
    pub heading: Vec3Config,
    pub speed_mps: f64,
    pub max_range_m: f64,
    pub turn_rate_deg_s: f64,
    /// 推進器の燃焼時間（秒）
    pub burn_time_s: f64,
    /// 燃焼終了後の減速率（m/s²）
    #[serde(default = "default_coast_decel")]
    pub coast_decel_mps2: f64,
    /// 命中判定距離（m）
    #[serde(default = "default_intercept_radius")]
    pub intercept_radius_m: f64,
    /// 発射時に指定する目標
    #[serde(default)]
    pub designated_target: Option<String>,
}

fn default_coast_decel() -> f64 {
    30.0
}

fn default_intercept_radius() -> f64 {
    20.0
}

/// フレア放出スケジュール
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlareConfig {
    pub target_id: String,
    pub time_s: f64,
    pub intensity: f64,
    pub burn_time_s: f64,
}

/// 完全なシナリオ設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    #[serde(default)]
    pub loal: LoalConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    pub targets: Vec<TargetConfig>,
    pub missiles: Vec<MissileConfig>,
    #[serde(default)]
    pub flares: Vec<FlareConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sim.dt_s.is_finite() && self.sim.dt_s > 0.0) {
            return Err(ConfigError::Validation("dt_s must be positive".to_string()));
        }
        if !(self.sim.t_max_s.is_finite() && self.sim.t_max_s > 0.0) {
            return Err(ConfigError::Validation("t_max_s must be positive".to_string()));
        }

        self.loal.validate()?;

        for target in &self.targets {
            if !(target.engine_ir.is_finite() && target.engine_ir >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "target {} engine_ir must not be negative",
                    target.id
                )));
            }
        }

        for missile in &self.missiles {
            if Vector3D::from(missile.heading).magnitude() <= f64::EPSILON {
                return Err(ConfigError::Validation(format!(
                    "missile {} heading must be non-zero",
                    missile.id
                )));
            }
            if !(missile.speed_mps > 0.0 && missile.max_range_m > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "missile {} speed and max range must be positive",
                    missile.id
                )));
            }
            if let Some(designated) = &missile.designated_target {
                if !self.targets.iter().any(|t| &t.id == designated) {
                    return Err(ConfigError::Validation(format!(
                        "missile {} designates unknown target {}",
                        missile.id, designated
                    )));
                }
            }
        }

        for flare in &self.flares {
            if !self.targets.iter().any(|t| t.id == flare.target_id) {
                return Err(ConfigError::Validation(format!(
                    "flare at {:.2}s references unknown target {}",
                    flare.time_s, flare.target_id
                )));
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        println!();

        println!("=== LOAL設定 ===");
        println!("捜索コーン: {:.1}度", self.loal.search_angle_deg);
        println!("捜索時間: {:.1}秒", self.loal.search_duration_s);
        println!("走査間隔: {:.2}秒", self.loal.scan_interval_s);
        println!(
            "閾値方式: {}",
            if self.loal.use_peak_threshold { "ピーク" } else { "瞬時" }
        );
        println!(
            "指定目標誘導: {}",
            if self.loal.enable_target_directed_steering { "有効" } else { "無効" }
        );
        println!();

        println!("=== 戦力 ===");
        println!("ターゲット: {}機", self.targets.len());
        println!("誘導弾: {}発", self.missiles.len());
        println!("フレア放出: {}回", self.flares.len());
        println!("地形起伏: {}箇所", self.terrain.ridges.len());
    }
}

/// 設定読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}
