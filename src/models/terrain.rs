use crate::config::TerrainConfig;
use crate::models::{
    common::Position3D,
    traits::ILineOfSight,
};

/// 視線判定のサンプリング間隔（m）
const LOS_SAMPLE_SPACING_M: f64 = 100.0;

/// 円錐状の山
#[derive(Debug, Clone, Copy)]
pub struct Ridge {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub height: f64,
}

impl Ridge {
    /// 水平位置(x, y)での標高
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let d = ((x - self.x).powi(2) + (y - self.y).powi(2)).sqrt();
        if d >= self.radius {
            0.0
        } else {
            self.height * (1.0 - d / self.radius)
        }
    }
}

/// 地形
///
/// 山の集合で表し、2点間の線分を一定間隔でサンプリングして視線遮蔽を判定します。
#[derive(Debug, Clone, Default)]
pub struct Terrain {
    pub ridges: Vec<Ridge>,
}

impl Terrain {
    pub fn new(ridges: Vec<Ridge>) -> Self {
        Self { ridges }
    }

    pub fn from_config(config: &TerrainConfig) -> Self {
        Self::new(
            config
                .ridges
                .iter()
                .map(|r| Ridge {
                    x: r.x_m,
                    y: r.y_m,
                    radius: r.radius_m,
                    height: r.height_m,
                })
                .collect(),
        )
    }

    /// 最も高い山の標高
    pub fn elevation(&self, x: f64, y: f64) -> f64 {
        self.ridges
            .iter()
            .map(|r| r.height_at(x, y))
            .fold(0.0, f64::max)
    }
}

impl ILineOfSight for Terrain {
    fn is_obstructed(&self, from: &Position3D, to: &Position3D) -> bool {
        if self.ridges.is_empty() {
            return false;
        }

        let delta = *to - *from;
        let samples = ((delta.magnitude() / LOS_SAMPLE_SPACING_M).ceil() as usize).max(1);

        // 端点は判定しない
        (1..samples).any(|i| {
            let p = *from + delta * (i as f64 / samples as f64);
            p.z < self.elevation(p.x, p.y)
        })
    }
}
