use std::ops::{Add, Mul, Neg, Sub};

/// 3次元ベクトル
///
/// 位置・速度・方向のいずれにも使用します。
/// ホストシミュレーションから受け取る値はすでに同期済みの真値として扱います。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 位置（m）
pub type Position3D = Vector3D;
/// 速度（m/s）
pub type Velocity3D = Vector3D;

impl Vector3D {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// ベクトルの大きさ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 3次元距離を計算
    pub fn distance_3d(&self, other: &Vector3D) -> f64 {
        (*other - *self).magnitude()
    }

    /// 内積
    pub fn dot(&self, other: &Vector3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// ベクトルを正規化（ゼロベクトルはそのまま返す）
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            *self
        }
    }

    /// 大きさの上限クリップ
    pub fn clamp_magnitude(&self, max: f64) -> Self {
        let mag = self.magnitude();
        if mag > max {
            *self * (max / mag)
        } else {
            *self
        }
    }
}

impl Add for Vector3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vector3D {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// エージェントの状態を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentStatus {
    Active,       // アクティブ
    Destroyed,    // 撃破
    SelfDestruct, // 自爆（ミサイルの場合）
    Inactive,     // 非アクティブ（無効化・燃え尽き）
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use super::Vector3D;

    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees.to_radians()
    }

    /// ラジアンを度に変換
    pub fn rad_to_deg(radians: f64) -> f64 {
        radians.to_degrees()
    }

    /// 2つのベクトルのなす角（度、0〜180）
    ///
    /// どちらかがゼロベクトルの場合は180度を返します。
    /// 候補選定では距離の下限判定で先に除外されるため、この値が使われることはありません。
    pub fn angle_between_deg(a: &Vector3D, b: &Vector3D) -> f64 {
        let denom = a.magnitude() * b.magnitude();
        if denom <= f64::EPSILON {
            return 180.0;
        }
        let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
        rad_to_deg(cos.acos())
    }

    /// 前方ベクトルから見た目標方向の角度（オフボアサイト角、度）
    pub fn off_boresight_deg(origin: &Vector3D, forward: &Vector3D, target: &Vector3D) -> f64 {
        angle_between_deg(forward, &(*target - *origin))
    }

    /// 方向ベクトルを最大角度だけ目標方向へ回転させる
    ///
    /// 旋回レート制限付きの方向更新に使用します。戻り値は単位ベクトルです。
    pub fn rotate_towards(current: &Vector3D, desired: &Vector3D, max_angle_deg: f64) -> Vector3D {
        let from = current.normalize();
        let to = desired.normalize();
        if to.magnitude() <= f64::EPSILON {
            return from;
        }
        if from.magnitude() <= f64::EPSILON {
            return to;
        }

        let angle = angle_between_deg(&from, &to);
        if angle <= max_angle_deg || angle <= 1e-9 {
            return to;
        }

        // from と to が張る平面内で from に直交する単位ベクトル
        let cos_full = from.dot(&to);
        let mut perp = to - from * cos_full;
        if perp.magnitude() <= 1e-9 {
            // 真後ろへの旋回は平面が定まらないため、任意の直交方向を使う
            perp = if from.z.abs() < 0.9 {
                Vector3D::new(-from.y, from.x, 0.0)
            } else {
                Vector3D::new(0.0, -from.z, from.y)
            };
        }
        let perp = perp.normalize();

        let step = deg_to_rad(max_angle_deg);
        (from * step.cos() + perp * step.sin()).normalize()
    }
}
