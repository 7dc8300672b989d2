//! テスト用のホスト側フェイク実装

use crate::models::common::{Position3D, Vector3D, Velocity3D};
use crate::models::traits::{
    IGuidedProjectile, ILineOfSight, ITarget, ITargetRegistry, IrSourceRef, SeekerState,
};

/// 原点から+X方向を機首とした場合に、水平面内で指定角度・距離にある位置
pub fn at_angle(angle_deg: f64, distance: f64) -> Position3D {
    let rad = angle_deg.to_radians();
    Vector3D::new(rad.cos() * distance, rad.sin() * distance, 0.0)
}

/// 常に遮蔽されている地形
pub struct BlockedSky;

impl ILineOfSight for BlockedSky {
    fn is_obstructed(&self, _from: &Position3D, _to: &Position3D) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct FakeTarget {
    pub id: String,
    pub faction: String,
    pub position: Position3D,
    pub velocity: Velocity3D,
    pub ir: f64,
    pub disabled: bool,
    pub decoy_primary: bool,
}

impl FakeTarget {
    pub fn new(id: &str, faction: &str, position: Position3D, ir: f64) -> Self {
        Self {
            id: id.to_string(),
            faction: faction.to_string(),
            position,
            velocity: Vector3D::new(0.0, 150.0, 0.0),
            ir,
            disabled: false,
            decoy_primary: false,
        }
    }
}

impl ITarget for FakeTarget {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Position3D {
        self.position
    }

    fn get_velocity(&self) -> Velocity3D {
        self.velocity
    }

    fn get_faction(&self) -> &str {
        &self.faction
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn ir_signature(&self) -> f64 {
        self.ir
    }

    fn primary_ir_source(&self) -> Option<IrSourceRef> {
        if self.ir <= 0.0 {
            return None;
        }
        if self.decoy_primary {
            Some(IrSourceRef::decoy(format!("{}_FLR", self.id), &self.id))
        } else {
            Some(IrSourceRef::engine(&self.id))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeTargets {
    pub targets: Vec<FakeTarget>,
}

impl FakeTargets {
    pub fn new(targets: Vec<FakeTarget>) -> Self {
        Self { targets }
    }

    pub fn get_mut(&mut self, id: &str) -> &mut FakeTarget {
        self.targets
            .iter_mut()
            .find(|t| t.id == id)
            .unwrap()
    }
}

impl ITargetRegistry for FakeTargets {
    fn live_targets(&self) -> Vec<&dyn ITarget> {
        self.targets.iter().map(|t| t as &dyn ITarget).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FakeProjectile {
    pub id: String,
    pub faction: String,
    pub position: Position3D,
    pub forward: Velocity3D,
    pub speed: f64,
    pub disabled: bool,
    pub guidance_active: bool,
    pub propulsion_on: bool,
    pub max_range: f64,
    pub losing_ground: bool,
    pub missed_target: bool,
    pub seeker: SeekerState,
    pub assigned_targets: Vec<Option<String>>,
    pub aimpoints: Vec<(Position3D, Velocity3D)>,
}

impl FakeProjectile {
    pub fn new(id: &str, faction: &str) -> Self {
        Self {
            id: id.to_string(),
            faction: faction.to_string(),
            position: Vector3D::ZERO,
            forward: Vector3D::new(1.0, 0.0, 0.0),
            speed: 600.0,
            disabled: false,
            guidance_active: true,
            propulsion_on: true,
            max_range: 8000.0,
            losing_ground: false,
            missed_target: false,
            seeker: SeekerState::default(),
            assigned_targets: Vec::new(),
            aimpoints: Vec::new(),
        }
    }

    /// 指定ターゲットのエンジンにロックした状態にする
    pub fn locked_on(mut self, target_id: &str) -> Self {
        self.seeker.ir_source = Some(IrSourceRef::engine(target_id));
        self.seeker.target_id = Some(target_id.to_string());
        self.seeker.lock_confirmed = true;
        self
    }
}

impl IGuidedProjectile for FakeProjectile {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Position3D {
        self.position
    }

    fn get_forward(&self) -> Velocity3D {
        self.forward
    }

    fn get_velocity(&self) -> Velocity3D {
        self.forward.normalize() * self.speed
    }

    fn get_faction(&self) -> &str {
        &self.faction
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn is_guidance_active(&self) -> bool {
        self.guidance_active
    }

    fn is_propulsion_on(&self) -> bool {
        self.propulsion_on
    }

    fn max_range(&self) -> f64 {
        self.max_range
    }

    fn is_losing_ground(&self) -> bool {
        self.losing_ground
    }

    fn has_missed_target(&self) -> bool {
        self.missed_target
    }

    fn seeker(&self) -> &SeekerState {
        &self.seeker
    }

    fn seeker_mut(&mut self) -> &mut SeekerState {
        &mut self.seeker
    }

    fn set_target(&mut self, target_id: Option<String>) {
        self.assigned_targets.push(target_id);
    }

    fn set_aimpoint(&mut self, position: Position3D, velocity: Velocity3D) {
        self.aimpoints.push((position, velocity));
    }
}
