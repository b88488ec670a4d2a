// ==============================================================================
// body.rs - FORCE BODY
// ------------------------------------------------------------------------------
// The external force-accepting body and its kinematic snapshot.
// ==============================================================================

use nalgebra::{Isometry3, Point3, Vector3};

/// Pose and velocities of the body the wheels push on, sampled once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyKinematics {
    pub pose: Isometry3<f32>,
    pub linvel: Vector3<f32>,
    pub angvel: Vector3<f32>,
    pub center_of_mass: Point3<f32>, // world space
}

impl BodyKinematics {
    pub fn at_rest(pose: Isometry3<f32>) -> Self {
        Self {
            pose,
            linvel: Vector3::zeros(),
            angvel: Vector3::zeros(),
            center_of_mass: Point3::from(pose.translation.vector),
        }
    }

    /// v(p) = v_com + w x (p - com)
    #[inline]
    pub fn point_velocity(&self, p: &Point3<f32>) -> Vector3<f32> {
        self.linvel + self.angvel.cross(&(p.coords - self.center_of_mass.coords))
    }

    pub fn up(&self) -> Vector3<f32> {
        self.pose.rotation * Vector3::y()
    }
}

pub trait ForceBody {
    fn kinematics(&self) -> BodyKinematics;

    /// World-space force applied for the duration of the current tick.
    fn add_force_at_point(&mut self, force: Vector3<f32>, point: Point3<f32>);
}

/// Collects forces for a host to apply after all controllers have ticked.
#[derive(Debug, Clone)]
pub struct ForceAccumulator {
    kinematics: BodyKinematics,
    forces: Vec<(Vector3<f32>, Point3<f32>)>,
}

impl ForceAccumulator {
    pub fn new(kinematics: BodyKinematics) -> Self {
        Self {
            kinematics,
            forces: Vec::new(),
        }
    }

    pub fn forces(&self) -> &[(Vector3<f32>, Point3<f32>)] {
        &self.forces
    }

    pub fn into_forces(self) -> Vec<(Vector3<f32>, Point3<f32>)> {
        self.forces
    }

    pub fn total_force(&self) -> Vector3<f32> {
        self.forces.iter().map(|(f, _)| *f).sum()
    }
}

impl ForceBody for ForceAccumulator {
    fn kinematics(&self) -> BodyKinematics {
        self.kinematics
    }

    fn add_force_at_point(&mut self, force: Vector3<f32>, point: Point3<f32>) {
        if force.iter().all(|c| c.is_finite()) {
            self.forces.push((force, point));
        }
    }
}
