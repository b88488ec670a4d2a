// ==============================================================================
// contact.rs - PER-WHEEL CONTACT MODEL (SUSPENSION + TIRE + WHEEL SPIN)
// ------------------------------------------------------------------------------
// One update() per physics tick:
// 1) probe the ground from the wheel mount along the body's down axis
//    (GroundProbe is the black-box geometry query; ray or sweep)
// 2) compression + compression velocity -> spring force (never pulls)
// 3) bump stop when bottomed; complex bump stop adds a progressive force
// 4) wheel basis on the contact plane (steer angle around body up)
// 5) slip ratio / slip angle -> FrictionCurve -> forces, each clamped to the
//    force that would cancel the slip velocity within this tick (no energy gain)
// 6) integrate wheel spin: motor + reaction torque, then brake/rolling
//    resistance toward zero without reversing
//
// Output: one world-space force at the contact point for the controller to
// apply to the ForceBody. Submodules only write the torque/angle inputs.
// ==============================================================================

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

use crate::wheel::body::BodyKinematics;
use crate::wheel::friction::FrictionCurve;
use crate::wheel::types::{ColliderKind, ContactSurface, FrictionMultipliers, WheelConfig, WheelRuntime};

/// Probe mask bits.
pub mod contact_mask {
    pub const TERRAIN: u32 = 0b0001;
    pub const VESSELS: u32 = 0b0010;
    pub const WATER: u32 = 0b0100;
    pub const DEFAULT: u32 = TERRAIN | VESSELS;
}

const LOW_SPEED: f32 = 0.5;            // m/s, slip denominator floor
const ROLLING_RESISTANCE: f32 = 0.01;  // torque per (load * radius)
const ROTATIONAL_DRAG: f32 = 0.1;      // 1/s, free-spin decay
const BUMP_STOP_GAIN: f32 = 4.0;       // x spring, complex bump stop
const TIME_BOOST_RAMP: f32 = 1.0;      // s
const WATER_GRIP: f32 = 0.15;
const MIN_INERTIA: f32 = 1e-4;
const MASS_SCALE_POWER: i32 = 3;

// ============================================
// ----- ground probe -------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeShape {
    Ray,
    Sphere { radius: f32 },
    /// Axis along the wheel's local X (axle).
    Capsule { radius: f32, half_width: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeQuery {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>, // unit, suspension travel direction
    pub orientation: UnitQuaternion<f32>,
    pub radius: f32,
    pub max_travel: f32,         // wheel centre travel
    pub shape: ProbeShape,
    pub mask: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundHit {
    /// Distance the wheel centre travels from the mount before touching.
    /// Negative when the wheel is already inside the ground.
    pub travel: f32,
    pub point: Point3<f32>,
    pub normal: Vector3<f32>,
    pub surface: ContactSurface,
}

pub trait GroundProbe {
    fn probe(&self, query: &ProbeQuery) -> Option<GroundHit>;
}

/// Never hits anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGround;

impl GroundProbe for NoGround {
    fn probe(&self, _query: &ProbeQuery) -> Option<GroundHit> {
        None
    }
}

/// Infinite horizontal plane at `height` (world Y up).
#[derive(Debug, Clone)]
pub struct FlatGround {
    pub height: f32,
    pub surface: ContactSurface,
}

impl FlatGround {
    pub fn terrain(height: f32) -> Self {
        Self {
            height,
            surface: ContactSurface::Terrain { id: 0, biome: None, water: false },
        }
    }
}

impl GroundProbe for FlatGround {
    fn probe(&self, query: &ProbeQuery) -> Option<GroundHit> {
        let required = match &self.surface {
            ContactSurface::Terrain { water: true, .. } => contact_mask::WATER,
            ContactSurface::Terrain { .. } => contact_mask::TERRAIN,
            ContactSurface::Body { .. } => contact_mask::VESSELS,
        };
        if query.mask & required == 0 {
            return None;
        }

        let down = query.direction.y;
        if down > -1e-4 {
            return None;
        }

        // centre height at which the wheel rim touches the plane
        let travel = (self.height + query.radius - query.origin.y) / down;
        if travel > query.max_travel || travel < -query.radius {
            return None;
        }

        let centre = query.origin + query.direction * travel;
        Some(GroundHit {
            travel,
            point: Point3::new(centre.x, self.height, centre.z),
            normal: Vector3::y(),
            surface: self.surface.clone(),
        })
    }
}

// ============================================
// ----- contact model ------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactForce {
    pub force: Vector3<f32>,
    pub point: Point3<f32>,
}

#[derive(Debug, Clone)]
pub struct WheelContactModel {
    radius: f32,
    width: f32,
    mass: f32,
    length: f32,
    offset: Vector3<f32>,
    kind: ColliderKind,
    mask: u32,
    complex_bump_stop: bool,

    pub friction: FrictionMultipliers,
    pub forward_curve: FrictionCurve,
    pub side_curve: FrictionCurve,

    runtime: WheelRuntime,
    contact_point: Point3<f32>,
    contact_normal: Vector3<f32>,
    was_grounded: bool,
}

impl WheelContactModel {
    pub fn new(config: &WheelConfig, scale: f32) -> Self {
        let mut model = Self {
            radius: 0.0,
            width: 0.0,
            mass: 0.0,
            length: 0.0,
            offset: Vector3::zeros(),
            kind: config.collider,
            mask: contact_mask::DEFAULT,
            complex_bump_stop: config.complex_bump_stop,
            friction: FrictionMultipliers::default(),
            forward_curve: FrictionCurve::FORWARD,
            side_curve: FrictionCurve::SIDEWAYS,
            runtime: WheelRuntime::default(),
            contact_point: Point3::origin(),
            contact_normal: Vector3::y(),
            was_grounded: false,
        };
        model.apply_scale(config, scale);
        model
    }

    /// Re-derive geometry from the config at a new part scale.
    pub fn apply_scale(&mut self, config: &WheelConfig, scale: f32) {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        self.radius = config.radius * scale;
        self.width = config.width * scale;
        self.length = config.length * scale;
        self.mass = config.mass * scale.powi(MASS_SCALE_POWER);
        let [x, y, z] = config.offset;
        self.offset = Vector3::new(x, y, z) * scale;
    }

    // ----- inputs -----

    pub fn set_spring_damper(&mut self, spring: f32, damper: f32) {
        self.runtime.spring = spring.max(0.0);
        self.runtime.damper = damper.max(0.0);
    }

    pub fn set_motor_torque(&mut self, torque: f32) {
        self.runtime.motor_torque = torque;
    }

    pub fn set_brake_torque(&mut self, torque: f32) {
        self.runtime.brake_torque = torque.abs();
    }

    /// Degrees around the body up axis.
    pub fn set_steer_angle(&mut self, degrees: f32) {
        self.runtime.steer_angle = degrees;
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = length.max(0.0);
    }

    pub fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    pub fn set_water_mode(&mut self, on: bool) {
        self.runtime.water_mode = on;
    }

    pub fn set_rpm(&mut self, rpm: f32) {
        self.runtime.set_rpm(rpm);
    }

    pub fn set_time_boost(&mut self, boost: f32) {
        self.runtime.time_boost = boost.clamp(0.0, 1.0);
    }

    // ----- outputs -----

    pub fn runtime(&self) -> &WheelRuntime {
        &self.runtime
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn grounded(&self) -> bool {
        self.runtime.grounded
    }

    pub fn compression(&self) -> f32 {
        self.runtime.compression
    }

    pub fn rpm(&self) -> f32 {
        self.runtime.rpm()
    }

    pub fn contact_point(&self) -> Point3<f32> {
        self.contact_point
    }

    pub fn contact_normal(&self) -> Vector3<f32> {
        self.contact_normal
    }

    /// Rim speed in m/s.
    pub fn surface_speed(&self) -> f32 {
        self.runtime.angular_velocity * self.radius
    }

    /// Spin inertia about the axle, floored so it is never zero.
    pub fn inertia(&self) -> f32 {
        (0.5 * self.mass * self.radius * self.radius).max(MIN_INERTIA)
    }

    fn effective_mask(&self) -> u32 {
        if self.runtime.water_mode {
            self.mask | contact_mask::WATER
        } else {
            self.mask & !contact_mask::WATER
        }
    }

    // ----- resets -----

    /// Drop any contact from the previous tick.
    pub fn clear_grounded_state(&mut self) {
        let rt = &mut self.runtime;
        rt.grounded = false;
        rt.surface = None;
        rt.compression = 0.0;
        rt.prev_compression = 0.0;
        rt.spring_force = 0.0;
        rt.longitudinal_force = 0.0;
        rt.lateral_force = 0.0;
        rt.longitudinal_slip = 0.0;
        rt.lateral_slip = 0.0;
        self.was_grounded = false;
    }

    /// Ground contact cleared plus zero spin and zero torque inputs.
    pub fn reset_contact_state(&mut self) {
        self.clear_grounded_state();
        self.runtime.angular_velocity = 0.0;
        self.runtime.motor_torque = 0.0;
        self.runtime.brake_torque = 0.0;
    }

    // ----- tick -----

    pub fn update(
        &mut self,
        dt: f32,
        body: &BodyKinematics,
        probe: &dyn GroundProbe,
        gravity: f32,
    ) -> Option<ContactForce> {
        if dt <= 0.0 || !dt.is_finite() {
            return None;
        }
        self.runtime.prev_compression = self.runtime.compression;
        self.runtime.time_boost = (self.runtime.time_boost + dt / TIME_BOOST_RAMP).min(1.0);

        let up = body.up();
        let steer = UnitQuaternion::from_axis_angle(
            &Unit::new_normalize(up),
            self.runtime.steer_angle.to_radians(),
        );
        let orientation = steer * body.pose.rotation;

        let hit = if self.length > 0.0 {
            let query = ProbeQuery {
                origin: body.pose * Point3::from(self.offset),
                direction: -up,
                orientation,
                radius: self.radius,
                max_travel: self.length,
                shape: match self.kind {
                    ColliderKind::Ray => ProbeShape::Ray,
                    ColliderKind::Sphere => ProbeShape::Sphere { radius: self.radius },
                    ColliderKind::Capsule => ProbeShape::Capsule {
                        radius: self.radius,
                        half_width: self.width * 0.5,
                    },
                },
                mask: self.effective_mask(),
            };
            probe.probe(&query).filter(|h| h.travel <= self.length)
        } else {
            None
        };

        match hit {
            Some(hit) => Some(self.update_grounded(dt, body, &orientation, hit, gravity)),
            None => {
                self.update_airborne(dt);
                None
            }
        }
    }

    fn update_airborne(&mut self, dt: f32) {
        self.clear_grounded_state();
        let inertia = self.inertia();
        let rt = &mut self.runtime;
        rt.angular_velocity += rt.motor_torque * dt / inertia;
        rt.angular_velocity *= (-ROTATIONAL_DRAG * self.friction.rotational.max(0.0) * dt).exp();
        rt.angular_velocity = toward_zero(rt.angular_velocity, rt.brake_torque * dt / inertia);
    }

    fn update_grounded(
        &mut self,
        dt: f32,
        body: &BodyKinematics,
        orientation: &UnitQuaternion<f32>,
        hit: GroundHit,
        gravity: f32,
    ) -> ContactForce {
        let inertia = self.inertia();
        let length = self.length;
        let radius = self.radius;

        // -------------------------
        // SUSPENSION
        // -------------------------
        let compression = (length - hit.travel).clamp(0.0, length);
        let overshoot = (-hit.travel).max(0.0);
        let compression_vel = if self.was_grounded {
            (compression - self.runtime.prev_compression) / dt
        } else {
            0.0
        };

        let spring = self.runtime.spring;
        let mut load = spring * compression + self.runtime.damper * compression_vel;
        if overshoot > 0.0 && self.complex_bump_stop {
            load += spring * BUMP_STOP_GAIN * overshoot;
        }

        let normal = hit.normal.try_normalize(1e-6).unwrap_or_else(|| body.up());
        let point_vel = body.point_velocity(&hit.point);

        // bump stop: bottomed and still approaching -> cancel the approach
        let design_mass = if gravity > f32::EPSILON { spring * length / gravity } else { 0.0 };
        if compression >= length - 1e-5 {
            let approach = -point_vel.dot(&normal);
            if approach > 0.0 {
                load += approach * design_mass / dt;
            }
        }
        let fz = load.max(0.0);
        let sprung_mass = if gravity > f32::EPSILON { fz / gravity } else { 0.0 };

        // -------------------------
        // WHEEL BASIS (contact plane)
        // -------------------------
        let heading = orientation * Vector3::z();
        let forward = (heading - normal * heading.dot(&normal))
            .try_normalize(1e-6)
            .unwrap_or_else(|| normal.cross(&(orientation * Vector3::x())));
        let side = normal.cross(&forward);

        let v_long = point_vel.dot(&forward);
        let v_lat = point_vel.dot(&side);

        let mut grip = fz * self.friction.surface.max(0.0);
        if matches!(hit.surface, ContactSurface::Terrain { water: true, .. }) {
            grip *= WATER_GRIP;
        }

        // -------------------------
        // LONGITUDINAL
        // -------------------------
        let rim_speed = self.runtime.angular_velocity * radius;
        let slip_speed = rim_speed - v_long;
        let long_slip = slip_speed / v_long.abs().max(rim_speed.abs()).max(LOW_SPEED);

        let mut f_long = long_slip.signum()
            * self.forward_curve.evaluate(long_slip)
            * grip
            * self.friction.forward.max(0.0)
            * self.runtime.time_boost;

        // effective mass of body share + wheel inertia seen at the rim
        let inv_mass = if sprung_mass > f32::EPSILON { 1.0 / sprung_mass } else { 0.0 }
            + radius * radius / inertia;
        let f_match = slip_speed.abs() / inv_mass / dt;
        f_long = f_long.clamp(-f_match, f_match);

        // -------------------------
        // LATERAL
        // -------------------------
        let lat_slip = v_lat / v_long.abs().max(LOW_SPEED);
        let mut f_lat = -v_lat.signum()
            * self.side_curve.evaluate(lat_slip)
            * grip
            * self.friction.sideways.max(0.0);
        let lat_limit = v_lat.abs() * sprung_mass / dt;
        f_lat = f_lat.clamp(-lat_limit, lat_limit);

        // -------------------------
        // WHEEL SPIN
        // -------------------------
        let rt = &mut self.runtime;
        rt.angular_velocity += (rt.motor_torque - f_long * radius) * dt / inertia;
        let rolling = ROLLING_RESISTANCE * self.friction.rolling.max(0.0) * fz * radius;
        rt.angular_velocity = toward_zero(rt.angular_velocity, (rt.brake_torque + rolling) * dt / inertia);

        rt.compression = compression;
        rt.grounded = true;
        rt.surface = Some(hit.surface);
        rt.spring_force = fz;
        rt.longitudinal_force = f_long;
        rt.lateral_force = f_lat;
        rt.longitudinal_slip = long_slip;
        rt.lateral_slip = lat_slip;

        self.was_grounded = true;
        self.contact_point = hit.point;
        self.contact_normal = normal;

        ContactForce {
            force: normal * fz + forward * f_long + side * f_lat,
            point: hit.point,
        }
    }
}

/// Reduce |value| by `amount` without crossing zero.
#[inline]
fn toward_zero(value: f32, amount: f32) -> f32 {
    if value.abs() <= amount {
        0.0
    } else {
        value - amount * value.signum()
    }
}
