// ==============================================================================
// physics.rs - RAPIER HOST WORLD FOR WHEELED VESSELS
// ------------------------------------------------------------------------------
// The wheel core only sees two traits: GroundProbe (geometry query) and
// ForceBody (the chassis). This file implements both on top of rapier3d:
//
// step(dt):
// 1) refresh the query pipeline
// 2) per vessel: snapshot chassis kinematics into a ForceAccumulator and tick
//    every controller (one per part) against a RapierGround probe
// 3) cross-part anti-roll links (symmetric sibling parts)
// 4) fold controller landed states into the vessel state
// 5) apply accumulated forces as impulses (F * dt), then step rapier
//
// Mask bits map 1:1 onto rapier collision groups (terrain / vessels / water).
// The core's own nalgebra types are converted component-wise at this boundary.
// ==============================================================================

use std::collections::HashMap;

use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::math::{Isometry as RIsometry, Point as RPoint, Real, Vector as RVector};
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape::{Ball, Capsule, Shape};
use rapier3d::prelude::nalgebra as rna;
use rapier3d::prelude::{
    CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, DefaultBroadPhase, Group, ImpulseJointSet,
    IntegrationParameters, InteractionGroups, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryFilter, QueryPipeline, Ray, RigidBody, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{CrossPartLink, VesselConfig};
use crate::controller::{SubmoduleId, TickEnv, WheelController};
use crate::error::{Result, WheelError};
use crate::modules::{toggle_deployment, BrakesModule, MotorModule, SteeringModule, ToggleOutcome};
use crate::resources::ResourceTank;
use crate::scene::NamedNodes;
use crate::submodule::WheelSubmodule;
use crate::telemetry::{ControllerTelemetry, VesselTelemetry};
use crate::wheel::anti_roll;
use crate::wheel::contact::contact_mask;
use crate::wheel::{
    BodyKinematics, ContactSurface, ForceAccumulator, ForceBody, GroundHit, GroundProbe, LandedState, ProbeQuery,
    ProbeShape,
};

const GROUP_GROUND: Group = Group::from_bits_truncate(contact_mask::TERRAIN);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(contact_mask::VESSELS);
const GROUP_WATER: Group = Group::from_bits_truncate(contact_mask::WATER);

const WORLD_LIMIT: f32 = 1_000.0; // m

// ============================================
// ----- nalgebra <-> rapier ------------------
// ============================================

#[inline] fn to_rapier_vec(v: &Vector3<f32>) -> RVector<Real> { RVector::new(v.x, v.y, v.z) }
#[inline] fn to_rapier_point(p: &Point3<f32>) -> RPoint<Real> { RPoint::new(p.x, p.y, p.z) }
#[inline] fn from_rapier_vec(v: &RVector<Real>) -> Vector3<f32> { Vector3::new(v.x, v.y, v.z) }
#[inline] fn from_rapier_point(p: &RPoint<Real>) -> Point3<f32> { Point3::new(p.x, p.y, p.z) }

fn from_rapier_iso(iso: &RIsometry<Real>) -> Isometry3<f32> {
    let t = iso.translation.vector;
    let q = iso.rotation;
    Isometry3::from_parts(
        Translation3::new(t.x, t.y, t.z),
        UnitQuaternion::new_unchecked(Quaternion::new(q.w, q.i, q.j, q.k)),
    )
}

fn to_rapier_iso(origin: &Point3<f32>, rotation: &UnitQuaternion<f32>) -> RIsometry<Real> {
    RIsometry::from_parts(
        rna::Translation3::new(origin.x, origin.y, origin.z),
        rna::UnitQuaternion::new_unchecked(rna::Quaternion::new(rotation.w, rotation.i, rotation.j, rotation.k)),
    )
}

fn kinematics_of(body: &RigidBody) -> BodyKinematics {
    BodyKinematics {
        pose: from_rapier_iso(body.position()),
        linvel: from_rapier_vec(body.linvel()),
        angvel: from_rapier_vec(body.angvel()),
        center_of_mass: from_rapier_point(body.center_of_mass()),
    }
}

fn surface_id(handle: ColliderHandle) -> u64 {
    let (index, generation) = handle.into_raw_parts();
    (u64::from(generation) << 32) | u64::from(index)
}

// ============================================
// ----- ground probe -------------------------
// ============================================

/// Tag for static colliders: biome name and water surfaces.
#[derive(Debug, Clone, Default)]
pub struct SurfaceTag {
    pub biome: Option<String>,
    pub water: bool,
}

pub struct RapierGround<'a> {
    pub query: &'a QueryPipeline,
    pub bodies: &'a RigidBodySet,
    pub colliders: &'a ColliderSet,
    pub exclude: RigidBodyHandle,
    pub tags: &'a HashMap<ColliderHandle, SurfaceTag>,
    /// Last known (landed, splashed) of every vessel body.
    pub vessel_landed: &'a HashMap<RigidBodyHandle, (bool, bool)>,
}

impl RapierGround<'_> {
    fn surface(&self, handle: ColliderHandle) -> ContactSurface {
        let id = surface_id(handle);
        let parent = self.colliders.get(handle).and_then(|c| c.parent());
        let dynamic_parent = parent.filter(|p| self.bodies.get(*p).is_some_and(|b| b.is_dynamic()));

        match dynamic_parent {
            Some(body) => {
                let (landed, splashed) = self.vessel_landed.get(&body).copied().unwrap_or((false, false));
                ContactSurface::Body { id, landed, splashed }
            }
            None => {
                let tag = self.tags.get(&handle).cloned().unwrap_or_default();
                ContactSurface::Terrain { id, biome: tag.biome, water: tag.water }
            }
        }
    }

    fn sweep(&self, query: &ProbeQuery, shape: &dyn Shape, filter: QueryFilter) -> Option<GroundHit> {
        let pose = to_rapier_iso(&query.origin, &query.orientation);
        let dir = to_rapier_vec(&query.direction);
        let options = ShapeCastOptions::with_max_time_of_impact(query.max_travel);

        let (handle, hit) = self.query.cast_shape(self.bodies, self.colliders, &pose, &dir, shape, options, filter)?;

        let travel = hit.time_of_impact;
        let centre = query.origin + query.direction * travel;
        let point = if travel > 0.0 {
            from_rapier_point(&hit.witness1)
        } else {
            centre + query.direction * query.radius
        };
        let mut normal = from_rapier_vec(&hit.normal1).try_normalize(1e-6).unwrap_or(-query.direction);
        if normal.dot(&query.direction) > 0.0 {
            normal = -normal;
        }

        Some(GroundHit { travel, point, normal, surface: self.surface(handle) })
    }
}

impl GroundProbe for RapierGround<'_> {
    fn probe(&self, query: &ProbeQuery) -> Option<GroundHit> {
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.exclude)
            .groups(InteractionGroups::new(Group::ALL, Group::from_bits_truncate(query.mask)));

        match query.shape {
            ProbeShape::Ray => {
                let ray = Ray::new(to_rapier_point(&query.origin), to_rapier_vec(&query.direction));
                let max_toi = query.max_travel + query.radius;
                let (handle, hit) =
                    self.query.cast_ray_and_get_normal(self.bodies, self.colliders, &ray, max_toi, true, filter)?;
                let normal = from_rapier_vec(&hit.normal).try_normalize(1e-6).unwrap_or(-query.direction);
                Some(GroundHit {
                    travel: hit.time_of_impact - query.radius,
                    point: from_rapier_point(&ray.point_at(hit.time_of_impact)),
                    normal,
                    surface: self.surface(handle),
                })
            }
            ProbeShape::Sphere { radius } => self.sweep(query, &Ball::new(radius), filter),
            ProbeShape::Capsule { radius, half_width } => self.sweep(query, &Capsule::new_x(half_width, radius), filter),
        }
    }
}

// ============================================
// ----- vessels ------------------------------
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriveInput {
    pub throttle: f32, // -1..1
    pub steer: f32,    // -1..1
    pub brake: f32,    // 0..1
    pub parking: bool,
}

pub struct WheelVessel {
    pub id: String,
    pub body: RigidBodyHandle,
    pub controllers: Vec<WheelController>,
    pub resources: ResourceTank,
    pub landed: LandedState,
    pub links: Vec<CrossPartLink>,
    pub config_mass: f32,
    pub half_extents: [f32; 3],
}

impl WheelVessel {
    fn apply_cross_links(&self, body: &mut dyn ForceBody) {
        for link in &self.links {
            let a = self
                .controllers
                .get(link.part_a)
                .and_then(|c| c.wheels().get(link.wheel_a))
                .and_then(|w| w.model());
            let b = self
                .controllers
                .get(link.part_b)
                .and_then(|c| c.wheels().get(link.wheel_b))
                .and_then(|w| w.model());
            let (Some(a), Some(b)) = (a, b) else { continue };
            if let Some(forces) = anti_roll::couple(a, b, link.coefficient) {
                body.add_force_at_point(forces.on_a.0, forces.on_a.1);
                body.add_force_at_point(forces.on_b.0, forces.on_b.1);
            }
        }
    }

    fn fold_landed(&mut self) {
        let mut landed = LandedState::default();
        for state in self.controllers.iter().map(WheelController::landed_state) {
            landed.landed |= state.landed;
            landed.splashed |= state.splashed;
            landed.on_body |= state.on_body;
            if landed.biome.is_none() {
                landed.biome = state.biome.clone();
            }
        }
        if landed != self.landed {
            debug!(vessel = %self.id, landed = landed.landed, splashed = landed.splashed, "vessel landed state");
        }
        self.landed = landed;
    }
}

// ============================================
// ----- world --------------------------------
// ============================================

pub struct PhysicsWorld {
    pub gravity: RVector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,
    pub vessels: HashMap<String, WheelVessel>,
    surfaces: HashMap<ColliderHandle, SurfaceTag>,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut surfaces = HashMap::new();

        // Ground slab, top face at y = 0
        let ground_rb = RigidBodyBuilder::fixed().translation(RVector::new(0.0, -1.0, 0.0)).build();
        let ground_handle = bodies.insert(ground_rb);
        let ground_collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build();
        let ground = colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);
        surfaces.insert(ground, SurfaceTag { biome: Some("Flats".to_string()), water: false });

        info!(bodies = bodies.len(), colliders = colliders.len(), "ground inserted");

        Self {
            gravity: RVector::new(0.0, -9.81, 0.0),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            vessels: HashMap::new(),
            surfaces,
        }
    }

    /// Water volume with its top face at `center.y`. Only wheels in water
    /// mode see it.
    pub fn add_water(&mut self, center: [f32; 3], half_extents: [f32; 3], biome: Option<String>) -> ColliderHandle {
        let [hx, hy, hz] = half_extents;
        let body = self
            .bodies
            .insert(RigidBodyBuilder::fixed().translation(RVector::new(center[0], center[1] - hy, center[2])).build());
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_WATER, GROUP_WATER))
            .build();
        let handle = self.colliders.insert_with_parent(collider, body, &mut self.bodies);
        self.surfaces.insert(handle, SurfaceTag { biome, water: true });
        handle
    }

    pub fn tag_surface(&mut self, collider: ColliderHandle, tag: SurfaceTag) {
        self.surfaces.insert(collider, tag);
    }

    pub fn vessel(&self, id: &str) -> Option<&WheelVessel> {
        self.vessels.get(id)
    }

    pub fn vessel_mut(&mut self, id: &str) -> Result<&mut WheelVessel> {
        self.vessels.get_mut(id).ok_or_else(|| WheelError::VesselNotFound(id.to_string()))
    }

    /// Chassis body plus one controller per part.
    pub fn spawn_vessel(&mut self, id: impl Into<String>, config: &VesselConfig, position: [f32; 3]) -> RigidBodyHandle {
        let id = id.into();
        if self.vessels.contains_key(&id) {
            self.despawn_vessel(&id);
        }

        let chassis = &config.chassis;
        let rb = RigidBodyBuilder::dynamic()
            .translation(RVector::new(position[0], chassis.spawn_height, position[2]))
            .linear_damping(0.05)
            .angular_damping(0.5)
            .ccd_enabled(true)
            .build();

        let [hx, hy, hz] = chassis.half_extents;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND | GROUP_CHASSIS))
            .mass(chassis.mass)
            .friction(0.6)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        let nodes: NamedNodes = config.parts.iter().flat_map(|p| p.wheels.iter().map(|w| w.mount.as_str())).collect();
        let controllers = config
            .parts
            .iter()
            .map(|part| {
                let mut controller = WheelController::from_part(part);
                controller.set_interactive(true);
                controller.setup(&nodes);
                controller
            })
            .collect();

        let mut resources = ResourceTank::new();
        for (name, amount) in &config.resources {
            resources.set(name.clone(), *amount);
        }

        info!(vessel = %id, parts = config.parts.len(), ?position, "spawned vessel");

        self.vessels.insert(
            id.clone(),
            WheelVessel {
                id,
                body: handle,
                controllers,
                resources,
                landed: LandedState::default(),
                links: config.links.clone(),
                config_mass: chassis.mass,
                half_extents: chassis.half_extents,
            },
        );
        handle
    }

    pub fn despawn_vessel(&mut self, id: &str) -> bool {
        let Some(vessel) = self.vessels.remove(id) else { return false };
        self.bodies.remove(
            vessel.body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
        info!(vessel = %id, "despawned vessel");
        true
    }

    /// Attach an extra submodule to one of a vessel's controllers.
    pub fn attach_submodule(
        &mut self,
        vessel: &str,
        controller: usize,
        module: Box<dyn WheelSubmodule>,
    ) -> Result<Option<SubmoduleId>> {
        let v = self.vessel_mut(vessel)?;
        let name = module.name();
        let target = v
            .controllers
            .get_mut(controller)
            .ok_or(WheelError::ControllerNotFound { controller, submodule: name })?;
        Ok(target.register(module))
    }

    pub fn apply_drive_input(&mut self, vessel: &str, input: DriveInput) -> Result<()> {
        let v = self.vessel_mut(vessel)?;
        for c in &mut v.controllers {
            for motor in c.each_mut::<MotorModule>() {
                motor.set_throttle(input.throttle);
            }
            for steering in c.each_mut::<SteeringModule>() {
                steering.set_input(input.steer);
            }
            for brakes in c.each_mut::<BrakesModule>() {
                brakes.set_input(input.brake);
                brakes.set_parking(input.parking);
            }
        }
        Ok(())
    }

    /// Toggle gear on every part that has a deployment module.
    pub fn toggle_deploy(&mut self, vessel: &str) -> Result<Vec<ToggleOutcome>> {
        let v = self.vessel_mut(vessel)?;
        let resources = &mut v.resources;
        Ok(v
            .controllers
            .iter_mut()
            .map(|c| toggle_deployment(c, &mut *resources))
            .filter(|o| *o != ToggleOutcome::NoDeployModule)
            .collect())
    }

    /// Repair every broken part; returns how many were repaired.
    pub fn repair(&mut self, vessel: &str) -> Result<usize> {
        let v = self.vessel_mut(vessel)?;
        Ok(v.controllers.iter_mut().map(WheelController::repair).filter(|repaired| *repaired).count())
    }

    // ============================================
    // ----- stepping -----------------------------
    // ============================================

    pub fn step(&mut self, dt: Real) {
        self.query_pipeline.update(&self.colliders);
        let gravity = self.gravity.norm();

        let vessel_landed: HashMap<RigidBodyHandle, (bool, bool)> = self
            .vessels
            .values()
            .map(|v| (v.body, (v.landed.landed, v.landed.splashed)))
            .collect();

        let mut impulses = Vec::with_capacity(self.vessels.len());
        for vessel in self.vessels.values_mut() {
            let Some(body) = self.bodies.get(vessel.body) else { continue };
            let mass = if body.mass() > 0.0 { body.mass() } else { vessel.config_mass };

            let probe = RapierGround {
                query: &self.query_pipeline,
                bodies: &self.bodies,
                colliders: &self.colliders,
                exclude: vessel.body,
                tags: &self.surfaces,
                vessel_landed: &vessel_landed,
            };
            let mut forces = ForceAccumulator::new(kinematics_of(body));

            for controller in vessel.controllers.iter_mut() {
                controller.tick(
                    dt,
                    mass,
                    gravity,
                    TickEnv { probe: &probe, body: Some(&mut forces), resources: &mut vessel.resources },
                );
            }
            vessel.apply_cross_links(&mut forces);
            vessel.fold_landed();
            impulses.push((vessel.body, forces.into_forces()));
        }

        for (handle, forces) in impulses {
            let Some(body) = self.bodies.get_mut(handle) else { continue };
            for (force, point) in forces {
                body.apply_impulse_at_point(to_rapier_vec(&(force * dt)), to_rapier_point(&point), true);
            }
        }

        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters { dt, ..IntegrationParameters::default() },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // Safety: keep bodies out of numerically broken states
        for (_, body) in self.bodies.iter_mut() {
            let pos = *body.translation();
            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.x.abs() > WORLD_LIMIT
                || pos.y.abs() > WORLD_LIMIT
                || pos.z.abs() > WORLD_LIMIT;
            if bad {
                warn!(?pos, "resetting runaway body");
                body.set_translation(RVector::new(0.0, 2.0, 0.0), true);
                body.set_linvel(RVector::zeros(), true);
                body.set_angvel(RVector::zeros(), true);
            }
        }
    }

    /// Cosmetic per-frame hooks (deploy animation progress, track scroll).
    pub fn frame_update(&mut self, dt: f32) {
        for vessel in self.vessels.values_mut() {
            for controller in vessel.controllers.iter_mut() {
                controller.frame_update(dt);
            }
        }
    }

    // ============================================
    // ----- telemetry ----------------------------
    // ============================================

    pub fn telemetry(&self, id: &str) -> Option<VesselTelemetry> {
        let vessel = self.vessels.get(id)?;
        let body = self.bodies.get(vessel.body)?;
        let pos = body.translation();
        let rot = body.rotation();
        Some(VesselTelemetry {
            id: vessel.id.clone(),
            position: [pos.x, pos.y, pos.z],
            rotation: [rot.i, rot.j, rot.k, rot.w],
            speed: body.linvel().norm(),
            landed: vessel.landed.clone(),
            resources: vessel.resources.iter().map(|(k, v)| (k.to_string(), v)).collect(),
            controllers: vessel.controllers.iter().map(ControllerTelemetry::of).collect(),
        })
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}
