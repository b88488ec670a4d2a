// ==============================================================================
// telemetry.rs - SERIALIZABLE WHEEL / CONTROLLER SNAPSHOTS (SERVER -> CLIENT)
// ------------------------------------------------------------------------------
// Read-only views over controllers for the websocket snapshot and for
// debugging. Nothing here feeds back into the simulation.
// ==============================================================================

use serde::Serialize;

use crate::controller::WheelController;
use crate::wheel::{LandedState, Wheel, WheelState};

#[derive(Debug, Clone, Serialize)]
pub struct WheelTelemetry {
    pub index: usize,
    pub mount: String,
    pub created: bool,
    pub grounded: bool,
    pub compression: f32,
    pub length: f32,
    pub rpm: f32,
    pub steer_angle: f32,
    pub motor_torque: f32,
    pub brake_torque: f32,
    pub spring: f32,
    pub damper: f32,
    pub spring_force: f32,
    pub longitudinal_force: f32,
    pub lateral_force: f32,
    pub longitudinal_slip: f32,
    pub lateral_slip: f32,
    pub contact_point: Option<[f32; 3]>,
}

impl WheelTelemetry {
    pub fn of(index: usize, wheel: &Wheel) -> Self {
        let mut t = WheelTelemetry {
            index,
            mount: wheel.config.mount.clone(),
            created: wheel.is_created(),
            grounded: false,
            compression: 0.0,
            length: wheel.config.length,
            rpm: 0.0,
            steer_angle: 0.0,
            motor_torque: 0.0,
            brake_torque: 0.0,
            spring: 0.0,
            damper: 0.0,
            spring_force: 0.0,
            longitudinal_force: 0.0,
            lateral_force: 0.0,
            longitudinal_slip: 0.0,
            lateral_slip: 0.0,
            contact_point: None,
        };

        if let Some(m) = wheel.model() {
            let rt = m.runtime();
            t.grounded = rt.grounded;
            t.compression = rt.compression;
            t.length = m.length();
            t.rpm = rt.rpm();
            t.steer_angle = rt.steer_angle;
            t.motor_torque = rt.motor_torque;
            t.brake_torque = rt.brake_torque;
            t.spring = rt.spring;
            t.damper = rt.damper;
            t.spring_force = rt.spring_force;
            t.longitudinal_force = rt.longitudinal_force;
            t.lateral_force = rt.lateral_force;
            t.longitudinal_slip = rt.longitudinal_slip;
            t.lateral_slip = rt.lateral_slip;
            if rt.grounded {
                let p = m.contact_point();
                t.contact_point = Some([p.x, p.y, p.z]);
            }
        }
        t
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerTelemetry {
    pub name: String,
    pub state: WheelState,
    pub landed: LandedState,
    pub repair: f32,
    pub submodules: Vec<&'static str>,
    pub wheels: Vec<WheelTelemetry>,
}

impl ControllerTelemetry {
    pub fn of(controller: &WheelController) -> Self {
        ControllerTelemetry {
            name: controller.name().to_string(),
            state: controller.state(),
            landed: controller.landed_state().clone(),
            repair: controller.params().repair.value(),
            submodules: controller.submodule_names(),
            wheels: controller
                .wheels()
                .iter()
                .enumerate()
                .map(|(i, w)| WheelTelemetry::of(i, w))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VesselTelemetry {
    pub id: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion (i, j, k, w)
    pub speed: f32,
    pub landed: LandedState,
    pub resources: Vec<(String, f64)>,
    pub controllers: Vec<ControllerTelemetry>,
}
