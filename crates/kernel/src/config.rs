use serde::{Deserialize, Serialize};

/// Simulation tuning: tick period, tool strengths, build limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed tick rate of the simulation loop, independent of rendering.
    pub tick_hz: f64,
    /// Force applied by the interactive force tool.
    pub force_magnitude: f64,
    /// Drag coefficient of the interactive friction tool.
    pub friction_coefficient: f64,
    /// Scale applied to the friction tool's drag.
    pub friction_magnitude: f64,
    /// Largest radius the build planner accepts.
    pub max_gear_radius: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            force_magnitude: 100.0,
            friction_coefficient: 1.0,
            friction_magnitude: 1.0,
            max_gear_radius: 8,
        }
    }
}

impl SimConfig {
    /// Seconds per tick.
    pub fn tick_period(&self) -> f64 {
        1.0 / self.tick_hz
    }
}
