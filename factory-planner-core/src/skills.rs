// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component B: skill modifiers.
//!
//! `Skills` is the crate's configuration surface (see SPEC_FULL.md §2): a plain
//! `Copy` struct of integer point counts, passed by reference into every
//! calculation entry point rather than stored as global state.

use serde::{Deserialize, Serialize};

/// Skill point levels, each in `0..=10`, per spec.md §4.B.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Skills {
    pub conveyor_speed: u8,
    pub throwing_speed: u8,
    pub machine_efficiency: u8,
    pub alchemy_efficiency: u8,
    pub fuel_efficiency: u8,
    pub fertilizer_efficiency: u8,
    pub shop_profit: u8,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            conveyor_speed: 0,
            throwing_speed: 0,
            machine_efficiency: 0,
            alchemy_efficiency: 0,
            fuel_efficiency: 0,
            fertilizer_efficiency: 0,
            shop_profit: 0,
        }
    }
}

impl Skills {
    /// Belt speed cap, items/min: `60 + 15*points`.
    pub fn belt_speed(&self) -> f32 {
        60.0 + 15.0 * self.conveyor_speed as f32
    }

    /// Non-belt throwing-handling cap, items/min: `60 + 15*points`.
    pub fn throwing_speed(&self) -> f32 {
        60.0 + 15.0 * self.throwing_speed as f32
    }

    /// Multiplier applied to recipe processing time: `max(0.05, 1 - 0.25*points)`.
    pub fn recipe_time_multiplier(&self) -> f32 {
        (1.0 - 0.25 * self.machine_efficiency as f32).max(0.05)
    }

    /// Multiplier applied to base fuel consumption: `1 + 0.25*points`.
    pub fn fuel_consumption_multiplier(&self) -> f32 {
        1.0 + 0.25 * self.machine_efficiency as f32
    }

    /// Effective processing time of a recipe with base time `base_time_sec`.
    pub fn effective_time(&self, base_time_sec: f32) -> f32 {
        base_time_sec * self.recipe_time_multiplier()
    }

    /// Total heat `P`/s consumed for a base heat requirement, after the machine
    /// efficiency skill's fuel-consumption multiplier.
    pub fn fuel_consumption(&self, base_heat_p: f32) -> f32 {
        base_heat_p * self.fuel_consumption_multiplier()
    }

    /// Multiplier applied to extractor output: `1 + 0.03*points`.
    pub fn alchemy_multiplier(&self) -> f32 {
        1.0 + 0.03 * self.alchemy_efficiency as f32
    }

    /// Multiplier applied to effective fuel heat value: `1 + 0.10*points`.
    pub fn fuel_value_multiplier(&self) -> f32 {
        1.0 + 0.10 * self.fuel_efficiency as f32
    }

    /// Effective heat value of a fuel whose catalog `fuel_value` is given.
    pub fn effective_fuel_value(&self, fuel_value: f32) -> f32 {
        fuel_value * self.fuel_value_multiplier()
    }

    /// Multiplier applied to fertilizer nutrient value (not max fertility):
    /// `1 + 0.10*points`.
    pub fn fertilizer_value_multiplier(&self) -> f32 {
        1.0 + 0.10 * self.fertilizer_efficiency as f32
    }

    /// Multiplier applied to sale prices: `1 + 0.03*points`.
    pub fn shop_profit_multiplier(&self) -> f32 {
        1.0 + 0.03 * self.shop_profit as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_skills_are_identity() {
        let skills = Skills::default();
        assert_eq!(skills.belt_speed(), 60.0);
        assert_eq!(skills.recipe_time_multiplier(), 1.0);
        assert_eq!(skills.fuel_consumption_multiplier(), 1.0);
    }

    #[test]
    fn machine_efficiency_floors_at_five_percent() {
        let skills = Skills {
            machine_efficiency: 10,
            ..Default::default()
        };
        assert_eq!(skills.recipe_time_multiplier(), 0.05);
    }

    #[test]
    fn belt_speed_scales_with_points() {
        let skills = Skills {
            conveyor_speed: 4,
            ..Default::default()
        };
        assert_eq!(skills.belt_speed(), 120.0);
    }
}
