// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component A: domain model & queries.
//!
//! Unlike the teacher crate's baked, versioned `Database`, the catalog here is
//! mutable at runtime: materials, machines, recipes, and blueprint templates are
//! created and edited by the user and cascaded on deletion (spec.md §3
//! "Ownership & lifecycle").

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blueprint::BlueprintTemplate;
use crate::ids::{BlueprintId, Id, MachineId, MaterialId, RecipeId};

/// Errors produced by fallible, user-driven mutations of the catalog (spec.md §7
/// `UserInputInvalid` / `BlueprintCollision`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("material {0} is not in the database")]
    UnknownMaterial(MaterialId),
    #[error("machine {0} is not in the database")]
    UnknownMachine(MachineId),
    #[error("recipe {0} is not in the database")]
    UnknownRecipe(RecipeId),
    #[error("blueprint {0} is not in the database")]
    UnknownBlueprint(BlueprintId),
    #[error("name must not be empty")]
    EmptyName,
    #[error("processing time must be greater than zero")]
    InvalidProcessingTime,
    #[error("recipe must have between 1 and {max} inputs, got {actual}")]
    InvalidInputCount { max: u32, actual: usize },
    #[error("recipe must have exactly {expected} outputs, got {actual}")]
    InvalidOutputCount { expected: u32, actual: usize },
    #[error("blueprint {0} cannot be deleted while it is used by a placed instance")]
    BlueprintInUse(BlueprintId),
    #[error("blueprint {0} cannot contain itself, directly or transitively")]
    BlueprintSelfNested(BlueprintId),
}

/// A mutually exclusive role a [`Material`] can play, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaterialRole {
    /// No special role.
    None,
    /// Can be burned for heat by a heating device.
    Fuel {
        /// Heat value in `P` (game heat unit).
        fuel_value: f32,
    },
    /// Can be spread by a nursery to grow plants.
    Fertilizer {
        /// Nutrient value `V` delivered per unit consumed.
        nutrient_value: f32,
        /// Maximum fertility rate this fertilizer can sustain, `V/s`.
        max_fertility: f32,
    },
    /// Can be grown by a nursery given a compatible fertilizer.
    Plant {
        /// Nutrient `V` required to grow one unit.
        required_nutrient: f32,
    },
}

/// A material in the catalog: an item that flows across belts and through machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub buy_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub role: MaterialRole,
    /// Items per storage slot. Always >= 1.
    pub stack_size: u32,
}

impl Material {
    pub fn fuel_value(&self) -> Option<f32> {
        match self.role {
            MaterialRole::Fuel { fuel_value } => Some(fuel_value),
            _ => None,
        }
    }

    pub fn fertilizer(&self) -> Option<(f32, f32)> {
        match self.role {
            MaterialRole::Fertilizer {
                nutrient_value,
                max_fertility,
            } => Some((nutrient_value, max_fertility)),
            _ => None,
        }
    }

    pub fn plant_required_nutrient(&self) -> Option<f32> {
        match self.role {
            MaterialRole::Plant { required_nutrient } => Some(required_nutrient),
            _ => None,
        }
    }
}

/// An input or output entry of a [`Recipe`]: a material and a quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAmount {
    pub material: MaterialId,
    /// Number of items produced/consumed per recipe run.
    pub items: f32,
}

/// A recipe that a [`Machine`] can run, converting `inputs` into `outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    /// The machine this recipe belongs to. `None` if the owning machine was deleted
    /// (spec.md §3: "machine removal blanks recipe.machineId").
    pub machine: Option<MachineId>,
    /// Time in seconds to complete one run at 100% speed. Always > 0.
    pub processing_time_sec: f32,
    pub inputs: Vec<ItemAmount>,
    pub outputs: Vec<ItemAmount>,
}

/// Dimensions of a machine's footprint on a heating device's tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub length: u32,
}

/// Extra catalog fields present only on standard machines that require a furnace
/// (i.e. can be placed as a topper on a heating device).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FurnaceRequirement {
    /// Heat consumed, in `P` per second, at 100% machine efficiency skill.
    pub heat_consumption_p: f32,
    pub footprint: Footprint,
}

/// Kind-specific catalog fields for a [`Machine`] (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MachineKind {
    /// Runs a [`Recipe`]; optionally requires furnace heat, in which case it can be
    /// placed as a topper on a heating device.
    Standard {
        requires_furnace: Option<FurnaceRequirement>,
    },
    /// Provides heat to its toppers by burning fuel.
    HeatingDevice {
        base_heat_consumption_p: f32,
        heating_area: Footprint,
    },
    /// A multi-material buffer.
    Storage { storage_slots: u32 },
    /// Grows a plant from a fertilizer.
    Nursery,
}

/// A machine definition in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub inputs: u32,
    pub outputs: u32,
    pub kind: MachineKind,
}

/// The mutable catalog of materials, machines, recipes, and blueprint templates.
///
/// This is the crate's "component A" domain model. It owns no workspace/placement
/// data (that lives in [`crate::build::Build`]); it is purely the editable reference
/// data that placed machines point into by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    materials: BTreeMap<MaterialId, Material>,
    machines: BTreeMap<MachineId, Machine>,
    recipes: BTreeMap<RecipeId, Recipe>,
    blueprints: BTreeMap<BlueprintId, BlueprintTemplate>,
}

impl Database {
    pub fn new() -> Self {
        Default::default()
    }

    pub(crate) fn materials_map(&self) -> &BTreeMap<MaterialId, Material> {
        &self.materials
    }

    pub(crate) fn machines_map(&self) -> &BTreeMap<MachineId, Machine> {
        &self.machines
    }

    pub(crate) fn recipes_map(&self) -> &BTreeMap<RecipeId, Recipe> {
        &self.recipes
    }

    pub(crate) fn blueprints_map(&self) -> &BTreeMap<BlueprintId, BlueprintTemplate> {
        &self.blueprints
    }

    /// Look up a catalog entry by its typed id.
    pub fn get<T: Id>(&self, id: T) -> Option<&<T as Id>::Info> {
        id.fetch(self)
    }

    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values()
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &BlueprintTemplate> {
        self.blueprints.values()
    }

    pub fn blueprints_mut(&mut self) -> &mut BTreeMap<BlueprintId, BlueprintTemplate> {
        &mut self.blueprints
    }

    /// Get a recipe's owning material id from a port, resolving to the database's
    /// copy of the recipe. Used by [`crate::database::Database::get_material_id_from_port`]
    /// callers elsewhere in the engine.
    pub fn recipe_machine(&self, recipe_id: RecipeId) -> Option<MachineId> {
        self.recipes.get(&recipe_id).and_then(|r| r.machine)
    }

    /// Insert or replace a material. Returns a validation error if `name` is empty
    /// or `stack_size` is zero.
    pub fn insert_material(&mut self, material: Material) -> Result<(), CatalogError> {
        if material.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        self.materials.insert(material.id, material);
        Ok(())
    }

    /// Remove a material, cascading: strips it from every recipe's inputs/outputs.
    pub fn remove_material(&mut self, id: MaterialId) -> Option<Material> {
        let removed = self.materials.remove(&id)?;
        for recipe in self.recipes.values_mut() {
            let before_in = recipe.inputs.len();
            recipe.inputs.retain(|ia| ia.material != id);
            let before_out = recipe.outputs.len();
            recipe.outputs.retain(|ia| ia.material != id);
            if recipe.inputs.len() != before_in || recipe.outputs.len() != before_out {
                warn!(
                    "material {id} removed; stripped from recipe {}",
                    recipe.id
                );
            }
        }
        Some(removed)
    }

    pub fn insert_machine(&mut self, machine: Machine) -> Result<(), CatalogError> {
        if machine.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        self.machines.insert(machine.id, machine);
        Ok(())
    }

    /// Remove a machine, cascading: blanks `recipe.machine` on every recipe that
    /// belonged to it (spec.md §3).
    pub fn remove_machine(&mut self, id: MachineId) -> Option<Machine> {
        let removed = self.machines.remove(&id)?;
        for recipe in self.recipes.values_mut() {
            if recipe.machine == Some(id) {
                recipe.machine = None;
                warn!("machine {id} removed; blanked owner of recipe {}", recipe.id);
            }
        }
        Some(removed)
    }

    /// Insert or replace a recipe, validating its input/output counts against its
    /// machine (when the machine is known) per spec.md §3's Recipe invariants.
    pub fn insert_recipe(&mut self, recipe: Recipe) -> Result<(), CatalogError> {
        if recipe.processing_time_sec <= 0.0 {
            return Err(CatalogError::InvalidProcessingTime);
        }
        if let Some(machine_id) = recipe.machine {
            if let Some(machine) = self.machines.get(&machine_id) {
                if recipe.outputs.len() != machine.outputs as usize {
                    return Err(CatalogError::InvalidOutputCount {
                        expected: machine.outputs,
                        actual: recipe.outputs.len(),
                    });
                }
                let max_inputs = machine.inputs;
                if recipe.inputs.is_empty() || recipe.inputs.len() > max_inputs as usize {
                    return Err(CatalogError::InvalidInputCount {
                        max: max_inputs,
                        actual: recipe.inputs.len(),
                    });
                }
            }
        }
        self.recipes.insert(recipe.id, recipe);
        Ok(())
    }

    pub fn remove_recipe(&mut self, id: RecipeId) -> Option<Recipe> {
        self.recipes.remove(&id)
    }

    /// Insert or replace a blueprint template, refusing if it would contain itself
    /// transitively (spec.md §4.J "Nested editing").
    pub fn insert_blueprint(&mut self, template: BlueprintTemplate) -> Result<(), CatalogError> {
        if template.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if self.blueprint_contains(&template, template.id) {
            return Err(CatalogError::BlueprintSelfNested(template.id));
        }
        self.blueprints.insert(template.id, template);
        Ok(())
    }

    /// Remove a blueprint template. Refused if `in_use_by_instance` (a placed
    /// `blueprint_instance` referencing it somewhere in the active workspaces) or if
    /// any other template nests it.
    pub fn remove_blueprint(
        &mut self,
        id: BlueprintId,
        in_use_by_instance: bool,
    ) -> Result<BlueprintTemplate, CatalogError> {
        if in_use_by_instance {
            return Err(CatalogError::BlueprintInUse(id));
        }
        if self.blueprints.values().any(|t| t.references_blueprint(id)) {
            return Err(CatalogError::BlueprintInUse(id));
        }
        self.blueprints
            .remove(&id)
            .ok_or(CatalogError::UnknownBlueprint(id))
    }

    /// True if `template` (considered as the definition of `candidate_id`, which may
    /// not yet be in the catalog) transitively nests `candidate_id` via any other
    /// template reachable from it, or references `candidate_id` directly.
    fn blueprint_contains(&self, template: &BlueprintTemplate, candidate_id: BlueprintId) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.blueprint_contains_inner(template, candidate_id, &mut seen)
    }

    fn blueprint_contains_inner(
        &self,
        template: &BlueprintTemplate,
        candidate_id: BlueprintId,
        seen: &mut std::collections::HashSet<BlueprintId>,
    ) -> bool {
        for machine in &template.body.machines {
            if let crate::build::PlacedMachineKind::BlueprintInstance { blueprint_id, .. } = machine.kind {
                if blueprint_id == candidate_id {
                    return true;
                }
                if !seen.insert(blueprint_id) {
                    continue;
                }
                if let Some(nested) = self.blueprints.get(&blueprint_id) {
                    if self.blueprint_contains_inner(nested, candidate_id, seen) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(id: &str) -> Material {
        Material {
            id: MaterialId::from(id),
            name: id.to_owned(),
            buy_price: None,
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        }
    }

    #[test]
    fn remove_material_cascades_to_recipes() {
        let mut db = Database::new();
        db.insert_material(material("ore")).unwrap();
        db.insert_material(material("ingot")).unwrap();
        db.insert_machine(Machine {
            id: MachineId::from("smelter"),
            name: "Smelter".into(),
            inputs: 1,
            outputs: 1,
            kind: MachineKind::Standard {
                requires_furnace: None,
            },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: RecipeId::from("smelt"),
            name: "Smelt".into(),
            machine: Some(MachineId::from("smelter")),
            processing_time_sec: 6.0,
            inputs: vec![ItemAmount {
                material: MaterialId::from("ore"),
                items: 1.0,
            }],
            outputs: vec![ItemAmount {
                material: MaterialId::from("ingot"),
                items: 1.0,
            }],
        })
        .unwrap();

        db.remove_material(MaterialId::from("ore"));
        let recipe = db.get(RecipeId::from("smelt")).unwrap();
        assert!(recipe.inputs.is_empty());
    }

    #[test]
    fn remove_machine_blanks_recipe_owner() {
        let mut db = Database::new();
        db.insert_machine(Machine {
            id: MachineId::from("smelter"),
            name: "Smelter".into(),
            inputs: 1,
            outputs: 1,
            kind: MachineKind::Standard {
                requires_furnace: None,
            },
        })
        .unwrap();
        db.insert_material(material("ore")).unwrap();
        db.insert_material(material("ingot")).unwrap();
        db.insert_recipe(Recipe {
            id: RecipeId::from("smelt"),
            name: "Smelt".into(),
            machine: Some(MachineId::from("smelter")),
            processing_time_sec: 6.0,
            inputs: vec![ItemAmount {
                material: MaterialId::from("ore"),
                items: 1.0,
            }],
            outputs: vec![ItemAmount {
                material: MaterialId::from("ingot"),
                items: 1.0,
            }],
        })
        .unwrap();

        db.remove_machine(MachineId::from("smelter"));
        let recipe = db.get(RecipeId::from("smelt")).unwrap();
        assert_eq!(recipe.machine, None);
    }

    #[test]
    fn invalid_recipe_output_count_rejected() {
        let mut db = Database::new();
        db.insert_machine(Machine {
            id: MachineId::from("m"),
            name: "M".into(),
            inputs: 1,
            outputs: 2,
            kind: MachineKind::Standard {
                requires_furnace: None,
            },
        })
        .unwrap();
        db.insert_material(material("a")).unwrap();
        let err = db
            .insert_recipe(Recipe {
                id: RecipeId::from("r"),
                name: "R".into(),
                machine: Some(MachineId::from("m")),
                processing_time_sec: 1.0,
                inputs: vec![ItemAmount {
                    material: MaterialId::from("a"),
                    items: 1.0,
                }],
                outputs: vec![ItemAmount {
                    material: MaterialId::from("a"),
                    items: 1.0,
                }],
            })
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::InvalidOutputCount {
                expected: 2,
                actual: 1
            }
        );
    }
}
