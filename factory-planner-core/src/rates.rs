// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component D: per-port rate primitives.
//!
//! These compute a port's *nominal* rate: a standard machine's recipe
//! throughput, a purchasing portal's belt-capped supply, a heating device's
//! aggregated topper demand, and so on, all before the distribution (E) and
//! backpressure (F) passes reconcile supply against demand. Storage ports
//! delegate to [`crate::storage`] since their rate depends on simulated
//! inventory state, not just the catalog.

use log::warn;

use crate::build::PlacedMachineKind;
use crate::database::{Database, MachineKind};
use crate::ids::{MaterialId, Port};
use crate::skills::Skills;
use crate::tree::{FlatId, GraphView};

/// A recipe counts as an "extractor" — eligible for the alchemy efficiency
/// bonus — when it has no inputs (raw material generation).
fn is_extractor(recipe: &crate::database::Recipe) -> bool {
    recipe.inputs.is_empty()
}

/// The nominal output rate (items/min) of `port` on `id`, before distribution
/// or backpressure are applied.
pub fn port_output_rate(view: &impl GraphView, database: &Database, skills: &Skills, id: &FlatId, port: Port) -> f32 {
    let Some(fm) = view.machine(id) else {
        return 0.0;
    };
    match &fm.kind {
        PlacedMachineKind::PurchasingPortal { .. } => skills.belt_speed(),
        PlacedMachineKind::Nursery { plant_id, fertilizer_id } => {
            nursery_output_rate(view, database, skills, id, *plant_id, *fertilizer_id, fm.count)
        }
        PlacedMachineKind::Machine { machine_id, recipe_id, toppers, .. } => {
            let Some(machine) = database.get(*machine_id) else {
                return 0.0;
            };
            match machine.kind {
                MachineKind::Storage { .. } => {
                    crate::storage::storage_port_output_rate(view, database, skills, id, &fm, port)
                }
                MachineKind::HeatingDevice { .. } => {
                    heating_grouped_rate(database, skills, toppers, port, fm.count, false)
                }
                MachineKind::Standard { .. } | MachineKind::Nursery => {
                    let Port::Index(idx) = port else { return 0.0 };
                    let Some(recipe_id) = recipe_id else { return 0.0 };
                    let Some(recipe) = database.get(*recipe_id) else { return 0.0 };
                    let Some(item) = recipe.outputs.get(idx as usize) else { return 0.0 };
                    let mut rate = item.items / skills.effective_time(recipe.processing_time_sec) * 60.0;
                    if is_extractor(recipe) {
                        rate *= skills.alchemy_multiplier();
                    }
                    rate * fm.count as f32
                }
            }
        }
        PlacedMachineKind::BlueprintInstance { .. } => 0.0,
    }
}

/// The nominal input demand (items/min) of `port` on `id`: how much the
/// machine would consume if fully supplied.
pub fn port_input_demand(view: &impl GraphView, database: &Database, skills: &Skills, id: &FlatId, port: Port) -> f32 {
    let Some(fm) = view.machine(id) else {
        return 0.0;
    };
    match &fm.kind {
        PlacedMachineKind::PurchasingPortal { .. } => 0.0,
        PlacedMachineKind::Nursery { fertilizer_id, .. } => {
            nursery_input_demand(database, skills, *fertilizer_id, fm.count)
        }
        PlacedMachineKind::Machine { machine_id, recipe_id, toppers, .. } => {
            let Some(machine) = database.get(*machine_id) else {
                return 0.0;
            };
            match machine.kind {
                MachineKind::Storage { .. } => skills.belt_speed(),
                MachineKind::HeatingDevice { base_heat_consumption_p, .. } => match port {
                    Port::Fuel => fuel_demand(view, database, skills, id, base_heat_consumption_p, toppers, fm.count),
                    _ => heating_grouped_rate(database, skills, toppers, port, fm.count, true),
                },
                MachineKind::Standard | MachineKind::Nursery => {
                    let Port::Index(idx) = port else { return 0.0 };
                    let Some(recipe_id) = recipe_id else { return 0.0 };
                    let Some(recipe) = database.get(*recipe_id) else { return 0.0 };
                    let Some(item) = recipe.inputs.get(idx as usize) else { return 0.0 };
                    item.items / skills.effective_time(recipe.processing_time_sec) * 60.0 * fm.count as f32
                }
            }
        }
        PlacedMachineKind::BlueprintInstance { .. } => 0.0,
    }
}

/// Aggregate demand or supply across every topper's recipe for `material`'s
/// grouped port.
fn heating_grouped_rate(
    database: &Database,
    skills: &Skills,
    toppers: &[crate::build::Topper],
    port: Port,
    count: u32,
    is_input: bool,
) -> f32 {
    let material = match port {
        Port::GroupedIn(m) if is_input => m,
        Port::GroupedOut(m) if !is_input => m,
        _ => return 0.0,
    };
    let mut total = 0.0;
    for topper in toppers {
        let Some(recipe_id) = topper.recipe_id else { continue };
        let Some(recipe) = database.get(recipe_id) else { continue };
        let items = if is_input {
            recipe.inputs.iter().find(|i| i.material == material)
        } else {
            recipe.outputs.iter().find(|i| i.material == material)
        };
        let Some(items) = items else { continue };
        let mut rate = items.items / skills.effective_time(recipe.processing_time_sec) * 60.0;
        if !is_input && is_extractor(recipe) {
            rate *= skills.alchemy_multiplier();
        }
        total += rate;
    }
    total * count as f32
}

/// Fuel demand for a heating device: total heat required divided by the
/// effective heat value of whatever material feeds its fuel port.
fn fuel_demand(
    view: &impl GraphView,
    database: &Database,
    skills: &Skills,
    id: &FlatId,
    base_heat_consumption_p: f32,
    toppers: &[crate::build::Topper],
    count: u32,
) -> f32 {
    let mut heat = base_heat_consumption_p;
    for topper in toppers {
        if let Some(requirement) = database
            .get(topper.machine_id)
            .and_then(|m| match m.kind {
                MachineKind::Standard { requires_furnace } => requires_furnace,
                _ => None,
            })
        {
            heat += requirement.heat_consumption_p;
        }
    }
    let heat = skills.fuel_consumption(heat) * count as f32;

    let Some(material) = incoming_fuel_material(view, database, id) else {
        warn!("heating device {id} has no fuel source connected; treating demand as 0");
        return 0.0;
    };
    let Some(fuel_value) = database.get(material).and_then(|m| m.fuel_value()) else {
        warn!("material {material} connected to a fuel port has no fuel value");
        return 0.0;
    };
    // heat is P/s; fuel demand is reported in items/min (spec.md §4.D: `60*heatP/fuelValue`).
    heat * 60.0 / skills.effective_fuel_value(fuel_value)
}

fn incoming_fuel_material(view: &impl GraphView, database: &Database, id: &FlatId) -> Option<MaterialId> {
    view.connections_to(id, Port::Fuel)
        .into_iter()
        .find_map(|c| material_id_for_output(view, database, &c.from, c.from_port))
}

fn nursery_output_rate(
    view: &impl GraphView,
    database: &Database,
    _skills: &Skills,
    id: &FlatId,
    plant_id: Option<MaterialId>,
    fertilizer_id: Option<MaterialId>,
    count: u32,
) -> f32 {
    let Some(plant_id) = plant_id else { return 0.0 };
    let Some(required_nutrient) = database.get(plant_id).and_then(|m| m.plant_required_nutrient()) else {
        return 0.0;
    };
    let fertilizer_id =
        fertilizer_id.or_else(|| incoming_nursery_material(view, database, id));
    let Some(fertilizer_id) = fertilizer_id else { return 0.0 };
    let Some((_, max_fertility)) = database.get(fertilizer_id).and_then(|m| m.fertilizer()) else {
        return 0.0;
    };
    // spec.md §4.D: growthTime = plantRequiredNutrient / fertilizerMaxFertility; rate = 60/growthTime*count.
    60.0 * max_fertility / required_nutrient * count as f32
}

fn nursery_input_demand(database: &Database, skills: &Skills, fertilizer_id: Option<MaterialId>, count: u32) -> f32 {
    let Some(fertilizer_id) = fertilizer_id else { return 0.0 };
    let Some((nutrient_value, max_fertility)) = database.get(fertilizer_id).and_then(|m| m.fertilizer()) else {
        return 0.0;
    };
    let nutrient_value = nutrient_value * skills.fertilizer_value_multiplier();
    (max_fertility * 60.0 / nutrient_value) * count as f32
}

fn incoming_nursery_material(view: &impl GraphView, database: &Database, id: &FlatId) -> Option<MaterialId> {
    view.connections_to(id, Port::Index(0))
        .into_iter()
        .find_map(|c| material_id_for_output(view, database, &c.from, c.from_port))
}

/// The material carried by an output port, independent of rate.
pub fn material_id_for_output(view: &impl GraphView, database: &Database, id: &FlatId, port: Port) -> Option<MaterialId> {
    let fm = view.machine(id)?;
    match &fm.kind {
        PlacedMachineKind::PurchasingPortal { material_id } => Some(*material_id),
        PlacedMachineKind::Nursery { plant_id, .. } => *plant_id,
        PlacedMachineKind::Machine { machine_id, recipe_id, .. } => {
            let machine = database.get(*machine_id)?;
            match machine.kind {
                MachineKind::Storage { .. } => {
                    crate::storage::material_for_storage_output(view, database, id, &fm, port)
                }
                _ => match port {
                    Port::GroupedOut(material) => Some(material),
                    Port::Index(idx) => {
                        let recipe = database.get((*recipe_id)?)?;
                        recipe.outputs.get(idx as usize).map(|ia| ia.material)
                    }
                    _ => None,
                },
            }
        }
        PlacedMachineKind::BlueprintInstance { .. } => None,
    }
}

/// The material a given input port accepts, independent of rate.
pub fn material_id_for_input(view: &impl GraphView, database: &Database, id: &FlatId, port: Port) -> Option<MaterialId> {
    let fm = view.machine(id)?;
    match &fm.kind {
        PlacedMachineKind::PurchasingPortal { .. } => None,
        PlacedMachineKind::Nursery { fertilizer_id, .. } => *fertilizer_id,
        PlacedMachineKind::Machine { recipe_id, .. } => match port {
            Port::GroupedIn(material) => Some(material),
            Port::Fuel => None,
            Port::Index(idx) => {
                let recipe = database.get((*recipe_id)?)?;
                recipe.inputs.get(idx as usize).map(|ia| ia.material)
            }
            Port::LegacyTopper { .. } => None,
        },
        PlacedMachineKind::BlueprintInstance { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{Build, PlacedMachine};
    use crate::database::{ItemAmount, Machine, Material, MaterialRole, Recipe};
    use crate::tree::FlatTree;
    use uuid::Uuid;

    fn setup() -> (Database, Uuid, Build) {
        let mut db = Database::new();
        db.insert_material(Material {
            id: MaterialId::from("ore"),
            name: "Ore".into(),
            buy_price: None,
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        db.insert_material(Material {
            id: MaterialId::from("ingot"),
            name: "Ingot".into(),
            buy_price: None,
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        db.insert_machine(Machine {
            id: crate::ids::MachineId::from("smelter"),
            name: "Smelter".into(),
            inputs: 1,
            outputs: 1,
            kind: MachineKind::Standard { requires_furnace: None },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: crate::ids::RecipeId::from("smelt"),
            name: "Smelt".into(),
            machine: Some(crate::ids::MachineId::from("smelter")),
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

        let mut build = Build::new();
        let pm = PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::Machine {
                machine_id: crate::ids::MachineId::from("smelter"),
                recipe_id: Some(crate::ids::RecipeId::from("smelt")),
                storage_slots: None,
                manual_inventories: vec![],
                toppers: vec![],
                preview_fuel_id: None,
            },
        };
        let id = pm.id;
        build.placed_machines.insert(id, pm);
        (db, id, build)
    }

    #[test]
    fn standard_output_rate_matches_recipe_throughput() {
        let (db, id, build) = setup();
        let tree = FlatTree::build(&build, &db);
        let skills = Skills::default();
        let rate = port_output_rate(&tree, &db, &skills, &FlatId::TopLevel(id), Port::Index(0));
        assert!((rate - 10.0).abs() < 1e-6);
    }

    #[test]
    fn machine_efficiency_scales_output() {
        let (db, id, build) = setup();
        let tree = FlatTree::build(&build, &db);
        let skills = Skills {
            machine_efficiency: 2,
            ..Default::default()
        };
        let rate = port_output_rate(&tree, &db, &skills, &FlatId::TopLevel(id), Port::Index(0));
        // recipe_time_multiplier = 1 - 0.5 = 0.5, so throughput doubles.
        assert!((rate - 20.0).abs() < 1e-6);
    }

    /// spec.md §8 S4: a heating device with two toppers aggregates their heat
    /// into fuel demand, and exposes grouped per-material input/output rates.
    #[test]
    fn s4_heating_device_aggregates_topper_heat_and_grouped_rates() {
        use crate::build::Topper;
        use crate::database::{Footprint, FurnaceRequirement};

        let mut db = Database::new();
        db.insert_material(Material {
            id: MaterialId::from("coal"),
            name: "Coal".into(),
            buy_price: Some(1.0),
            sale_price: None,
            role: MaterialRole::Fuel { fuel_value: 8.0 },
            stack_size: 100,
        })
        .unwrap();
        for (id, _) in [("clay", 0), ("sand", 0)] {
            db.insert_material(Material {
                id: MaterialId::from(id),
                name: id.to_owned(),
                buy_price: Some(1.0),
                sale_price: None,
                role: MaterialRole::None,
                stack_size: 100,
            })
            .unwrap();
        }
        for id in ["brick", "glass"] {
            db.insert_material(Material {
                id: MaterialId::from(id),
                name: id.to_owned(),
                buy_price: None,
                sale_price: None,
                role: MaterialRole::None,
                stack_size: 100,
            })
            .unwrap();
        }

        db.insert_machine(Machine {
            id: "topper-x".into(),
            name: "Topper X".into(),
            inputs: 1,
            outputs: 1,
            kind: MachineKind::Standard {
                requires_furnace: Some(FurnaceRequirement {
                    heat_consumption_p: 2.0,
                    footprint: Footprint { width: 2, length: 1 },
                }),
            },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: "clay-to-brick".into(),
            name: "Clay to Brick".into(),
            machine: Some("topper-x".into()),
            processing_time_sec: 4.0,
            inputs: vec![ItemAmount {
                material: "clay".into(),
                items: 1.0,
            }],
            outputs: vec![ItemAmount {
                material: "brick".into(),
                items: 1.0,
            }],
        })
        .unwrap();

        db.insert_machine(Machine {
            id: "topper-y".into(),
            name: "Topper Y".into(),
            inputs: 1,
            outputs: 1,
            kind: MachineKind::Standard {
                requires_furnace: Some(FurnaceRequirement {
                    heat_consumption_p: 1.0,
                    footprint: Footprint { width: 1, length: 1 },
                }),
            },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: "sand-to-glass".into(),
            name: "Sand to Glass".into(),
            machine: Some("topper-y".into()),
            processing_time_sec: 2.0,
            inputs: vec![ItemAmount {
                material: "sand".into(),
                items: 2.0,
            }],
            outputs: vec![ItemAmount {
                material: "glass".into(),
                items: 1.0,
            }],
        })
        .unwrap();

        db.insert_machine(Machine {
            id: "heater".into(),
            name: "Heating Device".into(),
            inputs: 1,
            outputs: 0,
            kind: MachineKind::HeatingDevice {
                base_heat_consumption_p: 1.0,
                heating_area: Footprint { width: 2, length: 2 },
            },
        })
        .unwrap();

        let mut build = Build::new();
        let coal_portal = PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::PurchasingPortal {
                material_id: "coal".into(),
            },
        };
        let heater = PlacedMachine {
            id: Uuid::new_v4(),
            x: 1.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::Machine {
                machine_id: "heater".into(),
                recipe_id: None,
                storage_slots: None,
                manual_inventories: vec![],
                toppers: vec![
                    Topper {
                        machine_id: "topper-x".into(),
                        recipe_id: Some("clay-to-brick".into()),
                    },
                    Topper {
                        machine_id: "topper-y".into(),
                        recipe_id: Some("sand-to-glass".into()),
                    },
                ],
                preview_fuel_id: None,
            },
        };
        let (portal_id, heater_id) = (coal_portal.id, heater.id);
        build.placed_machines.insert(portal_id, coal_portal);
        build.placed_machines.insert(heater_id, heater);
        build.connections.insert(
            Uuid::new_v4(),
            crate::build::Connection {
                id: Uuid::new_v4(),
                from_machine: portal_id,
                from_port: Port::Index(0),
                to_machine: heater_id,
                to_port: Port::Fuel,
            },
        );

        let tree = FlatTree::build(&build, &db);
        let skills = Skills::default();
        let heater_id = FlatId::TopLevel(heater_id);

        let fuel = port_input_demand(&tree, &db, &skills, &heater_id, Port::Fuel);
        assert!((fuel - 30.0).abs() < 1e-2, "expected 30, got {fuel}");

        let brick = port_output_rate(&tree, &db, &skills, &heater_id, Port::GroupedOut("brick".into()));
        assert!((brick - 15.0).abs() < 1e-2, "expected 15, got {brick}");

        let sand = port_input_demand(&tree, &db, &skills, &heater_id, Port::GroupedIn("sand".into()));
        assert!((sand - 60.0).abs() < 1e-2, "expected 60, got {sand}");
    }
}
