// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component H: the read-only `Calc` snapshot.
//!
//! Aggregates net production, sources/sinks, purchasing and import costs, and
//! storage fill projections from an already-solved [`FlatTree`] plus its
//! efficiencies and actual per-connection rates (components C, D, F).

use std::collections::{HashMap, HashSet};

use crate::blueprint::declared_ports_for_kind;
use crate::build::PlacedMachineKind;
use crate::database::{Database, MachineKind};
use crate::ids::MaterialId;
use crate::rates::{material_id_for_input, material_id_for_output};
use crate::skills::Skills;
use crate::tree::{FlatId, FlatTree, GraphView};

/// One entry of `storageFillItems`: a material accumulating in a storage
/// building whose slot would eventually fill at the current net rate.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageFillItem {
    pub storage_id: FlatId,
    pub storage_name: String,
    pub material_id: MaterialId,
    pub net_rate: f32,
    pub input_rate: f32,
    pub time_to_fill_minutes: f32,
}

/// The full read-only snapshot produced by one calculator run (spec.md §4.H).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calc {
    pub net_production: HashMap<MaterialId, f32>,
    pub sources: Vec<FlatId>,
    pub sinks: Vec<FlatId>,
    pub purchasing_costs: HashMap<MaterialId, f64>,
    pub total_purchasing_cost: f64,
    pub import_costs: HashMap<MaterialId, f64>,
    pub total_import_cost: f64,
    pub storage_fill_items: Vec<StorageFillItem>,
}

/// Builds the [`Calc`] snapshot from a flattened, solved tree.
pub fn aggregate(
    tree: &FlatTree,
    database: &Database,
    skills: &Skills,
    actual_rates: &HashMap<FlatId, f32>,
) -> Calc {
    let net_production = net_production(tree, database, actual_rates);
    let (sources, sinks) = sources_and_sinks(tree);
    let (purchasing_costs, total_purchasing_cost) = purchasing_costs(tree, database, skills, actual_rates);
    let (import_costs, total_import_cost) = import_costs(database, &net_production);
    let storage_fill_items = storage_fill_items(tree, database, skills, actual_rates);

    Calc {
        net_production,
        sources,
        sinks,
        purchasing_costs,
        total_purchasing_cost,
        import_costs,
        total_import_cost,
        storage_fill_items,
    }
}

/// For each material: actual output flow of every real (non-storage)
/// producer minus actual input flow of every real consumer. Storage is
/// excluded entirely (pass-through, spec.md §4.H); a fully-balanced run nets
/// to zero except at true sources/sinks or partially-satisfied demand.
fn net_production(tree: &FlatTree, database: &Database, actual_rates: &HashMap<FlatId, f32>) -> HashMap<MaterialId, f32> {
    let mut net: HashMap<MaterialId, f32> = HashMap::new();
    for fm in tree.machines() {
        if is_storage(&fm.kind, database) {
            continue;
        }
        let ports = declared_ports_for_kind(&fm.kind, database);
        for port in ports.outputs {
            if let Some(material) = material_id_for_output(tree, database, &fm.id, port) {
                let sum: f32 = tree
                    .connections()
                    .filter(|c| c.from == fm.id && c.from_port == port)
                    .filter_map(|c| actual_rates.get(&c.origin))
                    .sum();
                *net.entry(material).or_insert(0.0) += sum;
            }
        }
        for port in ports.inputs {
            if let Some(material) = material_id_for_input(tree, database, &fm.id, port) {
                let sum: f32 = tree
                    .connections()
                    .filter(|c| c.to == fm.id && c.to_port == port)
                    .filter_map(|c| actual_rates.get(&c.origin))
                    .sum();
                *net.entry(material).or_insert(0.0) -= sum;
            }
        }
    }
    net.retain(|_, rate| rate.abs() > crate::EPSILON);
    net
}

fn is_storage(kind: &PlacedMachineKind, database: &Database) -> bool {
    matches!(kind, PlacedMachineKind::Machine { machine_id, .. }
        if matches!(database.get(*machine_id).map(|m| &m.kind), Some(MachineKind::Storage { .. })))
}

fn sources_and_sinks(tree: &FlatTree) -> (Vec<FlatId>, Vec<FlatId>) {
    let mut sources = Vec::new();
    let mut sinks = Vec::new();
    for fm in tree.machines() {
        let has_incoming = tree.connections().any(|c| c.to == fm.id);
        let has_outgoing = tree.connections().any(|c| c.from == fm.id);
        if !has_incoming {
            sources.push(fm.id.clone());
        }
        if !has_outgoing {
            sinks.push(fm.id.clone());
        }
    }
    (sources, sinks)
}

/// Demand actually flowing out of each purchasing portal's output, valued at
/// the material's buy price (spec.md §4.H).
fn purchasing_costs(
    tree: &FlatTree,
    database: &Database,
    _skills: &Skills,
    actual_rates: &HashMap<FlatId, f32>,
) -> (HashMap<MaterialId, f64>, f64) {
    let mut costs: HashMap<MaterialId, f64> = HashMap::new();
    for fm in tree.machines() {
        let PlacedMachineKind::PurchasingPortal { material_id } = &fm.kind else {
            continue;
        };
        let flow: f32 = tree
            .connections()
            .filter(|c| c.from == fm.id)
            .filter_map(|c| actual_rates.get(&c.origin))
            .sum();
        if flow <= crate::EPSILON {
            continue;
        }
        let Some(material) = database.get(*material_id) else {
            continue;
        };
        let Some(buy_price) = material.buy_price else {
            continue;
        };
        // shopProfit (spec.md:95) adjusts sale prices only, never what we pay to buy.
        *costs.entry(*material_id).or_insert(0.0) += flow as f64 * buy_price;
    }
    let total = costs.values().sum();
    (costs, total)
}

/// For every material with a net deficit, the minimum realised cost per item
/// (spec.md §4.H): either the catalog buy price, or the cheapest producing
/// recipe's cost of inputs divided by its output quantity, recursively.
/// `f64::INFINITY` on a cost cycle.
fn import_costs(database: &Database, net_production: &HashMap<MaterialId, f32>) -> (HashMap<MaterialId, f64>, f64) {
    let mut memo = HashMap::new();
    let mut costs = HashMap::new();
    for (&material, &rate) in net_production {
        if rate >= -crate::EPSILON {
            continue;
        }
        let deficit = -rate as f64;
        let mut visiting = HashSet::new();
        let cost_per_item = realized_cost(database, material, &mut memo, &mut visiting);
        if cost_per_item.is_finite() {
            costs.insert(material, cost_per_item * deficit);
        }
    }
    let total = costs.values().sum();
    (costs, total)
}

fn realized_cost(
    database: &Database,
    material: MaterialId,
    memo: &mut HashMap<MaterialId, f64>,
    visiting: &mut HashSet<MaterialId>,
) -> f64 {
    if let Some(&cost) = memo.get(&material) {
        return cost;
    }
    if !visiting.insert(material) {
        return f64::INFINITY;
    }

    let mut best = database
        .get(material)
        .and_then(|m| m.buy_price)
        .unwrap_or(f64::INFINITY);

    for recipe in database.recipes() {
        let Some(out) = recipe.outputs.iter().find(|o| o.material == material) else {
            continue;
        };
        if out.items <= 0.0 {
            continue;
        }
        let mut recipe_cost = 0.0;
        let mut valid = true;
        for input in &recipe.inputs {
            let input_cost = realized_cost(database, input.material, memo, visiting);
            if !input_cost.is_finite() {
                valid = false;
                break;
            }
            recipe_cost += input_cost * input.items as f64;
        }
        if valid {
            best = best.min(recipe_cost / out.items as f64);
        }
    }

    visiting.remove(&material);
    memo.insert(material, best);
    best
}

/// Materials accumulating in each storage's connected inputs, with a
/// projected time to fill a slot (spec.md §4.G inventory projection,
/// approximated here via component G's slot allocation rather than running
/// its own independent round-based simulation — see DESIGN.md).
fn storage_fill_items(
    tree: &FlatTree,
    database: &Database,
    skills: &Skills,
    actual_rates: &HashMap<FlatId, f32>,
) -> Vec<StorageFillItem> {
    let mut items = Vec::new();
    for fm in tree.machines() {
        let PlacedMachineKind::Machine {
            machine_id,
            storage_slots,
            manual_inventories,
            ..
        } = &fm.kind
        else {
            continue;
        };
        let Some(machine) = database.get(*machine_id) else {
            continue;
        };
        let MachineKind::Storage { .. } = machine.kind else {
            continue;
        };
        let slots = storage_slots.unwrap_or(0);
        let input_ports = machine.inputs;
        let allocation = crate::storage::calculate_storage_inventory(
            tree,
            database,
            skills,
            &fm.id,
            slots,
            input_ports,
            manual_inventories,
        );

        let mut input_rates: HashMap<MaterialId, f32> = HashMap::new();
        for port_idx in 0..input_ports {
            let port = crate::ids::Port::Index(port_idx);
            for conn in tree.connections_to(&fm.id, port) {
                if let Some(material) = material_id_for_output(tree, database, &conn.from, conn.from_port) {
                    let rate = actual_rates.get(&conn.origin).copied().unwrap_or(0.0);
                    *input_rates.entry(material).or_insert(0.0) += rate;
                }
            }
        }

        let mut output_rates: HashMap<MaterialId, f32> = HashMap::new();
        for port_idx in 0..machine.outputs {
            let port = crate::ids::Port::Index(port_idx);
            let Some(material) = material_id_for_output(tree, database, &fm.id, port) else {
                continue;
            };
            let sum: f32 = tree
                .connections_from(&fm.id, port)
                .iter()
                .filter_map(|c| actual_rates.get(&c.origin))
                .sum();
            *output_rates.entry(material).or_insert(0.0) += sum;
        }

        for &material in &allocation.slots {
            let input_rate = input_rates.get(&material).copied().unwrap_or(0.0);
            let output_rate = output_rates.get(&material).copied().unwrap_or(0.0);
            let net_rate = input_rate - output_rate;
            if net_rate <= crate::EPSILON {
                continue;
            }
            let stack_size = database.get(material).map(|m| m.stack_size).unwrap_or(100) as f32;
            let time_to_fill_minutes = (slots as f32 * stack_size) / net_rate;
            if !time_to_fill_minutes.is_finite() {
                continue;
            }
            items.push(StorageFillItem {
                storage_id: fm.id.clone(),
                storage_name: machine.name.clone(),
                material_id: material,
                net_rate,
                input_rate,
                time_to_fill_minutes,
            });
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{Build, PlacedMachine};
    use crate::database::{ItemAmount, Machine, MachineKind as MK, Material, MaterialRole, Recipe};
    use crate::ids::{MachineId, MaterialId as Mid, RecipeId};
    use crate::efficiency;
    use uuid::Uuid;

    fn portal(material: &str) -> PlacedMachine {
        PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::PurchasingPortal {
                material_id: Mid::from(material),
            },
        }
    }

    #[test]
    fn purchasing_portal_with_no_outflow_has_no_cost() {
        let mut db = Database::new();
        db.insert_material(Material {
            id: Mid::from("ore"),
            name: "Ore".into(),
            buy_price: Some(1.0),
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        let mut build = Build::new();
        let p = portal("ore");
        let id = p.id;
        build.placed_machines.insert(id, p);

        let tree = FlatTree::build(&build, &db);
        let skills = Skills::default();
        let effs = efficiency::solve(&tree, &db, &skills);
        let rates = efficiency::actual_rates(&tree, &db, &skills, &effs);
        let calc = aggregate(&tree, &db, &skills, &rates);
        assert!(calc.purchasing_costs.is_empty());
    }

    #[test]
    fn deficit_material_with_no_recipe_and_no_price_has_no_import_cost() {
        let mut db = Database::new();
        db.insert_material(Material {
            id: Mid::from("mystery"),
            name: "Mystery".into(),
            buy_price: None,
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        let mut net = HashMap::new();
        net.insert(Mid::from("mystery"), -5.0);
        let (costs, total) = import_costs(&db, &net);
        assert!(costs.is_empty());
        assert_eq!(total, 0.0);
    }

    #[test]
    fn realized_cost_prefers_cheaper_recipe_over_buy_price() {
        let mut db = Database::new();
        db.insert_material(Material {
            id: Mid::from("ore"),
            name: "Ore".into(),
            buy_price: Some(1.0),
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        db.insert_material(Material {
            id: Mid::from("ingot"),
            name: "Ingot".into(),
            buy_price: Some(100.0),
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        db.insert_machine(Machine {
            id: MachineId::from("smelter"),
            name: "Smelter".into(),
            inputs: 1,
            outputs: 1,
            kind: MK::Standard { requires_furnace: None },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: RecipeId::from("smelt"),
            name: "Smelt".into(),
            machine: Some(MachineId::from("smelter")),
            processing_time_sec: 1.0,
            inputs: vec![ItemAmount {
                material: Mid::from("ore"),
                items: 1.0,
            }],
            outputs: vec![ItemAmount {
                material: Mid::from("ingot"),
                items: 1.0,
            }],
        })
        .unwrap();

        let mut memo = HashMap::new();
        let mut visiting = HashSet::new();
        let cost = realized_cost(&db, Mid::from("ingot"), &mut memo, &mut visiting);
        assert!((cost - 1.0).abs() < 1e-9);
    }
}
