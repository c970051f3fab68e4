// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component F: backpressure efficiency solver.
//!
//! Every machine's efficiency is how much of its theoretical output is
//! actually pulled by downstream demand, computed depth-first so that a
//! machine's efficiency already reflects everything below it by the time
//! its own ratio is taken. `purchasing_portal`, storage, and blueprint
//! instances always run at 1 — supply for the first, pass-through for the
//! other two (their internal machines carry their own efficiencies).

use std::collections::{HashMap, HashSet};

use crate::blueprint::declared_ports_for_kind;
use crate::build::PlacedMachineKind;
use crate::database::Database;
use crate::distribution::distribute;
use crate::ids::MaterialId;
use crate::rates::{material_id_for_output, port_input_demand, port_output_rate};
use crate::skills::Skills;
use crate::tree::{FlatConnection, FlatId, FlatTree, GraphView};

/// Solves every machine's efficiency in `tree`, depth-first with cycle
/// detection (spec.md §4.F).
pub fn solve(tree: &FlatTree, database: &Database, skills: &Skills) -> HashMap<FlatId, f32> {
    let mut cache = HashMap::new();
    let mut processing = HashSet::new();
    for fm in tree.machines() {
        compute(&fm.id, tree, database, skills, &mut cache, &mut processing);
    }
    cache
}

fn compute(
    id: &FlatId,
    view: &impl GraphView,
    database: &Database,
    skills: &Skills,
    cache: &mut HashMap<FlatId, f32>,
    processing: &mut HashSet<FlatId>,
) -> f32 {
    if let Some(&eff) = cache.get(id) {
        return eff;
    }
    // Revisiting a machine still on the stack means a cycle; treat it as
    // fully supplied rather than looping (spec.md §4.F).
    if !processing.insert(id.clone()) {
        return 1.0;
    }

    let eff = match view.machine(id) {
        None => 1.0,
        Some(fm) => match &fm.kind {
            PlacedMachineKind::PurchasingPortal { .. }
            | PlacedMachineKind::BlueprintInstance { .. } => 1.0,
            PlacedMachineKind::Machine { machine_id, .. }
                if matches!(
                    database.get(*machine_id).map(|m| &m.kind),
                    Some(crate::database::MachineKind::Storage { .. })
                ) =>
            {
                1.0
            }
            _ => compute_ratio(id, &fm.kind, view, database, skills, cache, processing),
        },
    };

    processing.remove(id);
    cache.insert(id.clone(), eff);
    eff
}

fn compute_ratio(
    id: &FlatId,
    kind: &PlacedMachineKind,
    view: &impl GraphView,
    database: &Database,
    skills: &Skills,
    cache: &mut HashMap<FlatId, f32>,
    processing: &mut HashSet<FlatId>,
) -> f32 {
    let outputs = declared_ports_for_kind(kind, database).outputs;

    let mut max_output: HashMap<MaterialId, f32> = HashMap::new();
    let mut actual_demand: HashMap<MaterialId, f32> = HashMap::new();

    for port in outputs {
        let total = port_output_rate(view, database, skills, id, port);
        let material = material_id_for_output(view, database, id, port);
        if total > crate::EPSILON {
            if let Some(material) = material {
                *max_output.entry(material).or_insert(0.0) += total;
            }
        }

        let conns = view.connections_from(id, port);
        for c in &conns {
            compute(&c.to, view, database, skills, cache, processing);
        }
        if conns.is_empty() {
            continue;
        }

        let cache_ref: &HashMap<FlatId, f32> = cache;
        let rates = distribute(&conns, total, |c: &FlatConnection| cap_for(view, database, skills, cache_ref, c));
        if let Some(material) = material {
            let sum: f32 = rates.iter().sum();
            *actual_demand.entry(material).or_insert(0.0) += sum;
        }
    }

    if max_output.is_empty() {
        return 1.0;
    }

    let mut eff = 1.0_f32;
    for (material, max_rate) in &max_output {
        if *max_rate <= crate::EPSILON {
            continue;
        }
        let actual = actual_demand.get(material).copied().unwrap_or(0.0);
        eff = eff.min(actual / max_rate);
    }
    eff.clamp(0.0, 1.0)
}

/// A sibling connection's cap: downstream demand scaled by the downstream
/// machine's already-solved efficiency, clamped at belt speed (spec.md §4.E).
fn cap_for(
    view: &impl GraphView,
    database: &Database,
    skills: &Skills,
    efficiencies: &HashMap<FlatId, f32>,
    conn: &FlatConnection,
) -> f32 {
    let demand = port_input_demand(view, database, skills, &conn.to, conn.to_port);
    let target_eff = efficiencies.get(&conn.to).copied().unwrap_or(1.0);
    (demand * target_eff).min(skills.belt_speed())
}

/// Second pass (spec.md §4.F): writes each connection's actual rate by
/// running distribution once per `(sourceMachine, fromPort)` group with
/// `totalAvailable = maxRate · sourceEfficiency`. Keyed by each connection's
/// [`FlatConnection::origin`].
pub fn actual_rates(
    tree: &FlatTree,
    database: &Database,
    skills: &Skills,
    efficiencies: &HashMap<FlatId, f32>,
) -> HashMap<FlatId, f32> {
    let mut groups: HashMap<(FlatId, crate::ids::Port), Vec<FlatConnection>> = HashMap::new();
    for conn in tree.connections() {
        groups
            .entry((conn.from.clone(), conn.from_port))
            .or_default()
            .push(conn.clone());
    }

    let mut result = HashMap::new();
    for ((from, from_port), conns) in groups {
        let source_eff = efficiencies.get(&from).copied().unwrap_or(1.0);
        let max_rate = port_output_rate(tree, database, skills, &from, from_port);
        let total_available = max_rate * source_eff;
        let rates = distribute(&conns, total_available, |c| cap_for(tree, database, skills, efficiencies, c));
        for (conn, rate) in conns.iter().zip(rates) {
            result.insert(conn.origin.clone(), rate);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{Build, PlacedMachine};
    use crate::database::{ItemAmount, Machine, MachineKind, Material, MaterialRole, Recipe};
    use crate::ids::{MachineId, MaterialId as Mid, Port, RecipeId};
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
    fn producer_with_no_downstream_has_zero_efficiency() {
        let mut db = Database::new();
        db.insert_material(Material {
            id: Mid::from("ore"),
            name: "Ore".into(),
            buy_price: None,
            sale_price: None,
            role: MaterialRole::None,
            stack_size: 100,
        })
        .unwrap();
        db.insert_material(Material {
            id: Mid::from("ingot"),
            name: "Ingot".into(),
            buy_price: None,
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
            kind: MachineKind::Standard { requires_furnace: None },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: RecipeId::from("smelt"),
            name: "Smelt".into(),
            machine: Some(MachineId::from("smelter")),
            processing_time_sec: 6.0,
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

        let mut build = Build::new();
        let smelter = PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::Machine {
                machine_id: MachineId::from("smelter"),
                recipe_id: Some(RecipeId::from("smelt")),
                storage_slots: None,
                manual_inventories: vec![],
                toppers: vec![],
                preview_fuel_id: None,
            },
        };
        let smelter_id = smelter.id;
        build.placed_machines.insert(smelter_id, smelter);

        let tree = FlatTree::build(&build, &db);
        let skills = Skills::default();
        let effs = solve(&tree, &db, &skills);
        assert_eq!(effs.get(&FlatId::TopLevel(smelter_id)).copied(), Some(0.0));
    }

    #[test]
    fn portal_always_runs_at_full_efficiency() {
        let db = Database::new();
        let mut build = Build::new();
        let p = portal("ore");
        let id = p.id;
        build.placed_machines.insert(id, p);
        let tree = FlatTree::build(&build, &db);
        let skills = Skills::default();
        let effs = solve(&tree, &db, &skills);
        assert_eq!(effs.get(&FlatId::TopLevel(id)).copied(), Some(1.0));
    }
}
