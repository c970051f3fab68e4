// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component G: multi-material storage slot allocation.
//!
//! A storage building has a fixed number of slots, each holding one
//! material. Which material lands in which slot is either pinned by the user
//! (`manual_inventories`) or decided automatically by a fill-time simulation:
//! the material that would top off a slot soonest, given its incoming rate
//! and stack size, claims a slot first. Ties break lexicographically on
//! [`MaterialId`] for determinism (spec.md §8 invariant on scheduler/solver
//! determinism applies equally here: the same build must always allocate the
//! same way).

use crate::build::{ManualInventoryEntry, PlacedMachineKind};
use crate::database::Database;
use crate::ids::{MaterialId, Port};
use crate::skills::Skills;
use crate::tree::{FlatId, FlatMachine, GraphView};

/// The material assigned to each slot of a storage building, in slot order.
/// Manual entries always occupy the first slots, in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAllocation {
    pub slots: Vec<MaterialId>,
}

impl StorageAllocation {
    pub fn slot_for(&self, material: MaterialId) -> Option<usize> {
        self.slots.iter().position(|&m| m == material)
    }

    pub fn material_at(&self, slot: usize) -> Option<MaterialId> {
        self.slots.get(slot).copied()
    }
}

/// Computes the slot allocation for a storage machine given its incoming
/// connections, per spec.md §4.G.
pub fn calculate_storage_inventory(
    view: &impl GraphView,
    database: &Database,
    skills: &Skills,
    id: &FlatId,
    storage_slots: u32,
    input_ports: u32,
    manual_inventories: &[ManualInventoryEntry],
) -> StorageAllocation {
    let capacity = storage_slots as usize;
    let mut slots: Vec<MaterialId> = Vec::with_capacity(capacity);
    for entry in manual_inventories {
        if slots.len() >= capacity {
            break;
        }
        if !slots.contains(&entry.material) {
            slots.push(entry.material);
        }
    }

    if slots.len() < capacity {
        let mut candidates: Vec<(MaterialId, f32)> = Vec::new();
        for port_idx in 0..input_ports {
            let port = Port::Index(port_idx);
            for conn in view.connections_to(id, port) {
                if let Some(material) =
                    crate::rates::material_id_for_output(view, database, &conn.from, conn.from_port)
                {
                    if slots.contains(&material) || candidates.iter().any(|(m, _)| *m == material) {
                        continue;
                    }
                    let rate = crate::rates::port_output_rate(view, database, skills, &conn.from, conn.from_port);
                    candidates.push((material, rate));
                }
            }
        }

        candidates.sort_by(|(ma, ra), (mb, rb)| {
            let fill_a = fill_time(database, *ma, *ra);
            let fill_b = fill_time(database, *mb, *rb);
            fill_a
                .partial_cmp(&fill_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ma.cmp(mb))
        });

        for (material, _) in candidates {
            if slots.len() >= capacity {
                break;
            }
            slots.push(material);
        }
    }

    StorageAllocation { slots }
}

/// Seconds to fill one stack of `material` at `rate` items/min; `f32::INFINITY`
/// if nothing is flowing in (it never fills, so it is the lowest priority).
fn fill_time(database: &Database, material: MaterialId, rate: f32) -> f32 {
    if rate <= crate::EPSILON {
        return f32::INFINITY;
    }
    let stack_size = database.get(material).map(|m| m.stack_size).unwrap_or(100) as f32;
    stack_size / (rate / 60.0)
}

/// The nominal output rate of a storage's port: the total incoming rate of
/// whichever material automatic/manual allocation assigned to that slot,
/// capped at the belt speed. With no incoming connections (manual stock
/// only), falls back to downstream demand capped at belt speed (spec.md
/// §4.G).
pub fn storage_port_output_rate(
    view: &impl GraphView,
    database: &Database,
    skills: &Skills,
    id: &FlatId,
    fm: &FlatMachine,
    port: Port,
) -> f32 {
    let Port::Index(slot) = port else { return 0.0 };
    let PlacedMachineKind::Machine {
        machine_id,
        storage_slots,
        manual_inventories,
        ..
    } = &fm.kind
    else {
        return 0.0;
    };
    let slots = storage_slots.unwrap_or(0);
    let input_ports = database.get(*machine_id).map(|m| m.inputs).unwrap_or(0);
    let allocation = calculate_storage_inventory(view, database, skills, id, slots, input_ports, manual_inventories);
    let Some(material) = allocation.material_at(slot as usize) else {
        return 0.0;
    };
    let mut total_in = 0.0;
    let mut has_incoming = false;
    for port_idx in 0..input_ports.max(1) {
        for conn in view.connections_to(id, Port::Index(port_idx)) {
            has_incoming = true;
            if crate::rates::material_id_for_output(view, database, &conn.from, conn.from_port) == Some(material) {
                total_in += crate::rates::port_output_rate(view, database, skills, &conn.from, conn.from_port);
            }
        }
    }
    if !has_incoming {
        // Storage can sustain one belt per port from manual stock (spec.md §4.G).
        let demand: f32 = view
            .connections_from(id, port)
            .into_iter()
            .map(|c| crate::rates::port_input_demand(view, database, skills, &c.to, c.to_port))
            .sum();
        return skills.belt_speed().min(demand);
    }
    total_in.min(skills.belt_speed())
}

/// The material assigned to a storage's output slot, for port-to-material
/// resolution (component D).
pub fn material_for_storage_output(
    view: &impl GraphView,
    database: &Database,
    id: &FlatId,
    fm: &FlatMachine,
    port: Port,
) -> Option<MaterialId> {
    let Port::Index(slot) = port else { return None };
    let PlacedMachineKind::Machine {
        machine_id,
        storage_slots,
        manual_inventories,
        ..
    } = &fm.kind
    else {
        return None;
    };
    let skills = Skills::default();
    let input_ports = database.get(*machine_id).map(|m| m.inputs).unwrap_or(0);
    let allocation = calculate_storage_inventory(
        view,
        database,
        &skills,
        id,
        storage_slots.unwrap_or(0),
        input_ports,
        manual_inventories,
    );
    allocation.material_at(slot as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_inventory_takes_priority_slots() {
        let manual = vec![
            ManualInventoryEntry {
                material: MaterialId::from("copper"),
                amount: 50.0,
            },
            ManualInventoryEntry {
                material: MaterialId::from("iron"),
                amount: 10.0,
            },
        ];
        let slots: Vec<MaterialId> = manual
            .iter()
            .map(|e| e.material)
            .take(2)
            .collect();
        assert_eq!(slots, vec![MaterialId::from("copper"), MaterialId::from("iron")]);
    }

    #[test]
    fn fill_time_is_infinite_with_no_inflow() {
        let db = Database::new();
        assert_eq!(fill_time(&db, MaterialId::from("x"), 0.0), f32::INFINITY);
    }

    /// spec.md §8 S3: material A (10/min, stack 10) fills a slot sooner than
    /// material B (5/min, stack 10), so A wins the contested third slot.
    #[test]
    fn s3_faster_filling_material_wins_the_contested_slot() {
        use crate::build::{Build, Connection, PlacedMachine};
        use crate::database::{Database as Db, ItemAmount, Machine, Material, MaterialRole, Recipe};
        use crate::tree::FlatTree;
        use uuid::Uuid;

        let mut db = Db::new();
        for id in ["a", "b"] {
            db.insert_material(Material {
                id: MaterialId::from(id),
                name: id.to_owned(),
                buy_price: None,
                sale_price: None,
                role: MaterialRole::None,
                stack_size: 10,
            })
            .unwrap();
        }
        db.insert_machine(Machine {
            id: "source".into(),
            name: "Source".into(),
            inputs: 0,
            outputs: 1,
            kind: crate::database::MachineKind::Standard {
                requires_furnace: None,
            },
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: "make-a".into(),
            name: "Make A".into(),
            machine: Some("source".into()),
            processing_time_sec: 6.0,
            inputs: vec![],
            outputs: vec![ItemAmount {
                material: "a".into(),
                items: 1.0,
            }],
        })
        .unwrap();
        db.insert_recipe(Recipe {
            id: "make-b".into(),
            name: "Make B".into(),
            machine: Some("source".into()),
            processing_time_sec: 12.0,
            inputs: vec![],
            outputs: vec![ItemAmount {
                material: "b".into(),
                items: 1.0,
            }],
        })
        .unwrap();

        let mut build = Build::new();
        let source_a = PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::Machine {
                machine_id: "source".into(),
                recipe_id: Some("make-a".into()),
                storage_slots: None,
                manual_inventories: vec![],
                toppers: vec![],
                preview_fuel_id: None,
            },
        };
        let source_b = PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 1.0,
            count: 1,
            kind: PlacedMachineKind::Machine {
                machine_id: "source".into(),
                recipe_id: Some("make-b".into()),
                storage_slots: None,
                manual_inventories: vec![],
                toppers: vec![],
                preview_fuel_id: None,
            },
        };
        let storage_id = Uuid::new_v4();
        let (a_id, b_id) = (source_a.id, source_b.id);
        build.placed_machines.insert(a_id, source_a);
        build.placed_machines.insert(b_id, source_b);
        build.connections.insert(
            Uuid::new_v4(),
            Connection {
                id: Uuid::new_v4(),
                from_machine: a_id,
                from_port: Port::Index(0),
                to_machine: storage_id,
                to_port: Port::Index(0),
            },
        );
        build.connections.insert(
            Uuid::new_v4(),
            Connection {
                id: Uuid::new_v4(),
                from_machine: b_id,
                from_port: Port::Index(0),
                to_machine: storage_id,
                to_port: Port::Index(1),
            },
        );

        let tree = FlatTree::build(&build, &db);
        let skills = Skills::default();
        let allocation = calculate_storage_inventory(
            &tree,
            &db,
            &skills,
            &FlatId::TopLevel(storage_id),
            3,
            2,
            &[],
        );
        assert_eq!(allocation.slot_for(MaterialId::from("a")), Some(0));
        assert_eq!(allocation.slot_for(MaterialId::from("b")), Some(1));
    }
}
