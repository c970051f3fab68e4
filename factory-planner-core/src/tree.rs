// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component C: the flattened tree view.
//!
//! A [`Build`] stores blueprint instances opaquely: each one carries a deep
//! copy of its template's body. The rate/efficiency/storage primitives
//! (components D-G) don't want to know about that nesting; they want one flat
//! graph of leaf machines and resolved connections. [`FlatTree`] builds that
//! view, and [`GraphView`] is the query surface both it and a bare top-level
//! [`Build`] (used when deriving a new blueprint's boundary, spec.md §4.J)
//! implement.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::blueprint::{BlueprintBody, InternalId};
use crate::build::{Build, PlacedMachine, PlacedMachineKind};
use crate::database::Database;
use crate::ids::Port;

/// Globally-unique id of a machine in the flattened tree: a path from a
/// top-level placed machine down through zero or more blueprint instance
/// boundaries (spec.md §3 "Blueprint instances can nest to arbitrary depth").
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum FlatId {
    TopLevel(Uuid),
    Nested(Box<FlatId>, InternalId),
}

impl fmt::Display for FlatId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlatId::TopLevel(id) => write!(f, "{id}"),
            FlatId::Nested(parent, internal) => write!(f, "{parent}/{internal}"),
        }
    }
}

/// A leaf machine in the flattened graph: never itself a blueprint instance.
/// `count` already folds in every ancestor blueprint instance's own `count`
/// (spec.md is silent on nested-instance multiplicity; treating an instance's
/// count as a multiplier on its children mirrors how a top-level machine's own
/// `count` scales its rates, see DESIGN.md).
#[derive(Debug, Clone, PartialEq)]
pub struct FlatMachine {
    pub id: FlatId,
    pub x: f32,
    pub y: f32,
    pub count: u32,
    pub kind: PlacedMachineKind,
}

/// A connection in the flattened graph, with endpoints resolved all the way
/// down to leaf machines. `origin` identifies the real stored connection (for
/// top-level connections) or the synthetic one nested inside a blueprint body,
/// and is the key the solver's per-connection results (component H) are
/// reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatConnection {
    pub origin: FlatId,
    pub from: FlatId,
    pub from_port: Port,
    pub to: FlatId,
    pub to_port: Port,
}

/// Query surface the rate/efficiency/storage primitives need: given a machine
/// and port, what connections touch it. Implemented by [`FlatTree`] (the real
/// graph the solver runs over) and by [`BuildGraphView`] (a top-level-only
/// view used while deriving a new blueprint's boundary ports, before any
/// instance has been created). Returns owned values so both a pre-flattened
/// map and an on-the-fly filter over a [`Build`] can implement it uniformly.
pub trait GraphView {
    fn machine(&self, id: &FlatId) -> Option<FlatMachine>;
    fn connections_from(&self, id: &FlatId, port: Port) -> Vec<FlatConnection>;
    fn connections_to(&self, id: &FlatId, port: Port) -> Vec<FlatConnection>;
    fn all_connections_to(&self, id: &FlatId) -> Vec<FlatConnection>;
}

/// The fully flattened graph for one workspace [`Build`].
#[derive(Debug, Clone, Default)]
pub struct FlatTree {
    machines: BTreeMap<FlatId, FlatMachine>,
    connections: Vec<FlatConnection>,
}

impl FlatTree {
    /// Flattens `build` against `database`, inlining every blueprint
    /// instance's children and resolving all connection endpoints to leaves.
    pub fn build(build: &Build, _database: &Database) -> FlatTree {
        let mut tree = FlatTree::default();

        for (&uuid, pm) in &build.placed_machines {
            let path = FlatId::TopLevel(uuid);
            match &pm.kind {
                PlacedMachineKind::BlueprintInstance { blueprint_data, .. } => {
                    flatten_body(blueprint_data, &path, pm.count, &mut tree.machines, &mut tree.connections);
                }
                _ => {
                    tree.machines.insert(
                        path.clone(),
                        FlatMachine {
                            id: path,
                            x: pm.x,
                            y: pm.y,
                            count: pm.count,
                            kind: pm.kind.clone(),
                        },
                    );
                }
            }
        }

        for conn in build.connections.values() {
            let from = resolve_top_level_endpoint(build, conn.from_machine, conn.from_port, false);
            let to = resolve_top_level_endpoint(build, conn.to_machine, conn.to_port, true);
            tree.connections.push(FlatConnection {
                origin: FlatId::TopLevel(conn.id),
                from,
                from_port: conn.from_port,
                to,
                to_port: conn.to_port,
            });
        }

        tree
    }

    pub fn machines(&self) -> impl Iterator<Item = &FlatMachine> {
        self.machines.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &FlatConnection> {
        self.connections.iter()
    }

    /// Depth-first search by id; trivial once flattened since `machines` is
    /// already keyed by the global [`FlatId`].
    pub fn find_machine(&self, id: &FlatId) -> Option<&FlatMachine> {
        self.machines.get(id)
    }
}

impl GraphView for FlatTree {
    fn machine(&self, id: &FlatId) -> Option<FlatMachine> {
        self.machines.get(id).cloned()
    }

    fn connections_from(&self, id: &FlatId, port: Port) -> Vec<FlatConnection> {
        self.connections
            .iter()
            .filter(|c| &c.from == id && c.from_port == port)
            .cloned()
            .collect()
    }

    fn connections_to(&self, id: &FlatId, port: Port) -> Vec<FlatConnection> {
        self.connections
            .iter()
            .filter(|c| &c.to == id && c.to_port == port)
            .cloned()
            .collect()
    }

    fn all_connections_to(&self, id: &FlatId) -> Vec<FlatConnection> {
        self.connections.iter().filter(|c| &c.to == id).cloned().collect()
    }
}

/// Recursively inlines a blueprint body's machines/connections under `path`,
/// multiplying each leaf's `count` by every ancestor instance's `count`.
fn flatten_body(
    body: &BlueprintBody,
    path: &FlatId,
    multiplier: u32,
    out_machines: &mut BTreeMap<FlatId, FlatMachine>,
    out_connections: &mut Vec<FlatConnection>,
) {
    for m in &body.machines {
        let node_path = FlatId::Nested(Box::new(path.clone()), m.id);
        match &m.kind {
            PlacedMachineKind::BlueprintInstance { blueprint_data, .. } => {
                flatten_body(blueprint_data, &node_path, m.count * multiplier, out_machines, out_connections);
            }
            _ => {
                out_machines.insert(
                    node_path.clone(),
                    FlatMachine {
                        id: node_path,
                        x: m.x,
                        y: m.y,
                        count: m.count * multiplier,
                        kind: m.kind.clone(),
                    },
                );
            }
        }
    }

    for c in &body.connections {
        let from = resolve_nested_endpoint(body, path, c.from_machine, c.from_port, false);
        let to = resolve_nested_endpoint(body, path, c.to_machine, c.to_port, true);
        out_connections.push(FlatConnection {
            origin: FlatId::Nested(Box::new(path.clone()), c.id),
            from,
            from_port: c.from_port,
            to,
            to_port: c.to_port,
        });
    }
}

/// Resolves one endpoint of a top-level [`Build`] connection to a [`FlatId`],
/// descending into a blueprint instance's `port_mappings` if the endpoint
/// machine is one.
fn resolve_top_level_endpoint(build: &Build, machine: Uuid, port: Port, is_input: bool) -> FlatId {
    let path = FlatId::TopLevel(machine);
    let Some(pm) = build.placed_machines.get(&machine) else {
        return path;
    };
    match &pm.kind {
        PlacedMachineKind::BlueprintInstance {
            blueprint_data,
            port_mappings,
            ..
        } => resolve_boundary(blueprint_data, &path, port_mappings, port, is_input).unwrap_or(path),
        _ => path,
    }
}

/// Resolves one endpoint of a [`crate::blueprint::BlueprintConnection`],
/// recursing the same way for nested instances.
fn resolve_nested_endpoint(
    body: &BlueprintBody,
    path: &FlatId,
    machine: InternalId,
    port: Port,
    is_input: bool,
) -> FlatId {
    let node_path = FlatId::Nested(Box::new(path.clone()), machine);
    let Some(m) = body.machines.iter().find(|m| m.id == machine) else {
        return node_path;
    };
    match &m.kind {
        PlacedMachineKind::BlueprintInstance {
            blueprint_data,
            port_mappings,
            ..
        } => resolve_boundary(blueprint_data, &node_path, port_mappings, port, is_input).unwrap_or(node_path),
        _ => node_path,
    }
}

/// Given a blueprint instance's declared boundary `port` (an input or output
/// index), follows its [`crate::blueprint::PortMappings`] entry to the
/// internal machine/port it maps to, recursing if that machine is itself a
/// nested instance.
fn resolve_boundary(
    body: &BlueprintBody,
    path: &FlatId,
    port_mappings: &crate::blueprint::PortMappings,
    port: Port,
    is_input: bool,
) -> Option<FlatId> {
    let Port::Index(idx) = port else {
        return None;
    };
    let mapping = if is_input {
        port_mappings.inputs.get(idx as usize)?
    } else {
        port_mappings.outputs.get(idx as usize)?
    };
    Some(resolve_nested_endpoint(
        body,
        path,
        mapping.internal_machine_id,
        mapping.internal_port,
        is_input,
    ))
}

/// A [`GraphView`] over a bare top-level [`Build`], with no flattening. Used
/// only while deriving a new blueprint's boundary ports from a selection
/// (spec.md §4.J); a blueprint instance encountered here is treated as an
/// opaque leaf exposing its own declared boundary ports, never traversed into.
pub struct BuildGraphView<'a> {
    build: &'a Build,
    database: &'a Database,
}

impl<'a> BuildGraphView<'a> {
    pub fn new(build: &'a Build, database: &'a Database) -> Self {
        Self { build, database }
    }

    pub fn database(&self) -> &'a Database {
        self.database
    }

    fn as_flat_machine(id: Uuid, pm: &PlacedMachine) -> FlatMachine {
        FlatMachine {
            id: FlatId::TopLevel(id),
            x: pm.x,
            y: pm.y,
            count: pm.count,
            kind: pm.kind.clone(),
        }
    }

    fn as_uuid(id: &FlatId) -> Option<Uuid> {
        match id {
            FlatId::TopLevel(uuid) => Some(*uuid),
            FlatId::Nested(..) => None,
        }
    }
}

impl<'a> GraphView for BuildGraphView<'a> {
    fn machine(&self, id: &FlatId) -> Option<FlatMachine> {
        let uuid = Self::as_uuid(id)?;
        self.build
            .placed_machines
            .get(&uuid)
            .map(|pm| Self::as_flat_machine(uuid, pm))
    }

    fn connections_from(&self, id: &FlatId, port: Port) -> Vec<FlatConnection> {
        let Some(uuid) = Self::as_uuid(id) else {
            return Vec::new();
        };
        self.build
            .connections
            .values()
            .filter(|c| c.from_machine == uuid && c.from_port == port)
            .map(|c| FlatConnection {
                origin: FlatId::TopLevel(c.id),
                from: FlatId::TopLevel(c.from_machine),
                from_port: c.from_port,
                to: FlatId::TopLevel(c.to_machine),
                to_port: c.to_port,
            })
            .collect()
    }

    fn connections_to(&self, id: &FlatId, port: Port) -> Vec<FlatConnection> {
        let Some(uuid) = Self::as_uuid(id) else {
            return Vec::new();
        };
        self.build
            .connections
            .values()
            .filter(|c| c.to_machine == uuid && c.to_port == port)
            .map(|c| FlatConnection {
                origin: FlatId::TopLevel(c.id),
                from: FlatId::TopLevel(c.from_machine),
                from_port: c.from_port,
                to: FlatId::TopLevel(c.to_machine),
                to_port: c.to_port,
            })
            .collect()
    }

    fn all_connections_to(&self, id: &FlatId) -> Vec<FlatConnection> {
        let Some(uuid) = Self::as_uuid(id) else {
            return Vec::new();
        };
        self.build
            .connections
            .values()
            .filter(|c| c.to_machine == uuid)
            .map(|c| FlatConnection {
                origin: FlatId::TopLevel(c.id),
                from: FlatId::TopLevel(c.from_machine),
                from_port: c.from_port,
                to: FlatId::TopLevel(c.to_machine),
                to_port: c.to_port,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MaterialId;

    fn portal(material: &str) -> PlacedMachine {
        PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::PurchasingPortal {
                material_id: MaterialId::from(material),
            },
        }
    }

    #[test]
    fn flattens_plain_machines_to_top_level_ids() {
        let mut build = Build::new();
        let m = portal("ore");
        let id = m.id;
        build.placed_machines.insert(id, m);
        let db = Database::new();
        let tree = FlatTree::build(&build, &db);
        assert!(tree.find_machine(&FlatId::TopLevel(id)).is_some());
    }

    #[test]
    fn flattens_blueprint_instance_children() {
        let mut build = Build::new();
        let inner = crate::blueprint::BlueprintMachine {
            id: InternalId::sequential(0),
            x: 0.0,
            y: 0.0,
            count: 1,
            kind: PlacedMachineKind::PurchasingPortal {
                material_id: MaterialId::from("ore"),
            },
        };
        let body = BlueprintBody {
            machines: vec![inner],
            connections: vec![],
            inputs: vec![],
            outputs: vec![],
        };
        let instance = PlacedMachine {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            count: 3,
            kind: PlacedMachineKind::BlueprintInstance {
                blueprint_id: crate::ids::BlueprintId::from("bp"),
                blueprint_data: body,
                port_mappings: Default::default(),
            },
        };
        let instance_id = instance.id;
        build.placed_machines.insert(instance_id, instance);

        let db = Database::new();
        let tree = FlatTree::build(&build, &db);
        let expected_id = FlatId::Nested(
            Box::new(FlatId::TopLevel(instance_id)),
            InternalId::sequential(0),
        );
        let leaf = tree.find_machine(&expected_id).expect("leaf machine present");
        assert_eq!(leaf.count, 3);
    }
}
