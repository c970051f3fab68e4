// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component J: blueprint templates and instances.
//!
//! A [`BlueprintTemplate`] is a reusable sub-graph stored in the catalog. A
//! placed `blueprint_instance` (see [`crate::build::PlacedMachineKind`])
//! carries a deep copy of a template's body plus a [`PortMappings`] resolving
//! each declared boundary port to the internal machine/port it maps to.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use internment::Intern;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::build::{Build, Connection, PlacedMachine, PlacedMachineKind};
use crate::database::Database;
use crate::ids::{BlueprintId, MaterialId, Port};
use crate::rates::{port_input_demand, port_output_rate};
use crate::skills::Skills;
use crate::tree::BuildGraphView;

/// A synthetic id for a machine or connection local to one [`BlueprintBody`],
/// of the form `bpm_<idx>` (spec.md §3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct InternalId(Intern<str>);

impl InternalId {
    pub fn sequential(idx: usize) -> Self {
        Self(Intern::from(format!("bpm_{idx}").as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for InternalId {
    fn from(s: &str) -> Self {
        Self(Intern::from(s))
    }
}

/// A declared input or output boundary port of a blueprint: the material it
/// carries and its rate (items/min) at the time it was declared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPort {
    pub material_id: MaterialId,
    pub rate: f32,
}

/// A machine internal to a [`BlueprintBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintMachine {
    pub id: InternalId,
    pub x: f32,
    pub y: f32,
    pub count: u32,
    pub kind: PlacedMachineKind,
}

/// A connection internal to a [`BlueprintBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintConnection {
    pub id: InternalId,
    pub from_machine: InternalId,
    pub from_port: Port,
    pub to_machine: InternalId,
    pub to_port: Port,
}

/// Maps a template's declared boundary ports to the internal machine/port
/// they resolve to, for one placed (or nested) instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMapping {
    pub internal_machine_id: InternalId,
    pub internal_port: Port,
    pub material_id: MaterialId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortMappings {
    pub inputs: Vec<PortMapping>,
    pub outputs: Vec<PortMapping>,
}

/// The contents of a blueprint: its internal machines, internal connections,
/// and declared boundary ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintBody {
    pub machines: Vec<BlueprintMachine>,
    pub connections: Vec<BlueprintConnection>,
    pub inputs: Vec<BoundaryPort>,
    pub outputs: Vec<BoundaryPort>,
}

/// A reusable sub-graph definition stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintTemplate {
    pub id: BlueprintId,
    pub name: String,
    pub description: Option<String>,
    pub body: BlueprintBody,
}

impl BlueprintTemplate {
    /// True if any machine in this template's body is a blueprint instance of
    /// `id` (used by [`Database::remove_blueprint`]'s nesting check).
    pub fn references_blueprint(&self, id: BlueprintId) -> bool {
        self.body.machines.iter().any(|m| match &m.kind {
            PlacedMachineKind::BlueprintInstance { blueprint_id, .. } => *blueprint_id == id,
            _ => false,
        })
    }

    /// Set of (material, rate) pairs for this template's boundary, used by the
    /// save-idempotence check in spec.md §4.J / §8 invariant 6.
    pub fn boundary_signature(&self) -> BoundarySignature {
        self.body.boundary_signature()
    }
}

impl BlueprintBody {
    pub fn boundary_signature(&self) -> BoundarySignature {
        BoundarySignature {
            inputs: self.inputs.iter().map(|p| (p.material_id, p.rate)).collect(),
            outputs: self.outputs.iter().map(|p| (p.material_id, p.rate)).collect(),
        }
    }
}

/// Snapshot of a template's boundary port set, comparable with a tolerance
/// (spec.md §4.J: "by set of materialId→rate pairs, tolerance 0.01").
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySignature {
    inputs: Vec<(MaterialId, f32)>,
    outputs: Vec<(MaterialId, f32)>,
}

impl BoundarySignature {
    /// True if `self` and `other` declare the same materials at the same
    /// rates, within [`crate::EPSILON`].
    pub fn compatible_with(&self, other: &BoundarySignature) -> bool {
        Self::sets_match(&self.inputs, &other.inputs) && Self::sets_match(&self.outputs, &other.outputs)
    }

    fn sets_match(a: &[(MaterialId, f32)], b: &[(MaterialId, f32)]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        let mut remaining: Vec<(MaterialId, f32)> = b.to_vec();
        for &(material, rate) in a {
            let Some(pos) = remaining
                .iter()
                .position(|&(m, r)| m == material && (r - rate).abs() <= crate::EPSILON)
            else {
                return false;
            };
            remaining.swap_remove(pos);
        }
        remaining.is_empty()
    }
}

/// Errors from blueprint operations (spec.md §7 `BlueprintCollision`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlueprintError {
    #[error("selection is empty")]
    EmptySelection,
    #[error("boundary port set changed; existing instance connections may be invalidated")]
    BoundaryChanged,
    #[error("cannot switch workspace while editing a blueprint")]
    EditInProgress,
}

/// Builds a [`BlueprintTemplate`] body from a selection of placed machines and
/// the connections between them (spec.md §4.J "Template creation").
///
/// `selected_machines` and `selected_connections` must be subsets of `build`.
/// Returns the new body plus the id-mapping from original [`Uuid`] to
/// synthetic [`InternalId`], which the caller uses to remove the originals
/// and place the resulting instance.
pub fn create_template_body(
    build: &Build,
    database: &Database,
    skills: &Skills,
    selected_machines: &[Uuid],
    selected_connections: &[Uuid],
) -> Result<(BlueprintBody, HashMap<Uuid, InternalId>), BlueprintError> {
    if selected_machines.is_empty() {
        return Err(BlueprintError::EmptySelection);
    }
    let selected_set: HashSet<Uuid> = selected_machines.iter().copied().collect();

    let first = &build.placed_machines[&selected_machines[0]];
    let (origin_x, origin_y) = (first.x, first.y);

    let mut id_map = HashMap::new();
    let mut machines = Vec::with_capacity(selected_machines.len());
    for (idx, &uuid) in selected_machines.iter().enumerate() {
        let internal_id = InternalId::sequential(idx);
        id_map.insert(uuid, internal_id);
        let pm = &build.placed_machines[&uuid];
        machines.push(BlueprintMachine {
            id: internal_id,
            x: pm.x - origin_x,
            y: pm.y - origin_y,
            count: pm.count,
            kind: pm.kind.clone(),
        });
    }

    let mut connections = Vec::new();
    for &conn_id in selected_connections {
        let conn = &build.connections[&conn_id];
        if selected_set.contains(&conn.from_machine) && selected_set.contains(&conn.to_machine) {
            connections.push(BlueprintConnection {
                id: InternalId::sequential(connections.len() + selected_machines.len()),
                from_machine: id_map[&conn.from_machine],
                from_port: conn.from_port,
                to_machine: id_map[&conn.to_machine],
                to_port: conn.to_port,
            });
        }
    }

    let view = BuildGraphView::new(build, database);
    let (inputs, outputs) = derive_boundary_ports(
        build,
        database,
        skills,
        &view,
        &selected_set,
        selected_connections,
    );

    Ok((
        BlueprintBody {
            machines,
            connections,
            inputs,
            outputs,
        },
        id_map,
    ))
}

/// Derives declared `inputs`/`outputs` from cross-boundary connections and
/// unconnected ports (spec.md §4.J "Boundary port declaration").
fn derive_boundary_ports(
    build: &Build,
    database: &Database,
    skills: &Skills,
    view: &BuildGraphView<'_>,
    selected: &HashSet<Uuid>,
    selected_connections: &[Uuid],
) -> (Vec<BoundaryPort>, Vec<BoundaryPort>) {
    let selected_conn_set: HashSet<Uuid> = selected_connections.iter().copied().collect();
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for &uuid in selected {
        let pm = &build.placed_machines[&uuid];
        let ports = declared_ports(pm, database);
        let flat_id = crate::tree::FlatId::TopLevel(uuid);

        for port in ports.inputs {
            let has_internal_source = build.connections.values().any(|c| {
                selected_conn_set.contains(&c.id)
                    && c.to_machine == uuid
                    && c.to_port == port
                    && selected.contains(&c.from_machine)
            });
            if has_internal_source {
                continue;
            }
            let demand = port_input_demand(view, database, skills, &flat_id, port);
            if demand > crate::EPSILON {
                if let Some(material) = crate::rates::material_id_for_input(view, database, &flat_id, port) {
                    inputs.push(BoundaryPort {
                        material_id: material,
                        rate: demand,
                    });
                }
            }
        }

        for port in ports.outputs {
            let has_internal_sink = build.connections.values().any(|c| {
                selected_conn_set.contains(&c.id)
                    && c.from_machine == uuid
                    && c.from_port == port
                    && selected.contains(&c.to_machine)
            });
            if has_internal_sink {
                continue;
            }
            if pm.is_purchasing_portal() {
                // Infinite sources never declare unused output capacity (spec.md §9).
                continue;
            }
            let rate = port_output_rate(view, database, skills, &flat_id, port);
            if rate > crate::EPSILON {
                if let Some(material) = crate::rates::material_id_for_output(view, database, &flat_id, port) {
                    outputs.push(BoundaryPort {
                        material_id: material,
                        rate,
                    });
                }
            }
        }
    }

    (inputs, outputs)
}

pub(crate) struct DeclaredPorts {
    pub(crate) inputs: Vec<Port>,
    pub(crate) outputs: Vec<Port>,
}

/// Enumerates the ports a placed machine declares, independent of whether
/// anything is connected to them.
fn declared_ports(pm: &PlacedMachine, database: &Database) -> DeclaredPorts {
    declared_ports_for_kind(&pm.kind, database)
}

pub(crate) fn declared_ports_for_kind(kind: &PlacedMachineKind, database: &Database) -> DeclaredPorts {
    match kind {
        PlacedMachineKind::Machine { machine_id, toppers, .. } => {
            let Some(machine) = database.get(*machine_id) else {
                return DeclaredPorts {
                    inputs: vec![],
                    outputs: vec![],
                };
            };
            match machine.kind {
                crate::database::MachineKind::HeatingDevice { .. } => {
                    let mut inputs = vec![Port::Fuel];
                    let mut outputs = vec![];
                    let mut seen_in = HashSet::new();
                    let mut seen_out = HashSet::new();
                    for topper in toppers {
                        if let Some(recipe_id) = topper.recipe_id {
                            if let Some(recipe) = database.get(recipe_id) {
                                for i in &recipe.inputs {
                                    if seen_in.insert(i.material) {
                                        inputs.push(Port::GroupedIn(i.material));
                                    }
                                }
                                for o in &recipe.outputs {
                                    if seen_out.insert(o.material) {
                                        outputs.push(Port::GroupedOut(o.material));
                                    }
                                }
                            }
                        }
                    }
                    DeclaredPorts { inputs, outputs }
                }
                _ => DeclaredPorts {
                    inputs: (0..machine.inputs).map(Port::Index).collect(),
                    outputs: (0..machine.outputs).map(Port::Index).collect(),
                },
            }
        }
        PlacedMachineKind::PurchasingPortal { .. } => DeclaredPorts {
            inputs: vec![],
            outputs: vec![Port::Index(0)],
        },
        PlacedMachineKind::Nursery { .. } => DeclaredPorts {
            inputs: vec![Port::Index(0)],
            outputs: vec![Port::Index(0)],
        },
        PlacedMachineKind::BlueprintInstance { blueprint_data, .. } => DeclaredPorts {
            inputs: (0..blueprint_data.inputs.len() as u32).map(Port::Index).collect(),
            outputs: (0..blueprint_data.outputs.len() as u32).map(Port::Index).collect(),
        },
    }
}

/// Places a single `blueprint_instance` at the centroid of the removed
/// selection (spec.md §4.J "Placement"); the caller is responsible for
/// removing the original machines/connections and re-pointing any external
/// connections at the returned instance by material identity.
pub fn instantiate(
    blueprint_id: BlueprintId,
    template: &BlueprintTemplate,
    database: &Database,
    centroid: (f32, f32),
) -> PlacedMachine {
    let port_mappings = default_port_mappings(&template.body, database);
    PlacedMachine {
        id: Uuid::new_v4(),
        x: centroid.0,
        y: centroid.1,
        count: 1,
        kind: PlacedMachineKind::BlueprintInstance {
            blueprint_id,
            blueprint_data: template.body.clone(),
            port_mappings,
        },
    }
}

/// The material an internal machine's port would carry, independent of rate:
/// used to match declared boundary ports to the internal port that produces
/// or consumes them (spec.md §4.J "Placement").
fn port_material(kind: &PlacedMachineKind, database: &Database, port: Port, is_input: bool) -> Option<MaterialId> {
    match (kind, port) {
        (_, Port::GroupedIn(material)) if is_input => Some(material),
        (_, Port::GroupedOut(material)) if !is_input => Some(material),
        (PlacedMachineKind::PurchasingPortal { material_id }, Port::Index(0)) if !is_input => Some(*material_id),
        (PlacedMachineKind::Nursery { plant_id, .. }, Port::Index(0)) if !is_input => *plant_id,
        (PlacedMachineKind::Nursery { fertilizer_id, .. }, Port::Index(0)) if is_input => *fertilizer_id,
        (PlacedMachineKind::Machine { recipe_id, .. }, Port::Index(idx)) => {
            let recipe = database.get((*recipe_id)?)?;
            let items = if is_input { &recipe.inputs } else { &recipe.outputs };
            items.get(idx as usize).map(|ia| ia.material)
        }
        _ => None,
    }
}

/// Builds the port mapping for a freshly instantiated blueprint by matching
/// each declared boundary port to the first internal machine/port with the
/// same material identity that isn't already fed/drained by an internal
/// connection (spec.md §4.J "Placement").
fn default_port_mappings(body: &BlueprintBody, database: &Database) -> PortMappings {
    let fed_internally: HashSet<(InternalId, Port)> =
        body.connections.iter().map(|c| (c.to_machine, c.to_port)).collect();
    let drained_internally: HashSet<(InternalId, Port)> =
        body.connections.iter().map(|c| (c.from_machine, c.from_port)).collect();

    let mut used = HashSet::new();
    let inputs = body
        .inputs
        .iter()
        .map(|boundary| {
            find_mapping(body, database, boundary.material_id, true, &fed_internally, &mut used)
        })
        .collect();
    let mut used = HashSet::new();
    let outputs = body
        .outputs
        .iter()
        .map(|boundary| {
            find_mapping(body, database, boundary.material_id, false, &drained_internally, &mut used)
        })
        .collect();

    PortMappings { inputs, outputs }
}

fn find_mapping(
    body: &BlueprintBody,
    database: &Database,
    material: MaterialId,
    is_input: bool,
    already_internal: &HashSet<(InternalId, Port)>,
    used: &mut HashSet<(InternalId, Port)>,
) -> PortMapping {
    for m in &body.machines {
        let candidates = if is_input {
            declared_ports_for_kind(&m.kind, database).inputs
        } else {
            declared_ports_for_kind(&m.kind, database).outputs
        };
        for port in candidates {
            let key = (m.id, port);
            if already_internal.contains(&key) || used.contains(&key) {
                continue;
            }
            if port_material(&m.kind, database, port, is_input) == Some(material) {
                used.insert(key);
                return PortMapping {
                    internal_machine_id: m.id,
                    internal_port: port,
                    material_id: material,
                };
            }
        }
    }
    // Should not happen for a template whose boundary was derived from its own
    // machines, but placement must not panic on a hand-edited/corrupt template.
    warn!("no internal port found for boundary material {material}; port mapping left dangling");
    PortMapping {
        internal_machine_id: body.machines.first().map(|m| m.id).unwrap_or(InternalId::sequential(0)),
        internal_port: Port::Index(0),
        material_id: material,
    }
}

/// Re-points a blueprint instance's incoming/outgoing connections at the
/// correct declared port index by matching on material identity (spec.md
/// §4.J "Placement": "pointing at the matching blueprint port index by
/// material identity").
pub fn reconnect_by_material(
    declared: &[BoundaryPort],
    carried_material: MaterialId,
    already_used: &HashSet<usize>,
) -> Option<usize> {
    declared
        .iter()
        .enumerate()
        .find(|(idx, port)| port.material_id == carried_material && !already_used.contains(idx))
        .map(|(idx, _)| idx)
}

/// State of an in-progress blueprint edit session (spec.md §4.J "Editing").
/// Holds the stack of parent canvases so nested editing can pop back out
/// arbitrarily deep.
#[derive(Debug, Clone, Default)]
pub struct BlueprintEditStack {
    frames: Vec<EditFrame>,
}

#[derive(Debug, Clone)]
struct EditFrame {
    parent_build: Build,
    editing_template: BlueprintId,
    /// The instance within `parent_build` that is being edited, so saving can
    /// write back into it without a full re-place.
    instance_id: Uuid,
    original_boundary: BoundarySignature,
}

impl BlueprintEditStack {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_editing(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push the current canvas and begin editing `template`'s contents as the
    /// new `state.build`. Returns the `Build` to load (machines/connections
    /// from the template, with fresh top-level ids).
    pub fn push(
        &mut self,
        parent_build: Build,
        instance_id: Uuid,
        template: &BlueprintTemplate,
    ) -> Build {
        self.frames.push(EditFrame {
            parent_build,
            editing_template: template.id,
            instance_id,
            original_boundary: template.boundary_signature(),
        });
        materialize_body_as_build(&template.body)
    }

    /// Save the currently-edited template, checking whether its boundary
    /// changed (spec.md §4.J: the user is warned if it did, tolerance 0.01).
    /// Returns `Err` (non-fatal) if the boundary changed; the caller decides
    /// whether to proceed anyway.
    pub fn check_save(&self, new_body: &BlueprintBody) -> Result<(), BlueprintError> {
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        let new_signature = new_body.boundary_signature();
        if frame.original_boundary.compatible_with(&new_signature) {
            Ok(())
        } else {
            Err(BlueprintError::BoundaryChanged)
        }
    }

    /// Pop back to the parent canvas, discarding any edits (spec.md §4.J
    /// "Exit without save pops the stack verbatim").
    pub fn pop(&mut self) -> Option<Build> {
        self.frames.pop().map(|frame| frame.parent_build)
    }

    pub fn current_template(&self) -> Option<BlueprintId> {
        self.frames.last().map(|f| f.editing_template)
    }

    pub fn current_instance(&self) -> Option<Uuid> {
        self.frames.last().map(|f| f.instance_id)
    }
}

/// Converts a template body into a standalone [`Build`] with fresh top-level
/// ids, for editing.
fn materialize_body_as_build(body: &BlueprintBody) -> Build {
    let mut build = Build::new();
    let mut id_map: HashMap<InternalId, Uuid> = HashMap::new();
    for m in &body.machines {
        let uuid = Uuid::new_v4();
        id_map.insert(m.id, uuid);
        build.placed_machines.insert(
            uuid,
            PlacedMachine {
                id: uuid,
                x: m.x,
                y: m.y,
                count: m.count,
                kind: m.kind.clone(),
            },
        );
    }
    for c in &body.connections {
        let id = Uuid::new_v4();
        build.connections.insert(
            id,
            Connection {
                id,
                from_machine: id_map[&c.from_machine],
                from_port: c.from_port,
                to_machine: id_map[&c.to_machine],
                to_port: c.to_port,
            },
        );
    }
    build
}

/// Memoized machine-count breakdown for a template (spec.md §4.J
/// "Machine-count caching"). Call [`MachineCountCache::invalidate`] whenever a
/// template mutates, which also walks every template that (transitively)
/// references it.
#[derive(Debug, Clone, Default)]
pub struct MachineCountCache {
    entries: HashMap<BlueprintId, CountBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountBreakdown {
    pub total_count: u64,
    pub by_machine: BTreeMap<crate::ids::MachineId, u64>,
}

impl MachineCountCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the cached breakdown, computing and memoizing it first if
    /// necessary.
    pub fn get_or_compute(
        &mut self,
        id: BlueprintId,
        database: &Database,
    ) -> CountBreakdown {
        if let Some(cached) = self.entries.get(&id) {
            return cached.clone();
        }
        let computed = compute_breakdown(database, id, 1, &mut HashSet::new());
        self.entries.insert(id, computed.clone());
        computed
    }

    /// Invalidates `id`'s cache entry and every template that (transitively)
    /// references it, since their memoized totals are now stale too.
    pub fn invalidate(&mut self, id: BlueprintId, database: &Database) {
        self.entries.remove(&id);
        for template in database.blueprints() {
            // A referencing template may never have been queried directly (so it has
            // no cache entry of its own) while still nesting inside one that was
            // cached; the walk must continue past it regardless to reach that parent.
            if template.references_blueprint(id) {
                self.invalidate(template.id, database);
            }
        }
    }
}

fn compute_breakdown(
    database: &Database,
    id: BlueprintId,
    multiplier: u64,
    visiting: &mut HashSet<BlueprintId>,
) -> CountBreakdown {
    let mut breakdown = CountBreakdown::default();
    let Some(template) = database.get(id) else {
        return breakdown;
    };
    if !visiting.insert(id) {
        // Self-nesting should already be refused by the catalog; guard anyway.
        return breakdown;
    }
    for m in &template.body.machines {
        let count = m.count as u64 * multiplier;
        match &m.kind {
            PlacedMachineKind::BlueprintInstance { blueprint_id, .. } => {
                let nested = compute_breakdown(database, *blueprint_id, count, visiting);
                breakdown.total_count += nested.total_count;
                for (machine_id, n) in nested.by_machine {
                    *breakdown.by_machine.entry(machine_id).or_default() += n;
                }
            }
            PlacedMachineKind::Machine { machine_id, .. } => {
                breakdown.total_count += count;
                *breakdown.by_machine.entry(*machine_id).or_default() += count;
            }
            PlacedMachineKind::PurchasingPortal { .. } | PlacedMachineKind::Nursery { .. } => {
                breakdown.total_count += count;
            }
        }
    }
    visiting.remove(&id);
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_id_sequential_naming() {
        assert_eq!(InternalId::sequential(0).to_string(), "bpm_0");
        assert_eq!(InternalId::sequential(12).to_string(), "bpm_12");
    }

    #[test]
    fn boundary_signature_tolerates_epsilon() {
        let a = BoundarySignature {
            inputs: vec![],
            outputs: vec![(MaterialId::from("ingot"), 10.0)],
        };
        let b = BoundarySignature {
            inputs: vec![],
            outputs: vec![(MaterialId::from("ingot"), 10.005)],
        };
        assert!(a.compatible_with(&b));
    }

    #[test]
    fn boundary_signature_detects_rate_change() {
        let a = BoundarySignature {
            inputs: vec![],
            outputs: vec![(MaterialId::from("ingot"), 10.0)],
        };
        let b = BoundarySignature {
            inputs: vec![],
            outputs: vec![(MaterialId::from("ingot"), 20.0)],
        };
        assert!(!a.compatible_with(&b));
    }
}
