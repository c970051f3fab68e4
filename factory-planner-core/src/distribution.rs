// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Component E: split-output distribution.
//!
//! Spreads a single output port's available rate across its outgoing
//! connections by equal-share refill: every unsatisfied sibling gets an
//! equal slice of what remains, capped at its own demand, repeated until
//! either everything is allocated or every sibling is capped out.

use std::collections::HashMap;

use uuid::Uuid;

use crate::tree::FlatConnection;

const MAX_ITERATIONS: u32 = 10;

/// One sibling connection's share of a distribution round: its cap (demand,
/// already clamped to belt speed by the caller) and the rate allotted so far.
struct Demand {
    cap: f32,
    current: f32,
    satisfied: bool,
}

/// Distributes `total_available` across `connections` by equal-share refill
/// (spec.md §4.E). `cap_for` returns a sibling's ceiling:
/// `min(downstream_demand · target_efficiency, belt_speed)`.
///
/// Returns the allotted rate for each connection, keyed by the connection's
/// own id (the `origin`'s inner [`Uuid`] for a top-level connection, or a
/// synthetic one for a nested connection — callers key their own maps off
/// [`crate::tree::FlatConnection::origin`] directly when that distinction
/// matters; this function only needs a stable per-call index).
pub fn distribute(connections: &[FlatConnection], total_available: f32, cap_for: impl Fn(&FlatConnection) -> f32) -> Vec<f32> {
    let mut demands: Vec<Demand> = connections
        .iter()
        .map(|c| Demand {
            cap: cap_for(c).max(0.0),
            current: 0.0,
            satisfied: false,
        })
        .collect();

    for d in &mut demands {
        if d.cap <= crate::EPSILON {
            d.satisfied = true;
        }
    }

    let mut remaining = total_available.max(0.0);
    let mut iteration = 0;
    loop {
        if remaining <= crate::EPSILON || iteration >= MAX_ITERATIONS {
            break;
        }
        let unsatisfied: Vec<usize> = demands
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.satisfied)
            .map(|(i, _)| i)
            .collect();
        if unsatisfied.is_empty() {
            break;
        }
        let share = remaining / unsatisfied.len() as f32;
        for idx in unsatisfied {
            let d = &mut demands[idx];
            let room = d.cap - d.current;
            let add = share.min(room);
            if add > crate::EPSILON {
                d.current += add;
                remaining -= add;
            }
            if d.current >= d.cap - crate::EPSILON || add <= crate::EPSILON {
                d.satisfied = true;
            }
        }
        iteration += 1;
    }

    demands.into_iter().map(|d| d.current).collect()
}

/// Convenience wrapper returning a map keyed by the stored connection id
/// rather than positionally, for callers that need random access by
/// connection (component H's actual-rate pass).
pub fn distribute_by_connection(
    connections: &[FlatConnection],
    total_available: f32,
    cap_for: impl Fn(&FlatConnection) -> f32,
    key_for: impl Fn(&FlatConnection) -> Uuid,
) -> HashMap<Uuid, f32> {
    let rates = distribute(connections, total_available, cap_for);
    connections
        .iter()
        .zip(rates)
        .map(|(c, rate)| (key_for(c), rate))
        .collect()
}
