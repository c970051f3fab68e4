// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! Interned string identifiers for catalog entities, and the polymorphic
//! [`Port`] identifier used to address a machine's inputs/outputs.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use internment::Intern;
use serde::{Deserialize, Serialize};

use crate::database::{Database, Machine, Material, Recipe};
use crate::blueprint::BlueprintTemplate;

/// Trait for symbol types that index into the [`Database`].
pub trait Id: fmt::Display + fmt::Debug + Eq + PartialEq + Copy + Clone + Hash + private::Sealed {
    type Info;

    /// Fetch the item of the correct type with this id from the database.
    fn fetch(self, database: &Database) -> Option<&Self::Info>;
}

macro_rules! typed_symbol {
    ($($(#[$m:meta])*
     $Self:ident {
        info = $info:ident,
        map = $map:ident,
     })+) => {
        $(
            $(#[$m])*
            #[derive(Copy, Clone, Eq, PartialEq, Hash)]
            pub struct $Self(Intern<str>);

            impl fmt::Debug for $Self {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}({:?})", stringify!($Self), self.as_str())
                }
            }

            impl Serialize for $Self {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where S: serde::Serializer,
                {
                    serializer.serialize_str(self.as_str())
                }
            }

            impl<'de> Deserialize<'de> for $Self {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where D: serde::Deserializer<'de>,
                {
                    struct Visitor;
                    impl<'de> serde::de::Visitor<'de> for Visitor {
                        type Value = $Self;

                        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                            f.write_str("a string symbol value")
                        }

                        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                        where E: serde::de::Error,
                        {
                            Ok(Self::Value::from(value))
                        }
                    }
                    deserializer.deserialize_str(Visitor)
                }
            }

            impl $Self {
                /// Borrow the interned string this id wraps.
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl Ord for $Self {
                fn cmp(&self, other: &Self) -> Ordering {
                    self.as_str().cmp(other.as_str())
                }
            }

            impl PartialOrd for $Self {
                fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                    Some(self.cmp(other))
                }
            }

            impl From<String> for $Self {
                fn from(id: String) -> Self {
                    Self(Intern::from(&*id))
                }
            }

            impl From<&str> for $Self {
                fn from(id: &str) -> Self {
                    Self(Intern::from(id))
                }
            }

            impl From<$Self> for String {
                fn from(id: $Self) -> Self {
                    id.as_str().to_owned()
                }
            }

            impl fmt::Display for $Self {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl Id for $Self {
                type Info = $info;

                fn fetch(self, database: &Database) -> Option<&Self::Info> {
                    database.$map().get(&self)
                }
            }

            impl private::Sealed for $Self {}
        )+
    };
}

typed_symbol! {
    /// Id of a material in the catalog.
    MaterialId {
        info = Material,
        map = materials_map,
    }

    /// Id of a machine definition in the catalog.
    MachineId {
        info = Machine,
        map = machines_map,
    }

    /// Id of a recipe in the catalog.
    RecipeId {
        info = Recipe,
        map = recipes_map,
    }

    /// Id of a blueprint template in the catalog.
    BlueprintId {
        info = BlueprintTemplate,
        map = blueprints_map,
    }
}

mod private {
    pub trait Sealed {}
}

/// Prefix used for the legacy per-topper port token `topper-<ti>-<pi>`.
const LEGACY_TOPPER_PREFIX: &str = "topper-";
/// Prefix used for the always-present heating-device fuel input port.
const FUEL_TOKEN: &str = "fuel";
/// Prefix for a heating device's aggregate input port for one material.
const GROUPED_IN_PREFIX: &str = "grouped-input-";
/// Prefix for a heating device's aggregate output port for one material.
const GROUPED_OUT_PREFIX: &str = "grouped-output-";

/// A port identifier: either a plain integer index (standard machine ports)
/// or one of the reserved string tokens used by heating devices.
///
/// Port is a tagged variant per spec.md's REDESIGN FLAGS, replacing a raw
/// polymorphic `usize | String` with an exhaustively-matchable enum.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Port {
    /// A standard, numbered port.
    Index(u32),
    /// A heating device's fuel input port.
    Fuel,
    /// A heating device's aggregate input port for one material across all toppers.
    GroupedIn(MaterialId),
    /// A heating device's aggregate output port for one material across all toppers.
    GroupedOut(MaterialId),
    /// Legacy per-topper port token (`topper-<topper_idx>-<port_idx>`), accepted on
    /// load but never produced by new connections. See spec.md §6 and §8 invariant 7.
    LegacyTopper { topper_idx: u32, port_idx: u32 },
}

impl Port {
    /// Parse a port token as it would appear in a serialized connection: either a
    /// plain non-negative integer, or one of the reserved string tokens.
    pub fn parse(token: &str) -> Option<Port> {
        if let Ok(idx) = token.parse::<u32>() {
            return Some(Port::Index(idx));
        }
        if token == FUEL_TOKEN {
            return Some(Port::Fuel);
        }
        if let Some(rest) = token.strip_prefix(GROUPED_IN_PREFIX) {
            return Some(Port::GroupedIn(MaterialId::from(rest)));
        }
        if let Some(rest) = token.strip_prefix(GROUPED_OUT_PREFIX) {
            return Some(Port::GroupedOut(MaterialId::from(rest)));
        }
        if let Some(rest) = token.strip_prefix(LEGACY_TOPPER_PREFIX) {
            let mut parts = rest.splitn(2, '-');
            let topper_idx = parts.next()?.parse().ok()?;
            let port_idx = parts.next()?.parse().ok()?;
            return Some(Port::LegacyTopper {
                topper_idx,
                port_idx,
            });
        }
        None
    }

    /// True if this is one of the legacy, pre-grouped-token forms that §6/§8 say must
    /// still load and produce an `outdated-port` validation issue.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Port::LegacyTopper { .. })
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Port::Index(idx) => write!(f, "{idx}"),
            Port::Fuel => f.write_str(FUEL_TOKEN),
            Port::GroupedIn(material) => write!(f, "{GROUPED_IN_PREFIX}{material}"),
            Port::GroupedOut(material) => write!(f, "{GROUPED_OUT_PREFIX}{material}"),
            Port::LegacyTopper {
                topper_idx,
                port_idx,
            } => write!(f, "{LEGACY_TOPPER_PREFIX}{topper_idx}-{port_idx}"),
        }
    }
}

impl Serialize for Port {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Port::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid port token {s:?}")))
    }
}

impl From<u32> for Port {
    fn from(idx: u32) -> Self {
        Port::Index(idx)
    }
}
