//! Text path: vendor command dumps into devices and trait trees.
pub mod cisco;
pub mod topology;
pub mod trait_map;
pub mod traits;

pub use topology::{Mac, PhysicalNode, Port, Vlan};
pub use trait_map::TraitMap;
pub use traits::{Trait, TraitValue, ValueKind};
