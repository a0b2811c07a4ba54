//! Map types shared by the runtime and the list controller.
//!
//! `hashbrown` backs them unless the `std-hash` feature asks for the
//! standard library maps.

#[cfg(not(feature = "std-hash"))]
pub(crate) use hashbrown::{HashMap, HashSet};

#[cfg(feature = "std-hash")]
pub(crate) use std::collections::{HashMap, HashSet};
