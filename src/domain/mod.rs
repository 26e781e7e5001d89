//! Domain layer - comparison helpers, flag codec and the remote client port
//!
//! This module defines the array-side records and the [`ports::ArrayClient`]
//! trait that backends implement, following hexagonal architecture principles.

pub mod array;
pub mod compare;
pub mod flags;
pub mod ports;

pub use array::*;
pub use compare::{
    contains_case_insensitive, contains_exact, set_equals, set_equals_by, unique_by,
    MembershipDelta,
};
pub use flags::{apply_overrides, Flag, HostFlag, HostFlags};
pub use ports::*;
