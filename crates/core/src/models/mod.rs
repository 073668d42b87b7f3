//! Data models for FleetFlow

mod account;
mod company;
mod invitation;
mod profile;

pub use account::*;
pub use company::*;
pub use invitation::*;
pub use profile::*;
