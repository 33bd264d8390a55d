//! Room membership for cliprelay.
//!
//! A room has no lifecycle of its own: it exists exactly as long as at
//! least one live connection is assigned to its id. This crate tracks
//! that membership and delivers server pushes within a room.

mod registry;

pub use registry::RoomRegistry;
