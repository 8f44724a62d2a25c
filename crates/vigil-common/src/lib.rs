//! # Vigil Common
//!
//! Common types shared by the Vigil stat core and its collaborators.
//!
//! This crate provides:
//! - Handle and ID types (entities, powers, campaign statuses, items)
//! - Map positions
//! - The error taxonomy used at content-load time
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_generation_mismatch() {
        let a = EntityHandle::new(3, 1);
        let b = EntityHandle::new(3, 3);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
    }

    #[test]
    fn test_null_ids_are_invalid() {
        assert!(!PowerId::NONE.is_valid());
        assert!(!StatusId::NONE.is_valid());
        assert!(!ItemId::NONE.is_valid());
        assert!(PowerId::new(7).is_valid());
    }

    #[test]
    fn test_position_floor() {
        let pos = Position::new(2.7, -0.3);
        assert_eq!(pos.tile(), (2, -1));
    }
}
