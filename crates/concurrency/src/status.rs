//! Transaction status transitions
//!
//! Pure functions deciding how an `add` or `remove` inside a transaction
//! changes the pending status of an existing entry. The entry's own
//! `explicit` flag is passed alongside because several transitions depend
//! on it.
//!
//! ```text
//!              add(flag)                        remove(flag)
//! NEUTRAL   inferred + explicit -> EXPLICIT     same flag -> DEPRECATED
//! NEW       inferred + explicit -> flip, NEW    same flag -> ZOMBIE
//! DEPRECATED same flag -> NEUTRAL               -
//!           explicit   -> EXPLICIT
//!           inferred   -> INFERRED
//! INFERRED  explicit   -> NEUTRAL               inferred -> DEPRECATED
//! EXPLICIT  -                                   explicit -> NEUTRAL
//! ZOMBIE    any        -> NEW with flag         -
//! ```
//!
//! Anything not listed is a no-op.

use quadmem_core::TxnStatus;

/// Effect of an operation on an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changes
    Unchanged,
    /// The pending status changes
    Status(TxnStatus),
    /// The pending status changes and the entry's flag is overwritten
    StatusAndFlag(TxnStatus, bool),
}

impl Transition {
    /// Check whether the operation changed anything
    pub fn is_change(self) -> bool {
        !matches!(self, Transition::Unchanged)
    }
}

/// Transition for adding a statement that already has an entry
pub fn on_add(status: TxnStatus, stored_explicit: bool, explicit: bool) -> Transition {
    use TxnStatus::*;
    match status {
        Neutral if !stored_explicit && explicit => Transition::Status(Explicit),
        New if !stored_explicit && explicit => Transition::StatusAndFlag(New, true),
        Deprecated if stored_explicit == explicit => Transition::Status(Neutral),
        Deprecated if explicit => Transition::Status(Explicit),
        Deprecated => Transition::Status(Inferred),
        Inferred if explicit => Transition::Status(Neutral),
        Zombie => Transition::StatusAndFlag(New, explicit),
        _ => Transition::Unchanged,
    }
}

/// Transition for removing a statement that has an entry
pub fn on_remove(status: TxnStatus, stored_explicit: bool, explicit: bool) -> Transition {
    use TxnStatus::*;
    match status {
        Neutral if stored_explicit == explicit => Transition::Status(Deprecated),
        New if stored_explicit == explicit => Transition::Status(Zombie),
        Inferred if stored_explicit && !explicit => Transition::Status(Deprecated),
        Explicit if !stored_explicit && explicit => Transition::Status(Neutral),
        _ => Transition::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadmem_core::TxnStatus::*;

    // ========================================================================
    // add
    // ========================================================================

    #[test]
    fn test_add_neutral() {
        assert_eq!(on_add(Neutral, false, true), Transition::Status(Explicit));
        assert_eq!(on_add(Neutral, true, true), Transition::Unchanged);
        assert_eq!(on_add(Neutral, false, false), Transition::Unchanged);
        // explicit subsumes inferred
        assert_eq!(on_add(Neutral, true, false), Transition::Unchanged);
    }

    #[test]
    fn test_add_new_flips_in_place() {
        assert_eq!(on_add(New, false, true), Transition::StatusAndFlag(New, true));
        assert_eq!(on_add(New, true, true), Transition::Unchanged);
        assert_eq!(on_add(New, true, false), Transition::Unchanged);
    }

    #[test]
    fn test_add_deprecated() {
        assert_eq!(on_add(Deprecated, true, true), Transition::Status(Neutral));
        assert_eq!(on_add(Deprecated, false, false), Transition::Status(Neutral));
        assert_eq!(on_add(Deprecated, false, true), Transition::Status(Explicit));
        assert_eq!(on_add(Deprecated, true, false), Transition::Status(Inferred));
    }

    #[test]
    fn test_add_inferred_and_explicit() {
        assert_eq!(on_add(Inferred, true, true), Transition::Status(Neutral));
        assert_eq!(on_add(Inferred, true, false), Transition::Unchanged);
        assert_eq!(on_add(Explicit, false, true), Transition::Unchanged);
        assert_eq!(on_add(Explicit, false, false), Transition::Unchanged);
    }

    #[test]
    fn test_add_zombie_revives() {
        assert_eq!(on_add(Zombie, true, false), Transition::StatusAndFlag(New, false));
        assert_eq!(on_add(Zombie, false, true), Transition::StatusAndFlag(New, true));
    }

    // ========================================================================
    // remove
    // ========================================================================

    #[test]
    fn test_remove_matching_flag() {
        assert_eq!(on_remove(Neutral, true, true), Transition::Status(Deprecated));
        assert_eq!(on_remove(New, false, false), Transition::Status(Zombie));
    }

    #[test]
    fn test_remove_non_matching_flag_is_noop() {
        assert_eq!(on_remove(Neutral, true, false), Transition::Unchanged);
        assert_eq!(on_remove(New, true, false), Transition::Unchanged);
    }

    #[test]
    fn test_remove_pending_flips() {
        assert_eq!(on_remove(Inferred, true, false), Transition::Status(Deprecated));
        assert_eq!(on_remove(Inferred, true, true), Transition::Unchanged);
        assert_eq!(on_remove(Explicit, false, true), Transition::Status(Neutral));
        assert_eq!(on_remove(Explicit, false, false), Transition::Unchanged);
    }

    #[test]
    fn test_remove_already_removed_is_noop() {
        assert!(!on_remove(Deprecated, true, true).is_change());
        assert!(!on_remove(Zombie, true, true).is_change());
    }
}
