//! Hierarchy consistency checks
//!
//! These guard the global rules of the management tree: at most one chief,
//! every manager exists, no record manages itself (directly or through a
//! chain), and nobody with subordinates is deleted. Callers must hold
//! exclusive access to the store from the check until the write completes.

use std::fmt;

use nonempty::NonEmpty;
use tracing::instrument;

use crate::{
    domain::{Parent, StaffId},
    storage::{RecordStore, StoreError},
};

/// A direct subordinate blocking a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subordinate {
    /// The subordinate's ID.
    pub id: StaffId,
    /// First and last name.
    pub name: String,
}

/// Subordinates listed by name, comma separated.
struct Names<'a>(&'a NonEmpty<Subordinate>);

impl fmt::Display for Names<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, subordinate) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", subordinate.name)?;
        }
        Ok(())
    }
}

/// A violation of the hierarchy rules.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    /// A chief (a record with no manager) already exists.
    #[error("There can be only one chief: another staff member already has no manager")]
    RootAlreadyExists,

    /// The requested manager does not exist.
    #[error("Staff member with ID {0} not found for assignment as manager")]
    ParentNotFound(StaffId),

    /// A record was asked to manage itself.
    #[error("Staff member with ID {0} cannot be their own manager")]
    SelfParent(StaffId),

    /// The requested manager reports, directly or indirectly, to the record.
    #[error("Staff member with ID {parent} reports to staff member {id} and cannot manage them")]
    WouldCreateCycle {
        /// The record being updated.
        id: StaffId,
        /// The requested manager.
        parent: StaffId,
    },

    /// The record still manages other staff.
    #[error(
        "Cannot delete staff member with ID {id}: they have {count} subordinate(s): {names}",
        count = subordinates.len(),
        names = Names(subordinates)
    )]
    HasSubordinates {
        /// The record that was to be deleted.
        id: StaffId,
        /// Every direct subordinate, ordered by last name then first name.
        subordinates: NonEmpty<Subordinate>,
    },

    /// The store could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Check that `parent` may be assigned to a record.
///
/// `exclude` is the record being updated, if any; it is exempt from the
/// single-chief rule (it may already be the chief) and is the subject of the
/// self- and cycle checks. `None` for `parent` means the manager is not being
/// changed, and always passes.
///
/// # Errors
///
/// - [`HierarchyError::RootAlreadyExists`] if `parent` is the root and another
///   record is already the chief
/// - [`HierarchyError::ParentNotFound`] if the manager does not exist
/// - [`HierarchyError::SelfParent`] or [`HierarchyError::WouldCreateCycle`] if
///   the assignment would make the record report to itself
#[instrument(level = "debug", skip(store))]
pub fn check_assignable_parent<S: RecordStore + ?Sized>(
    store: &S,
    parent: Option<Parent>,
    exclude: Option<StaffId>,
) -> Result<(), HierarchyError> {
    match parent {
        None => Ok(()),
        Some(Parent::Root) => match store.find_chief()? {
            Some(chief) if Some(chief.id()) != exclude => Err(HierarchyError::RootAlreadyExists),
            _ => Ok(()),
        },
        Some(Parent::Staff(manager)) => {
            if exclude == Some(manager) {
                return Err(HierarchyError::SelfParent(manager));
            }
            if !store.exists(manager)? {
                return Err(HierarchyError::ParentNotFound(manager));
            }
            if let Some(id) = exclude {
                if store.is_ancestor(id, manager)? {
                    return Err(HierarchyError::WouldCreateCycle {
                        id,
                        parent: manager,
                    });
                }
            }
            Ok(())
        }
    }
}

/// Check that the record `id` may be deleted.
///
/// # Errors
///
/// Returns [`HierarchyError::HasSubordinates`], listing every direct
/// subordinate, if any record reports to `id`.
#[instrument(level = "debug", skip(store))]
pub fn check_deletable<S: RecordStore + ?Sized>(store: &S, id: StaffId) -> Result<(), HierarchyError> {
    let subordinates = store
        .subordinates(id)?
        .into_iter()
        .map(|record| Subordinate {
            id: record.id(),
            name: record.display_name(),
        })
        .collect();

    match NonEmpty::from_vec(subordinates) {
        Some(subordinates) => Err(HierarchyError::HasSubordinates { id, subordinates }),
        None => Ok(()),
    }
}
