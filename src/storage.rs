use std::io;

use non_empty_string::NonEmptyString;

use crate::domain::{Parent, Profile, StaffId, StaffRecord};

pub mod directory;
mod tree;

pub use directory::Directory;
pub use tree::Tree;

/// Errors raised by a record store.
///
/// These are unexpected failures, not rule violations: the service surfaces
/// them as opaque internal errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A mutation referenced a record the store does not hold.
    #[error("staff record {0} not found in store")]
    Missing(StaffId),

    /// A second record tried to claim an email address.
    #[error("email '{0}' is already stored")]
    DuplicateEmail(String),

    /// The persisted data breaks a structural rule of the store.
    #[error("corrupt staff data: {0}")]
    Corrupt(String),

    /// Reading or writing the data file failed.
    #[error("failed to access staff data: {0}")]
    Io(#[from] io::Error),

    /// The data file could not be (de)serialized.
    #[error("failed to (de)serialize staff data: {0}")]
    Json(#[from] serde_json::Error),

    /// A thread panicked while holding the store lock.
    #[error("staff store lock poisoned")]
    Poisoned,
}

/// The capabilities the service needs from durable storage.
///
/// Stores do not enforce the hierarchy invariants themselves; the service
/// checks them before every mutation, while holding exclusive access.
pub trait RecordStore {
    /// Point lookup by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find(&self, id: StaffId) -> Result<Option<StaffRecord>, StoreError>;

    /// Whether a record with the given ID exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn exists(&self, id: StaffId) -> Result<bool, StoreError>;

    /// The record with no manager, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_chief(&self) -> Result<Option<StaffRecord>, StoreError>;

    /// Lookup by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_by_email(&self, email: &str) -> Result<Option<StaffRecord>, StoreError>;

    /// Direct subordinates of `id`, ordered by last name then first name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn subordinates(&self, id: StaffId) -> Result<Vec<StaffRecord>, StoreError>;

    /// Whether `ancestor` appears on the management chain above `id`.
    ///
    /// A record is its own ancestor.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn is_ancestor(&self, ancestor: StaffId, id: StaffId) -> Result<bool, StoreError>;

    /// The total number of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count(&self) -> Result<usize, StoreError>;

    /// One page of the records matching `filters`, ordered by ID, along with
    /// the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn scan(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> Result<(Vec<StaffRecord>, usize), StoreError>;

    /// Records whose first or last name contains `term`, ignoring case,
    /// ordered by last name then first name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn search_by_name(&self, term: &str) -> Result<Vec<StaffRecord>, StoreError>;

    /// Records holding exactly `position`, ignoring case, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_by_position(&self, position: &str) -> Result<Vec<StaffRecord>, StoreError>;

    /// Store a new record, assigning its ID and timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is already stored or the write fails.
    fn insert(&mut self, parent: Parent, profile: Profile) -> Result<StaffRecord, StoreError>;

    /// Replace a record's parent and profile, refreshing `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing, the email belongs to another
    /// record, or the write fails.
    fn update(
        &mut self,
        id: StaffId,
        parent: Parent,
        profile: Profile,
    ) -> Result<StaffRecord, StoreError>;

    /// Remove a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing or the write fails.
    fn remove(&mut self, id: StaffId) -> Result<StaffRecord, StoreError>;
}

/// Narrowing criteria for [`RecordStore::scan`].
///
/// All criteria ignore case. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Exact ID.
    pub id: Option<IdFilter>,
    /// Substring of the email address.
    pub email: Option<NonEmptyString>,
    /// Prefix of the last name.
    pub last_name: Option<NonEmptyString>,
}

impl Filters {
    /// Whether `record` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, record: &StaffRecord) -> bool {
        match self.id {
            Some(IdFilter::Exact(id)) if id != record.id() => return false,
            Some(IdFilter::Unmatchable) => return false,
            _ => {}
        }

        let profile = record.profile();
        if let Some(needle) = &self.email {
            let needle = needle.as_str().to_lowercase();
            let found = profile
                .email
                .as_deref()
                .is_some_and(|email| email.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        if let Some(prefix) = &self.last_name {
            let prefix = prefix.as_str().to_lowercase();
            let found = profile
                .last_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().starts_with(&prefix));
            if !found {
                return false;
            }
        }
        true
    }
}

/// The `id` criterion of [`Filters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFilter {
    /// Only the record with this ID.
    Exact(StaffId),
    /// A value no record ID can equal, such as `abc` or `-3`.
    Unmatchable,
}

/// A 1-based page number and a page size, both at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    limit: usize,
}

impl PageRequest {
    /// Construct a page request, clamping both values to at least 1.
    #[must_use]
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// The 1-based page number.
    #[must_use]
    pub const fn page(self) -> usize {
        self.page
    }

    /// The page size.
    #[must_use]
    pub const fn limit(self) -> usize {
        self.limit
    }

    /// The number of records preceding this page.
    #[must_use]
    pub const fn offset(self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}
