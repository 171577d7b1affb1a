use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::instrument;

use crate::{
    domain::{Parent, StaffFields, StaffId, StaffRecord},
    storage::{Filters, PageRequest, RecordStore, StoreError},
    validation::{self, Changes, Violations},
};

pub mod hierarchy;
pub use hierarchy::{HierarchyError, Subordinate};

/// The page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Why a service operation was refused.
///
/// Everything except [`ServiceError::Store`] is an expected condition the
/// caller can correct.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// One or more fields broke their constraints.
    #[error("Validation failed: {0}")]
    ValidationFailed(Violations),

    /// No record has the requested ID.
    #[error("Staff member with ID {0} not found")]
    RecordNotFound(StaffId),

    /// Another record already uses the email address.
    #[error("Email is already taken")]
    EmailAlreadyTaken(String),

    /// The operation would break the management hierarchy.
    #[error(transparent)]
    Hierarchy(HierarchyError),

    /// The store failed unexpectedly.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<HierarchyError> for ServiceError {
    fn from(error: HierarchyError) -> Self {
        match error {
            HierarchyError::Store(e) => Self::Store(e),
            other => Self::Hierarchy(other),
        }
    }
}

impl ServiceError {
    /// The HTTP status code this error maps to.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::ValidationFailed(_)
            | Self::Hierarchy(
                HierarchyError::ParentNotFound(_)
                | HierarchyError::SelfParent(_)
                | HierarchyError::WouldCreateCycle { .. }
                | HierarchyError::HasSubordinates { .. },
            ) => 400,
            Self::RecordNotFound(_) => 404,
            Self::EmailAlreadyTaken(_) | Self::Hierarchy(HierarchyError::RootAlreadyExists) => 409,
            Self::Store(_) | Self::Hierarchy(HierarchyError::Store(_)) => 500,
        }
    }
}

/// A request for a listing.
///
/// The first criterion present wins: `search`, then `position`, then
/// `filters`, then plain pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// 1-based page number. Defaults to 1.
    pub page: Option<usize>,
    /// Page size. Defaults to the service's configured page size.
    pub limit: Option<usize>,
    /// Substring of a first or last name.
    pub search: Option<String>,
    /// Exact job title.
    pub position: Option<String>,
    /// Narrowing criteria for a paginated scan.
    pub filters: Filters,
}

/// Page metadata for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// 1-based number of this page.
    pub current_page: usize,
    /// Requested page size.
    pub per_page: usize,
    /// Number of matching records across all pages.
    pub total: usize,
    /// Number of pages.
    pub total_pages: usize,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl Pagination {
    /// Metadata for one page of a paginated scan.
    #[must_use]
    pub const fn new(page: PageRequest, total: usize) -> Self {
        let total_pages = total.div_ceil(page.limit());
        Self {
            current_page: page.page(),
            per_page: page.limit(),
            total,
            total_pages,
            has_next: page.page() < total_pages,
            has_prev: page.page() > 1,
        }
    }

    /// Metadata for an unpaginated result, reported as a single page.
    #[must_use]
    pub const fn single(total: usize) -> Self {
        Self {
            current_page: 1,
            per_page: total,
            total,
            total_pages: 1,
            has_next: false,
            has_prev: false,
        }
    }
}

/// One page of records and its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// The records on this page.
    pub items: Vec<StaffRecord>,
    /// Where this page sits in the whole result.
    pub pagination: Pagination,
}

/// The directory service.
///
/// Orchestrates validation, uniqueness and hierarchy checks around a
/// [`RecordStore`]. Every mutation holds the write lock from its first check
/// until the store has committed, so two requests cannot both pass a check
/// that only one of them may pass.
#[derive(Debug)]
pub struct StaffService<S> {
    store: RwLock<S>,
    page_size: usize,
}

impl<S: RecordStore> StaffService<S> {
    /// Wrap a store, using the default page size.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self::with_page_size(store, DEFAULT_PAGE_SIZE)
    }

    /// Wrap a store with a page size for list requests that omit one.
    #[must_use]
    pub const fn with_page_size(store: S, page_size: usize) -> Self {
        Self {
            store: RwLock::new(store),
            page_size,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, S>, StoreError> {
        self.store.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, S>, StoreError> {
        self.store.write().map_err(|_| StoreError::Poisoned)
    }

    /// Check a field set without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ValidationFailed`] with every violation.
    pub fn validate(&self, fields: &StaffFields) -> Result<Changes, ServiceError> {
        validation::validate(fields).map_err(|violations| {
            tracing::debug!("Rejected staff fields: {violations}");
            ServiceError::ValidationFailed(violations)
        })
    }

    /// Create a staff member.
    ///
    /// A missing `pid` makes the new record the chief.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::ValidationFailed`] if any field is invalid
    /// - [`ServiceError::EmailAlreadyTaken`] if the email is in use
    /// - [`ServiceError::Hierarchy`] if the manager is missing, or a chief
    ///   already exists and none was given
    #[instrument(skip(self, fields))]
    pub fn create(&self, fields: &StaffFields) -> Result<StaffRecord, ServiceError> {
        let Changes { parent, profile } = self.validate(fields)?;
        let parent = parent.unwrap_or(Parent::Root);

        let mut store = self.write()?;
        if let Some(email) = profile.email.as_deref() {
            ensure_email_available(&*store, email, None)?;
        }
        hierarchy::check_assignable_parent(&*store, Some(parent), None)?;

        let record = store.insert(parent, profile)?;
        tracing::info!("Created staff member {}", record.id());
        Ok(record)
    }

    /// Update some fields of a staff member.
    ///
    /// Fields absent from `fields` keep their current values. An absent `pid`
    /// leaves the manager unchanged.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::RecordNotFound`] if no record has the ID
    /// - [`ServiceError::ValidationFailed`] if any supplied field is invalid
    /// - [`ServiceError::EmailAlreadyTaken`] if another record uses the email
    /// - [`ServiceError::Hierarchy`] if the new manager is missing, is the
    ///   record itself or one of its reports, or a second chief would result
    #[instrument(skip(self, fields))]
    pub fn update(&self, id: StaffId, fields: &StaffFields) -> Result<StaffRecord, ServiceError> {
        let mut store = self.write()?;
        let existing = store.find(id)?.ok_or(ServiceError::RecordNotFound(id))?;

        let Changes { parent, profile: patch } = self.validate(fields)?;
        if let Some(email) = patch.email.as_deref() {
            ensure_email_available(&*store, email, Some(id))?;
        }
        hierarchy::check_assignable_parent(&*store, parent, Some(id))?;

        let mut profile = existing.profile().clone();
        profile.apply(patch);
        let parent = parent.unwrap_or_else(|| existing.parent());

        let record = store.update(id, parent, profile)?;
        tracing::info!("Updated staff member {id}");
        Ok(record)
    }

    /// Delete a staff member with no subordinates.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::RecordNotFound`] if no record has the ID
    /// - [`ServiceError::Hierarchy`] if anyone reports to the record
    #[instrument(skip(self))]
    pub fn delete(&self, id: StaffId) -> Result<StaffRecord, ServiceError> {
        let mut store = self.write()?;
        if !store.exists(id)? {
            return Err(ServiceError::RecordNotFound(id));
        }
        hierarchy::check_deletable(&*store, id).inspect_err(|e| tracing::debug!("{e}"))?;

        let record = store.remove(id)?;
        tracing::info!("Deleted staff member {id}");
        Ok(record)
    }

    /// Look up a staff member.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::RecordNotFound`] if no record has the ID.
    pub fn get(&self, id: StaffId) -> Result<StaffRecord, ServiceError> {
        self.read()?
            .find(id)?
            .ok_or(ServiceError::RecordNotFound(id))
    }

    /// List staff members.
    ///
    /// Name searches and position lookups return every match as one page.
    /// Filtered and unfiltered listings are ordered by ID and paginated.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip(self))]
    pub fn list(&self, request: &ListRequest) -> Result<Listing, ServiceError> {
        if let Some(term) = non_blank(request.search.as_deref()) {
            let items = self.search_by_name(term)?;
            let pagination = Pagination::single(items.len());
            return Ok(Listing { items, pagination });
        }
        if let Some(position) = non_blank(request.position.as_deref()) {
            let items = self.find_by_position(position)?;
            let pagination = Pagination::single(items.len());
            return Ok(Listing { items, pagination });
        }

        let page = PageRequest::new(
            request.page.unwrap_or(1),
            request.limit.unwrap_or(self.page_size),
        );
        self.page(&request.filters, page)
    }

    /// One page of the records matching `filters`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn page(&self, filters: &Filters, page: PageRequest) -> Result<Listing, ServiceError> {
        let (items, total) = self.read()?.scan(filters, page)?;
        Ok(Listing {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    /// Staff whose first or last name contains `term`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn search_by_name(&self, term: &str) -> Result<Vec<StaffRecord>, ServiceError> {
        Ok(self.read()?.search_by_name(term)?)
    }

    /// Staff holding exactly `position`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn find_by_position(&self, position: &str) -> Result<Vec<StaffRecord>, ServiceError> {
        Ok(self.read()?.find_by_position(position)?)
    }

    /// Whether `email` belongs to a record other than `exclude`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn is_email_taken(
        &self,
        email: &str,
        exclude: Option<StaffId>,
    ) -> Result<bool, ServiceError> {
        Ok(email_taken(&*self.read()?, email, exclude)?)
    }

    /// The number of staff members.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn count(&self) -> Result<usize, ServiceError> {
        Ok(self.read()?.count()?)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn email_taken<S: RecordStore + ?Sized>(
    store: &S,
    email: &str,
    exclude: Option<StaffId>,
) -> Result<bool, StoreError> {
    if email.is_empty() {
        return Ok(false);
    }
    Ok(store
        .find_by_email(email)?
        .is_some_and(|owner| Some(owner.id()) != exclude))
}

fn ensure_email_available<S: RecordStore + ?Sized>(
    store: &S,
    email: &str,
    exclude: Option<StaffId>,
) -> Result<(), ServiceError> {
    if email_taken(store, email, exclude)? {
        tracing::debug!("Email '{email}' is already taken");
        return Err(ServiceError::EmailAlreadyTaken(email.to_string()));
    }
    Ok(())
}
