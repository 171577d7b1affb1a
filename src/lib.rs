//! Staff directory
//!
//! Staff records are organised in a manager/subordinate tree. Every mutation
//! is validated field-by-field and checked against the hierarchy invariants
//! before it reaches the record store.

pub mod domain;
pub use domain::{Config, Parent, Profile, StaffFields, StaffId, StaffRecord};

/// Field-level validation of proposed staff records.
pub mod validation;
pub use validation::{Changes, Field, Violations};

/// Record stores: the in-memory [`Tree`] and the file-backed [`Directory`].
pub mod storage;
pub use storage::{Directory, Filters, IdFilter, PageRequest, RecordStore, StoreError, Tree};

/// Hierarchy checks and the orchestrating [`StaffService`].
pub mod service;
pub use service::{
    HierarchyError, ListRequest, Listing, Pagination, ServiceError, StaffService, Subordinate,
};

/// Mapping of service calls onto status codes and JSON envelopes.
pub mod api;
pub use api::{Api, Envelope, ListQuery, Response};
