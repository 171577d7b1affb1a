//! Transport-free API surface
//!
//! Each operation takes the raw request inputs (path ID, query, JSON body)
//! and returns a [`Response`]: an HTTP status code and a JSON [`Envelope`].
//! Nothing here speaks HTTP; a server or the CLI supplies the transport.

use std::collections::BTreeMap;

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    domain::{StaffFields, StaffId, StaffRecord},
    service::{ListRequest, Pagination, ServiceError, StaffService},
    storage::{Filters, IdFilter, RecordStore},
    validation::Violations,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A status code and JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Envelope,
}

impl Response {
    fn ok(status: u16, message: Option<&str>, data: Data) -> Self {
        Self {
            status,
            body: Envelope {
                success: true,
                message: message.map(ToString::to_string),
                data: Some(data),
                errors: None,
                pagination: None,
            },
        }
    }

    fn done(message: &str) -> Self {
        Self {
            status: 200,
            body: Envelope {
                success: true,
                message: Some(message.to_string()),
                data: None,
                errors: None,
                pagination: None,
            },
        }
    }

    fn failure(status: u16, message: String) -> Self {
        Self {
            status,
            body: Envelope {
                success: false,
                message: Some(message),
                data: None,
                errors: None,
                pagination: None,
            },
        }
    }

    /// Map a service error, prefixing unexpected failures with `context`.
    fn error(error: ServiceError, context: &str) -> Self {
        let status = error.status();
        match error {
            ServiceError::ValidationFailed(violations) => {
                let mut response = Self::failure(status, format!("Validation failed: {violations}"));
                response.body.errors = Some(violations);
                response
            }
            ServiceError::Store(_) => {
                tracing::error!("{context}: {error}");
                Self::failure(status, format!("{context}: {error}"))
            }
            other => Self::failure(status, other.to_string()),
        }
    }

    fn invalid_json() -> Self {
        Self::failure(400, "Invalid JSON data".to_string())
    }

    fn not_found(id: u64) -> Self {
        Self::failure(404, format!("Staff member with ID {id} not found"))
    }

    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The JSON body of every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Whether the operation succeeded.
    pub success: bool,
    /// A human-readable outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The affected record or records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    /// Field violations, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Violations>,
    /// Page metadata, for listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// The payload of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Data {
    /// A single record.
    Record(StaffView),
    /// A page of records.
    Records(Vec<StaffView>),
}

/// A staff record as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffView {
    /// Record ID.
    pub id: u64,
    /// Manager ID, `0` for the chief.
    pub pid: u64,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Job title.
    pub position: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Home phone number.
    pub home_phone: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Creation time, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
    /// Last update time, `YYYY-MM-DD HH:MM:SS`.
    pub updated_at: String,
}

impl From<&StaffRecord> for StaffView {
    fn from(record: &StaffRecord) -> Self {
        let profile = record.profile().clone();
        Self {
            id: record.id().get(),
            pid: record.parent().pid(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            position: profile.position,
            email: profile.email,
            home_phone: profile.home_phone,
            notes: profile.notes,
            created_at: record.created_at().format(TIMESTAMP_FORMAT).to_string(),
            updated_at: record.updated_at().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// The query parameters of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
    /// Name search term.
    pub search: Option<String>,
    /// Exact job title.
    pub position: Option<String>,
    /// Generic filters: `id`, `email` and `last_name`.
    ///
    /// Empty values, an `id` of `0` and unknown keys are ignored. Any other
    /// `id` that is not a positive integer matches nothing.
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    /// The equivalent service request.
    #[must_use]
    pub fn to_request(&self) -> ListRequest {
        let mut filters = Filters::default();
        for (key, value) in &self.filters {
            let value = value.trim();
            match key.as_str() {
                "id" => filters.id = id_filter(value),
                "email" => filters.email = NonEmptyString::new(value.to_string()).ok(),
                "last_name" => filters.last_name = NonEmptyString::new(value.to_string()).ok(),
                _ => tracing::debug!("Ignoring unknown filter '{key}'"),
            }
        }

        ListRequest {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
            position: self.position.clone(),
            filters,
        }
    }
}

fn id_filter(value: &str) -> Option<IdFilter> {
    if value.is_empty() || value == "0" {
        return None;
    }
    Some(
        value
            .parse::<StaffId>()
            .map_or(IdFilter::Unmatchable, IdFilter::Exact),
    )
}

/// Parse a request body into a field set.
///
/// The body must be a non-empty JSON object.
fn parse_fields(body: &str) -> Option<StaffFields> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match &value {
        serde_json::Value::Object(map) if !map.is_empty() => serde_json::from_value(value).ok(),
        _ => None,
    }
}

/// The API surface over a [`StaffService`].
#[derive(Debug)]
pub struct Api<S> {
    service: StaffService<S>,
}

impl<S: RecordStore> Api<S> {
    /// Expose a service.
    #[must_use]
    pub const fn new(service: StaffService<S>) -> Self {
        Self { service }
    }

    /// The underlying service.
    #[must_use]
    pub const fn service(&self) -> &StaffService<S> {
        &self.service
    }

    /// `GET /staff`
    #[instrument(level = "debug", skip(self))]
    pub fn list(&self, query: &ListQuery) -> Response {
        match self.service.list(&query.to_request()) {
            Ok(listing) => {
                let records = listing.items.iter().map(StaffView::from).collect();
                let mut response = Response::ok(200, None, Data::Records(records));
                response.body.pagination = Some(listing.pagination);
                response
            }
            Err(e) => Response::error(e, "Error fetching staff"),
        }
    }

    /// `GET /staff/{id}`
    #[instrument(level = "debug", skip(self))]
    pub fn get(&self, id: u64) -> Response {
        let Some(id) = StaffId::new(id) else {
            return Response::failure(404, "Staff member not found".to_string());
        };
        match self.service.get(id) {
            Ok(record) => Response::ok(200, None, Data::Record((&record).into())),
            Err(ServiceError::RecordNotFound(_)) => {
                Response::failure(404, "Staff member not found".to_string())
            }
            Err(e) => Response::error(e, "Error fetching staff member"),
        }
    }

    /// `POST /staff`
    #[instrument(level = "debug", skip(self, body))]
    pub fn create(&self, body: &str) -> Response {
        let Some(fields) = parse_fields(body) else {
            return Response::invalid_json();
        };
        match self.service.create(&fields) {
            Ok(record) => Response::ok(
                201,
                Some("Staff member created successfully"),
                Data::Record((&record).into()),
            ),
            Err(e) => Response::error(e, "Error creating staff member"),
        }
    }

    /// `PUT /staff/{id}`
    #[instrument(level = "debug", skip(self, body))]
    pub fn update(&self, id: u64, body: &str) -> Response {
        let Some(fields) = parse_fields(body) else {
            return Response::invalid_json();
        };
        let Some(staff_id) = StaffId::new(id) else {
            return Response::not_found(id);
        };
        match self.service.update(staff_id, &fields) {
            Ok(record) => Response::ok(
                200,
                Some("Staff member updated successfully"),
                Data::Record((&record).into()),
            ),
            Err(e) => Response::error(e, "Error updating staff member"),
        }
    }

    /// `DELETE /staff/{id}`
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&self, id: u64) -> Response {
        let Some(staff_id) = StaffId::new(id) else {
            return Response::not_found(id);
        };
        match self.service.delete(staff_id) {
            Ok(_) => Response::done("Staff member deleted successfully"),
            Err(e) => Response::error(e, "Error deleting staff member"),
        }
    }

    /// Check a body against the field rules without storing anything.
    #[instrument(level = "debug", skip(self, body))]
    pub fn validate(&self, body: &str) -> Response {
        let Some(fields) = parse_fields(body) else {
            return Response::invalid_json();
        };
        match self.service.validate(&fields) {
            Ok(_) => Response::done("Staff fields are valid"),
            Err(e) => Response::error(e, "Error validating staff member"),
        }
    }
}
