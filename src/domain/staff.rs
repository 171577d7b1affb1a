use std::{fmt, num::NonZeroU64, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// The unique, store-assigned identifier of a staff record.
///
/// Identifiers are positive integers. Zero is reserved: as a parent reference
/// it means "no manager" (see [`Parent::Root`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(NonZeroU64);

impl StaffId {
    /// Create an identifier from a raw integer.
    ///
    /// Returns `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StaffId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidIdError(s.to_string()))
    }
}

/// Error returned when a string is not a positive integer identifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid staff ID '{0}': must be a positive integer")]
pub struct InvalidIdError(String);

/// A staff member's manager.
///
/// On the wire this is the integer `pid`, where `0` denotes the chief (the
/// single record with no manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum Parent {
    /// No manager: this record is the chief.
    Root,
    /// Reports to the staff member with the given ID.
    Staff(StaffId),
}

impl Parent {
    /// The wire value: `0` for the root, otherwise the manager's ID.
    #[must_use]
    pub const fn pid(self) -> u64 {
        match self {
            Self::Root => 0,
            Self::Staff(id) => id.get(),
        }
    }
}

impl From<u64> for Parent {
    fn from(pid: u64) -> Self {
        StaffId::new(pid).map_or(Self::Root, Self::Staff)
    }
}

impl From<Parent> for u64 {
    fn from(parent: Parent) -> Self {
        parent.pid()
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "none (chief)"),
            Self::Staff(id) => write!(f, "{id}"),
        }
    }
}

/// The descriptive, freely editable part of a staff record.
///
/// Every field is optional. When a `Profile` is used as a patch, `None` means
/// "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Job title.
    #[serde(default)]
    pub position: Option<String>,
    /// Contact email, unique across the directory.
    #[serde(default)]
    pub email: Option<String>,
    /// Home phone number.
    #[serde(default)]
    pub home_phone: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Profile {
    /// Overwrite the fields that are present in `patch`.
    ///
    /// Fields absent from the patch keep their current values.
    pub fn apply(&mut self, patch: Self) {
        let Self {
            first_name,
            last_name,
            position,
            email,
            home_phone,
            notes,
        } = patch;

        overwrite(&mut self.first_name, first_name);
        overwrite(&mut self.last_name, last_name);
        overwrite(&mut self.position, position);
        overwrite(&mut self.email, email);
        overwrite(&mut self.home_phone, home_phone);
        overwrite(&mut self.notes, notes);
    }
}

fn overwrite(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// A single member of staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRecord {
    id: StaffId,
    #[serde(rename = "pid")]
    parent: Parent,
    #[serde(flatten)]
    profile: Profile,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StaffRecord {
    /// Construct a freshly created record.
    ///
    /// Both timestamps are set to `now`.
    #[must_use]
    pub(crate) const fn new(
        id: StaffId,
        parent: Parent,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            parent,
            profile,
            created_at: now,
            updated_at: now,
        }
    }

    /// The unique, immutable identifier.
    #[must_use]
    pub const fn id(&self) -> StaffId {
        self.id
    }

    /// This record's manager.
    #[must_use]
    pub const fn parent(&self) -> Parent {
        self.parent
    }

    /// Descriptive fields.
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    /// When the record was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the record was last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The email address, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.profile.email.as_deref()
    }

    /// First and last name joined by a space.
    ///
    /// Falls back to `#<id>` when neither name is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [&self.profile.first_name, &self.profile.last_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        if name.trim().is_empty() {
            format!("#{}", self.id)
        } else {
            name
        }
    }

    /// Replace the parent and profile, refreshing `updated_at`.
    ///
    /// `updated_at` is strictly increasing for a given record, even when the
    /// clock has not visibly advanced since the previous write.
    pub(crate) fn revise(&mut self, parent: Parent, profile: Profile, now: DateTime<Utc>) {
        self.parent = parent;
        self.profile = profile;
        self.updated_at = now.max(self.updated_at + TimeDelta::microseconds(1));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn id(raw: u64) -> StaffId {
        StaffId::new(raw).unwrap()
    }

    #[test]
    fn zero_is_not_an_id() {
        assert!(StaffId::new(0).is_none());
        assert_eq!(StaffId::new(7).map(StaffId::get), Some(7));
    }

    #[test]
    fn parses_ids_from_strings() {
        assert_eq!("12".parse::<StaffId>(), Ok(id(12)));
        assert!("0".parse::<StaffId>().is_err());
        assert!("-3".parse::<StaffId>().is_err());
        assert!("abc".parse::<StaffId>().is_err());
    }

    #[test]
    fn parent_maps_zero_to_root() {
        assert_eq!(Parent::from(0), Parent::Root);
        assert_eq!(Parent::from(5), Parent::Staff(id(5)));
        assert_eq!(Parent::Staff(id(5)).pid(), 5);
        assert_eq!(Parent::Root.pid(), 0);
    }

    #[test]
    fn record_serialises_parent_as_pid() {
        let record = StaffRecord::new(id(3), Parent::Root, Profile::default(), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["pid"], 0);

        let back: StaffRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn apply_keeps_absent_fields() {
        let mut profile = Profile {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            ..Profile::default()
        };

        profile.apply(Profile {
            position: Some("Analyst".into()),
            ..Profile::default()
        });

        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
        assert_eq!(profile.position.as_deref(), Some("Analyst"));
    }

    #[test]
    fn display_name_joins_present_parts() {
        let now = Utc::now();
        let full = StaffRecord::new(
            id(1),
            Parent::Root,
            Profile {
                first_name: Some("Grace".into()),
                last_name: Some("Hopper".into()),
                ..Profile::default()
            },
            now,
        );
        assert_eq!(full.display_name(), "Grace Hopper");

        let anonymous = StaffRecord::new(id(9), Parent::Root, Profile::default(), now);
        assert_eq!(anonymous.display_name(), "#9");
    }

    #[test]
    fn revise_always_advances_updated_at() {
        let now = Utc::now();
        let mut record = StaffRecord::new(id(1), Parent::Root, Profile::default(), now);
        record.revise(Parent::Root, Profile::default(), now);
        assert!(record.updated_at() > record.created_at());
    }
}
