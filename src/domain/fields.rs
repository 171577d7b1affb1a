use serde::{Deserialize, Deserializer, Serialize};

/// A proposed set of staff fields, as received from a client.
///
/// Nothing here has been validated yet; see [`crate::validation::validate`].
///
/// `pid` distinguishes an absent key (`None`, "leave the manager unchanged")
/// from an explicit `null` (`Some(None)`, rejected by validation). For every
/// other field, absent and `null` both mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffFields {
    /// Raw manager reference.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub pid: Option<Option<i64>>,
    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Job title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Home phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_phone: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StaffFields {
    /// Set the manager reference.
    #[must_use]
    pub fn with_pid(mut self, pid: i64) -> Self {
        self.pid = Some(Some(pid));
        self
    }

    /// Whether no field at all was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pid.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.position.is_none()
            && self.email.is_none()
            && self.home_phone.is_none()
            && self.notes.is_none()
    }
}

/// Deserialise a present key, keeping an explicit `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
