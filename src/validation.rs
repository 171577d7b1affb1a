//! The validation stage.
//!
//! Field constraints are declared in a single table and evaluated uniformly.
//! There are no cross-field rules here; those belong to the hierarchy checks
//! in [`crate::service::hierarchy`].

use std::{collections::BTreeMap, fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::domain::{Parent, Profile, StaffFields};

/// A validated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// The manager reference.
    Pid,
    /// Given name.
    FirstName,
    /// Family name.
    LastName,
    /// Job title.
    Position,
    /// Contact email.
    Email,
    /// Home phone number.
    HomePhone,
    /// Free-form notes.
    Notes,
}

impl Field {
    /// The field's name as it appears in request payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Position => "position",
            Self::Email => "email",
            Self::HomePhone => "homePhone",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every violated field with one human-readable message each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Violations(BTreeMap<Field, String>);

impl Violations {
    /// Whether no field was violated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of violated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The message for a field, if it was violated.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Iterate over violated fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// Record a violation. The first message recorded for a field wins.
    fn insert(&mut self, field: Field, message: String) {
        self.0.entry(field).or_insert(message);
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

/// A validated field set, ready to be applied to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    /// The new manager, if the field was supplied.
    pub parent: Option<Parent>,
    /// The supplied descriptive fields. `None` means "not supplied".
    pub profile: Profile,
}

/// A single constraint on a text field.
#[derive(Debug, Clone, Copy)]
enum Constraint {
    MaxLength(usize),
    NotBlank,
    Email,
    Phone,
}

impl Constraint {
    fn check(self, value: &str) -> Result<(), String> {
        match self {
            Self::MaxLength(limit) if value.chars().count() > limit => Err(format!(
                "This value is too long. It should have {limit} characters or less."
            )),
            Self::NotBlank if value.trim().is_empty() => {
                Err("This value should not be blank.".to_string())
            }
            // Empty strings are left to `NotBlank`, as for the other formats.
            Self::Email if !value.is_empty() && !EMAIL.is_match(value) => {
                Err("This value is not a valid email address.".to_string())
            }
            Self::Phone if !value.is_empty() && !PHONE.is_match(value) => {
                Err("Phone number format is invalid".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// HTML5 email syntax: a local part, `@`, and a dotted domain.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// ASCII digits, spaces and punctuation only.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[1-9](?-u:[\d\s\-()]){7,20}$").expect("phone pattern is valid")
});

/// Constraints per text field, evaluated in order.
const RULES: &[(Field, &[Constraint])] = &[
    (Field::FirstName, &[Constraint::MaxLength(100), Constraint::NotBlank]),
    (Field::LastName, &[Constraint::MaxLength(100), Constraint::NotBlank]),
    (Field::Position, &[Constraint::MaxLength(150)]),
    (Field::Email, &[Constraint::Email, Constraint::MaxLength(255)]),
    (Field::HomePhone, &[Constraint::MaxLength(20), Constraint::Phone]),
    (Field::Notes, &[Constraint::MaxLength(5000)]),
];

fn text(fields: &StaffFields, field: Field) -> Option<&str> {
    match field {
        Field::Pid => None,
        Field::FirstName => fields.first_name.as_deref(),
        Field::LastName => fields.last_name.as_deref(),
        Field::Position => fields.position.as_deref(),
        Field::Email => fields.email.as_deref(),
        Field::HomePhone => fields.home_phone.as_deref(),
        Field::Notes => fields.notes.as_deref(),
    }
}

/// Check every supplied field against its constraints.
///
/// All violations are collected; nothing short-circuits across fields.
///
/// # Errors
///
/// Returns the full set of violations if any field is invalid.
pub fn validate(fields: &StaffFields) -> Result<Changes, Violations> {
    let mut violations = Violations::default();

    let parent = match fields.pid {
        None => None,
        Some(None) => {
            violations.insert(Field::Pid, "This value should not be null.".to_string());
            None
        }
        Some(Some(pid)) => u64::try_from(pid).map(Parent::from).map_or_else(
            |_| {
                violations.insert(
                    Field::Pid,
                    "This value should be either positive or zero.".to_string(),
                );
                None
            },
            Some,
        ),
    };

    for (field, constraints) in RULES {
        let Some(value) = text(fields, *field) else {
            continue;
        };
        if let Some(message) = constraints.iter().find_map(|c| c.check(value).err()) {
            violations.insert(*field, message);
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(Changes {
        parent,
        profile: Profile {
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            position: fields.position.clone(),
            email: fields.email.clone(),
            home_phone: fields.home_phone.clone(),
            notes: fields.notes.clone(),
        },
    })
}
