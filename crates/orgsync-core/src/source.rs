//! Records read from the source registry.
//!
//! These are the shapes the rest of the crate works on. Backends decode their
//! wire format into them; nothing here knows about GraphQL or REST.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── IT-accounts ─────────────────────────────────────────────────────────────

/// An alternate-identity account ("IT-account") in some external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItAccount {
  pub user_key:    String,
  pub system_name: String,
  pub system_uuid: Option<Uuid>,
  /// The engagement this account is tied to, if any.
  pub engagement:  Option<Uuid>,
}

/// One registration (validity period) of an IT-account, used to detect
/// accounts that have been terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
  pub user_key:    String,
  pub system_name: String,
  /// End of validity; `None` means open-ended.
  pub valid_to:    Option<DateTime<FixedOffset>>,
  pub person:      Option<Uuid>,
  pub org_unit:    Option<Uuid>,
}

// ─── Addresses ───────────────────────────────────────────────────────────────

/// Address scope as reported by the registry's address-type class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AddressScope {
  Email,
  Phone,
  Ean,
  Pnumber,
  Dar,
  Text,
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressType {
  pub uuid:     Uuid,
  pub user_key: String,
  pub name:     String,
  pub scope:    Option<AddressScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub value:        String,
  pub address_type: AddressType,
  /// Visibility scope; `None` or `"PUBLIC"` means the value may be exported.
  pub visibility:   Option<String>,
  /// The engagement the address belongs to (person addresses only).
  pub engagement:   Option<Uuid>,
}

impl Address {
  pub fn is_public(&self) -> bool {
    matches!(self.visibility.as_deref(), None | Some("PUBLIC"))
  }

  pub fn scope(&self) -> Option<AddressScope> {
    self.address_type.scope
  }
}

// ─── Org units ───────────────────────────────────────────────────────────────

/// What relevance needs to know about a unit. Fetched in a single query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitScope {
  pub uuid:        Uuid,
  pub parent:      Option<Uuid>,
  pub ancestors:   Vec<Uuid>,
  pub unit_type:   Option<Uuid>,
  pub unit_level:  Option<Uuid>,
  /// Name of the hierarchy-model class, e.g. `"linje"`.
  pub hierarchy:   Option<String>,
  pub it_accounts: Vec<ItAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerPerson {
  pub uuid:        Uuid,
  pub it_accounts: Vec<ItAccount>,
}

/// A manager role on a unit. `person` is `None` when the role is vacant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
  pub person: Option<ManagerPerson>,
}

/// A KLE task classification attached to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kle {
  pub number: Uuid,
  /// `"Udførende"`, `"Ansvarlig"` or `"Indsigt"`.
  pub aspect: Option<String>,
}

/// Everything the mapper needs to build a directory org unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOrgUnit {
  pub scope:               UnitScope,
  pub name:                String,
  /// IT-accounts on the parent unit, for substituting the parent reference.
  pub parent_it_accounts:  Vec<ItAccount>,
  pub addresses:           Vec<Address>,
  pub managers:            Vec<Manager>,
  pub kles:                Vec<Kle>,
}

impl SourceOrgUnit {
  pub fn uuid(&self) -> Uuid {
    self.scope.uuid
  }
}

// ─── Employees ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
  pub uuid:         Uuid,
  pub job_function: String,
  /// Free-text extension field used as job title when so configured.
  pub extension_3:  Option<String>,
  pub is_primary:   bool,
  pub unit:         UnitScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  pub uuid:        Uuid,
  pub name:        String,
  pub nickname:    Option<String>,
  pub cpr:         Option<String>,
  pub addresses:   Vec<Address>,
  pub engagements: Vec<Engagement>,
  pub it_accounts: Vec<ItAccount>,
}

/// One page of the paginated employee listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeePage {
  pub items:  Vec<Uuid>,
  pub offset: usize,
  pub total:  usize,
}

/// The unit and/or person an address or IT-account belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owners {
  pub org_unit: Option<Uuid>,
  pub person:   Option<Uuid>,
}
