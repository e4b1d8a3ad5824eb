//! GraphQL documents sent to the registry.

/// Selection for an IT-account.
macro_rules! ituser_fields {
  () => {
    "user_key engagement_uuid itsystem { uuid name }"
  };
}

/// Selection for an address.
macro_rules! address_fields {
  () => {
    "name engagement_uuid visibility { scope } address_type { uuid user_key name scope }"
  };
}

/// What relevance needs to know about a unit.
macro_rules! scope_fields {
  () => {
    concat!(
      "uuid parent { uuid } ancestors { uuid } unit_type { uuid } ",
      "org_unit_level { uuid } org_unit_hierarchy_model { name } ",
      "itusers { ",
      ituser_fields!(),
      " }"
    )
  };
}

pub const ORG_UNITS_BELOW: &str = "
query OrgUnitsBelow($root: UUID!, $limit: int, $cursor: Cursor) {
  org_units(filter: {ancestor: {uuids: [$root]}}, limit: $limit, cursor: $cursor) {
    objects { uuid }
    page_info { next_cursor }
  }
}";

pub const READ_UNIT_SCOPE: &str = concat!(
  "query ReadUnitScope($uuid: UUID!) {
  org_units(filter: {uuids: [$uuid]}) {
    objects { current { ",
  scope_fields!(),
  " } }
  }
}"
);

pub const READ_ORG_UNIT: &str = concat!(
  "query ReadOrgUnit($uuid: UUID!) {
  org_units(filter: {uuids: [$uuid]}) {
    objects { current { ",
  scope_fields!(),
  "
      name
      parent { uuid itusers { ",
  ituser_fields!(),
  " } }
      addresses { ",
  address_fields!(),
  " }
      managers { person { uuid itusers { ",
  ituser_fields!(),
  " } } }
      kles { kle_number { uuid } kle_aspect { name } }
    } }
  }
}"
);

pub const READ_EMPLOYEE: &str = concat!(
  "query ReadEmployee($uuid: UUID!) {
  employees(filter: {uuids: [$uuid]}) {
    objects { current {
      uuid name nickname cpr_number
      addresses { ",
  address_fields!(),
  " }
      engagements {
        uuid extension_3 is_primary job_function { name }
        org_unit { ",
  scope_fields!(),
  " }
      }
      itusers { ",
  ituser_fields!(),
  " }
    } }
  }
}"
);

pub const READ_UNIT_ADDRESSES: &str = concat!(
  "query ReadUnitAddresses($uuid: UUID!) {
  addresses(filter: {org_unit: {uuids: [$uuid]}}) {
    objects { current { ",
  address_fields!(),
  " } }
  }
}"
);

pub const UNIT_EMPLOYEES: &str = "
query UnitEmployees($uuid: UUID!) {
  engagements(filter: {org_unit: {uuids: [$uuid]}}) {
    objects { current { employee_uuid } }
  }
}";

pub const ITUSER_REGISTRATIONS: &str = "
query ItUserRegistrations($uuid: UUID!) {
  itusers(filter: {uuids: [$uuid], from_date: null, to_date: null}) {
    objects {
      validities {
        user_key itsystem { name } validity { to } employee_uuid org_unit_uuid
      }
    }
  }
}";

// ── Owner lookups ────────────────────────────────────────────────────────────

pub const ADDRESS_OWNER: &str = "
query AddressOwner($uuid: UUID!) {
  addresses(filter: {uuids: [$uuid], from_date: null, to_date: null}) {
    objects { validities { org_unit_uuid employee_uuid } }
  }
}";

pub const ITUSER_OWNER: &str = "
query ItUserOwner($uuid: UUID!) {
  itusers(filter: {uuids: [$uuid], from_date: null, to_date: null}) {
    objects { validities { org_unit_uuid employee_uuid } }
  }
}";

pub const MANAGER_UNIT: &str = "
query ManagerUnit($uuid: UUID!) {
  managers(filter: {uuids: [$uuid], from_date: null, to_date: null}) {
    objects { validities { org_unit_uuid } }
  }
}";

pub const ENGAGEMENT_PERSON: &str = "
query EngagementPerson($uuid: UUID!) {
  engagements(filter: {uuids: [$uuid], from_date: null, to_date: null}) {
    objects { validities { employee_uuid } }
  }
}";

pub const KLE_UNIT: &str = "
query KleUnit($uuid: UUID!) {
  kles(filter: {uuids: [$uuid], from_date: null, to_date: null}) {
    objects { validities { org_unit_uuid } }
  }
}";
