//! String hygiene for outgoing entities.
//!
//! Every string field, nested ones included, is trimmed and cut to a maximum
//! number of characters. Each cut is logged with the field, the entity and
//! the value that was kept.

use uuid::Uuid;

use crate::target::{OrgUnit, User};

pub trait Sanitize {
  fn sanitize(&mut self, max_len: usize);
}

fn clean(field: &str, entity: Uuid, value: &mut String, max_len: usize) {
  let trimmed = value.trim();
  if trimmed.len() != value.len() {
    *value = trimmed.to_string();
  }
  if value.chars().count() > max_len {
    *value = value.chars().take(max_len).collect();
    tracing::warn!(
      field,
      %entity,
      value = %value,
      max_len,
      "truncated field"
    );
  }
}

fn clean_opt(field: &str, entity: Uuid, value: &mut Option<String>, max_len: usize) {
  if let Some(v) = value {
    clean(field, entity, v, max_len);
  }
}

impl Sanitize for OrgUnit {
  fn sanitize(&mut self, max_len: usize) {
    let id = self.uuid;
    let fields: [(&str, &mut Option<String>); 21] = [
      ("ShortKey", &mut self.short_key),
      ("Name", &mut self.name),
      ("PhoneNumber", &mut self.phone_number),
      ("Email", &mut self.email),
      ("Location", &mut self.location),
      ("LOSShortName", &mut self.los_short_name),
      ("LOSId", &mut self.los_id),
      ("DtrId", &mut self.dtr_id),
      ("ContactOpenHours", &mut self.contact_open_hours),
      ("EmailRemarks", &mut self.email_remarks),
      ("Contact", &mut self.contact),
      ("PostReturn", &mut self.post_return),
      ("PhoneOpenHours", &mut self.phone_open_hours),
      ("Ean", &mut self.ean),
      ("Url", &mut self.url),
      ("Landline", &mut self.landline),
      ("Post", &mut self.post),
      ("PostSecondary", &mut self.post_secondary),
      ("FOA", &mut self.foa),
      ("PNR", &mut self.pnr),
      ("SOR", &mut self.sor),
    ];
    for (field, value) in fields {
      clean_opt(field, id, value, max_len);
    }
  }
}

impl Sanitize for User {
  fn sanitize(&mut self, max_len: usize) {
    let id = self.uuid;
    clean_opt("ShortKey", id, &mut self.short_key, max_len);
    clean("UserId", id, &mut self.user_id, max_len);
    clean("Name", id, &mut self.person.name, max_len);
    clean_opt("Cpr", id, &mut self.person.cpr, max_len);
    clean_opt("PhoneNumber", id, &mut self.phone_number, max_len);
    clean_opt("Landline", id, &mut self.landline, max_len);
    clean_opt("Email", id, &mut self.email, max_len);
    clean_opt("RacfID", id, &mut self.racf_id, max_len);
    clean_opt("Location", id, &mut self.location, max_len);
    clean_opt("FMKID", id, &mut self.fmk_id, max_len);
    for position in self.positions_mut() {
      clean("Name", id, &mut position.name, max_len);
    }
  }
}
