//! Operator-supplied Jinja templates that override mapped user fields.
//!
//! Templates are keyed by the field they produce:
//!
//! | key            | replaces              |
//! |----------------|-----------------------|
//! | `person.name`  | the person's name     |
//! | `user.user_id` | the directory user id |
//!
//! Every template sees the same variables: `uuid`, `name`, `nickname`, `cpr`
//! and `user_key`. Absent values are empty strings, so `{% if nickname %}`
//! works as expected. Unknown variables are render errors.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, source::Employee};

pub const PERSON_NAME: &str = "person.name";
pub const USER_ID: &str = "user.user_id";

const FIELDS: &[&str] = &[PERSON_NAME, USER_ID];

/// Variables visible to a template.
#[derive(Debug, Serialize)]
pub struct TemplateContext<'a> {
  pub uuid:     Uuid,
  pub name:     &'a str,
  pub nickname: &'a str,
  pub cpr:      &'a str,
  /// The username found on an IT-account, or empty.
  pub user_key: &'a str,
}

impl<'a> TemplateContext<'a> {
  pub fn new(employee: &'a Employee, user_key: Option<&'a str>) -> Self {
    Self {
      uuid:     employee.uuid,
      name:     &employee.name,
      nickname: employee.nickname.as_deref().unwrap_or_default(),
      cpr:      employee.cpr.as_deref().unwrap_or_default(),
      user_key: user_key.unwrap_or_default(),
    }
  }
}

fn environment<'s>() -> Environment<'s> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Strict);
  env
}

/// Check that every key names a known field and every template parses.
pub fn validate(templates: &BTreeMap<String, String>) -> Result<()> {
  let env = environment();
  for (field, source) in templates {
    if !FIELDS.contains(&field.as_str()) {
      return Err(Error::UnknownTemplateField(field.clone()));
    }
    env
      .template_from_str(source)
      .map_err(|source| Error::TemplateSyntax { field: field.clone(), source })?;
  }
  Ok(())
}

/// Render the template configured for `field`; `None` when there is none.
pub fn render(
  templates: &BTreeMap<String, String>,
  field: &str,
  ctx: &TemplateContext<'_>,
) -> Result<Option<String>> {
  let Some(source) = templates.get(field) else {
    return Ok(None);
  };
  let env = environment();
  let template = env
    .template_from_str(source)
    .map_err(|source| Error::TemplateSyntax { field: field.to_string(), source })?;
  let rendered = template
    .render(ctx)
    .map_err(|source| Error::TemplateRender { field: field.to_string(), source })?;
  Ok(Some(rendered))
}
