//! Field ACL checks for queries.
//!
//! Walks a query's predicate, sorts, computed keys and desired keys and
//! works out which access mode each referenced field needs:
//!
//! - Inside a simple predicate: discoverable or comparable.
//! - Inside any other predicate: comparable.
//! - In a sort: comparable.
//! - Computed and desired keys: readable.
//!
//! A predicate is simple when it is `eq`, `in` or `and`, and every
//! enclosing predicate is simple too. Anything under `or`, `not` or a
//! function predicate is therefore only comparable.
//!
//! # Pre-conditions
//!
//! - The query has been validated.
//!
//! # Post-conditions
//!
//! - `check` fails with `RecordQueryDenied` on the first field the viewer
//!   lacks access to, or `RecordQueryInvalid` when a keypath walks through
//!   a field that is not a reference.

use serde_json::{Map, json};

use crate::acl::{FieldAccessMode, FieldAcl};
use crate::context::AuthInfo;
use crate::error::{EngineError, ErrorKind};
use crate::query::types::{Expression, Operator, Predicate, PredicateChild, Query};
use crate::schema::FieldType;
use crate::storage::Storage;
use crate::types::record::{is_reserved_field, is_user_reference_field};

/// Checks a query against the field ACL.
pub struct QueryAccessChecker<'a> {
    field_acl: &'a FieldAcl,
    storage: &'a dyn Storage,
    user_record_type: &'a str,
}

impl<'a> QueryAccessChecker<'a> {
    #[must_use]
    pub const fn new(
        field_acl: &'a FieldAcl,
        storage: &'a dyn Storage,
        user_record_type: &'a str,
    ) -> Self {
        Self {
            field_acl,
            storage,
            user_record_type,
        }
    }

    /// Check every field `query` touches.
    pub fn check(&self, query: &Query) -> Result<(), EngineError> {
        if query.bypass_access_control {
            return Ok(());
        }
        let auth = query.view_as_user.as_ref();
        let record_type = query.record_type.as_str();

        if let Some(predicate) = &query.predicate {
            self.check_predicate(record_type, predicate, &[], auth)?;
        }
        for sort in &query.sorts {
            self.check_expression(
                record_type,
                &sort.expression,
                FieldAccessMode::Comparable,
                auth,
            )?;
        }
        for expression in query.computed_keys.values() {
            self.check_expression(record_type, expression, FieldAccessMode::Readable, auth)?;
        }
        for key in query.desired_keys.iter().flatten() {
            self.check_key_path(record_type, key, FieldAccessMode::Readable, auth)?;
        }
        Ok(())
    }

    /// `enclosing` holds the simplicity of every ancestor, outermost first.
    fn check_predicate(
        &self,
        record_type: &str,
        predicate: &Predicate,
        enclosing: &[bool],
        auth: Option<&AuthInfo>,
    ) -> Result<(), EngineError> {
        let simple = is_simple(predicate) && enclosing.last().is_none_or(|parent| *parent);
        let mode = if simple {
            FieldAccessMode::DiscoverableOrComparable
        } else {
            FieldAccessMode::Comparable
        };

        let mut stack = enclosing.to_vec();
        stack.push(simple);

        for child in &predicate.children {
            match child {
                PredicateChild::Predicate(inner) => {
                    self.check_predicate(record_type, inner, &stack, auth)?;
                }
                PredicateChild::Expression(expression) => {
                    self.check_expression(record_type, expression, mode, auth)?;
                }
            }
        }
        Ok(())
    }

    fn check_expression(
        &self,
        record_type: &str,
        expression: &Expression,
        mode: FieldAccessMode,
        auth: Option<&AuthInfo>,
    ) -> Result<(), EngineError> {
        match expression {
            Expression::Literal(_) => Ok(()),
            Expression::KeyPath(path) => self.check_key_path(record_type, path, mode, auth),
            Expression::Function(func) => func
                .referenced_key_paths()
                .into_iter()
                .try_for_each(|path| self.check_key_path(record_type, path, mode, auth)),
        }
    }

    fn check_key_path(
        &self,
        record_type: &str,
        path: &str,
        mode: FieldAccessMode,
        auth: Option<&AuthInfo>,
    ) -> Result<(), EngineError> {
        let components: Vec<&str> = path.split('.').collect();
        let mut current_type = record_type.to_owned();

        for (i, component) in components.iter().enumerate() {
            if !is_reserved_field(component)
                && !self
                    .field_acl
                    .accessible(&current_type, component, mode, auth, None)
            {
                let mut info = Map::new();
                info.insert("field".to_owned(), json!(component));
                info.insert("access".to_owned(), json!(mode.to_string()));
                return Err(EngineError::new(
                    ErrorKind::RecordQueryDenied,
                    format!("Cannot query on field \"{component}\" due to Field ACL: not {mode}"),
                )
                .with_info(info));
            }

            if i + 1 < components.len() {
                current_type = self.referenced_type(&current_type, component, path)?;
            }
        }
        Ok(())
    }

    /// The record type `field` of `record_type` refers to.
    fn referenced_type(
        &self,
        record_type: &str,
        field: &str,
        path: &str,
    ) -> Result<String, EngineError> {
        if is_user_reference_field(field) {
            return Ok(self.user_record_type.to_owned());
        }
        match self.storage.get_schema(record_type)?.get(field) {
            Some(FieldType::Reference(target)) => Ok(target.clone()),
            _ => Err(EngineError::new(
                ErrorKind::RecordQueryInvalid,
                format!(
                    "keypath \"{path}\" continues past \"{record_type}.{field}\", \
                     which is not a reference"
                ),
            )),
        }
    }
}

fn is_simple(predicate: &Predicate) -> bool {
    matches!(predicate.operator, Operator::Equal | Operator::In | Operator::And)
}
