//! Query request parsing.
//!
//! Turns the untyped JSON form of a query into a [`Query`]:
//!
//! ```json
//! {
//!   "record_type": "note",
//!   "predicate": ["and",
//!     ["eq", {"$type": "keypath", "$val": "category"}, "work"],
//!     ["lt", ["func", "distance", {"$type": "keypath", "$val": "location"},
//!             {"$type": "geo", "$lat": 22.3, "$lng": 114.2}], 500]],
//!   "sort": [[{"$type": "keypath", "$val": "_created_at"}, "desc"]],
//!   "include": {"author": {"$type": "keypath", "$val": "_owner"}},
//!   "desired_keys": ["title"],
//!   "limit": 20,
//!   "offset": 0,
//!   "count": true
//! }
//! ```
//!
//! Every failure is an `InvalidArgument` naming the top-level key at fault.

use serde_json::{Map, Value as JsonValue};

use crate::error::EngineError;
use crate::query::types::{
    Expression, Func, Operator, Predicate, PredicateChild, Query, RelationDirection, Sort,
    SortOrder,
};
use crate::types::record::OWNER_ID_FIELD;
use crate::types::{JsonDeserializable, Value};

/// Reserved alias for [`OWNER_ID_FIELD`] in keypaths.
const OWNER_ALIAS: &str = "_owner";

const FRIEND_RELATION: &str = "_friend";
const FOLLOW_RELATION: &str = "_follow";

/// Parses query requests on behalf of a viewer.
///
/// The viewer is captured into `userRelation` functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser<'a> {
    viewer: Option<&'a str>,
}

impl<'a> QueryParser<'a> {
    #[must_use]
    pub const fn new(viewer: Option<&'a str>) -> Self {
        Self { viewer }
    }

    /// Parse a query request.
    pub fn parse(&self, payload: &JsonValue) -> Result<Query, EngineError> {
        let Some(map) = payload.as_object() else {
            return Err(EngineError::invalid_argument(
                "query must be an object",
                &["record_type"],
            ));
        };

        let record_type = match map.get("record_type") {
            Some(JsonValue::String(s)) if !s.is_empty() => s.to_owned(),
            _ => {
                return Err(EngineError::invalid_argument(
                    "record_type must be a non-empty string",
                    &["record_type"],
                ));
            }
        };
        let mut query = Query::new(record_type);

        if let Some(raw) = present(map, "predicate") {
            let predicate = self
                .parse_predicate(raw)
                .map_err(|message| EngineError::invalid_argument(message, &["predicate"]))?;
            predicate.validate()?;
            query.predicate = Some(predicate);
        }

        if let Some(raw) = present(map, "sort") {
            query.sorts = self
                .parse_sorts(raw)
                .map_err(|message| EngineError::invalid_argument(message, &["sort"]))?;
        }

        if let Some(raw) = present(map, "include") {
            let Some(includes) = raw.as_object() else {
                return Err(EngineError::invalid_argument(
                    "include must be an object",
                    &["include"],
                ));
            };
            for (name, raw_expr) in includes {
                let expression = self.parse_expression(raw_expr).map_err(|message| {
                    EngineError::invalid_argument(
                        format!("include \"{name}\": {message}"),
                        &["include"],
                    )
                })?;
                if matches!(expression, Expression::Literal(_)) {
                    return Err(EngineError::invalid_argument(
                        format!("include \"{name}\" must be a keypath or a function"),
                        &["include"],
                    ));
                }
                query.computed_keys.insert(name.to_owned(), expression);
            }
        }

        if let Some(raw) = present(map, "desired_keys") {
            query.desired_keys = Some(parse_desired_keys(raw).ok_or_else(|| {
                EngineError::invalid_argument(
                    "desired_keys must be a list of field names",
                    &["desired_keys"],
                )
            })?);
        }

        if let Some(raw) = present(map, "limit") {
            query.limit = Some(raw.as_u64().ok_or_else(|| {
                EngineError::invalid_argument("limit must be a non-negative integer", &["limit"])
            })?);
        }

        if let Some(raw) = present(map, "offset") {
            query.offset = raw.as_u64().ok_or_else(|| {
                EngineError::invalid_argument("offset must be a non-negative integer", &["offset"])
            })?;
        }

        if let Some(raw) = present(map, "count") {
            query.get_count = raw.as_bool().ok_or_else(|| {
                EngineError::invalid_argument("count must be a boolean", &["count"])
            })?;
        }

        Ok(query)
    }

    fn parse_predicate(&self, raw: &JsonValue) -> Result<Predicate, String> {
        let (keyword, args) = split_operator(raw)
            .ok_or_else(|| "predicate must be a list starting with an operator".to_owned())?;
        let operator = Operator::from_keyword(keyword)
            .ok_or_else(|| format!("unknown operator \"{keyword}\""))?;

        if operator == Operator::Functional {
            let func = self.parse_func(args)?;
            if let Func::Distance { .. } = func {
                return Err("distance can only be used as an operand".to_owned());
            }
            return Ok(Predicate::function(func));
        }

        let children = if operator.is_compound() {
            args.iter()
                .map(|arg| self.parse_predicate(arg).map(PredicateChild::Predicate))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            if args.len() != 2 {
                return Err(format!(
                    "{operator} takes exactly 2 operands, got {}",
                    args.len()
                ));
            }
            args.iter()
                .map(|arg| self.parse_expression(arg).map(PredicateChild::Expression))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Predicate { operator, children })
    }

    fn parse_expression(&self, raw: &JsonValue) -> Result<Expression, String> {
        if let Some(("func", args)) = split_operator(raw) {
            return self.parse_func(args).map(Expression::Function);
        }
        if let Some(path) = key_path_of(raw)? {
            return Ok(Expression::KeyPath(path));
        }
        Value::from_json(raw).map(Expression::Literal)
    }

    fn parse_func(&self, args: &[JsonValue]) -> Result<Func, String> {
        let Some((JsonValue::String(name), args)) = args.split_first() else {
            return Err("func needs a function name".to_owned());
        };

        match name.as_str() {
            "distance" => {
                let [field, location] = args else {
                    return Err(arity_error(name, 2, args.len()));
                };
                let field = key_path_of(field)?
                    .ok_or_else(|| "distance needs a keypath as its first argument".to_owned())?;
                let Ok(Value::Location(location)) = Value::from_json(location) else {
                    return Err("distance needs a geo location as its second argument".to_owned());
                };
                Ok(Func::Distance { field, location })
            }
            "userRelation" => {
                let [key_path, relation] = args else {
                    return Err(arity_error(name, 2, args.len()));
                };
                let key_path = key_path_of(key_path)?.ok_or_else(|| {
                    "userRelation needs a keypath as its first argument".to_owned()
                })?;
                let (name, direction) = parse_relation(relation)?;
                Ok(Func::UserRelation {
                    key_path,
                    name,
                    direction,
                    viewer: self.viewer.map(str::to_owned),
                })
            }
            "userDiscover" => {
                let [JsonValue::Object(discover)] = args else {
                    return Err("userDiscover takes exactly 1 object argument".to_owned());
                };
                let usernames = string_list(discover, "username")?;
                let emails = string_list(discover, "email")?;
                if usernames.is_empty() && emails.is_empty() {
                    return Err("userDiscover needs a username or email list".to_owned());
                }
                Ok(Func::UserDiscover { usernames, emails })
            }
            other => Err(format!("unknown function \"{other}\"")),
        }
    }

    fn parse_sorts(&self, raw: &JsonValue) -> Result<Vec<Sort>, String> {
        let items = raw.as_array().ok_or_else(|| "sort must be a list".to_owned())?;
        items
            .iter()
            .map(|item| {
                let Some([expression, order]) = item.as_array().map(Vec::as_slice) else {
                    return Err("sort descriptor must be [expression, order]".to_owned());
                };
                let order = match order.as_str() {
                    Some("asc") => SortOrder::Ascending,
                    Some("desc") => SortOrder::Descending,
                    _ => return Err(format!("unknown sort order {order}")),
                };
                Ok(Sort {
                    expression: self.parse_expression(expression)?,
                    order,
                })
            })
            .collect()
    }
}

/// A key that is absent or `null` counts as not given.
fn present<'m>(map: &'m Map<String, JsonValue>, key: &str) -> Option<&'m JsonValue> {
    map.get(key).filter(|value| !value.is_null())
}

fn split_operator(raw: &JsonValue) -> Option<(&str, &[JsonValue])> {
    let (first, rest) = raw.as_array()?.split_first()?;
    Some((first.as_str()?, rest))
}

/// The keypath carried by a `keypath` object, if `raw` is one.
fn key_path_of(raw: &JsonValue) -> Result<Option<String>, String> {
    let Some(map) = raw.as_object() else {
        return Ok(None);
    };
    if map.get("$type").and_then(JsonValue::as_str) != Some("keypath") {
        return Ok(None);
    }
    let Some(path) = map.get("$val").and_then(JsonValue::as_str) else {
        return Err("keypath $val must be a string".to_owned());
    };
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(format!("malformed keypath \"{path}\""));
    }

    let components: Vec<&str> = path
        .split('.')
        .map(|component| {
            if component == OWNER_ALIAS {
                OWNER_ID_FIELD
            } else {
                component
            }
        })
        .collect();
    Ok(Some(components.join(".")))
}

fn parse_relation(raw: &JsonValue) -> Result<(String, RelationDirection), String> {
    let Some(map) = raw.as_object() else {
        return Err("userRelation needs a relation as its second argument".to_owned());
    };
    if map.get("$type").and_then(JsonValue::as_str) != Some("relation") {
        return Err("userRelation needs a relation as its second argument".to_owned());
    }
    let name = match map.get("$name").and_then(JsonValue::as_str) {
        Some(name @ (FRIEND_RELATION | FOLLOW_RELATION)) => name.to_owned(),
        Some(other) => return Err(format!("unknown relation \"{other}\"")),
        None => return Err("relation $name must be a string".to_owned()),
    };
    let direction = match map.get("$direction") {
        None | Some(JsonValue::Null) if name == FRIEND_RELATION => RelationDirection::Mutual,
        None | Some(JsonValue::Null) => RelationDirection::Outward,
        Some(JsonValue::String(keyword)) => RelationDirection::from_keyword(keyword)
            .ok_or_else(|| format!("unknown relation direction \"{keyword}\""))?,
        Some(_) => return Err("relation $direction must be a string".to_owned()),
    };
    Ok((name, direction))
}

fn string_list(map: &Map<String, JsonValue>, key: &str) -> Result<Vec<String>, String> {
    match map.get(key) {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| format!("{key} must be a list of strings"))
            })
            .collect(),
        Some(_) => Err(format!("{key} must be a list of strings")),
    }
}

fn parse_desired_keys(raw: &JsonValue) -> Option<Vec<String>> {
    raw.as_array()?
        .iter()
        .map(|key| key.as_str().map(str::to_owned))
        .collect()
}

fn arity_error(name: &str, expected: usize, got: usize) -> String {
    format!("{name} takes exactly {expected} arguments, got {got}")
}
