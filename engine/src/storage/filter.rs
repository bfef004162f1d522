//! Predicate and expression evaluation for the in-memory store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::query::{
    Expression, Func, Operator, Predicate, PredicateChild, RelationDirection, Sort, SortOrder,
};
use crate::types::record::is_user_reference_field;
use crate::types::{Record, RecordId, Value};

/// A directed relation edge between two users.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct Relation {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// Evaluates queries against a snapshot of the store.
pub(super) struct Evaluator<'a> {
    pub records: &'a BTreeMap<RecordId, Record>,
    pub relations: &'a BTreeSet<Relation>,
    pub user_record_type: &'a str,
}

impl Evaluator<'_> {
    pub fn matches(&self, predicate: &Predicate, record: &Record) -> bool {
        let sub_predicates = || {
            predicate.children.iter().filter_map(|child| match child {
                PredicateChild::Predicate(p) => Some(p),
                PredicateChild::Expression(_) => None,
            })
        };
        let operand = |i: usize| match predicate.children.get(i) {
            Some(PredicateChild::Expression(expression)) => self.evaluate(expression, record),
            _ => None,
        };

        match predicate.operator {
            Operator::And => sub_predicates().all(|p| self.matches(p, record)),
            Operator::Or => sub_predicates().any(|p| self.matches(p, record)),
            Operator::Not => !sub_predicates().all(|p| self.matches(p, record)),
            Operator::Functional => matches!(operand(0), Some(Value::Boolean(true))),
            Operator::Equal => values_equal(operand(0).as_ref(), operand(1).as_ref()),
            Operator::NotEqual => !values_equal(operand(0).as_ref(), operand(1).as_ref()),
            Operator::GreaterThan => compare(operand(0), operand(1)) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqual => matches!(
                compare(operand(0), operand(1)),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessThan => compare(operand(0), operand(1)) == Some(Ordering::Less),
            Operator::LessThanOrEqual => matches!(
                compare(operand(0), operand(1)),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Like | Operator::ILike => match (operand(0), operand(1)) {
                (Some(Value::String(text)), Some(Value::String(pattern))) => {
                    like(&pattern, &text, predicate.operator == Operator::ILike)
                }
                _ => false,
            },
            Operator::In => match (operand(0), operand(1)) {
                (needle, Some(Value::List(haystack))) => haystack
                    .iter()
                    .any(|item| values_equal(needle.as_ref(), Some(item))),
                (Some(Value::List(haystack)), needle) => haystack
                    .iter()
                    .any(|item| values_equal(Some(item), needle.as_ref())),
                _ => false,
            },
        }
    }

    /// The value of `expression` on `record`. `None` when absent or null.
    pub fn evaluate(&self, expression: &Expression, record: &Record) -> Option<Value> {
        let value = match expression {
            Expression::Literal(value) => Some(value.clone()),
            Expression::KeyPath(path) => self.key_path_value(record, path),
            Expression::Function(func) => self.call(func, record),
        };
        value.filter(|v| !v.is_null())
    }

    fn call(&self, func: &Func, record: &Record) -> Option<Value> {
        match func {
            Func::Distance { field, location } => match self.key_path_value(record, field)? {
                Value::Location(point) => Some(Value::Number(point.distance_to(location))),
                _ => None,
            },
            Func::UserRelation {
                key_path,
                name,
                direction,
                viewer,
            } => {
                let user = match self.key_path_value(record, key_path)? {
                    Value::String(user_id) => user_id,
                    Value::Reference(id) => id.key,
                    _ => return Some(Value::Boolean(false)),
                };
                let Some(viewer) = viewer else {
                    return Some(Value::Boolean(false));
                };
                let outward = self.has_relation(name, viewer, &user);
                let inward = self.has_relation(name, &user, viewer);
                let related = match direction {
                    RelationDirection::Outward => outward,
                    RelationDirection::Inward => inward,
                    RelationDirection::Mutual => outward && inward,
                };
                Some(Value::Boolean(related))
            }
            Func::UserDiscover { usernames, emails } => {
                let field_in = |field: &str, candidates: &[String]| {
                    record
                        .get(field)
                        .and_then(|v| v.as_str().map(str::to_owned))
                        .is_some_and(|v| candidates.contains(&v))
                };
                Some(Value::Boolean(
                    field_in("username", usernames) || field_in("email", emails),
                ))
            }
        }
    }

    fn has_relation(&self, name: &str, from: &str, to: &str) -> bool {
        self.relations.contains(&Relation {
            name: name.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
        })
    }

    /// Follow `path` through references.
    fn key_path_value(&self, record: &Record, path: &str) -> Option<Value> {
        let mut components = path.split('.');
        let first = components.next()?;
        let mut field = first;
        let mut value = record.get(first)?.into_owned();

        for next in components {
            let target = match value {
                Value::Reference(id) => id,
                Value::String(user_id) if is_user_reference_field(field) => {
                    RecordId::new(self.user_record_type, user_id)
                }
                _ => return None,
            };
            value = self.records.get(&target)?.get(next)?.into_owned();
            field = next;
        }
        Some(value)
    }

    /// Order two records by `sorts`. Absent values sort first.
    pub fn compare_records(&self, sorts: &[Sort], a: &Record, b: &Record) -> Ordering {
        for sort in sorts {
            let ordering = match (
                self.evaluate(&sort.expression, a),
                self.evaluate(&sort.expression, b),
            ) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
            };
            let ordering = match sort.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare(a: Option<Value>, b: Option<Value>) -> Option<Ordering> {
    compare_values(&a?, &b?)
}

/// Order two values of comparable kinds.
pub(super) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Absent and null are equal to each other and to nothing else.
fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y) == Some(Ordering::Equal),
            _ => x == y,
        },
        _ => false,
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` any one character.
pub(super) fn like(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if case_insensitive {
            s.to_lowercase().chars().collect()
        } else {
            s.chars().collect()
        }
    };
    let pattern = fold(pattern);
    let text = fold(text);

    // matched[j]: the pattern so far matches the first j characters of text.
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for &pc in &pattern {
        let mut next = vec![false; text.len() + 1];
        if pc == '%' {
            let mut seen = false;
            for (n, m) in next.iter_mut().zip(&matched) {
                seen |= *m;
                *n = seen;
            }
        } else {
            for (j, &tc) in text.iter().enumerate() {
                next[j + 1] = matched[j] && (pc == '_' || pc == tc);
            }
        }
        matched = next;
    }
    matched[text.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    #[test]
    fn test_like() {
        assert!(like("hel%", "hello", false));
        assert!(like("h_llo", "hello", false));
        assert!(like("%ll%", "hello", false));
        assert!(!like("HEL%", "hello", false));
        assert!(like("HEL%", "hello", true));
        assert!(!like("h_lo", "hello", false));
        assert!(like("%", "", false));
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Number(1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&Value::String("a".to_owned()), &Value::String("b".to_owned())),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::String("a".to_owned()), &Value::Number(1.0)),
            None
        );
    }

    #[test]
    fn test_values_equal() {
        assert!(values_equal(None, Some(&Value::Null)));
        assert!(values_equal(Some(&Value::Integer(1)), Some(&Value::Number(1.0))));
        assert!(!values_equal(Some(&Value::Number(1.0)), None));
    }

    #[test]
    fn test_tiny_numbers_compare_exactly() {
        let records = BTreeMap::new();
        let relations = BTreeSet::new();
        let evaluator = Evaluator {
            records: &records,
            relations: &relations,
            user_record_type: "user",
        };
        let note = Record::new(RecordId::new("note", "0")).with("v", Value::Number(1e-17));
        let against_zero = |operator| {
            Predicate::binary(
                operator,
                Expression::key_path("v"),
                Expression::literal(Value::Number(0.0)),
            )
        };

        assert!(!evaluator.matches(&against_zero(Operator::Equal), &note));
        assert!(evaluator.matches(&against_zero(Operator::NotEqual), &note));
        assert!(evaluator.matches(&against_zero(Operator::GreaterThan), &note));
        assert!(!evaluator.matches(&against_zero(Operator::LessThanOrEqual), &note));
    }

    #[test]
    fn test_distance_and_relations() {
        let records = BTreeMap::new();
        let mut relations = BTreeSet::new();
        relations.insert(Relation {
            name: "_follow".to_owned(),
            from: "viewer".to_owned(),
            to: "u1".to_owned(),
        });
        let evaluator = Evaluator {
            records: &records,
            relations: &relations,
            user_record_type: "user",
        };

        let mut note = Record::new(RecordId::new("note", "0"))
            .with("location", Value::Location(GeoPoint::new(0.0, 0.0)));
        note.owner_id = "u1".to_owned();

        let distance = Expression::Function(Func::Distance {
            field: "location".to_owned(),
            location: GeoPoint::new(0.0, 0.0),
        });
        assert_eq!(evaluator.evaluate(&distance, &note), Some(Value::Number(0.0)));

        let relation = |direction: RelationDirection| {
            Predicate::function(Func::UserRelation {
                key_path: "_owner_id".to_owned(),
                name: "_follow".to_owned(),
                direction,
                viewer: Some("viewer".to_owned()),
            })
        };
        assert!(evaluator.matches(&relation(RelationDirection::Outward), &note));
        assert!(!evaluator.matches(&relation(RelationDirection::Inward), &note));
        assert!(!evaluator.matches(&relation(RelationDirection::Mutual), &note));
    }
}
