//! Query model.
//!
//! This module defines the typed form of a client query:
//! - `Predicate` - An operator applied to sub-predicates or expressions
//! - `Expression` - A literal, a keypath, or a function call
//! - `Func` - The closed set of query functions
//! - `Sort` - An expression and a direction
//! - `Query` - A complete query over one record type
//!
//! # Invariants
//!
//! After `Predicate::validate` succeeds:
//! - Compound predicates (`and`, `or`, `not`) have only predicate children,
//!   and `not` has exactly one.
//! - Binary predicates have exactly two expression children.
//! - Functional predicates have exactly one function expression child.

use std::collections::BTreeMap;
use std::fmt;

use crate::context::AuthInfo;
use crate::error::EngineError;
use crate::types::{GeoPoint, Value};

/// A predicate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    ILike,
    In,
    Functional,
}

impl Operator {
    /// Map a request keyword to its operator.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let op = match keyword {
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "eq" => Self::Equal,
            "neq" => Self::NotEqual,
            "gt" => Self::GreaterThan,
            "gte" => Self::GreaterThanOrEqual,
            "lt" => Self::LessThan,
            "lte" => Self::LessThanOrEqual,
            "like" => Self::Like,
            "ilike" => Self::ILike,
            "in" => Self::In,
            "func" => Self::Functional,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Equal => "eq",
            Self::NotEqual => "neq",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "gte",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::In => "in",
            Self::Functional => "func",
        }
    }

    #[must_use]
    pub const fn is_compound(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    #[must_use]
    pub const fn is_binary(self) -> bool {
        !self.is_compound() && !matches!(self, Self::Functional)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Direction of a user relation, seen from the viewing user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationDirection {
    /// The viewer has the relation to the user.
    Outward,
    /// The user has the relation to the viewer.
    Inward,
    /// Both.
    Mutual,
}

impl RelationDirection {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "outward" => Some(Self::Outward),
            "inward" => Some(Self::Inward),
            "mutual" => Some(Self::Mutual),
            _ => None,
        }
    }
}

/// A query function.
#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    /// Distance in metres between a location field and a point.
    Distance { field: String, location: GeoPoint },
    /// Whether the user at `key_path` has relation `name` with the viewer.
    UserRelation {
        key_path: String,
        name: String,
        direction: RelationDirection,
        viewer: Option<String>,
    },
    /// Whether a user record matches any of the given usernames or emails.
    UserDiscover {
        usernames: Vec<String>,
        emails: Vec<String>,
    },
}

impl Func {
    /// Keypaths the function reads, for access checking.
    #[must_use]
    pub fn referenced_key_paths(&self) -> Vec<&str> {
        match self {
            Self::Distance { field, .. } => vec![field.as_str()],
            Self::UserRelation { key_path, .. } => vec![key_path.as_str()],
            Self::UserDiscover { usernames, emails } => {
                let mut paths = Vec::new();
                if !usernames.is_empty() {
                    paths.push("username");
                }
                if !emails.is_empty() {
                    paths.push("email");
                }
                paths
            }
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Distance { .. } => "distance",
            Self::UserRelation { .. } => "userRelation",
            Self::UserDiscover { .. } => "userDiscover",
        }
    }
}

/// A leaf of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// Dot-separated field path, possibly crossing references.
    KeyPath(String),
    Function(Func),
}

impl Expression {
    #[must_use]
    pub fn key_path(path: impl Into<String>) -> Self {
        Self::KeyPath(path.into())
    }

    #[must_use]
    pub const fn literal(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// A child of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateChild {
    Predicate(Predicate),
    Expression(Expression),
}

/// A filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub operator: Operator,
    pub children: Vec<PredicateChild>,
}

impl Predicate {
    /// Combine sub-predicates with a compound operator.
    #[must_use]
    pub fn compound(operator: Operator, predicates: Vec<Self>) -> Self {
        Self {
            operator,
            children: predicates.into_iter().map(PredicateChild::Predicate).collect(),
        }
    }

    /// Compare two expressions.
    #[must_use]
    pub fn binary(operator: Operator, lhs: Expression, rhs: Expression) -> Self {
        Self {
            operator,
            children: vec![PredicateChild::Expression(lhs), PredicateChild::Expression(rhs)],
        }
    }

    /// Use a boolean function as a predicate.
    #[must_use]
    pub fn function(func: Func) -> Self {
        Self {
            operator: Operator::Functional,
            children: vec![PredicateChild::Expression(Expression::Function(func))],
        }
    }

    /// Check the shape of this predicate and all its descendants.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: String| EngineError::invalid_argument(message, &["predicate"]);

        if self.operator.is_compound() {
            if self.operator == Operator::Not && self.children.len() != 1 {
                return Err(invalid(format!(
                    "not predicate takes exactly 1 child, got {}",
                    self.children.len()
                )));
            }
            for child in &self.children {
                match child {
                    PredicateChild::Predicate(predicate) => predicate.validate()?,
                    PredicateChild::Expression(_) => {
                        return Err(invalid(format!(
                            "{} predicate takes only predicates as children",
                            self.operator
                        )));
                    }
                }
            }
            return Ok(());
        }

        if self.operator == Operator::Functional {
            return match self.children.as_slice() {
                [PredicateChild::Expression(Expression::Function(_))] => Ok(()),
                _ => Err(invalid(
                    "functional predicate takes exactly 1 function".to_owned(),
                )),
            };
        }

        if self.children.len() != 2 {
            return Err(invalid(format!(
                "{} predicate takes exactly 2 operands, got {}",
                self.operator,
                self.children.len()
            )));
        }
        if self
            .children
            .iter()
            .any(|child| matches!(child, PredicateChild::Predicate(_)))
        {
            return Err(invalid(format!(
                "{} predicate takes only expressions as operands",
                self.operator
            )));
        }
        Ok(())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub expression: Expression,
    pub order: SortOrder,
}

/// A query over one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub record_type: String,
    pub predicate: Option<Predicate>,
    pub sorts: Vec<Sort>,
    /// Keyed by the name results carry them under in `_transient`.
    pub computed_keys: BTreeMap<String, Expression>,
    /// `None` returns every field.
    pub desired_keys: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub get_count: bool,
    /// The user record ACL is evaluated against.
    pub view_as_user: Option<AuthInfo>,
    pub bypass_access_control: bool,
}

impl Query {
    #[must_use]
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: None,
            sorts: Vec::new(),
            computed_keys: BTreeMap::new(),
            desired_keys: None,
            limit: None,
            offset: 0,
            get_count: false,
            view_as_user: None,
            bypass_access_control: false,
        }
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}
