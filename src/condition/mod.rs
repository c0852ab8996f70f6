//! Structured filter and condition expressions.
//!
//! A [`Condition`] is a tree over attribute paths. Compiling it against a
//! [`Collection`](crate::table::Collection) validates every path root and
//! renders DynamoDB's placeholder syntax: each name segment becomes a fresh
//! `#N<k>` and each literal a fresh `:V<k>`.
//!
//! ```rust
//! use dynamo_fetch::condition::{Condition, attribute_value};
//! use dynamo_fetch::table::{Collection, KeySchema};
//!
//! # fn main() -> Result<(), dynamo_fetch::Error> {
//! let orders = Collection::table("orders", KeySchema::new("user_id", Some("order_id")))
//!     .with_fields(["status", "shipped_at"]);
//!
//! let active = Condition::eq("status", attribute_value("open")?)
//!     & Condition::not_exists("shipped_at");
//! let compiled = active.compile(&orders)?;
//!
//! assert_eq!(
//!     compiled.expression,
//!     "(#N0 = :V0) AND (attribute_not_exists(#N1))"
//! );
//! # Ok(())
//! # }
//! ```

mod compile;

pub use compile::{CompiledExpression, Placeholders};

use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use crate::Error;

/// Largest number of `IN` operands DynamoDB accepts
pub const MAX_IN_OPERANDS: usize = 100;

/// One step below the root of an [`AttrPath`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Map member access, `.name`
    Field(String),
    /// List element access, `[index]`
    Index(usize),
}

/// Reference to a possibly nested attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrPath {
    root: String,
    segments: Vec<PathSegment>,
}

impl AttrPath {
    /// Path to a top-level attribute
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// Descend into a map member
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Field(name.into()));
        self
    }

    /// Descend into a list element
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Top-level attribute name
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Segments below the root
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl From<&str> for AttrPath {
    fn from(root: &str) -> Self {
        Self::new(root)
    }
}

impl From<String> for AttrPath {
    fn from(root: String) -> Self {
        Self::new(root)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Binary comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparator {
    /// Operator as written in an expression
    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// Boolean predicate over item attributes
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// `path <op> value`
    Compare {
        /// Attribute compared
        path: AttrPath,
        /// Operator
        op: Comparator,
        /// Right-hand literal
        value: AttributeValue,
    },
    /// `path IN (values…)`
    In {
        /// Attribute tested
        path: AttrPath,
        /// Candidate literals
        values: Vec<AttributeValue>,
    },
    /// `path BETWEEN low AND high`
    Between {
        /// Attribute tested
        path: AttrPath,
        /// Inclusive lower bound
        low: AttributeValue,
        /// Inclusive upper bound
        high: AttributeValue,
    },
    /// `attribute_exists(path)`
    Exists(AttrPath),
    /// `attribute_not_exists(path)`
    NotExists(AttrPath),
    /// `begins_with(path, prefix)`
    BeginsWith {
        /// Attribute tested
        path: AttrPath,
        /// String or binary prefix
        prefix: AttributeValue,
    },
    /// `contains(path, value)`
    Contains {
        /// Set, list or string attribute
        path: AttrPath,
        /// Element or substring
        value: AttributeValue,
    },
    /// Both hold
    And(Box<Condition>, Box<Condition>),
    /// Either holds
    Or(Box<Condition>, Box<Condition>),
    /// Negation
    Not(Box<Condition>),
}

/// Encode a literal for use in a condition
pub fn attribute_value<V: Serialize>(value: V) -> Result<AttributeValue, Error> {
    Ok(to_attribute_value(value)?)
}

impl Condition {
    /// `path <op> value`
    pub fn compare(path: impl Into<AttrPath>, op: Comparator, value: AttributeValue) -> Self {
        Condition::Compare {
            path: path.into(),
            op,
            value,
        }
    }

    /// `path = value`
    pub fn eq(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Self::compare(path, Comparator::Eq, value)
    }

    /// `path <> value`
    pub fn ne(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Self::compare(path, Comparator::Ne, value)
    }

    /// `path < value`
    pub fn lt(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Self::compare(path, Comparator::Lt, value)
    }

    /// `path <= value`
    pub fn le(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Self::compare(path, Comparator::Le, value)
    }

    /// `path > value`
    pub fn gt(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Self::compare(path, Comparator::Gt, value)
    }

    /// `path >= value`
    pub fn ge(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Self::compare(path, Comparator::Ge, value)
    }

    /// `path IN (values…)`
    pub fn is_in(path: impl Into<AttrPath>, values: Vec<AttributeValue>) -> Self {
        Condition::In {
            path: path.into(),
            values,
        }
    }

    /// `path BETWEEN low AND high`
    pub fn between(path: impl Into<AttrPath>, low: AttributeValue, high: AttributeValue) -> Self {
        Condition::Between {
            path: path.into(),
            low,
            high,
        }
    }

    /// `attribute_exists(path)`
    pub fn exists(path: impl Into<AttrPath>) -> Self {
        Condition::Exists(path.into())
    }

    /// `attribute_not_exists(path)`
    pub fn not_exists(path: impl Into<AttrPath>) -> Self {
        Condition::NotExists(path.into())
    }

    /// `begins_with(path, prefix)`
    pub fn begins_with(path: impl Into<AttrPath>, prefix: AttributeValue) -> Self {
        Condition::BeginsWith {
            path: path.into(),
            prefix,
        }
    }

    /// `contains(path, value)`
    pub fn contains(path: impl Into<AttrPath>, value: AttributeValue) -> Self {
        Condition::Contains {
            path: path.into(),
            value,
        }
    }

    /// Conjunction
    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// Disjunction
    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Negation
    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Root attribute names referenced anywhere in the tree
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut BTreeSet<&'a str>) {
        match self {
            Condition::Compare { path, .. }
            | Condition::In { path, .. }
            | Condition::Between { path, .. }
            | Condition::Exists(path)
            | Condition::NotExists(path)
            | Condition::BeginsWith { path, .. }
            | Condition::Contains { path, .. } => {
                let _ = fields.insert(path.root());
            }
            Condition::And(left, right) | Condition::Or(left, right) => {
                left.collect_fields(fields);
                right.collect_fields(fields);
            }
            Condition::Not(inner) => inner.collect_fields(fields),
        }
    }

    /// Compile against `collection` with a fresh placeholder allocator
    pub fn compile(
        &self,
        collection: &crate::table::Collection,
    ) -> Result<CompiledExpression, Error> {
        let mut placeholders = Placeholders::new(collection);
        let expression = placeholders.render(self)?;
        Ok(placeholders.finish(expression))
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        self.negate()
    }
}
