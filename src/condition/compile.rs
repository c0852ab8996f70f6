use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

use super::{AttrPath, Condition, MAX_IN_OPERANDS, PathSegment};
use crate::error::{Error, ExpressionError};
use crate::table::Collection;

/// A rendered expression with its placeholder maps
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledExpression {
    /// Expression text using `#N<k>` and `:V<k>` placeholders
    pub expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl CompiledExpression {
    /// `ExpressionAttributeNames`, `None` when no name was allocated
    pub fn names(&self) -> Option<&HashMap<String, String>> {
        (!self.names.is_empty()).then_some(&self.names)
    }

    /// `ExpressionAttributeValues`, `None` when no literal was allocated.
    ///
    /// DynamoDB rejects an empty value map, so this must be passed to the
    /// request setter as is.
    pub fn values(&self) -> Option<&HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then_some(&self.values)
    }

    /// Split into expression, names and values
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        String,
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        (
            self.expression,
            non_empty(self.names),
            non_empty(self.values),
        )
    }
}

fn non_empty<V>(map: HashMap<String, V>) -> Option<HashMap<String, V>> {
    (!map.is_empty()).then_some(map)
}

/// Placeholder allocator shared by every expression of one request.
///
/// Key conditions and filters of the same query draw from one allocator so
/// their placeholders never collide. Numbering follows rendering order.
#[derive(Debug)]
pub struct Placeholders<'a> {
    collection: &'a Collection,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl<'a> Placeholders<'a> {
    /// Empty allocator validating paths against `collection`
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            names: HashMap::new(),
            values: HashMap::new(),
        }
    }

    /// Allocate a fresh name placeholder for `name`
    pub fn name(&mut self, name: &str) -> String {
        let placeholder = format!("#N{}", self.names.len());
        let _ = self.names.insert(placeholder.clone(), name.to_string());
        placeholder
    }

    /// Allocate a fresh value placeholder for `value`
    pub fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":V{}", self.values.len());
        let _ = self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Render a path, allocating one name per segment
    pub fn path(&mut self, path: &AttrPath) -> Result<String, Error> {
        if !self.collection.has_field(path.root()) {
            return Err(ExpressionError::UnknownField {
                table: self.collection.table_name().to_string(),
                field: path.root().to_string(),
            }
            .into());
        }

        let mut rendered = self.name(path.root());
        for segment in path.segments() {
            match segment {
                PathSegment::Field(name) => {
                    rendered.push('.');
                    rendered.push_str(&self.name(name));
                }
                PathSegment::Index(index) => {
                    rendered.push_str(&format!("[{}]", index));
                }
            }
        }
        Ok(rendered)
    }

    /// Render a condition tree depth first, left to right
    pub fn render(&mut self, condition: &Condition) -> Result<String, Error> {
        match condition {
            Condition::Compare { path, op, value } => {
                let name = self.path(path)?;
                let value = self.value(value.clone());
                Ok(format!("{} {} {}", name, op.as_str(), value))
            }
            Condition::In { path, values } => {
                if values.is_empty() {
                    return Err(ExpressionError::EmptyInList {
                        field: path.to_string(),
                    }
                    .into());
                }
                if values.len() > MAX_IN_OPERANDS {
                    return Err(ExpressionError::TooManyInOperands {
                        field: path.to_string(),
                        count: values.len(),
                    }
                    .into());
                }
                let name = self.path(path)?;
                let operands: Vec<String> = values
                    .iter()
                    .map(|value| self.value(value.clone()))
                    .collect();
                Ok(format!("{} IN ({})", name, operands.join(",")))
            }
            Condition::Between { path, low, high } => {
                let name = self.path(path)?;
                let low = self.value(low.clone());
                let high = self.value(high.clone());
                Ok(format!("{} BETWEEN {} AND {}", name, low, high))
            }
            Condition::Exists(path) => Ok(format!("attribute_exists({})", self.path(path)?)),
            Condition::NotExists(path) => {
                Ok(format!("attribute_not_exists({})", self.path(path)?))
            }
            Condition::BeginsWith { path, prefix } => {
                let name = self.path(path)?;
                let prefix = self.value(prefix.clone());
                Ok(format!("begins_with({}, {})", name, prefix))
            }
            Condition::Contains { path, value } => {
                let name = self.path(path)?;
                let value = self.value(value.clone());
                Ok(format!("contains({}, {})", name, value))
            }
            Condition::And(left, right) => {
                let left = self.render(left)?;
                let right = self.render(right)?;
                Ok(format!("({}) AND ({})", left, right))
            }
            Condition::Or(left, right) => {
                let left = self.render(left)?;
                let right = self.render(right)?;
                Ok(format!("({}) OR ({})", left, right))
            }
            Condition::Not(inner) => Ok(format!("NOT ({})", self.render(inner)?)),
        }
    }

    /// Bundle `expression` with the maps allocated so far
    pub fn finish(self, expression: String) -> CompiledExpression {
        CompiledExpression {
            expression,
            names: self.names,
            values: self.values,
        }
    }

    /// Allocated maps, each `None` when empty
    #[allow(clippy::type_complexity)]
    pub fn into_maps(
        self,
    ) -> (
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        (non_empty(self.names), non_empty(self.values))
    }
}
