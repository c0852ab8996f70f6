use std::num::NonZeroUsize;

/// Retry configuration for batch operations
pub(crate) mod retry_config {
    use std::time::Duration;

    /// Calculate retry delay with exponential backoff
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-based)
    /// * `initial` - Initial delay duration
    /// * `max` - Maximum delay duration
    ///
    /// # Returns
    /// Duration to wait before retrying, never above `max`
    pub(crate) fn retry_delay(attempt: usize, initial: Duration, max: Duration) -> Duration {
        let initial_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|attempt| 2u64.checked_pow(attempt))
            .unwrap_or(u64::MAX);
        Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms))
    }
}

/// Split `items` into consecutive non-empty groups of at most `max` items.
///
/// Order and count are preserved; an empty input yields no groups.
pub fn chunk<T>(items: Vec<T>, max: NonZeroUsize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(max.get()));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(max.get()).collect());
    }
    chunks
}

/// Key condition rendering for DynamoDB queries
pub(crate) mod expressions {
    use serde::Serialize;
    use serde_dynamo::to_attribute_value;

    use crate::condition::Placeholders;
    use crate::error::{Error, KeyError};
    use crate::table::descriptor::Collection;
    use crate::table::types::RangeCondition;

    /// Render `hash = value [AND range condition]` with shared placeholders
    pub(crate) fn key_condition<H, R>(
        placeholders: &mut Placeholders<'_>,
        collection: &Collection,
        hash_key: &H,
        range: Option<&RangeCondition<R>>,
    ) -> Result<String, Error>
    where
        H: Serialize,
        R: Serialize,
    {
        let schema = collection.key_schema();
        let hash_name = placeholders.name(&schema.hash_key);
        let hash_value = placeholders.value(to_attribute_value(hash_key)?);
        let mut expression = format!("{hash_name} = {hash_value}");

        let Some(range) = range else {
            return Ok(expression);
        };
        let Some(range_key) = schema.range_key.as_deref() else {
            return Err(KeyError::RangeConditionWithoutRangeKey {
                table: collection.table_name().to_string(),
            }
            .into());
        };

        let name = placeholders.name(range_key);
        let rendered = match range {
            RangeCondition::Eq(value) => compare(placeholders, &name, "=", value)?,
            RangeCondition::Lt(value) => compare(placeholders, &name, "<", value)?,
            RangeCondition::Le(value) => compare(placeholders, &name, "<=", value)?,
            RangeCondition::Gt(value) => compare(placeholders, &name, ">", value)?,
            RangeCondition::Ge(value) => compare(placeholders, &name, ">=", value)?,
            RangeCondition::Between(low, high) => {
                let low = placeholders.value(to_attribute_value(low)?);
                let high = placeholders.value(to_attribute_value(high)?);
                format!("{name} BETWEEN {low} AND {high}")
            }
            RangeCondition::BeginsWith(prefix) => {
                let prefix = placeholders.value(to_attribute_value(prefix)?);
                format!("begins_with({name}, {prefix})")
            }
        };

        expression.push_str(" AND ");
        expression.push_str(&rendered);
        Ok(expression)
    }

    fn compare<R: Serialize>(
        placeholders: &mut Placeholders<'_>,
        name: &str,
        op: &str,
        value: &R,
    ) -> Result<String, Error> {
        let value = placeholders.value(to_attribute_value(value)?);
        Ok(format!("{name} {op} {value}"))
    }
}

/// Shared request builders for Query and Scan
pub(crate) mod query_builder {
    use aws_sdk_dynamodb::operation::query::QueryInput;
    use aws_sdk_dynamodb::operation::query::builders::QueryInputBuilder;
    use aws_sdk_dynamodb::operation::scan::ScanInput;
    use aws_sdk_dynamodb::operation::scan::builders::ScanInputBuilder;
    use aws_sdk_dynamodb::types::Select;
    use serde::Serialize;

    use super::expressions;
    use crate::condition::Placeholders;
    use crate::error::{Error, ExpressionError};
    use crate::table::descriptor::Collection;
    use crate::table::types::{Cursor, QueryOpts, ScanOpts};

    // Secondary indexes only expose their projected attributes; DynamoDB rejects AllAttributes.
    // See https://docs.aws.amazon.com/amazondynamodb/latest/developerguide/SQLtoNoSQL.SelectingAttributes.html
    fn select(collection: &Collection) -> Select {
        if collection.index_name().is_some() {
            Select::AllProjectedAttributes
        } else {
            Select::AllAttributes
        }
    }

    fn limit(page_size: Option<u16>) -> Option<i32> {
        page_size.filter(|size| *size > 0).map(i32::from)
    }

    /// Assemble the first Query request for `opts`
    pub(crate) fn query_input<H, R>(
        collection: &Collection,
        opts: &QueryOpts<H, R>,
    ) -> Result<QueryInputBuilder, Error>
    where
        H: Serialize,
        R: Serialize,
    {
        let schema = collection.key_schema();
        if let Some(filter) = &opts.filter {
            if let Some(field) = filter.fields().into_iter().find(|f| schema.contains(f)) {
                return Err(ExpressionError::KeyFieldInFilter {
                    field: field.to_string(),
                }
                .into());
            }
        }

        let mut placeholders = Placeholders::new(collection);
        let key_condition = expressions::key_condition(
            &mut placeholders,
            collection,
            &opts.hash_key,
            opts.range.as_ref(),
        )?;
        let filter = opts
            .filter
            .as_ref()
            .map(|filter| placeholders.render(filter))
            .transpose()?;
        let (names, values) = placeholders.into_maps();

        Ok(QueryInput::builder()
            .table_name(collection.table_name())
            .set_index_name(collection.index_name().map(str::to_string))
            .select(select(collection))
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .consistent_read(
                collection
                    .effective_consistency(opts.consistency)
                    .consistent_read(),
            )
            .scan_index_forward(opts.direction.scan_index_forward())
            .set_limit(limit(opts.page_size))
            .set_exclusive_start_key(opts.start.clone().map(Cursor::into_item)))
    }

    /// Assemble the first Scan request for `opts`
    pub(crate) fn scan_input(
        collection: &Collection,
        opts: &ScanOpts,
    ) -> Result<ScanInputBuilder, Error> {
        let (filter, names, values) = match &opts.filter {
            Some(filter) => {
                let (expression, names, values) = filter.compile(collection)?.into_parts();
                (Some(expression), names, values)
            }
            None => (None, None, None),
        };

        Ok(ScanInput::builder()
            .table_name(collection.table_name())
            .set_index_name(collection.index_name().map(str::to_string))
            .select(select(collection))
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .consistent_read(
                collection
                    .effective_consistency(opts.consistency)
                    .consistent_read(),
            )
            .set_segment(opts.segment.map(|segment| segment.segment()))
            .set_total_segments(opts.segment.map(|segment| segment.total_segments()))
            .set_limit(limit(opts.page_size))
            .set_exclusive_start_key(opts.start.clone().map(Cursor::into_item)))
    }
}
