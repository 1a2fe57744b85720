use super::rows::{bind_params, row_to_record};
use super::types::Database;
use serde::Serialize;
use serde_json::Value;
use tenant_query::{
    compile, fields_for, schema_for, FilterGroup, FilterIssue, QueryError, QueryLimits,
    RecordFilter, Resource, SortSpec,
};

/// One page of a filtered listing, plus the non-fatal issues hit while
/// resolving the tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredPage {
    pub records: Vec<Value>,
    pub issues: Vec<String>,
    pub limit: i64,
    pub offset: i64,
}

fn issue_messages(issues: &[FilterIssue]) -> Vec<String> {
    issues.iter().map(|issue| issue.to_string()).collect()
}

impl Database {
    /// Listing through the compiled SQL predicate. Always tenant scoped.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_filtered(
        &self,
        resource: Resource,
        tenant_id: &str,
        filter: &FilterGroup,
        sort: Option<&SortSpec>,
        limit: Option<i64>,
        offset: Option<i64>,
        limits: &QueryLimits,
    ) -> Result<FilteredPage, QueryError> {
        let schema = schema_for(resource);
        let compiled = compile(filter, schema, tenant_id, sort)?;
        let limit = limits.clamp(limit);
        let offset = offset.unwrap_or(0).max(0);
        let statement = compiled.select(limit, offset);

        tracing::debug!(
            resource = %resource,
            tenant_id = %tenant_id,
            params = statement.params.len(),
            "Filtered listing: {}",
            statement.sql
        );

        let rows = bind_params(sqlx::query(&statement.sql), &statement.params)
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::execution)?;
        let records = rows
            .iter()
            .map(|row| row_to_record(row, schema))
            .collect::<Result<Vec<_>, _>>()
            .map_err(QueryError::execution)?;

        Ok(FilteredPage {
            records,
            issues: issue_messages(compiled.issues()),
            limit,
            offset,
        })
    }

    /// Loads up to `max_limit` tenant records once, then filters and pages
    /// them in process. Matches [`Database::search_filtered`] whenever the
    /// tenant has no more than `max_limit` records.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_in_memory(
        &self,
        resource: Resource,
        tenant_id: &str,
        filter: &FilterGroup,
        sort: Option<&SortSpec>,
        limit: Option<i64>,
        offset: Option<i64>,
        limits: &QueryLimits,
    ) -> Result<FilteredPage, QueryError> {
        filter.check_complexity()?;
        let loaded = self
            .search_filtered(
                resource,
                tenant_id,
                &FilterGroup::empty(),
                sort,
                Some(limits.max_limit),
                Some(0),
                limits,
            )
            .await?;

        let (matched, issues) = filter_loaded(resource, filter, &loaded.records)?;
        let limit = limits.clamp(limit);
        let offset = offset.unwrap_or(0).max(0);
        let records = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(FilteredPage {
            records,
            issues: issue_messages(&issues),
            limit,
            offset,
        })
    }
}

/// Filters records that are already materialized, keyed by field key.
pub fn filter_loaded(
    resource: Resource,
    filter: &FilterGroup,
    records: &[Value],
) -> Result<(Vec<Value>, Vec<FilterIssue>), QueryError> {
    filter.check_complexity()?;
    let record_filter = RecordFilter::new(filter, fields_for(resource));
    let matched = record_filter
        .apply(records)
        .into_iter()
        .cloned()
        .collect();
    Ok((matched, record_filter.issues().to_vec()))
}
