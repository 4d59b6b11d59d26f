use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const QUERY_USED_IN_FIELD: &str = "queryUsedIn.id";
pub const TAG_FQN_FIELD: &str = "tags.tagFQN";
pub const QUERY_DATE_FIELD: &str = "queryDate";

/// One entry of a tag dropdown: `key` is the tag FQN, `label` is display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SearchDropdownOption {
    pub key: String,
    pub label: String,
}

impl SearchDropdownOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_ts: i64, // epoch millis
    pub end_ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilterRequest {
    pub table_id: String,
    #[serde(default)]
    pub tags: Option<Vec<SearchDropdownOption>>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

impl QueryFilterRequest {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: Vec<SearchDropdownOption>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_time_range(mut self, start_ts: i64, end_ts: i64) -> Self {
        self.time_range = Some(TimeRange { start_ts, end_ts });
        self
    }
}

/// Inclusive numeric bounds of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub gte: i64,
    pub lte: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BoolClause {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Clause>,
}

/// A search-backend query clause. The externally tagged serde form is the
/// backend's own JSON, e.g. `{"term": {"field": "value"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clause {
    Term(BTreeMap<String, String>),
    Bool(BoolClause),
    Range(BTreeMap<String, RangeBounds>),
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Clause::Term(BTreeMap::from([(field.into(), value.into())]))
    }

    pub fn range(field: impl Into<String>, gte: i64, lte: i64) -> Self {
        Clause::Range(BTreeMap::from([(field.into(), RangeBounds { gte, lte })]))
    }

    pub fn must(clauses: Vec<Clause>) -> Self {
        Clause::Bool(BoolClause {
            must: clauses,
            should: Vec::new(),
        })
    }

    pub fn should(clauses: Vec<Clause>) -> Self {
        Clause::Bool(BoolClause {
            must: Vec::new(),
            should: clauses,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub query: Clause,
}

impl QueryFilter {
    /// Top-level `must` clauses; empty if the root is not a bool clause.
    pub fn must(&self) -> &[Clause] {
        match &self.query {
            Clause::Bool(b) => &b.must,
            _ => &[],
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // String keys and integer leaves only, so serialization cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Filter for the queries that ran against `table_id`, narrowed by any tags
/// (matching one is enough) and by the time range.
pub fn create_query_filter(request: &QueryFilterRequest) -> QueryFilter {
    let mut must = vec![Clause::term(QUERY_USED_IN_FIELD, request.table_id.as_str())];

    if let Some(tags) = request.tags.as_deref().filter(|t| !t.is_empty()) {
        must.push(Clause::should(
            tags.iter()
                .map(|tag| Clause::term(TAG_FQN_FIELD, tag.key.as_str()))
                .collect(),
        ));
    }

    if let Some(range) = request.time_range {
        must.push(Clause::range(QUERY_DATE_FIELD, range.start_ts, range.end_ts));
    }

    QueryFilter {
        query: Clause::must(must),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_only() {
        let filter = create_query_filter(&QueryFilterRequest::new("tbl-1"));
        assert_eq!(filter.must(), &[Clause::term(QUERY_USED_IN_FIELD, "tbl-1")]);
        assert_eq!(
            filter.to_json(),
            json!({"query": {"bool": {"must": [{"term": {"queryUsedIn.id": "tbl-1"}}]}}})
        );
    }

    #[test]
    fn empty_tags_are_omitted() {
        let req = QueryFilterRequest::new("t").with_tags(vec![]);
        assert_eq!(create_query_filter(&req).must().len(), 1);
    }

    #[test]
    fn empty_table_id_still_emits_term() {
        let filter = create_query_filter(&QueryFilterRequest::new(""));
        assert_eq!(filter.must(), &[Clause::term(QUERY_USED_IN_FIELD, "")]);
    }

    #[test]
    fn request_reads_camel_case() {
        let req: QueryFilterRequest = serde_json::from_value(json!({
            "tableId": "t",
            "tags": [{"key": "PII.Sensitive", "label": "Sensitive"}],
            "timeRange": {"startTs": 1, "endTs": 2}
        }))
        .unwrap();
        assert_eq!(req.tags.as_ref().map(Vec::len), Some(1));
        assert_eq!(req.time_range, Some(TimeRange { start_ts: 1, end_ts: 2 }));
    }

    #[test]
    fn to_json_matches_serializer_at_extremes() {
        let req = QueryFilterRequest::new("tbl ✓ \"quoted\"")
            .with_tags(vec![SearchDropdownOption::new("", "")])
            .with_time_range(i64::MIN, i64::MAX);
        let filter = create_query_filter(&req);
        let json = filter.to_json();
        assert!(!json.is_null());
        assert_eq!(json, serde_json::to_value(&filter).unwrap());
        assert_eq!(json["query"]["bool"]["must"][2]["range"]["queryDate"]["gte"], i64::MIN);
    }

    #[test]
    fn filter_deserializes_back() {
        let req = QueryFilterRequest::new("t")
            .with_tags(vec![SearchDropdownOption::new("a", "A")])
            .with_time_range(10, 20);
        let filter = create_query_filter(&req);
        let back: QueryFilter = serde_json::from_value(filter.to_json()).unwrap();
        assert_eq!(back, filter);
    }
}
