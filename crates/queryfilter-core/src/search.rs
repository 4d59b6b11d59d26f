use crate::errors::Result;
use crate::params::{parse_search_params, SearchParams};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

/// State of the table queries page as kept in its URL.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuerySearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    // page number; always a string on the wire
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_from: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl QuerySearchParams {
    pub fn parse(raw: &str) -> Result<Self> {
        parse_search_params(raw).into_typed()
    }

    pub fn to_query_string(&self) -> Result<String> {
        Ok(SearchParams::from_typed(self)?.to_query_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ParamsError;

    #[test]
    fn reads_known_keys_and_ignores_rest() {
        let p = QuerySearchParams::parse("?tableId=abc&queryFrom=3&extra[x]=1").unwrap();
        assert_eq!(p.table_id.as_deref(), Some("abc"));
        assert_eq!(p.query_from, Some(3));
        assert_eq!(p.query, None);
        assert_eq!(p.after, None);
    }

    #[test]
    fn bad_page_number_fails_decode() {
        let err = QuerySearchParams::parse("queryFrom=two").unwrap_err();
        assert!(matches!(err, ParamsError::Decode(_)));
    }

    #[test]
    fn absent_fields_are_not_written() {
        let p = QuerySearchParams {
            query_from: Some(2),
            query: Some("select 1".into()),
            ..Default::default()
        };
        assert_eq!(p.to_query_string().unwrap(), "query=select+1&queryFrom=2");
        assert_eq!(QuerySearchParams::default().to_query_string().unwrap(), "");
    }
}
