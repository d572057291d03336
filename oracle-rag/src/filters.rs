//! Metadata filter model and conversion to Qdrant `Filter`.
//!
//! Only exact equality on scalar fields is supported; conditions combine
//! conjunctively (`must`), matching the delete-by-document and
//! search-within-document semantics of the service.

use qdrant_client::qdrant::{Condition, FieldCondition, Filter, Match, condition::ConditionOneOf};
use tracing::debug;

use crate::types::{MetaValue, Metadata};

/// Exact-equality metadata filter, applied conjunctively.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub equals: Vec<(String, MetaValue)>,
}

impl MetadataFilter {
    /// Filter matching a single field value.
    pub fn equals(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self {
            equals: vec![(field.into(), value.into())],
        }
    }

    /// Filter selecting every row of one document.
    pub fn doc_id(doc_id: &str) -> Self {
        Self::equals("doc_id", doc_id)
    }

    /// True when `metadata` satisfies every condition.
    /// Used by the in-memory collection; Qdrant evaluates server-side.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals
            .iter()
            .all(|(field, want)| metadata.get(field) == Some(want))
    }
}

/// Converts a [`MetadataFilter`] to a Qdrant [`Filter`].
pub fn to_qdrant_filter(f: &MetadataFilter) -> Filter {
    debug!(target: "oracle_rag::filters", equals = f.equals.len(), "to_qdrant_filter");

    let mut must: Vec<Condition> = Vec::new();

    for (field, value) in &f.equals {
        let m = match value {
            MetaValue::Str(s) => Match {
                match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                    s.clone(),
                )),
            },
            MetaValue::Int(i) => Match {
                match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Integer(*i)),
            },
            MetaValue::Bool(b) => Match {
                match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Boolean(*b)),
            },
            // Float equality is not a match condition Qdrant supports.
            MetaValue::Float(_) => continue,
        };

        must.push(Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: field.clone(),
                r#match: Some(m),
                ..Default::default()
            })),
        });
    }

    Filter {
        must,
        ..Default::default()
    }
}
