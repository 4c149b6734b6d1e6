use super::Repository;
use crate::errors::Result;
use sea_orm::{DbBackend, FromQueryResult, Statement};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Characters of summary kept in a result snippet
const SNIPPET_CHARS: usize = 300;

/// Requested retrieval mode.
///
/// Semantic and hybrid retrieval are not implemented; every mode runs
/// the keyword path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// One search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub document_id: Uuid,
    pub document_title: String,
    pub snippet: String,
}

#[derive(Debug, FromQueryResult)]
struct MatchRow {
    id: Uuid,
    title: String,
    summary: Option<String>,
}

impl From<MatchRow> for SearchHit {
    fn from(row: MatchRow) -> Self {
        let snippet = match row.summary {
            Some(summary) if !summary.is_empty() => {
                let mut chars = summary.chars();
                let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
                if chars.next().is_some() {
                    format!("{}…", head)
                } else {
                    head
                }
            }
            _ => row.title.clone(),
        };

        SearchHit {
            document_id: row.id,
            document_title: row.title,
            snippet,
        }
    }
}

/// Escape LIKE metacharacters and wrap in `%…%`
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Repository {
    // ========================================================================
    // Search Operations
    // ========================================================================

    /// Case-insensitive substring search over title and summary.
    ///
    /// Archived and failed documents are excluded; newest activity first.
    pub async fn search_documents(
        &self,
        user_id: Uuid,
        query: &str,
        mode: SearchMode,
        limit: u64,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT id, title, summary
            FROM documents
            WHERE user_id = $1
              AND status NOT IN ('ARCHIVED', 'FAILED')
              AND (title ILIKE $2 ESCAPE '\' OR summary ILIKE $2 ESCAPE '\')
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
            vec![user_id.into(), like_pattern(query).into(), (limit as i64).into()],
        );

        let hits: Vec<SearchHit> = MatchRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(SearchHit::from)
            .collect();

        crate::metrics::record_search(mode.as_str(), start.elapsed(), hits.len());

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::empty_repo;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_done"), r"%100\%\_done%");
    }

    #[test]
    fn test_snippet_truncates_summary() {
        let hit = SearchHit::from(MatchRow {
            id: Uuid::nil(),
            title: "T".into(),
            summary: Some("a".repeat(400)),
        });
        assert_eq!(hit.snippet.chars().count(), SNIPPET_CHARS + 1);
        assert!(hit.snippet.ends_with('…'));
    }

    #[test]
    fn test_snippet_falls_back_to_title() {
        let hit = SearchHit::from(MatchRow {
            id: Uuid::nil(),
            title: "Graph Theory".into(),
            summary: None,
        });
        assert_eq!(hit.snippet, "Graph Theory");
    }

    #[tokio::test]
    async fn test_blank_query_skips_store() {
        // The mock has no rows queued, so any statement would error
        let hits = empty_repo()
            .search_documents(Uuid::new_v4(), "   ", SearchMode::Hybrid, 20)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_mode_wire_form() {
        let mode: SearchMode = serde_json::from_str("\"semantic\"").unwrap();
        assert_eq!(mode, SearchMode::Semantic);
        assert_eq!(SearchMode::default(), SearchMode::Keyword);
    }
}
