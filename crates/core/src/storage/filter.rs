//! Dynamic WHERE-clause builder for list queries

use rusqlite::types::Value;

/// Accumulates AND-ed conditions and their positional parameters
#[derive(Debug, Default)]
pub struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`, skipped when the value is absent
    pub fn eq(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.clauses.push(format!("{} = ?", column));
            self.params.push(Value::Text(value.to_string()));
        }
        self
    }

    /// Case-insensitive substring match over any of `columns`.
    /// Both sides are Unicode lower-cased; blank search terms are ignored.
    pub fn search(mut self, columns: &[&str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }

        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("casefold({}) LIKE ? ESCAPE '\\'", c))
            .collect();
        self.clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            self.params.push(Value::Text(pattern.clone()));
        }
        self
    }

    /// Arbitrary condition with its own parameters
    pub fn raw(mut self, clause: &str, params: impl IntoIterator<Item = Value>) -> Self {
        self.clauses.push(clause.to_string());
        self.params.extend(params);
        self
    }

    /// Parameterless condition
    pub fn clause(mut self, clause: &str) -> Self {
        self.clauses.push(clause.to_string());
        self
    }

    /// Leading-space WHERE clause, or empty when unfiltered
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameters followed by LIMIT and OFFSET values
    pub fn params_with_page(&self, limit: u32, offset: u64) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(i64::from(limit)));
        params.push(Value::Integer(offset as i64));
        params
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        let f = SqlFilter::new().eq("status", None).search(&["title"], Some("  "));
        assert_eq!(f.where_sql(), "");
        assert!(f.params().is_empty());
    }

    #[test]
    fn test_combined_filter() {
        let f = SqlFilter::new()
            .eq("status", Some("open"))
            .search(&["title", "description"], Some("leak"));
        assert_eq!(
            f.where_sql(),
            " WHERE status = ? AND (casefold(title) LIKE ? ESCAPE '\\' OR casefold(description) LIKE ? ESCAPE '\\')"
        );
        assert_eq!(f.params().len(), 3);
        assert_eq!(f.params()[1], Value::Text("%leak%".into()));
    }

    #[test]
    fn test_search_term_lowercased() {
        let f = SqlFilter::new().search(&["title"], Some("ÉLISE"));
        assert_eq!(f.params(), &[Value::Text("%élise%".into())]);
    }

    #[test]
    fn test_like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
