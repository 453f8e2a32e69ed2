use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::IndexerError;

/// A typed column value, used only to decide whether a field is "zero for its
/// type" (the sparse-update rule) and to bind it into a dynamically built
/// query. An explicit, per-entity builder stands in for a reflection-based
/// field walk.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Text(String),
    I64(i64),
}

impl SqlValue {
    fn is_zero(&self) -> bool {
        match self {
            SqlValue::Text(s) => s.is_empty(),
            SqlValue::I64(n) => *n == 0,
        }
    }
}

/// Implemented by every entity that is written through the sparse-UPSERT
/// mechanism. `columns()` must list every column in table order, including
/// primary-key columns.
pub trait SparseRow {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static [&'static str];

    fn columns(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Executes `INSERT ... ON CONFLICT (pk) DO UPDATE SET ...` where both the
/// INSERT column/value list and the SET list contain only the columns of
/// `row` that are non-zero for their declared type (primary-key columns are
/// always included in the INSERT list, but never in the SET list). A
/// zero-for-type column is left out of the INSERT entirely so a first-time
/// row gets the column's `DEFAULT` rather than an empty string or `0`
/// overwriting it.
pub async fn sparse_upsert<R: SparseRow>(pool: &PgPool, row: &R) -> Result<(), IndexerError> {
    build_query(row)
        .build()
        .execute(pool)
        .await
        .map_err(|err| IndexerError::Fatal(err.into()))?;

    Ok(())
}

/// Builds the `INSERT ... ON CONFLICT ... DO UPDATE SET ...` query for `row`,
/// separated from [`sparse_upsert`] so the generated SQL can be inspected in
/// tests without a live connection.
fn build_query<R: SparseRow>(row: &R) -> QueryBuilder<'static, Postgres> {
    let columns = row.columns();

    let insert_columns: Vec<&(&'static str, SqlValue)> = columns
        .iter()
        .filter(|(name, value)| R::PRIMARY_KEY.contains(name) || !value.is_zero())
        .collect();

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} (", R::TABLE));
    {
        let mut separated = builder.separated(", ");
        for (name, _) in &insert_columns {
            separated.push(*name);
        }
    }
    builder.push(") VALUES (");
    {
        let mut separated = builder.separated(", ");
        for (_, value) in &insert_columns {
            match value {
                SqlValue::Text(v) => separated.push_bind(v.clone()),
                SqlValue::I64(v) => separated.push_bind(*v),
            };
        }
    }
    builder.push(")");

    let set_columns: Vec<&'static str> = columns
        .iter()
        .filter(|(name, value)| !R::PRIMARY_KEY.contains(name) && !value.is_zero())
        .map(|(name, _)| *name)
        .collect();

    builder.push(format!(" ON CONFLICT ({}) ", R::PRIMARY_KEY.join(", ")));
    if set_columns.is_empty() {
        builder.push("DO NOTHING");
    } else {
        builder.push("DO UPDATE SET ");
        let mut separated = builder.separated(", ");
        for name in &set_columns {
            separated.push(format!("{name} = EXCLUDED.{name}"));
        }
    }

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        number: i64,
        hash: String,
    }

    impl SparseRow for Fixture {
        const TABLE: &'static str = "fixtures";
        const PRIMARY_KEY: &'static [&'static str] = &["number"];

        fn columns(&self) -> Vec<(&'static str, SqlValue)> {
            vec![
                ("number", SqlValue::I64(self.number)),
                ("hash", SqlValue::Text(self.hash.clone())),
            ]
        }
    }

    #[test]
    fn zero_text_field_is_zero() {
        assert!(SqlValue::Text(String::new()).is_zero());
        assert!(!SqlValue::Text("a".to_string()).is_zero());
    }

    #[test]
    fn zero_i64_field_is_zero() {
        assert!(SqlValue::I64(0).is_zero());
        assert!(!SqlValue::I64(1).is_zero());
    }

    #[test]
    fn fixture_columns_include_primary_key() {
        let fixture = Fixture {
            number: 1,
            hash: "abc".to_string(),
        };
        let columns = fixture.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].0, "number");
    }

    #[test]
    fn insert_clause_omits_zero_non_primary_key_column() {
        let fixture = Fixture {
            number: 1,
            hash: String::new(),
        };
        let sql = build_query(&fixture).sql().to_string();
        let insert_clause = sql.split(" VALUES ").next().unwrap();
        assert!(insert_clause.contains("number"));
        assert!(
            !insert_clause.contains("hash"),
            "a zero-valued column must be left out of the INSERT so its \
             DEFAULT applies, not bound as an empty string: {insert_clause}"
        );
    }

    #[test]
    fn insert_clause_keeps_non_zero_non_primary_key_column() {
        let fixture = Fixture {
            number: 1,
            hash: "abc".to_string(),
        };
        let sql = build_query(&fixture).sql().to_string();
        let insert_clause = sql.split(" VALUES ").next().unwrap();
        assert!(insert_clause.contains("hash"));
    }

    #[test]
    fn insert_clause_always_keeps_the_primary_key_even_when_zero() {
        let fixture = Fixture {
            number: 0,
            hash: String::new(),
        };
        let sql = build_query(&fixture).sql().to_string();
        let insert_clause = sql.split(" VALUES ").next().unwrap();
        assert!(insert_clause.contains("number"));
    }
}
