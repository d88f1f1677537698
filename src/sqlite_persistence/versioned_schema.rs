use anyhow::{bail, Result};
use rusqlite::{params, Connection};

use super::BASE_DB_VERSION;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // unused_mut fires when the macro is invoked without optional
            // field assignments (e.g. `is_primary_key = true`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    fn from_sql(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            "BLOB" => Some(&SqlType::Blob),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut create_sql = format!("CREATE TABLE {} (", self.name);
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_sql.push_str(", ");
            }
            create_sql.push_str(&format!("{} {}", column.name, column.sql_type.as_sql()));
            if column.is_primary_key {
                create_sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                create_sql.push_str(" NOT NULL");
            }
            if column.is_unique {
                create_sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                create_sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(foreign_key) = column.foreign_key {
                create_sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    foreign_key.foreign_table,
                    foreign_key.foreign_column,
                    match foreign_key.on_delete {
                        ForeignKeyOnChange::NoAction => "NO ACTION",
                        ForeignKeyOnChange::Restrict => "RESTRICT",
                        ForeignKeyOnChange::SetNull => "SET NULL",
                        ForeignKeyOnChange::SetDefault => "SET DEFAULT",
                        ForeignKeyOnChange::Cascade => "CASCADE",
                    }
                ));
            }
        }

        for unique_constraint in self.unique_constraints {
            create_sql.push_str(&format!(", UNIQUE ({})", unique_constraint.join(", ")));
        }
        create_sql.push_str(");");
        conn.execute(&create_sql, params![])?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

/// Column shape as reported by `PRAGMA table_info`.
struct ReportedColumn {
    name: String,
    sql_type: &'static SqlType,
    non_null: bool,
    default_value: Option<String>,
    is_primary_key: bool,
}

fn strip_outer_parentheses(s: &str) -> &str {
    if s.starts_with('(') && s.ends_with(')') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    /// Check an existing database against this schema definition, column by
    /// column, so a stale or foreign database fails loudly at open time.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table.name))?;
            let actual_columns: Vec<ReportedColumn> = stmt
                .query_map(params![], |row| {
                    let declared_type: String = row.get(2)?;
                    let sql_type = SqlType::from_sql(&declared_type).ok_or_else(|| {
                        rusqlite::Error::InvalidColumnType(
                            2,
                            declared_type,
                            rusqlite::types::Type::Text,
                        )
                    })?;
                    Ok(ReportedColumn {
                        name: row.get(1)?,
                        sql_type,
                        non_null: row.get::<_, i32>(3)? == 1,
                        default_value: row.get(4)?,
                        is_primary_key: row.get::<_, i32>(5)? == 1,
                    })
                })?
                .collect::<Result<_, _>>()?;

            if actual_columns.len() != table.columns.len() {
                bail!(
                    "Table {} has {} columns, expected {}. Found: [{}], expected: [{}]",
                    table.name,
                    actual_columns.len(),
                    table.columns.len(),
                    actual_columns
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    table
                        .columns
                        .iter()
                        .map(|c| c.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }

            for (actual, expected) in actual_columns.iter().zip(table.columns.iter()) {
                if actual.name != expected.name {
                    bail!(
                        "Table {} column name mismatch: expected {}, got {}",
                        table.name,
                        expected.name,
                        actual.name
                    );
                }
                if actual.sql_type != expected.sql_type {
                    bail!(
                        "Table {} column {} type mismatch: expected {:?}, got {:?}",
                        table.name,
                        expected.name,
                        expected.sql_type,
                        actual.sql_type
                    );
                }
                if actual.non_null != expected.non_null {
                    bail!(
                        "Table {} column {} non-null mismatch: expected {}, got {}",
                        table.name,
                        expected.name,
                        expected.non_null,
                        actual.non_null
                    );
                }
                // SQLite may report defaults wrapped in parentheses
                if actual.default_value.as_deref().map(strip_outer_parentheses)
                    != expected.default_value.map(strip_outer_parentheses)
                {
                    bail!(
                        "Table {} column {} default mismatch: expected {:?}, got {:?}",
                        table.name,
                        expected.name,
                        expected.default_value,
                        actual.default_value
                    );
                }
                if actual.is_primary_key != expected.is_primary_key {
                    bail!(
                        "Table {} column {} primary key mismatch: expected {}, got {}",
                        table.name,
                        expected.name,
                        expected.is_primary_key,
                        actual.is_primary_key
                    );
                }
            }

            for (index_name, _columns) in table.indices {
                let index_exists: bool = conn
                    .query_row(
                        "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                        params![index_name, table.name],
                        |_| Ok(true),
                    )
                    .unwrap_or(false);

                if !index_exists {
                    bail!("Table {} is missing index '{}'", table.name, index_name);
                }
            }
        }
        Ok(())
    }
}
