//! MySQL statement builders
//!
//! Statements are built as text with `?` placeholders; values are always bound.
//! Every identifier is backtick-quoted, so column names that collide with
//! reserved words (`long`, `type`, `sequence`, ...) need no special casing.

use crate::sync::registry::TableSpec;

/// MySQL rejects prepared statements with more placeholders than this
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Quote an identifier with backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `?, ?, ?` for `n` values
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// How many rows of `columns` values fit in one statement
pub fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

/// `CREATE TABLE IF NOT EXISTS` for a registered table
pub fn create_table(spec: &TableSpec) -> String {
    let mut defs: Vec<String> = spec
        .columns
        .iter()
        .map(|column| {
            let mut def = format!("{} {}", quote_ident(column.name), column.sql_type);
            if spec.primary_key == Some(column.name) {
                if spec.surrogate_key {
                    def.push_str(" AUTO_INCREMENT");
                }
                def.push_str(" PRIMARY KEY");
            }
            def
        })
        .collect();

    for index in spec.indexes {
        defs.push(format!(
            "INDEX {} ({})",
            quote_ident(&format!("idx_{}", index)),
            quote_ident(index)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(spec.name()),
        defs.join(",\n    ")
    )
}

/// `SELECT * FROM table WHERE column IN (?, ...)`
pub fn select_in(table: &str, column: &str, n: usize) -> String {
    format!(
        "SELECT * FROM {} WHERE {} IN ({})",
        quote_ident(table),
        quote_ident(column),
        placeholders(n)
    )
}

/// Surrogate id and key of the target rows holding any of `n` keys
pub fn select_key_ids(table: &str, id_column: &str, key_column: &str, n: usize) -> String {
    format!(
        "SELECT {id}, {key} FROM {} WHERE {key} IN ({}) ORDER BY {id}",
        quote_ident(table),
        placeholders(n),
        id = quote_ident(id_column),
        key = quote_ident(key_column)
    )
}

pub fn delete_in(table: &str, column: &str, n: usize) -> String {
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quote_ident(table),
        quote_ident(column),
        placeholders(n)
    )
}

/// Multi-row `INSERT` for `rows` rows of `columns`
pub fn insert(table: &str, columns: &[&str], rows: usize) -> String {
    let row = format!("({})", placeholders(columns.len()));
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        quoted.join(", "),
        vec![row.as_str(); rows].join(", ")
    )
}

/// Multi-row `INSERT ... ON DUPLICATE KEY UPDATE` overwriting `updates`
pub fn insert_on_duplicate(table: &str, columns: &[&str], rows: usize, updates: &[&str]) -> String {
    let sets: Vec<String> = updates
        .iter()
        .map(|c| format!("{col} = VALUES({col})", col = quote_ident(c)))
        .collect();
    format!("{} ON DUPLICATE KEY UPDATE {}", insert(table, columns, rows), sets.join(", "))
}
