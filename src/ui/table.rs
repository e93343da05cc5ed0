use tabled::{settings::Style, Table, Tabled};

use crate::context::TableStats;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub table: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Rows")]
    pub rows: i64,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, table: &str, kind: &str, rows: i64) {
        self.rows.push(TableRow {
            table: table.to_string(),
            kind: kind.to_string(),
            rows,
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Row counts per managed table
pub fn stats_table(stats: &[TableStats]) -> String {
    let mut builder = TableBuilder::new();
    for entry in stats {
        builder.add_row(&entry.table, entry.kind.as_str(), entry.rows);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TableKind;

    #[test]
    fn test_stats_table_lists_every_table() {
        let stats = vec![
            TableStats { table: "Store".into(), kind: TableKind::Primary, rows: 1 },
            TableStats { table: "StoreToBook".into(), kind: TableKind::Junction, rows: 2 },
        ];
        let rendered = stats_table(&stats);
        assert!(rendered.contains("StoreToBook"));
        assert!(rendered.contains("junction"));
        assert!(stats_table(&[]).is_empty());
    }
}
