//! Tabularization: group labelled text into typed rows.

use super::spec::{FieldSpec, FormatSpec, PartialRowPolicy};
use super::value::{coerce, ValueKind};
use crate::error::Result;
use crate::model::{FieldTag, Row, Table, TextBlock, Value};

/// Name of the column added by instrument classification.
pub const INSTRUMENT_COLUMN: &str = "Instrument";

#[derive(Debug, Clone)]
struct Column {
    name: String,
    tag: FieldTag,
    kind: ValueKind,
    required: bool,
}

impl From<&FieldSpec> for Column {
    fn from(spec: &FieldSpec) -> Self {
        Self {
            name: spec.name.clone(),
            tag: spec.tag,
            kind: spec.kind,
            required: spec.required,
        }
    }
}

/// Column set and row policy of one format.
#[derive(Debug, Clone)]
pub struct TabularizeRules {
    format: String,
    columns: Vec<Column>,
    on_partial_row: PartialRowPolicy,
    instrument_column: bool,
}

impl TabularizeRules {
    pub fn from_spec(spec: &FormatSpec) -> Self {
        Self {
            format: spec.id.clone(),
            columns: spec.fields.iter().map(Column::from).collect(),
            on_partial_row: spec.on_partial_row,
            instrument_column: spec.instrument_column,
        }
    }

    /// Output column names, in order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        if self.instrument_column {
            names.push(INSTRUMENT_COLUMN.to_string());
        }
        names
    }

    /// Build the output table. Text blocks from the same source block form one
    /// row; rows keep the order of their first text block.
    pub fn tabularize(&self, texts: &[TextBlock]) -> Result<Table> {
        let mut table = Table::new(self.format.clone(), self.column_names());
        let mut rejected = 0usize;

        for group in group_by_source(texts) {
            let mut cells = Vec::with_capacity(table.columns.len());
            let mut problems = Vec::new();

            for column in &self.columns {
                let text = group.iter().find(|t| t.field == column.name);
                let cell = match text {
                    Some(t) => match coerce(column.kind, &t.text) {
                        Ok(v) => Some(v),
                        Err(e) => {
                            problems.push(format!("{}: {}", column.name, e));
                            None
                        }
                    },
                    None if column.required => {
                        problems.push(format!("{}: missing", column.name));
                        None
                    }
                    None => None,
                };
                cells.push(cell);
            }

            if self.instrument_column {
                cells.push(Some(Value::Text(self.classify(&cells).to_string())));
            }

            if !problems.is_empty() {
                let origin = group[0].provenance;
                match self.on_partial_row {
                    PartialRowPolicy::Reject => {
                        log::warn!("Row from {} rejected ({})", origin, problems.join("; "));
                        rejected += 1;
                        continue;
                    }
                    PartialRowPolicy::FillNull => {
                        log::debug!("Row from {} kept with nulls ({})", origin, problems.join("; "));
                    }
                }
            }
            table.push(Row::new(cells));
        }

        if rejected > 0 {
            log::info!("{}: {} partial rows rejected", self.format, rejected);
        }
        Ok(table)
    }

    /// A row is a bond when it carries an interest rate or a maturity.
    fn classify(&self, cells: &[Option<Value>]) -> &'static str {
        let is_bond = self.columns.iter().zip(cells).any(|(column, cell)| {
            matches!(column.tag, FieldTag::InterestRate | FieldTag::Maturity) && cell.is_some()
        });
        if is_bond {
            "bond"
        } else {
            "equity"
        }
    }
}

/// Group text blocks by source block ordinal, keeping first-seen order.
fn group_by_source(texts: &[TextBlock]) -> Vec<Vec<&TextBlock>> {
    let mut groups: Vec<Vec<&TextBlock>> = Vec::new();
    let mut current: Option<usize> = None;
    for text in texts {
        if current == Some(text.provenance.block) {
            if let Some(last) = groups.last_mut() {
                last.push(text);
            }
            continue;
        }
        match groups
            .iter_mut()
            .find(|g| g[0].provenance.block == text.provenance.block)
        {
            Some(group) => group.push(text),
            None => groups.push(vec![text]),
        }
        current = Some(text.provenance.block);
    }
    groups
}
