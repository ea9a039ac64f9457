use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet};
use std::path::PathBuf;
use tracing::info;

use super::{Destination, TableOutcome};
use crate::error::DocgridError;
use crate::model::Value;
use crate::normalize::NormalizedDocument;
use crate::schema::{ColumnType, TableSchema};

/// Spreadsheet destination: one workbook per run, one sheet per table.
///
/// Rows are buffered and the file is written (overwritten) by `finish`.
pub struct XlsxSink {
    path: PathBuf,
    sheets: Vec<Sheet>,
    last: Option<Checkpoint>,
}

/// Sheet and row counts before the most recent document was buffered.
struct Checkpoint {
    sheets: usize,
    rows: Vec<usize>,
}

struct Sheet {
    schema: &'static TableSchema,
    rows: Vec<Vec<Value>>,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XlsxSink {
            path: path.into(),
            sheets: Vec::new(),
            last: None,
        }
    }

    fn sheet_mut(&mut self, schema: &'static TableSchema) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|s| s.schema.name == schema.name) {
            Some(i) => i,
            None => {
                self.sheets.push(Sheet {
                    schema,
                    rows: Vec::new(),
                });
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    /// Render the buffered tables as workbook bytes.
    pub fn to_buffer(&self) -> Result<Vec<u8>, DocgridError> {
        let mut workbook = Workbook::new();
        // A fixed creation time keeps identical runs byte-identical.
        let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
        workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet.schema.name)?;
            write_sheet(worksheet, sheet)?;
        }
        Ok(workbook.save_to_buffer()?)
    }
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<(), DocgridError> {
    for (col, def) in sheet.schema.columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, def.name)?;
    }

    for (r, row) in sheet.rows.iter().enumerate() {
        let xl_row = (r + 1) as u32;
        for (col, (def, value)) in sheet.schema.columns.iter().zip(row).enumerate() {
            let col = col as u16;
            if def.ty == ColumnType::Serial {
                worksheet.write_number(xl_row, col, (r + 1) as f64)?;
                continue;
            }
            match value {
                Value::Null => {}
                Value::Integer(i) => {
                    worksheet.write_number(xl_row, col, *i as f64)?;
                }
                Value::Decimal(d) => match d.to_f64() {
                    Some(f) => {
                        worksheet.write_number(xl_row, col, f)?;
                    }
                    None => {
                        worksheet.write_string(xl_row, col, d.to_string())?;
                    }
                },
                Value::Text(s) => {
                    worksheet.write_string(xl_row, col, s)?;
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(xl_row, col, *b)?;
                }
            }
        }
    }
    Ok(())
}

impl Destination for XlsxSink {
    fn name(&self) -> &str {
        "xlsx"
    }

    fn write_document(&mut self, doc: &NormalizedDocument) -> Result<Vec<TableOutcome>, DocgridError> {
        self.last = Some(Checkpoint {
            sheets: self.sheets.len(),
            rows: self.sheets.iter().map(|s| s.rows.len()).collect(),
        });
        let mut outcomes = Vec::with_capacity(doc.tables.len());
        for table in doc.tables.iter() {
            let sheet = self.sheet_mut(table.schema);
            sheet.rows.extend(table.rows.iter().cloned());
            let mut outcome = TableOutcome::new(table.name());
            outcome.inserted = table.rows.len();
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn discard_last(&mut self) {
        if let Some(cp) = self.last.take() {
            self.sheets.truncate(cp.sheets);
            for (sheet, len) in self.sheets.iter_mut().zip(cp.rows) {
                sheet.rows.truncate(len);
            }
        }
    }

    fn finish(&mut self) -> Result<(), DocgridError> {
        let bytes = self.to_buffer()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, bytes)?;
        info!(
            path = %self.path.display(),
            sheets = self.sheets.len(),
            rows = self.sheets.iter().map(|s| s.rows.len()).sum::<usize>(),
            "workbook written"
        );
        Ok(())
    }
}
