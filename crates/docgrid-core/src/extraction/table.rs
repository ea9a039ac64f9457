//! Reconstruct invoice grids from pdftotext -layout output.
//!
//! A header row fixes the column layout. Pipe-delimited headers split rows on
//! `|`; otherwise columns are positional, located by the character spans of
//! the header labels, and each whitespace-separated chunk of a row lands in the
//! column it sits under.

use crate::normalize::values::parse_amount;

/// A recognized invoice grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Item,
    Description,
    HsnCode,
    Quantity,
    UnitPrice,
    TotalPrice,
}

const LABELS: &[(&str, Column)] = &[
    ("item description", Column::Item),
    ("item desc", Column::Item),
    ("item name", Column::Item),
    ("item", Column::Item),
    ("items", Column::Item),
    ("product", Column::Item),
    ("description", Column::Description),
    ("desc", Column::Description),
    ("particulars", Column::Description),
    ("details", Column::Description),
    ("hsn/sac", Column::HsnCode),
    ("hsn code", Column::HsnCode),
    ("hsn", Column::HsnCode),
    ("hsdn", Column::HsnCode),
    ("sac", Column::HsnCode),
    ("code", Column::HsnCode),
    ("quantity", Column::Quantity),
    ("qty", Column::Quantity),
    ("qnty", Column::Quantity),
    ("unit price", Column::UnitPrice),
    ("unit cost", Column::UnitPrice),
    ("price", Column::UnitPrice),
    ("rate", Column::UnitPrice),
    ("total price", Column::TotalPrice),
    ("line total", Column::TotalPrice),
    ("total", Column::TotalPrice),
    ("amount", Column::TotalPrice),
    ("amt", Column::TotalPrice),
];

impl Column {
    /// Candidate field name the column's cells are stored under.
    pub fn field(self) -> &'static str {
        match self {
            Column::Item => "item",
            Column::Description => "description",
            Column::HsnCode => "hsn_code",
            Column::Quantity => "quantity",
            Column::UnitPrice => "unit_price",
            Column::TotalPrice => "total_price",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Column::Quantity | Column::UnitPrice | Column::TotalPrice)
    }

    fn is_text(self) -> bool {
        matches!(self, Column::Item | Column::Description)
    }

    /// Look up a header label, ignoring case, punctuation and a `(USD)`-style suffix.
    pub fn from_label(label: &str) -> Option<Column> {
        let key = normalize_label(label);
        LABELS.iter().find(|(l, _)| *l == key).map(|(_, c)| *c)
    }
}

fn normalize_label(label: &str) -> String {
    let base = match label.find('(') {
        Some(i) => &label[..i],
        None => label,
    };
    base.split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, '.' | ':' | '#' | '*')))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A run of text with its character columns `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Segment {
    fn overlap(&self, start: usize, end: usize) -> usize {
        self.end.min(end).saturating_sub(self.start.max(start))
    }

    fn center2(&self) -> usize {
        self.start + self.end
    }
}

/// Split a line by gaps of 2+ whitespace characters, keeping positions.
pub fn split_by_whitespace_gaps(line: &str) -> Vec<Segment> {
    split_runs(line, 2)
}

/// Split a line into runs separated by at least `min_gap` whitespace characters.
fn split_runs(line: &str, min_gap: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<(usize, String)> = None;
    let mut pending_space = 0usize;

    for (col, c) in line.chars().enumerate() {
        if c.is_whitespace() {
            pending_space += 1;
            if pending_space == min_gap {
                if let Some((start, text)) = current.take() {
                    let end = start + text.chars().count();
                    segments.push(Segment { start, end, text });
                }
            }
            continue;
        }
        match current.as_mut() {
            Some((_, text)) => {
                for _ in 0..pending_space {
                    text.push(' ');
                }
                text.push(c);
            }
            None => current = Some((col, c.to_string())),
        }
        pending_space = 0;
    }

    if let Some((start, text)) = current {
        let end = start + text.chars().count();
        segments.push(Segment { start, end, text });
    }
    segments
}

#[derive(Debug, Clone)]
struct LayoutColumn {
    column: Option<Column>,
    start: usize,
    end: usize,
}

/// Column positions derived from a grid header row.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    piped: bool,
    columns: Vec<LayoutColumn>,
}

/// Minimum number of distinct recognized labels for a header row.
pub const MIN_HEADER_COLUMNS: usize = 3;

impl ColumnLayout {
    /// Derive a layout from a header row, or `None` if too few labels are recognized.
    pub fn from_header(line: &str) -> Option<ColumnLayout> {
        let piped = line.contains('|');
        let mut columns = if piped {
            pipe_cells(line)
                .into_iter()
                .map(|cell| LayoutColumn {
                    column: Column::from_label(&cell),
                    start: 0,
                    end: 0,
                })
                .collect()
        } else {
            positional_labels(line)
        };

        // A grid with only a description column uses it as the item name.
        let has_item = columns.iter().any(|c| c.column == Some(Column::Item));
        if !has_item {
            if let Some(c) = columns
                .iter_mut()
                .find(|c| c.column == Some(Column::Description))
            {
                c.column = Some(Column::Item);
            }
        }

        let mut seen = Vec::new();
        for c in columns.iter_mut() {
            if let Some(col) = c.column {
                if seen.contains(&col) {
                    c.column = None;
                } else {
                    seen.push(col);
                }
            }
        }

        if seen.len() < MIN_HEADER_COLUMNS {
            return None;
        }
        Some(ColumnLayout { piped, columns })
    }

    pub fn is_piped(&self) -> bool {
        self.piped
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.iter().any(|c| c.column == Some(column))
    }

    /// Recognized columns in header order.
    pub fn columns(&self) -> Vec<Column> {
        self.columns.iter().filter_map(|c| c.column).collect()
    }

    /// Split a data line into cells keyed by column. Blank cells are omitted.
    pub fn split_row(&self, line: &str) -> Vec<(Column, String)> {
        let mut cells: Vec<(Column, String)> = Vec::new();
        let mut push = |column: Column, text: &str| {
            let text = text.trim();
            if text.is_empty() {
                return;
            }
            match cells.iter_mut().find(|(c, _)| *c == column) {
                Some((_, existing)) => {
                    existing.push(' ');
                    existing.push_str(text);
                }
                None => cells.push((column, text.to_string())),
            }
        };

        if self.piped {
            for (i, cell) in pipe_cells(line).iter().enumerate() {
                if let Some(column) = self.columns.get(i).and_then(|c| c.column) {
                    push(column, cell);
                }
            }
        } else {
            for seg in split_by_whitespace_gaps(line) {
                if let Some(column) = self.assign(&seg) {
                    push(column, &seg.text);
                }
            }
        }
        cells
    }

    /// Whether a split row carries a number in a quantity or price column.
    pub fn is_data_row(cells: &[(Column, String)]) -> bool {
        cells
            .iter()
            .any(|(c, text)| c.is_numeric() && matches!(parse_amount(text), Ok(Some(_))))
    }

    /// Whether a split row reads as a priced line item: at least two numeric
    /// cells, one of them a quantity or unit price. Summary lines such as
    /// totals and tax carry a single amount.
    pub fn is_item_row(cells: &[(Column, String)]) -> bool {
        let numbers: Vec<Column> = cells
            .iter()
            .filter(|(c, text)| c.is_numeric() && matches!(parse_amount(text), Ok(Some(_))))
            .map(|(c, _)| *c)
            .collect();
        numbers.len() >= 2
            && numbers
                .iter()
                .any(|c| matches!(c, Column::Quantity | Column::UnitPrice))
    }

    fn assign(&self, seg: &Segment) -> Option<Column> {
        let overlapping: Vec<(&LayoutColumn, usize)> = self
            .columns
            .iter()
            .map(|c| (c, seg.overlap(c.start, c.end)))
            .filter(|(_, o)| *o > 0)
            .collect();

        if overlapping.len() > 1 {
            // Free text spills rightwards over neighbouring labels.
            if let Some((c, _)) = overlapping
                .iter()
                .find(|(c, _)| c.column.is_some_and(Column::is_text))
            {
                return c.column;
            }
        }
        if let Some((c, _)) = overlapping.iter().max_by_key(|(_, o)| *o) {
            return c.column;
        }

        self.columns
            .iter()
            .min_by_key(|c| (c.start + c.end).abs_diff(seg.center2()))
            .and_then(|c| c.column)
    }
}

/// Split a pipe-delimited line into trimmed cells, ignoring outer pipes.
fn pipe_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Locate header labels by position, merging single-spaced words into two-word labels.
fn positional_labels(line: &str) -> Vec<LayoutColumn> {
    let words = split_runs(line, 1);
    let mut columns: Vec<LayoutColumn> = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let word = &words[i];
        if let Some(next) = words.get(i + 1) {
            if next.start == word.end + 1 {
                let pair = format!("{} {}", word.text, next.text);
                if let Some(column) = Column::from_label(&pair) {
                    columns.push(LayoutColumn {
                        column: Some(column),
                        start: word.start,
                        end: next.end,
                    });
                    i += 2;
                    continue;
                }
            }
        }

        let column = Column::from_label(&word.text);
        match columns.last_mut() {
            // Adjacent unknown words form one unlabelled column ("S. No.").
            Some(last) if column.is_none() && last.column.is_none() && word.start == last.end + 1 => {
                last.end = word.end;
            }
            _ => columns.push(LayoutColumn {
                column,
                start: word.start,
                end: word.end,
            }),
        }
        i += 1;
    }
    columns
}
