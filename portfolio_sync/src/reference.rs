//! The security master list: reading, cleaning and diagnosing the reference file.
//!
//! The file is a delimited table with at least the columns `symbol`, `organ_name`,
//! `icb_name` and `exchange`. Extra columns are ignored.

use std::{collections::HashSet, fs::File, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::ReferenceError;

pub const REQUIRED_COLUMNS: [&str; 4] = ["symbol", "organ_name", "icb_name", "exchange"];

/// Exchange codes a company may be listed on.
pub const VALID_EXCHANGES: [&str; 3] = ["HOSE", "HNX", "UPCOM"];

/// One line of the reference file as read; any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReferenceRow {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub organ_name: Option<String>,
    #[serde(default)]
    pub icb_name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}

/// A validated company: every field present, non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub symbol: String,
    /// Legal name.
    pub organ_name: String,
    /// ICB industry classification name.
    pub icb_name: String,
    /// Exchange code, e.g. `HOSE`.
    pub exchange: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub incomplete: usize,
    pub duplicates: usize,
}

impl CleaningReport {
    pub fn removed(&self) -> usize {
        self.incomplete + self.duplicates
    }
}

/// Reads every row of the reference file without cleaning it.
pub fn read_reference_rows(path: &Path) -> Result<Vec<ReferenceRow>, ReferenceError> {
    let csv_err = |source| ReferenceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReferenceError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(csv_err(csv::Error::from(e))),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers().map_err(csv_err)?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReferenceError::MissingColumns(missing));
    }

    reader
        .deserialize::<ReferenceRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)
}

fn clean_field(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trims every field, drops rows missing a required field and keeps the first row
/// of each symbol.
///
/// Incomplete rows are dropped before duplicates are looked for, so an incomplete
/// first row never hides a complete later row for the same symbol.
pub fn clean_reference_rows(rows: Vec<ReferenceRow>) -> (Vec<Company>, CleaningReport) {
    let mut report = CleaningReport {
        rows_read: rows.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut companies = Vec::with_capacity(rows.len());

    for row in &rows {
        let (Some(symbol), Some(organ_name), Some(icb_name), Some(exchange)) = (
            clean_field(&row.symbol),
            clean_field(&row.organ_name),
            clean_field(&row.icb_name),
            clean_field(&row.exchange),
        ) else {
            report.incomplete += 1;
            continue;
        };
        if !seen.insert(symbol.clone()) {
            report.duplicates += 1;
            continue;
        }
        companies.push(Company {
            symbol,
            organ_name,
            icb_name,
            exchange,
        });
    }
    (companies, report)
}

/// Reads and cleans the reference file.
///
/// Every failure is logged and yields an empty list; callers treat empty as fatal.
pub fn load_reference_data(path: &Path) -> Vec<Company> {
    info!(path = %path.display(), "reading reference data");
    let rows = match read_reference_rows(path) {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "cannot load reference data");
            return Vec::new();
        }
    };
    let (companies, report) = clean_reference_rows(rows);
    if report.removed() > 0 {
        warn!(
            incomplete = report.incomplete,
            duplicates = report.duplicates,
            "dropped {} reference rows",
            report.removed()
        );
    }
    info!(companies = companies.len(), "reference data loaded");
    companies
}

/// Structural health of a reference table. Diagnostics only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub empty: bool,
    /// Rows whose symbol appears more than once (every copy counted).
    pub duplicate_rows: usize,
    /// Missing values per required column, only columns with at least one.
    pub null_counts: IndexMap<&'static str, usize>,
    pub invalid_exchanges: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        if self.empty {
            return vec!["reference table is empty".to_string()];
        }
        let mut out = Vec::new();
        if self.duplicate_rows > 0 {
            out.push(format!("{} rows share a duplicated symbol", self.duplicate_rows));
        }
        if !self.null_counts.is_empty() {
            let cols: Vec<String> = self
                .null_counts
                .iter()
                .map(|(col, n)| format!("{col}={n}"))
                .collect();
            out.push(format!("missing values: {}", cols.join(", ")));
        }
        if !self.invalid_exchanges.is_empty() {
            out.push(format!(
                "unknown exchange codes: {}",
                self.invalid_exchanges.join(", ")
            ));
        }
        out
    }
}

pub fn validate_reference_rows(rows: &[ReferenceRow]) -> ValidationReport {
    if rows.is_empty() {
        return ValidationReport {
            empty: true,
            ..Default::default()
        };
    }

    let mut symbol_counts: IndexMap<String, usize> = IndexMap::new();
    for sym in rows.iter().filter_map(|r| clean_field(&r.symbol)) {
        *symbol_counts.entry(sym).or_default() += 1;
    }
    let duplicate_rows = symbol_counts.values().filter(|n| **n > 1).sum();

    let mut null_counts = IndexMap::new();
    let fields: [(&'static str, fn(&ReferenceRow) -> &Option<String>); 4] = [
        ("symbol", |r| &r.symbol),
        ("organ_name", |r| &r.organ_name),
        ("icb_name", |r| &r.icb_name),
        ("exchange", |r| &r.exchange),
    ];
    for (name, get) in fields {
        let n = rows.iter().filter(|r| clean_field(get(r)).is_none()).count();
        if n > 0 {
            null_counts.insert(name, n);
        }
    }

    let mut invalid_exchanges: Vec<String> = Vec::new();
    for code in rows.iter().filter_map(|r| clean_field(&r.exchange)) {
        if !VALID_EXCHANGES.contains(&code.as_str()) && !invalid_exchanges.contains(&code) {
            invalid_exchanges.push(code);
        }
    }

    ValidationReport {
        empty: false,
        duplicate_rows,
        null_counts,
        invalid_exchanges,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSummary {
    pub total: usize,
    pub by_exchange: IndexMap<String, usize>,
    pub by_industry: IndexMap<String, usize>,
    pub distinct_industries: usize,
    pub symbols: Vec<String>,
}

/// Counts by exchange and industry, most frequent first.
pub fn summarize_companies(companies: &[Company]) -> ReferenceSummary {
    let mut by_exchange: IndexMap<String, usize> = IndexMap::new();
    let mut by_industry: IndexMap<String, usize> = IndexMap::new();
    for c in companies {
        *by_exchange.entry(c.exchange.clone()).or_default() += 1;
        *by_industry.entry(c.icb_name.clone()).or_default() += 1;
    }
    by_exchange.sort_by(|_, a, _, b| b.cmp(a));
    by_industry.sort_by(|_, a, _, b| b.cmp(a));

    ReferenceSummary {
        total: companies.len(),
        distinct_industries: by_industry.len(),
        by_exchange,
        by_industry,
        symbols: companies.iter().map(|c| c.symbol.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(symbol: &str, name: &str, icb: &str, exchange: &str) -> ReferenceRow {
        let f = |s: &str| Some(s.to_string());
        ReferenceRow {
            symbol: f(symbol),
            organ_name: f(name),
            icb_name: f(icb),
            exchange: f(exchange),
        }
    }

    #[test]
    fn first_duplicate_wins_and_blanks_are_incomplete() {
        let rows = vec![
            row(" AAA ", "Acme Corp", "Banking", "HOSE"),
            row("AAA", "Acme Corp Renamed", "Banking", "HOSE"),
            row("BBB", "   ", "Banking", "HNX"),
            ReferenceRow {
                symbol: Some("CCC".into()),
                ..Default::default()
            },
        ];
        let (companies, report) = clean_reference_rows(rows);
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].symbol, "AAA");
        assert_eq!(companies[0].organ_name, "Acme Corp");
        assert_eq!(
            report,
            CleaningReport {
                rows_read: 4,
                incomplete: 2,
                duplicates: 1
            }
        );
    }

    #[test]
    fn complete_row_survives_an_earlier_incomplete_one() {
        let rows = vec![
            row("AAA", "", "Banking", "HOSE"),
            row("AAA", "Acme", "Banking", "HOSE"),
            row("AAA", "Acme Later", "Banking", "HOSE"),
        ];
        let (companies, report) = clean_reference_rows(rows);
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].organ_name, "Acme");
        assert_eq!(
            report,
            CleaningReport {
                rows_read: 3,
                incomplete: 1,
                duplicates: 1
            }
        );
    }

    #[test]
    fn validation_reports_without_mutating() {
        let rows = vec![
            row("AAA", "Acme", "Banking", "HOSE"),
            row("AAA", "Acme 2", "Banking", "NYSE"),
            ReferenceRow {
                symbol: Some("BBB".into()),
                organ_name: Some("Beta".into()),
                icb_name: None,
                exchange: Some("HNX".into()),
            },
        ];
        let report = validate_reference_rows(&rows);
        assert!(!report.is_valid());
        assert_eq!(report.duplicate_rows, 2);
        assert_eq!(report.null_counts.get("icb_name"), Some(&1));
        assert_eq!(report.invalid_exchanges, vec!["NYSE".to_string()]);
        assert_eq!(report.errors().len(), 3);

        assert!(validate_reference_rows(&[]).errors()[0].contains("empty"));
        assert!(validate_reference_rows(&rows[..1]).is_valid());
    }

    #[test]
    fn summary_counts_by_exchange_and_industry() {
        let (companies, _) = clean_reference_rows(vec![
            row("AAA", "A", "Banking", "HOSE"),
            row("BBB", "B", "Banking", "HOSE"),
            row("CCC", "C", "Retail", "HNX"),
        ]);
        let s = summarize_companies(&companies);
        assert_eq!(s.total, 3);
        assert_eq!(s.by_exchange.get_index(0), Some((&"HOSE".to_string(), &2)));
        assert_eq!(s.distinct_industries, 2);
        assert_eq!(s.symbols, vec!["AAA", "BBB", "CCC"]);
    }

    proptest! {
        #[test]
        fn cleaning_is_idempotent_and_unique(
            raw in prop::collection::vec(("[A-D]{1}", "[a-z ]{0,4}"), 0..30)
        ) {
            let rows: Vec<ReferenceRow> = raw
                .iter()
                .map(|(s, n)| row(s, n, "Banking", "HOSE"))
                .collect();
            let (once, _) = clean_reference_rows(rows);
            let again_rows: Vec<ReferenceRow> = once
                .iter()
                .map(|c| row(&c.symbol, &c.organ_name, &c.icb_name, &c.exchange))
                .collect();
            let (twice, report) = clean_reference_rows(again_rows);
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(report.removed(), 0);
            let unique: HashSet<_> = once.iter().map(|c| &c.symbol).collect();
            prop_assert_eq!(unique.len(), once.len());
        }
    }
}
