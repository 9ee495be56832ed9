use crate::domain::model::PppRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::str::FromStr;

/// World Bank exports carry four metadata rows plus the column header row.
pub const DEFAULT_HEADER_ROWS: usize = 5;
/// Columns 0 and 1 hold the country name and code; yearly values start after them.
pub const DEFAULT_FIRST_VALUE_COLUMN: usize = 2;

/// What to do with a non-empty cell that is not a usable factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedCellPolicy {
    /// Report the cell as factor 0 and stop scanning. Pricing then treats the country as having no data.
    #[default]
    Zero,
    /// Treat the cell as empty and keep scanning towards older years.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    pub header_rows: usize,
    pub first_value_column: usize,
    pub on_malformed_cell: MalformedCellPolicy,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            header_rows: DEFAULT_HEADER_ROWS,
            first_value_column: DEFAULT_FIRST_VALUE_COLUMN,
            on_malformed_cell: MalformedCellPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub rows_read: usize,
    pub header_rows_skipped: usize,
    pub undecodable_rows: usize,
    pub rows_without_code: usize,
    pub rows_without_factor: usize,
    pub malformed_cells: usize,
    pub records_emitted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PppCsvParser {
    options: ParserOptions,
}

impl PppCsvParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// 回傳一次性的惰性迭代器，每列最多產生一筆紀錄
    pub fn parse<R: Read>(&self, reader: R) -> PppRecords<BufReader<R>> {
        let mut input = BufReader::new(reader);
        let header_rows_skipped = skip_header_rows(&mut input, self.options.header_rows);
        let stats = ParseStats {
            rows_read: header_rows_skipped,
            header_rows_skipped,
            ..ParseStats::default()
        };

        let rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input)
            .into_records();

        PppRecords {
            rows,
            options: self.options,
            stats,
            finished: false,
        }
    }
}

pub struct PppRecords<R> {
    rows: csv::StringRecordsIntoIter<R>,
    options: ParserOptions,
    stats: ParseStats,
    finished: bool,
}

impl<R: Read> PppRecords<R> {
    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    fn record_from_row(&mut self, row: &csv::StringRecord) -> Option<PppRecord> {
        let country_name = row.get(0).map(str::trim).unwrap_or_default();
        let country_code = row.get(1).map(str::trim).unwrap_or_default();

        if country_code.is_empty() {
            self.stats.rows_without_code += 1;
            tracing::debug!("Row {} has no country code, skipping", self.stats.rows_read);
            return None;
        }

        match self.latest_factor(row, country_code) {
            Some(factor) => Some(PppRecord::new(
                country_code.to_ascii_uppercase(),
                country_name,
                factor,
            )),
            None => {
                self.stats.rows_without_factor += 1;
                tracing::debug!(
                    "Row {} ({}) has no PPP value in any year, skipping",
                    self.stats.rows_read,
                    country_code
                );
                None
            }
        }
    }

    // 從最右邊（最新年份）往左找第一個非空值
    fn latest_factor(&mut self, row: &csv::StringRecord, country_code: &str) -> Option<Decimal> {
        for index in (self.options.first_value_column..row.len()).rev() {
            let cell = row.get(index).map(str::trim).unwrap_or_default();
            if cell.is_empty() {
                continue;
            }

            if let Some(factor) = parse_factor(cell) {
                return Some(factor);
            }

            self.stats.malformed_cells += 1;
            tracing::debug!(
                "Malformed PPP value '{}' for {} at row {}, column {} (policy: {:?})",
                cell,
                country_code,
                self.stats.rows_read,
                index,
                self.options.on_malformed_cell
            );

            match self.options.on_malformed_cell {
                MalformedCellPolicy::Zero => return Some(Decimal::ZERO),
                MalformedCellPolicy::Skip => continue,
            }
        }

        None
    }
}

impl<R: Read> Iterator for PppRecords<R> {
    type Item = PppRecord;

    fn next(&mut self) -> Option<PppRecord> {
        while !self.finished {
            let Some(row) = self.rows.next() else {
                self.finished = true;
                break;
            };
            self.stats.rows_read += 1;

            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => {
                    tracing::error!("Reading PPP CSV failed at row {}: {}", self.stats.rows_read, e);
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.stats.undecodable_rows += 1;
                    tracing::debug!("Skipping undecodable row {}: {}", self.stats.rows_read, e);
                    continue;
                }
            };

            if let Some(record) = self.record_from_row(&row) {
                self.stats.records_emitted += 1;
                return Some(record);
            }
        }

        None
    }
}

/// Consumes up to `rows` leading CSV rows without decoding them.
///
/// A blank line is a row of its own; a quoted cell spanning several lines stays one row.
fn skip_header_rows<R: BufRead>(input: &mut R, rows: usize) -> usize {
    let mut skipped = 0;
    let mut line = Vec::new();
    let mut in_quotes = false;

    while skipped < rows {
        line.clear();
        match input.read_until(b'\n', &mut line) {
            Ok(0) => {
                // 檔尾還在引號內，殘列仍算一列
                if in_quotes {
                    skipped += 1;
                }
                break;
            }
            Ok(_) => {
                // "" 跳脫成對出現，不影響奇偶
                if line.iter().filter(|&&b| b == b'"').count() % 2 == 1 {
                    in_quotes = !in_quotes;
                }
                if !in_quotes {
                    skipped += 1;
                }
            }
            Err(e) => {
                tracing::error!("Reading PPP CSV header failed: {}", e);
                break;
            }
        }
    }

    skipped
}

/// Parses a factor cell. Negative values are not valid PPP factors.
fn parse_factor(cell: &str) -> Option<Decimal> {
    let value = Decimal::from_str(cell)
        .or_else(|_| Decimal::from_scientific(cell))
        .ok()?;

    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    Some(value.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "\"Data Source\",\"World Development Indicators\",\n\
\n\
\"Last Updated Date\",\"2025-07-01\",\n\
\n\
\"Country Name\",\"Country Code\",\"2021\",\"2022\",\"2023\",\n";

    fn parse_all(csv: &str, options: ParserOptions) -> (Vec<PppRecord>, ParseStats) {
        let mut records = PppCsvParser::new(options).parse(csv.as_bytes());
        let collected: Vec<PppRecord> = records.by_ref().collect();
        (collected, records.stats().clone())
    }

    #[test]
    fn test_latest_non_empty_value_wins() {
        let csv = format!(
            "{}\"France\",\"FRA\",\"\",\"\",\"0.72\"\n\"Germany\",\"DEU\",\"0.75\",\"0.74\",\"\"\n",
            HEADER
        );
        let (records, _) = parse_all(&csv, ParserOptions::default());

        assert_eq!(
            records,
            vec![
                PppRecord::new("FRA", "France", dec!(0.72)),
                PppRecord::new("DEU", "Germany", dec!(0.74)),
            ]
        );
    }

    #[test]
    fn test_header_rows_skipped_regardless_of_content() {
        // 前五列看起來像資料也要跳過
        let csv = "Spain,ESP,0.60\nItaly,ITA,0.65\nPortugal,PRT,0.55\nGreece,GRC,0.50\nMalta,MLT,0.70\nFrance,FRA,0.72\n";
        let (records, stats) = parse_all(csv, ParserOptions::default());

        assert_eq!(records, vec![PppRecord::new("FRA", "France", dec!(0.72))]);
        assert_eq!(stats.header_rows_skipped, 5);
        assert_eq!(stats.rows_read, 6);
    }

    #[test]
    fn test_multiline_quoted_header_cell_is_one_row() {
        let csv = "\"Data Source\",\"World Development\nIndicators\"\n\
h2\n\
\n\
h4\n\
\"Country Name\",\"Country Code\",\"2023\"\n\
France,FRA,0.72\n";
        let (records, stats) = parse_all(csv, ParserOptions::default());

        assert_eq!(records, vec![PppRecord::new("FRA", "France", dec!(0.72))]);
        assert_eq!(stats.header_rows_skipped, 5);
        assert_eq!(stats.rows_read, 6);
    }

    #[test]
    fn test_escaped_quotes_in_header_do_not_join_rows() {
        let csv = "\"Note: \"\"PPP\"\" values\",x\nh2\nh3\nh4\nh5\nFrance,FRA,0.72\n";
        let (records, _) = parse_all(csv, ParserOptions::default());
        assert_eq!(records, vec![PppRecord::new("FRA", "France", dec!(0.72))]);
    }

    #[test]
    fn test_header_row_count_is_configurable() {
        let csv = "Country Name,Country Code,2023\nFrance,FRA,0.72\n";
        let options = ParserOptions {
            header_rows: 1,
            ..ParserOptions::default()
        };
        let (records, _) = parse_all(csv, options);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_rows_without_code_or_values_are_dropped() {
        let csv = format!(
            "{}\"Nowhere\",\"\",\"1.0\",\"\",\"\"\n\"Atlantis\",\"ATL\",\"\",\"\",\"\"\n\"Japan\",\"JPN\",\"\",\"96.3\",\"\"\n",
            HEADER
        );
        let (records, stats) = parse_all(&csv, ParserOptions::default());

        assert_eq!(records, vec![PppRecord::new("JPN", "Japan", dec!(96.3))]);
        assert_eq!(stats.rows_without_code, 1);
        assert_eq!(stats.rows_without_factor, 1);
        assert_eq!(stats.records_emitted, 1);
    }

    #[test]
    fn test_name_and_code_are_trimmed() {
        let csv = format!("{}\"  Brazil \",\" bra \",\" 2.38 \"\n", HEADER);
        let (records, _) = parse_all(&csv, ParserOptions::default());
        assert_eq!(records, vec![PppRecord::new("BRA", "Brazil", dec!(2.38))]);
    }

    #[test]
    fn test_value_columns_start_after_code() {
        // 只有名稱和代碼，沒有任何年份欄
        let csv = format!("{}\"Monaco\",\"MCO\"\n", HEADER);
        let (records, stats) = parse_all(&csv, ParserOptions::default());
        assert!(records.is_empty());
        assert_eq!(stats.rows_without_factor, 1);
    }

    #[test]
    fn test_malformed_cell_reads_as_zero_by_default() {
        let csv = format!("{}\"Kenya\",\"KEN\",\"40.1\",\"41.2\",\"N/A\"\n", HEADER);
        let (records, stats) = parse_all(&csv, ParserOptions::default());

        assert_eq!(records, vec![PppRecord::new("KEN", "Kenya", Decimal::ZERO)]);
        assert_eq!(stats.malformed_cells, 1);
    }

    #[test]
    fn test_malformed_cell_skipped_with_skip_policy() {
        let csv = format!(
            "{}\"Kenya\",\"KEN\",\"40.1\",\"41.2\",\"N/A\"\n\"Chile\",\"CHL\",\"oops\",\"\",\"-3\"\n",
            HEADER
        );
        let options = ParserOptions {
            on_malformed_cell: MalformedCellPolicy::Skip,
            ..ParserOptions::default()
        };
        let (records, stats) = parse_all(&csv, options);

        assert_eq!(records, vec![PppRecord::new("KEN", "Kenya", dec!(41.2))]);
        assert_eq!(stats.malformed_cells, 3);
        assert_eq!(stats.rows_without_factor, 1);
    }

    #[test]
    fn test_scientific_notation_is_accepted() {
        let csv = format!("{}\"Tinyland\",\"TNY\",\"7.5e-1\"\n", HEADER);
        let (records, _) = parse_all(&csv, ParserOptions::default());
        assert_eq!(records[0].factor, dec!(0.75));
    }

    #[test]
    fn test_ragged_and_broken_rows_do_not_abort() {
        let mut csv = HEADER.as_bytes().to_vec();
        csv.extend_from_slice(b"\"Peru\",\"PER\",\"1.9\"\n");
        // 非 UTF-8 的列應被跳過，但列數仍要前進
        csv.extend_from_slice(b"\"Bad\xff\",\"BAD\",\"1.0\"\n");
        csv.extend_from_slice(b"\"India\",\"IND\",\"20.1\",\"21.0\",\"22.4\",\"\",\"\",\n");

        let mut records = PppCsvParser::default().parse(csv.as_slice());
        let collected: Vec<PppRecord> = records.by_ref().collect();

        assert_eq!(
            collected,
            vec![
                PppRecord::new("PER", "Peru", dec!(1.9)),
                PppRecord::new("IND", "India", dec!(22.4)),
            ]
        );
        assert_eq!(records.stats().undecodable_rows, 1);
        assert_eq!(records.stats().header_rows_skipped, 5);
        assert_eq!(records.stats().rows_read, 8);
    }

    #[test]
    fn test_parse_factor_rejects_garbage() {
        assert_eq!(parse_factor("0.85"), Some(dec!(0.85)));
        assert_eq!(parse_factor("0"), Some(Decimal::ZERO));
        assert_eq!(parse_factor("-0.5"), None);
        assert_eq!(parse_factor("1,234.5"), None);
        assert_eq!(parse_factor(".."), None);
    }
}
