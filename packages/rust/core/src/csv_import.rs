//! Referent import from delimited text.
//!
//! Detect the delimiter from the header line, read the records with the
//! `csv` reader (quoted fields may contain the delimiter), map the
//! name/email/role columns (header keywords first, then sniffing the first
//! data row), then build referents while skipping rows that are incomplete
//! or whose email is already known.

use std::collections::HashSet;
use std::fmt;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, info, instrument};

use dealdesk_shared::{DealDeskError, ImportConfig, Referent, ReferentId, Result};

/// Rejection shown when the file has no data rows.
pub const EMPTY_FILE_MESSAGE: &str = "The file looks empty or contains only the header row.";
/// Rejection shown when name or email cannot be located.
pub const UNMAPPED_COLUMNS_MESSAGE: &str =
    "Unable to map the CSV columns. Make sure at least a name and an e-mail column are present.";

const NAME_KEYWORDS: &[&str] = &["AMMINIS", "ADMINIS", "NOME", "NAME", "SOGGETTO", "SUBJECT"];
const EMAIL_KEYWORDS: &[&str] = &["PEC", "MAIL"];
const ROLE_KEYWORDS: &[&str] = &["RUOLO", "ROLE", "QUALIFICA", "QUALIFICATION"];

// ---------------------------------------------------------------------------
// Delimiter
// ---------------------------------------------------------------------------

/// Supported field separators, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Semicolon,
    Comma,
    Tab,
}

impl Delimiter {
    pub const CANDIDATES: [Delimiter; 3] = [Self::Semicolon, Self::Comma, Self::Tab];

    pub fn as_char(&self) -> char {
        match self {
            Self::Semicolon => ';',
            Self::Comma => ',',
            Self::Tab => '\t',
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Semicolon => b';',
            Self::Comma => b',',
            Self::Tab => b'\t',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Semicolon => "semicolon",
            Self::Comma => "comma",
            Self::Tab => "tab",
        })
    }
}

/// Pick the candidate that splits `header` into the most fields.
/// Ties go to the earlier candidate.
pub fn detect_delimiter(header: &str) -> Delimiter {
    let mut best = Delimiter::Semicolon;
    let mut best_count = 0;
    for candidate in Delimiter::CANDIDATES {
        let count = header.split(candidate.as_char()).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Column inference
// ---------------------------------------------------------------------------

/// Zero-based column positions used to build referents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub email: usize,
    pub role: Option<usize>,
}

/// Locate the name, email and role columns.
///
/// Header keywords win; when name or email is still missing, the first data
/// row is sniffed: the first cell with `@` becomes the email column, and the
/// first other cell longer than three characters that is not a number becomes
/// the name column.
pub fn infer_columns(headers: &[&str], sample_row: Option<&[&str]>) -> Result<ColumnMap> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_uppercase().replace(['"', '\''], ""))
        .collect();

    let find = |keywords: &[&str]| {
        normalized
            .iter()
            .position(|h| keywords.iter().any(|k| h.contains(k)))
    };

    let mut name = find(NAME_KEYWORDS);
    let mut email = find(EMAIL_KEYWORDS);
    let role = find(ROLE_KEYWORDS);

    if let Some(row) = sample_row.filter(|_| name.is_none() || email.is_none()) {
        let cells: Vec<String> = row.iter().map(|c| clean_cell(c)).collect();

        if email.is_none() {
            email = cells.iter().position(|c| c.contains('@'));
        }
        if name.is_none() {
            name = cells.iter().enumerate().position(|(idx, c)| {
                Some(idx) != email
                    && c.chars().count() > 3
                    && !c.contains('@')
                    && !looks_numeric(c)
            });
        }
    }

    match (name, email) {
        (Some(name), Some(email)) => Ok(ColumnMap { name, email, role }),
        _ => Err(DealDeskError::import(UNMAPPED_COLUMNS_MESSAGE)),
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// What an import produced.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// New referents, in file order.
    pub added: Vec<Referent>,
    /// Data rows that produced no referent.
    pub skipped: usize,
    pub delimiter: Delimiter,
    pub columns: ColumnMap,
}

impl ImportOutcome {
    /// User-facing summary of the import.
    pub fn summary(&self) -> String {
        if self.added.is_empty() {
            "No new contacts found in the file (they may already be in the directory).".into()
        } else {
            format!(
                "Import succeeded: {} new contacts added ({} rows skipped).",
                self.added.len(),
                self.skipped
            )
        }
    }
}

/// Parse `text` and return the referents it adds to `existing`.
///
/// Nothing is mutated here; the caller appends [`ImportOutcome::added`].
#[instrument(skip_all, fields(bytes = text.len(), existing = existing.len()))]
pub fn import_referents(
    text: &str,
    existing: &[Referent],
    config: &ImportConfig,
) -> Result<ImportOutcome> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(header) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Err(DealDeskError::import(EMPTY_FILE_MESSAGE));
    };
    let delimiter = detect_delimiter(header);

    let (rows, malformed) = read_rows(text, delimiter);
    if rows.len() < 2 {
        return Err(DealDeskError::import(EMPTY_FILE_MESSAGE));
    }

    let headers: Vec<&str> = rows[0].iter().map(String::as_str).collect();
    let sample: Vec<&str> = rows[1].iter().map(String::as_str).collect();
    let columns = infer_columns(&headers, Some(sample.as_slice()))?;
    debug!(%delimiter, ?columns, "columns mapped");

    let mut seen: HashSet<String> = existing.iter().map(|r| r.email.to_lowercase()).collect();
    let mut added = Vec::new();
    let mut skipped = malformed;

    for cells in &rows[1..] {
        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");

        let name = cell(columns.name);
        let email = cell(columns.email);

        if name.is_empty() || email.is_empty() || !email.contains('@') {
            skipped += 1;
            continue;
        }
        if !seen.insert(email.to_lowercase()) {
            skipped += 1;
            continue;
        }

        let role = columns
            .role
            .map(cell)
            .filter(|r| !r.is_empty())
            .unwrap_or(config.default_role.as_str());

        added.push(Referent {
            id: ReferentId::generate(),
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            department: config.default_department.clone(),
        });
    }

    info!(added = added.len(), skipped, %delimiter, "referent import parsed");

    Ok(ImportOutcome {
        added,
        skipped,
        delimiter,
        columns,
    })
}

/// Read every non-blank record as cleaned cells. Returns the rows and the
/// number of records the reader rejected.
fn read_rows(text: &str, delimiter: Delimiter) -> (Vec<Vec<String>>, usize) {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter.as_byte())
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut malformed = 0;
    for (idx, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let cells: Vec<String> = record.iter().map(clean_cell).collect();
                if cells.iter().any(|c| !c.is_empty()) {
                    rows.push(cells);
                }
            }
            Err(e) => {
                debug!(record = idx + 1, error = %e, "unreadable record skipped");
                malformed += 1;
            }
        }
    }
    (rows, malformed)
}

/// Trim and strip one leftover layer of surrounding quotes (single quotes, or
/// double quotes the reader kept because they did not open the field).
fn clean_cell(cell: &str) -> String {
    let trimmed = cell.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Whether a cell converts to a number the way a spreadsheet export's
/// loose numeric coercion does: blank cells count as zero, `Infinity` is
/// accepted, and `0x`/`0o`/`0b` literals are read in their radix.
fn looks_numeric(cell: &str) -> bool {
    let cell = cell.trim();
    if cell.is_empty() {
        return true;
    }

    let unsigned = cell.strip_prefix(['+', '-']).unwrap_or(cell);
    if unsigned == "Infinity" {
        return true;
    }

    let prefixed = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)];
    for (prefix, radix) in prefixed {
        if let Some(digits) = cell.strip_prefix(prefix) {
            return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
        }
    }

    cell.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && cell.parse::<f64>().is_ok()
}
