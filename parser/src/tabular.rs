use crate::{ParseError, RawRecord, Row};
use tracing::debug;

/// Split delimited text into rows of fields.
///
/// Quote-aware: a quoted field may hold commas, newlines and `""` escapes.
/// `\r` outside quotes is dropped so CRLF and LF input read the same. The
/// scan never fails; unbalanced quotes just run to the end of the input.
pub fn parse(text: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut row: Row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Zip every data row against the header row.
///
/// Header names are trimmed. Short rows are padded with `""`, extra
/// fields past the header are dropped. Header-only or empty input gives
/// no records.
pub fn rows_to_records(rows: &[Row]) -> Vec<RawRecord> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let header: Vec<&str> = header.iter().map(|h| h.trim()).collect();

    data.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let value = row.get(idx).map(String::as_str).unwrap_or("");
                    (*name, value)
                })
                .collect()
        })
        .collect()
}

pub fn parse_records(text: &str) -> Vec<RawRecord> {
    let rows = parse(text);
    debug!("Tokenized {} rows ({} bytes)", rows.len(), text.len());
    rows_to_records(&rows)
}

/// Serialize records as RFC4180 CSV.
///
/// The header is the union of all record keys in first-seen order; a record
/// without a given key writes an empty field. Every line ends with `\n`.
pub fn write_records(records: &[RawRecord]) -> Result<String, ParseError> {
    let mut header: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !header.contains(&key) {
                header.push(key);
            }
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if !header.is_empty() {
        writer.write_record(&header)?;
    }
    for record in records {
        writer.write_record(header.iter().map(|h| record.get(h).unwrap_or("")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ParseError::Custom(format!("CSV buffer flush failed: {}", e)))?;
    Ok(String::from_utf8(bytes).map_err(|e| e.utf8_error())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn rfc4180_field(value: &str) -> String {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record([value]).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_basic_rows() {
        let rows = parse("a,b,c\n1,2,3\n");
        assert_eq!(rows, vec![row(&["a", "b", "c"]), row(&["1", "2", "3"])]);
    }

    #[test]
    fn test_parse_without_trailing_newline() {
        let rows = parse("a,b\n1,2");
        assert_eq!(rows, vec![row(&["a", "b"]), row(&["1", "2"])]);
    }

    #[test]
    fn test_parse_crlf_matches_lf() {
        assert_eq!(parse("a,b\r\n1,2\r\n"), parse("a,b\n1,2\n"));
    }

    #[test]
    fn test_parse_quoted_comma_newline_and_escape() {
        let rows = parse("name,notes\n\"Doe, Jane\",\"line one\nsays \"\"hi\"\"\"\n");
        assert_eq!(
            rows,
            vec![
                row(&["name", "notes"]),
                row(&["Doe, Jane", "line one\nsays \"hi\""]),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_crlf_inside_quotes() {
        let rows = parse("\"a\r\nb\"\n");
        assert_eq!(rows, vec![row(&["a\r\nb"])]);
    }

    #[test]
    fn test_parse_keeps_whitespace_and_case() {
        let rows = parse(" Ab , \" Cd \"\n");
        assert_eq!(rows, vec![row(&[" Ab ", "  Cd "])]);
    }

    #[test]
    fn test_parse_trailing_comma_yields_empty_field() {
        let rows = parse("a,\n");
        assert_eq!(rows, vec![row(&["a", ""])]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse_records("").is_empty());
    }

    #[test]
    fn test_header_only_has_no_records() {
        assert!(parse_records("Last Name,First Name\n").is_empty());
    }

    #[test]
    fn test_rows_to_records_arity_mismatch() {
        let records = parse_records("a,b,c\n1\n1,2,3,4\n");
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].get("a"), Some("1"));
        assert_eq!(records[0].get("b"), Some(""));
        assert_eq!(records[0].get("c"), Some(""));

        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1].get("c"), Some("3"));
    }

    #[test]
    fn test_rows_to_records_trims_headers_and_keeps_last_duplicate() {
        let records = parse_records(" Email ,Phone,Email\nold@x.com,555,new@x.com\n");
        assert_eq!(records[0].get("Email"), Some("new@x.com"));
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["Email", "Phone"]);
    }

    #[test]
    fn test_write_records_parses_back() {
        let records: Vec<RawRecord> = vec![
            vec![("name", "Doe, Jane"), ("notes", "said \"hi\"\nthen left")]
                .into_iter()
                .collect(),
            vec![("name", "Smith"), ("extra", "x")].into_iter().collect(),
        ];
        let text = write_records(&records).unwrap();
        let back = parse_records(&text);

        assert_eq!(back.len(), 2);
        assert_eq!(back[0].get("notes"), Some("said \"hi\"\nthen left"));
        assert_eq!(back[0].get("extra"), Some(""));
        assert_eq!(back[1].get("name"), Some("Smith"));
        assert_eq!(back[1].get("notes"), Some(""));
    }

    #[test]
    fn test_write_records_empty() {
        assert_eq!(write_records(&[]).unwrap(), "");
    }

    proptest! {
        #[test]
        fn prop_quoted_field_round_trips(value in "[a-z ,\"\n\r]{0,40}") {
            let encoded = rfc4180_field(&value);
            let rows = parse(&encoded);
            prop_assert_eq!(rows, vec![vec![value]]);
        }
    }
}
