use chrono::NaiveDate;
use funding_loader::error::PipelineError;
use funding_loader::source::{read_source, Amount};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_source(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn reads_and_canonicalizes_an_export() {
    let file = write_source(
        b"S No,Date,Startup Name,Industry,City,Investors,Round Type,Amount in USD:\n\
          1,2015-01-01,Ola,Transportation,Bengaluru,\"SoftBank, Tiger Global\",Series C,\"50,000,000\"\n\
          2,09/01/2016,Swiggy,Food,Bengaluru,,Series D,undisclosed\n",
    );

    let table = read_source(file.path()).unwrap();

    assert_eq!(
        table.columns,
        vec![
            "temp_id",
            "date",
            "startup_name",
            "industry",
            "city",
            "investors",
            "round_type",
            "amount_usd"
        ]
    );
    assert_eq!(table.len(), 2);

    let ola = &table.records[0];
    assert_eq!(ola.temp_id.as_deref(), Some("1"));
    assert_eq!(ola.startup_name.as_deref(), Some("Ola"));
    assert_eq!(ola.investors.as_deref(), Some("SoftBank, Tiger Global"));
    assert_eq!(ola.date, NaiveDate::from_ymd_opt(2015, 1, 1));
    assert_eq!(ola.amount_usd, Some(Amount::Usd(50_000_000)));
    assert_eq!(ola.line, 2);

    let swiggy = &table.records[1];
    assert_eq!(swiggy.date, NaiveDate::from_ymd_opt(2016, 1, 9));
    assert_eq!(swiggy.investors, None);
    assert_eq!(swiggy.amount_usd, Some(Amount::Unparsed("undisclosed".to_string())));
    assert_eq!(table.invalid_amounts, 1);
    assert_eq!(table.invalid_dates, 0);
}

#[test]
fn decodes_non_utf8_bytes_as_latin1() {
    let file = write_source(
        b"Startup Name,City,Industry,Investors,Date,Round Type,Amount in USD\n\
          Caf\xe9 Coffee Day,Bengaluru,Food,Ren\xe9 Capital,2015-01-01,Seed,100\n",
    );

    let table = read_source(file.path()).unwrap();

    let record = &table.records[0];
    assert_eq!(record.startup_name.as_deref(), Some("Caf\u{e9} Coffee Day"));
    assert_eq!(record.investors.as_deref(), Some("Ren\u{e9} Capital"));
}

#[test]
fn na_markers_and_short_rows_are_absent() {
    let file = write_source(
        b"Startup Name,City,Industry,Investors,Date,Round Type,Amount in USD\n\
          NaN,N/A,nan,NULL,not-a-date,,\n\
          Ola,Bengaluru\n",
    );

    let table = read_source(file.path()).unwrap();

    let blank = &table.records[0];
    assert_eq!(blank.startup_name, None);
    assert_eq!(blank.city, None);
    assert_eq!(blank.industry, None);
    assert_eq!(blank.investors, None);
    assert_eq!(blank.date, None);
    assert_eq!(table.invalid_dates, 1);

    let short = &table.records[1];
    assert_eq!(short.startup_name.as_deref(), Some("Ola"));
    assert_eq!(short.industry, None);
    assert_eq!(short.amount_usd, None);
}

#[test]
fn utf8_bom_is_ignored_in_headers() {
    let file = write_source(
        b"\xef\xbb\xbfStartup Name,City,Industry,Investors,Date,Round Type,Amount in USD\n\
          Ola,Bengaluru,Transportation,SoftBank,2015-01-01,Seed,1\n",
    );

    let table = read_source(file.path()).unwrap();
    assert_eq!(table.columns[0], "startup_name");
    assert_eq!(table.records[0].startup_name.as_deref(), Some("Ola"));
}

#[test]
fn missing_file_is_not_an_empty_table() {
    let err = read_source(Path::new("does/not/exist.csv")).unwrap_err();
    assert!(matches!(err, PipelineError::SourceNotFound(_)));
}

#[test]
fn missing_required_column_is_a_parse_error() {
    let file = write_source(b"Startup Name,City\nOla,Bengaluru\n");

    let err = read_source(file.path()).unwrap_err();

    match err {
        PipelineError::SourceParse { message, .. } => {
            assert!(message.contains("industry"));
            assert!(message.contains("amount_usd"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
