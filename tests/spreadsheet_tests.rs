use std::io::Write;
use std::path::{Path, PathBuf};

use arrow::array::{Array, Float64Array, Int64Array, StringArray, TimestampNanosecondArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, TimeUnit};
use chrono::NaiveDate;
use datafusion::prelude::SessionContext;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use trip_loader::exceptions::TripLoaderResult;
use trip_loader::fetcher::formats::{read_spreadsheet, read_table};
use trip_loader::normalizer::Normalizer;
use trip_loader::summary::DataPeriod;
use trip_loader::transformers::coercion::ColumnKind;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
  <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Trips" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

/// Style 1 is the built-in `m/d/yyyy h:mm` date-time format.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
  </cellXfs>
</styleSheet>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="5" uniqueCount="5">
  <si><t>VendorID</t></si>
  <si><t>tpep_pickup_datetime</t></si>
  <si><t>fare_amount</t></si>
  <si><t>store_and_fwd_flag</t></si>
  <si><t>N</t></si>
</sst>"#;

/// Two trips; the pickups are date-time cells (serials 45306.5 and 45307.75) and the second
/// trip has no flag.
const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1:D3"/>
  <sheetData>
    <row r="1">
      <c r="A1" t="s"><v>0</v></c>
      <c r="B1" t="s"><v>1</v></c>
      <c r="C1" t="s"><v>2</v></c>
      <c r="D1" t="s"><v>3</v></c>
    </row>
    <row r="2">
      <c r="A2"><v>1</v></c>
      <c r="B2" s="1"><v>45306.5</v></c>
      <c r="C2"><v>12.5</v></c>
      <c r="D2" t="s"><v>4</v></c>
    </row>
    <row r="3">
      <c r="A3"><v>2</v></c>
      <c r="B3" s="1"><v>45307.75</v></c>
      <c r="C3"><v>30</v></c>
    </row>
  </sheetData>
</worksheet>"#;

/// Writes the workbook above to `dir/name`.
fn write_workbook(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (part, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES),
        ("xl/sharedStrings.xml", SHARED_STRINGS),
        ("xl/worksheets/sheet1.xml", SHEET),
    ] {
        zip.start_file(part, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

#[test]
fn test_read_spreadsheet_types_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path(), "trips.xlsx");

    let batch = read_spreadsheet(&path).unwrap();
    let schema = batch.schema();
    let columns: Vec<(&str, &DataType)> = schema
        .fields()
        .iter()
        .map(|f| (f.name().as_str(), f.data_type()))
        .collect();
    assert_eq!(
        columns,
        [
            ("VendorID", &DataType::Int64),
            ("tpep_pickup_datetime", &DataType::Utf8),
            ("fare_amount", &DataType::Float64),
            ("store_and_fwd_flag", &DataType::Utf8),
        ]
    );
    assert_eq!(batch.num_rows(), 2);

    let vendors = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(vendors.values(), &[1, 2]);

    let pickups = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(pickups.value(0), "2024-01-15 12:00:00");
    assert_eq!(pickups.value(1), "2024-01-16 18:00:00");

    let fares = batch.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(fares.values(), &[12.5, 30.0]);

    let flags = batch.column(3).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(flags.value(0), "N");
    assert!(flags.is_null(1));
}

#[tokio::test]
async fn test_workbook_normalizes_like_csv() -> TripLoaderResult<()> {
    let dir = TempDir::new()?;
    let path = write_workbook(dir.path(), "january.xlsx");
    let ctx = SessionContext::new();

    let df = read_table(&ctx, &path).await?;
    let cleaned = Normalizer::default().normalize(df).await?;
    let pickup = cleaned.report.column("tpep_pickup_datetime").unwrap();
    assert_eq!(pickup.kind, ColumnKind::Datetime);
    assert_eq!(pickup.nulls_introduced(), 0);

    let frame = cleaned.frame.clone();
    let schema = std::sync::Arc::new(frame.schema().as_arrow().clone());
    assert_eq!(
        schema.field_with_name("tpep_pickup_datetime")?.data_type(),
        &DataType::Timestamp(TimeUnit::Nanosecond, None)
    );
    let batch = concat_batches(&schema, &frame.collect().await?)?;
    let pickups = batch
        .column(schema.index_of("tpep_pickup_datetime")?)
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    let mut values: Vec<_> = (0..pickups.len())
        .filter_map(|i| pickups.value_as_datetime(i))
        .collect();
    values.sort();
    let noon = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let evening = NaiveDate::from_ymd_opt(2024, 1, 16)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap();
    assert_eq!(values, [noon, evening]);

    let period = DataPeriod::detect(&cleaned.frame).await?.unwrap();
    assert_eq!(period.column, "tpep_pickup_datetime");
    assert_eq!(period.start, noon);
    assert_eq!(period.end, evening);
    Ok(())
}
