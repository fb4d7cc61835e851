use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, UInt8Array,
    UInt32Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{Data, Reader, open_workbook_auto};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{ImportanceDataset, MaskColor, MetadataValue, ObjectRecord};

/// Columns consumed by the model; everything else is carried as metadata.
pub const IMAGE_COLUMN: &str = "img_name";
pub const OBJECT_COLUMN: &str = "obj_name";
pub const CLASS_COLUMN: &str = "class";
pub const COLOR_COLUMNS: [&str; 3] = ["R", "G", "B"];

/// One raw table row before validation: column_name → value.
type RawRow = BTreeMap<String, MetadataValue>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an object table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one object per line (spreadsheet export)
/// * `.json`    – `[{ "img_name": "img1", "obj_name": "sky", "R": 12, ... }, ...]`
/// * `.parquet` – flat columns with the same names
/// * `.xlsx`    – first sheet, header in the first row
pub fn load_table(path: &Path) -> Result<ImportanceDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (columns, rows) = match ext.as_str() {
        "csv" => read_csv(path)?,
        "json" => read_json(path)?,
        "parquet" | "pq" => read_parquet(path)?,
        "xlsx" | "xls" => read_xlsx(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let dataset = build_dataset(&columns, rows)
        .with_context(|| format!("reading object table {}", path.display()))?;
    log::info!(
        "Loaded {} objects across {} images from {}",
        dataset.len(),
        dataset.image_names.len(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Row validation
// ---------------------------------------------------------------------------

fn build_dataset(columns: &[String], rows: Vec<RawRow>) -> Result<ImportanceDataset> {
    let required = [IMAGE_COLUMN, OBJECT_COLUMN, CLASS_COLUMN]
        .into_iter()
        .chain(COLOR_COLUMNS);
    for col in required {
        if !columns.iter().any(|c| c == col) {
            bail!("table missing '{col}' column");
        }
    }

    let metadata_columns: Vec<String> = columns
        .iter()
        .filter(|c| !is_model_column(c))
        .cloned()
        .collect();

    let objects = rows
        .into_iter()
        .enumerate()
        .map(|(row_no, row)| parse_object(row_no, row))
        .collect::<Result<Vec<_>>>()?;

    Ok(ImportanceDataset::from_objects(objects, metadata_columns))
}

fn is_model_column(col: &str) -> bool {
    col == IMAGE_COLUMN
        || col == OBJECT_COLUMN
        || col == CLASS_COLUMN
        || COLOR_COLUMNS.contains(&col)
}

fn parse_object(row_no: usize, mut row: RawRow) -> Result<ObjectRecord> {
    let image = take_text(&mut row, IMAGE_COLUMN, row_no)?;
    let name = take_text(&mut row, OBJECT_COLUMN, row_no)?;

    let mut rgb = [0u8; 3];
    for (slot, col) in rgb.iter_mut().zip(COLOR_COLUMNS) {
        let v = take_integer(&mut row, col, row_no)?;
        *slot = u8::try_from(v)
            .with_context(|| format!("Row {row_no}, '{col}': {v} is outside 0..=255"))?;
    }
    let class = take_integer(&mut row, CLASS_COLUMN, row_no)?;

    Ok(ObjectRecord {
        image,
        name,
        color: MaskColor::new(rgb[0], rgb[1], rgb[2]),
        class,
        features: None,
        metadata: row,
    })
}

fn take_text(row: &mut RawRow, col: &str, row_no: usize) -> Result<String> {
    row.remove(col)
        .and_then(|v| v.as_text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .with_context(|| format!("Row {row_no}: missing value in '{col}'"))
}

fn take_integer(row: &mut RawRow, col: &str, row_no: usize) -> Result<i64> {
    let value = row
        .remove(col)
        .with_context(|| format!("Row {row_no}: missing value in '{col}'"))?;
    value
        .as_i64()
        .with_context(|| format!("Row {row_no}, '{col}': '{value}' is not an integer"))
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), guess_value_type(value.trim())))
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}

fn guess_value_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
fn read_json(path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut row = RawRow::new();
        for (key, val) in obj {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
            row.insert(key.clone(), json_to_value(val));
        }
        rows.push(row);
    }

    Ok((columns, rows))
}

fn json_to_value(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn read_parquet(path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let first_row = rows.len();
        append_batch_rows(&batch, first_row, &mut rows)?;
    }

    Ok((columns, rows))
}

/// Convert one record batch; `first_row` is the table index of its first row.
fn append_batch_rows(batch: &RecordBatch, first_row: usize, rows: &mut Vec<RawRow>) -> Result<()> {
    let schema = batch.schema();
    for row in 0..batch.num_rows() {
        let raw: RawRow = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(col_idx, field)| {
                let value = extract_value(batch.column(col_idx), row).with_context(|| {
                    format!("Row {}, column '{}'", first_row + row, field.name())
                })?;
                Ok((field.name().clone(), value))
            })
            .collect::<Result<_>>()?;
        rows.push(raw);
    }
    Ok(())
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<MetadataValue> {
    if col.is_null(row) {
        return Ok(MetadataValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::UInt8 => MetadataValue::Integer(downcast::<UInt8Array>(col)?.value(row) as i64),
        DataType::UInt32 => {
            MetadataValue::Integer(downcast::<UInt32Array>(col)?.value(row) as i64)
        }
        DataType::Int32 => MetadataValue::Integer(downcast::<Int32Array>(col)?.value(row) as i64),
        DataType::Int64 => MetadataValue::Integer(downcast::<Int64Array>(col)?.value(row)),
        DataType::Float32 => MetadataValue::Float(downcast::<Float32Array>(col)?.value(row) as f64),
        DataType::Float64 => MetadataValue::Float(downcast::<Float64Array>(col)?.value(row)),
        DataType::Boolean => MetadataValue::Bool(downcast::<BooleanArray>(col)?.value(row)),
        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(..)
        | DataType::Struct(_)
        | DataType::Map(..) => bail!("nested column type {} is not supported", col.data_type()),
        // dates, timestamps, decimals: keep their textual form
        _ => {
            let formatter = ArrayFormatter::try_new(&**col, &FormatOptions::default())?;
            MetadataValue::String(formatter.value(row).to_string())
        }
    };
    Ok(value)
}

fn downcast<T: 'static>(col: &Arc<dyn Array>) -> Result<&T> {
    col.as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("unexpected array layout for {:?}", col.data_type()))
}

// ---------------------------------------------------------------------------
// Spreadsheet reader
// ---------------------------------------------------------------------------

/// First worksheet of an Excel workbook. Blank header cells (the index
/// column pandas writes) are named `Unnamed: N` and kept as metadata.
fn read_xlsx(path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.to_string().trim() {
            "" => format!("Unnamed: {i}"),
            name => name.to_string(),
        })
        .collect();

    let rows: Vec<RawRow> = sheet_rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            columns
                .iter()
                .zip(cells)
                .map(|(col, cell)| (col.clone(), cell_to_value(cell)))
                .collect()
        })
        .collect();

    Ok((columns, rows))
}

fn cell_to_value(cell: &Data) -> MetadataValue {
    match cell {
        Data::Empty => MetadataValue::Null,
        Data::Int(i) => MetadataValue::Integer(*i),
        Data::Float(f) => MetadataValue::Float(*f),
        Data::Bool(b) => MetadataValue::Bool(*b),
        Data::String(s) => MetadataValue::String(s.trim().to_string()),
        other => MetadataValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use arrow::array::{ArrayRef, Date32Array, ListArray, StringArray};
    use arrow::datatypes::Int32Type;
    use parquet::arrow::ArrowWriter;
    use rust_xlsxwriter::Workbook;

    use super::*;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn csv_rows_keep_order_and_extra_columns() {
        let file = write_temp(
            ".csv",
            "num_objs,img_name,obj_name,R,G,B,class\n\
             2,img1,sky,10,20,30,0\n\
             2,img1,dog,200,0,0,1\n\
             1,img2,car,0,0,255,1\n",
        );
        let ds = load_table(file.path()).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.image_names, vec!["img1", "img2"]);
        assert_eq!(ds.metadata_columns, vec!["num_objs"]);
        assert_eq!(ds.objects[1].name, "dog");
        assert_eq!(ds.objects[1].color, MaskColor::new(200, 0, 0));
        assert_eq!(ds.objects[1].class, 1);
        assert_eq!(
            ds.objects[0].metadata.get("num_objs"),
            Some(&MetadataValue::Integer(2))
        );
    }

    #[test]
    fn json_records_accept_float_encoded_integers() {
        let file = write_temp(
            ".json",
            r#"[{"img_name": "img1", "obj_name": "a", "R": 1.0, "G": 2, "B": 3, "class": 1.0}]"#,
        );
        let ds = load_table(file.path()).unwrap();
        assert_eq!(ds.objects[0].color, MaskColor::new(1, 2, 3));
        assert_eq!(ds.objects[0].class, 1);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let file = write_temp(".csv", "img_name,obj_name,R,G,class\nimg1,a,1,2,0\n");
        let err = load_table(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("'B'"));
    }

    #[test]
    fn out_of_range_color_is_rejected() {
        let file = write_temp(".csv", "img_name,obj_name,R,G,B,class\nimg1,a,256,0,0,0\n");
        let err = load_table(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("outside 0..=255"));
    }

    #[test]
    fn unsupported_extension_fails() {
        let file = write_temp(".ods2", "");
        let err = load_table(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    fn object_batch() -> RecordBatch {
        RecordBatch::try_from_iter([
            ("num_objs", Arc::new(Int64Array::from(vec![2, 2])) as ArrayRef),
            ("img_name", Arc::new(StringArray::from(vec!["img1", "img1"])) as ArrayRef),
            ("obj_name", Arc::new(StringArray::from(vec!["sky", "dog"])) as ArrayRef),
            ("R", Arc::new(Int64Array::from(vec![1, 4])) as ArrayRef),
            ("G", Arc::new(Int64Array::from(vec![2, 5])) as ArrayRef),
            ("B", Arc::new(Float64Array::from(vec![3.0, 6.0])) as ArrayRef),
            ("class", Arc::new(Int64Array::from(vec![0, 1])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn parquet_columns_map_to_objects() {
        let file = tempfile::Builder::new()
            .suffix(".parquet")
            .tempfile()
            .unwrap();
        let batch = object_batch();
        let mut writer =
            ArrowWriter::try_new(file.reopen().unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_table(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.metadata_columns, vec!["num_objs"]);
        assert_eq!(ds.objects[0].name, "sky");
        assert_eq!(ds.objects[0].color, MaskColor::new(1, 2, 3));
        assert_eq!(ds.objects[1].color, MaskColor::new(4, 5, 6));
        assert_eq!(ds.labels(&[0, 1]), vec![0, 1]);
    }

    #[test]
    fn later_batches_report_table_row_numbers() {
        let mut rows = Vec::new();
        append_batch_rows(&object_batch(), 0, &mut rows).unwrap();
        assert_eq!(rows.len(), 2);

        let nested = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1)]),
            Some(vec![Some(2)]),
        ]);
        let batch = RecordBatch::try_from_iter([("tags", Arc::new(nested) as ArrayRef)]).unwrap();
        let err = append_batch_rows(&batch, rows.len(), &mut rows).unwrap_err();
        assert!(format!("{err:#}").contains("Row 2, column 'tags'"));
    }

    #[test]
    fn parquet_dates_are_kept_as_text() {
        let col: ArrayRef = Arc::new(Date32Array::from(vec![19_000]));
        assert_eq!(
            extract_value(&col, 0).unwrap(),
            MetadataValue::String("2022-01-08".to_string())
        );
    }

    #[test]
    fn workbook_with_index_column_loads() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = ["", "num_objs", "img_name", "obj_name", "R", "G", "B", "class"];
        for (col, name) in header.into_iter().enumerate() {
            sheet.write_string(0, col as u16, name).unwrap();
        }
        let records = [
            (0.0, 2.0, "img1", "sky", [10.0, 20.0, 30.0], 0.0),
            (1.0, 2.0, "img1", "dog", [200.0, 0.0, 0.0], 1.0),
        ];
        for (i, (index, num, image, object, rgb, class)) in records.into_iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_number(row, 0, index).unwrap();
            sheet.write_number(row, 1, num).unwrap();
            sheet.write_string(row, 2, image).unwrap();
            sheet.write_string(row, 3, object).unwrap();
            for (c, v) in rgb.into_iter().enumerate() {
                sheet.write_number(row, 4 + c as u16, v).unwrap();
            }
            sheet.write_number(row, 7, class).unwrap();
        }
        workbook.save(file.path()).unwrap();

        let ds = load_table(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.metadata_columns, vec!["Unnamed: 0", "num_objs"]);
        assert_eq!(ds.objects[1].name, "dog");
        assert_eq!(ds.objects[1].color, MaskColor::new(200, 0, 0));
        assert_eq!(ds.objects[1].class, 1);
        assert_eq!(
            ds.objects[1].metadata.get("Unnamed: 0").and_then(MetadataValue::as_i64),
            Some(1)
        );
    }
}
