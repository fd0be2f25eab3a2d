use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, Int8Array, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;

use trip_loader::exceptions::TripLoaderResult;
use trip_loader::pipeline::Transformer;
use trip_loader::transformers::dictionary::CodeLabelMapper;

async fn create_dataframe() -> DataFrame {
    let payments: ArrayRef = Arc::new(Int8Array::from(vec![Some(1), Some(2), Some(9), None]));
    let vendors: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 7, 6]));
    let flags: ArrayRef = Arc::new(StringArray::from(vec!["N", "N", "Y", "N"]));
    let schema = Arc::new(Schema::new(vec![
        Field::new("payment_type", DataType::Int8, true),
        Field::new("VendorID", DataType::Int64, true),
        Field::new("store_and_fwd_flag", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(schema.clone(), vec![payments, vendors, flags]).unwrap();

    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("trips", Arc::new(mem_table)).unwrap();
    ctx.table("trips").await.unwrap()
}

fn labels(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    let column = batch.column(batch.schema().index_of(name).unwrap());
    let strings = column
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("labels should be Utf8");
    strings.iter().map(|v| v.map(str::to_string)).collect()
}

#[tokio::test]
async fn test_codes_become_labels() -> TripLoaderResult<()> {
    let df = create_dataframe().await;
    let mut mapper = CodeLabelMapper::nyc_taxi();
    mapper.fit(&df).await?;
    assert!(!mapper.is_stateful());

    let mapped = mapper.transform(df)?;
    let schema = Arc::new(mapped.schema().as_arrow().clone());
    let batch = concat_batches(&schema, &mapped.collect().await?)?;

    assert_eq!(
        labels(&batch, "payment_type"),
        [
            Some("1 - Credit Card".to_string()),
            Some("2 - Cash".to_string()),
            Some("9".to_string()),
            None,
        ]
    );
    assert_eq!(
        labels(&batch, "VendorID"),
        [
            Some("1 - Creative Mobile Technologies".to_string()),
            Some("2 - Curb Mobility".to_string()),
            Some("7 - Helix".to_string()),
            Some("6 - Myle Technologies".to_string()),
        ]
    );
    assert_eq!(labels(&batch, "store_and_fwd_flag")[2], Some("Y".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_mapping_twice_is_a_no_op() -> TripLoaderResult<()> {
    let mapper = CodeLabelMapper::nyc_taxi();
    let once = mapper.transform(create_dataframe().await)?;
    let twice = mapper.transform(once.clone())?;

    assert_eq!(
        once.schema().as_arrow().fields(),
        twice.schema().as_arrow().fields()
    );
    let schema = Arc::new(twice.schema().as_arrow().clone());
    let batch = concat_batches(&schema, &twice.collect().await?)?;
    assert_eq!(labels(&batch, "payment_type")[0], Some("1 - Credit Card".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_custom_mapping_ignores_missing_columns() -> TripLoaderResult<()> {
    let mapper = CodeLabelMapper::new(vec![(
        "trip_type".to_string(),
        vec![(1, "1 - Street-hail".to_string())],
    )]);
    let df = create_dataframe().await;
    let before = df.schema().as_arrow().clone();

    let mapped = mapper.transform(df)?;
    assert_eq!(mapped.schema().as_arrow(), &before);
    Ok(())
}
