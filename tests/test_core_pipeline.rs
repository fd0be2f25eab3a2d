use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{DataFrame, SessionContext};
use trip_loader::exceptions::{TripLoaderError, TripLoaderResult};
use trip_loader::make_pipeline;
use trip_loader::pipeline::{Pipeline, Transformer};
use trip_loader::transformers::coercion::{ColumnKind, IntegerDowncast, TypeCoercion};
use trip_loader::transformers::deduplication::DropDuplicates;

/// Creates a DataFrame with raw text columns:
/// - "passenger_count": whole numbers stored as text, with one repeated row.
/// - "fare_amount": numbers stored as text, one of them malformed.
async fn create_dataframe() -> TripLoaderResult<DataFrame> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("passenger_count", DataType::Utf8, true),
        Field::new("fare_amount", DataType::Utf8, true),
    ]));
    let passengers: ArrayRef = Arc::new(StringArray::from(vec!["1", "2", "2", "6"]));
    let fares: ArrayRef = Arc::new(StringArray::from(vec!["12.5", "8", "8", "n/a"]));
    let batch = RecordBatch::try_new(schema.clone(), vec![passengers, fares])?;

    // Create a MemTable with a single batch.
    let mem_table = MemTable::try_new(schema, vec![vec![batch]])?;
    let ctx = SessionContext::new();
    ctx.register_table("trips", Arc::new(mem_table))?;
    Ok(ctx.table("trips").await?)
}

#[tokio::test]
async fn test_pipeline_with_coercion_steps() -> TripLoaderResult<()> {
    let df = create_dataframe().await?;

    let coercion = TypeCoercion::new(vec![
        ("passenger_count".to_string(), ColumnKind::Integer),
        ("fare_amount".to_string(), ColumnKind::Float),
    ]);
    let downcast = IntegerDowncast::new(vec!["passenger_count".to_string()]);

    // Build the pipeline with the two transformers.
    let mut pipeline = Pipeline::new(
        vec![
            (
                "coerce".to_string(),
                Box::new(coercion) as Box<dyn Transformer + Send + Sync>,
            ),
            (
                "downcast".to_string(),
                Box::new(downcast) as Box<dyn Transformer + Send + Sync>,
            ),
        ],
        false, // verbose off for testing
    );

    let transformed = pipeline.fit_transform(&df).await?;
    let schema = transformed.schema().clone();
    assert_eq!(
        schema.field_with_name(None, "passenger_count")?.data_type(),
        &DataType::Int8
    );
    assert_eq!(
        schema.field_with_name(None, "fare_amount")?.data_type(),
        &DataType::Float64
    );

    let results = transformed.collect().await?;
    let fares: Vec<Option<f64>> = results
        .iter()
        .flat_map(|batch| {
            batch
                .column(1)
                .as_any()
                .downcast_ref::<Float64Array>()
                .expect("Failed to downcast column 'fare_amount'")
                .iter()
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(fares, [Some(12.5), Some(8.0), Some(8.0), None]);
    Ok(())
}

#[tokio::test]
async fn test_make_pipeline_macro() -> TripLoaderResult<()> {
    let df = create_dataframe().await?;

    let mut pipeline = make_pipeline!(
        true,
        (
            "coerce",
            TypeCoercion::new(vec![("passenger_count".to_string(), ColumnKind::Integer)])
        ),
        ("dedupe", DropDuplicates::new()),
    );
    assert_eq!(pipeline.step_names(), ["coerce", "dedupe"]);

    let transformed = pipeline.fit_transform(&df).await?;
    assert_eq!(transformed.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_transform_before_fit_fails() -> TripLoaderResult<()> {
    let df = create_dataframe().await?;

    let pipeline = make_pipeline!(
        false,
        (
            "coerce",
            TypeCoercion::new(vec![("passenger_count".to_string(), ColumnKind::Integer)])
        ),
        (
            "downcast",
            IntegerDowncast::new(vec!["passenger_count".to_string()])
        ),
    );

    let err = pipeline.transform(df).unwrap_err();
    assert!(matches!(err, TripLoaderError::FitNotCalled));
    Ok(())
}

#[tokio::test]
async fn test_empty_pipeline_is_rejected() -> TripLoaderResult<()> {
    let df = create_dataframe().await?;
    let mut pipeline = Pipeline::new(vec![], false);

    let err = pipeline.fit(&df).await.unwrap_err();
    assert!(matches!(err, TripLoaderError::InvalidParameter(_)));
    Ok(())
}

#[tokio::test]
async fn test_failing_step_names_itself() -> TripLoaderResult<()> {
    let df = create_dataframe().await?;
    let mut pipeline = make_pipeline!(
        false,
        (
            "coerce_tips",
            TypeCoercion::new(vec![("tip_amount".to_string(), ColumnKind::Float)])
        ),
    );

    let err = pipeline.fit(&df).await.unwrap_err();
    assert!(err.to_string().contains("coerce_tips"));
    Ok(())
}
