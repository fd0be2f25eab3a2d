//! ## Data Dictionary Mapping
//!
//! NYC taxi trip records store several categorical attributes as integer codes. [`CodeLabelMapper`]
//! replaces those codes with readable labels such as `"1 - Credit Card"`. A code that has no
//! label is kept in its text form, and a null stays null.
//!
//! Only numeric columns are mapped. A column that is missing or already text is left alone, which
//! makes the mapping safe to apply more than once.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use crate::impl_transformer;
use crate::transformers::is_numeric_type;
use datafusion::arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion::logical_expr::Case as DFCase;
use datafusion_expr::{ident, lit, try_cast, Expr};

pub const PAYMENT_TYPE_LABELS: [(i64, &str); 7] = [
    (0, "Flex Fare"),
    (1, "Credit Card"),
    (2, "Cash"),
    (3, "No Charge"),
    (4, "Dispute"),
    (5, "Unknown"),
    (6, "Voided Trip"),
];

pub const VENDOR_ID_LABELS: [(i64, &str); 4] = [
    (1, "Creative Mobile Technologies"),
    (2, "Curb Mobility"),
    (6, "Myle Technologies"),
    (7, "Helix"),
];

pub const RATECODE_ID_LABELS: [(i64, &str); 7] = [
    (1, "Standard Rate"),
    (2, "JFK"),
    (3, "Newark"),
    (4, "Nassau/Westchester"),
    (5, "Negotiated Fare"),
    (6, "Group Ride"),
    (99, "Null/Unknown"),
];

/// Label for `code`, formatted `"<code> - <label>"`.
fn format_label(code: i64, label: &str) -> String {
    format!("{} - {}", code, label)
}

/// Maps integer codes in named columns to labels. Stateless.
#[derive(Debug, Clone, Default)]
pub struct CodeLabelMapper {
    pub mappings: Vec<(String, Vec<(i64, String)>)>,
}

impl CodeLabelMapper {
    pub fn new(mappings: Vec<(String, Vec<(i64, String)>)>) -> Self {
        Self { mappings }
    }

    /// The NYC taxi data dictionary: `payment_type`, `VendorID`, and `RatecodeID`.
    pub fn nyc_taxi() -> Self {
        let table = |labels: &[(i64, &str)]| -> Vec<(i64, String)> {
            labels
                .iter()
                .map(|(code, label)| (*code, format_label(*code, label)))
                .collect()
        };
        Self::new(vec![
            ("payment_type".to_string(), table(&PAYMENT_TYPE_LABELS)),
            ("VendorID".to_string(), table(&VENDOR_ID_LABELS)),
            ("RatecodeID".to_string(), table(&RATECODE_ID_LABELS)),
        ])
    }

    /// Stateless transformer: fit does nothing.
    pub async fn fit(&mut self, _df: &DataFrame) -> TripLoaderResult<()> {
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                let mapping = self
                    .mappings
                    .iter()
                    .find(|(column, _)| column == name)
                    .map(|(_, labels)| labels);
                match mapping {
                    Some(labels) if is_numeric_type(field.data_type()) => {
                        label_expr(name, labels).alias(name)
                    }
                    _ => ident(name),
                }
            })
            .collect();
        df.select(exprs).map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// `CASE WHEN code = c1 THEN l1 ... ELSE CAST(col AS Utf8) END`
fn label_expr(name: &str, labels: &[(i64, String)]) -> Expr {
    let code = try_cast(ident(name), DataType::Int64);
    let when_then_expr = labels
        .iter()
        .map(|(value, label)| {
            (
                Box::new(code.clone().eq(lit(*value))),
                Box::new(lit(label.clone())),
            )
        })
        .collect();
    Expr::Case(DFCase {
        expr: None,
        when_then_expr,
        else_expr: Some(Box::new(try_cast(ident(name), DataType::Utf8))),
    })
}

impl_transformer!(CodeLabelMapper);
