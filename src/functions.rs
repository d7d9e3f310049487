use datafusion::{
    arrow::{
        array::{Float64Array, Float64Builder, UInt64Builder},
        datatypes::DataType,
    },
    error::DataFusionError,
    logical_expr::{ColumnarValue, ScalarUDF, Volatility},
    prelude::*,
    scalar::ScalarValue,
};
use std::sync::Arc;

use crate::codec::{TDigestArray, make_tdigest_arrow_type};

fn tdigest_quantile(values: &[ColumnarValue]) -> Result<ColumnarValue, DataFusionError> {
    if values.len() != 2 {
        return Err(DataFusionError::Execution(
            "wrong number of arguments to tdigest_quantile".into(),
        ));
    }

    let digests: TDigestArray = (&values[0]).try_into()?;
    let mut result_builder = Float64Builder::with_capacity(digests.len());
    for index in 0..digests.len() {
        let ratio = match &values[1] {
            ColumnarValue::Array(array) => array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| DataFusionError::Execution("downcasting to Float64Array".into()))?
                .value(index),
            ColumnarValue::Scalar(scalar_value) => {
                if let ScalarValue::Float64(Some(ratio)) = scalar_value {
                    *ratio
                } else {
                    return Err(DataFusionError::Execution(format!(
                        "bad ratio {scalar_value:?} in tdigest_quantile"
                    )));
                }
            }
        };

        if digests.is_null(index) {
            result_builder.append_null();
            continue;
        }
        let digest = digests.digest(index)?;
        result_builder.append_value(digest.quantile(ratio));
    }

    Ok(ColumnarValue::Array(Arc::new(result_builder.finish())))
}

pub fn make_tdigest_quantile_udf() -> ScalarUDF {
    create_udf(
        "tdigest_quantile",
        vec![make_tdigest_arrow_type(), DataType::Float64],
        DataType::Float64,
        Volatility::Immutable,
        Arc::new(&tdigest_quantile),
    )
}

fn tdigest_mass(values: &[ColumnarValue]) -> Result<ColumnarValue, DataFusionError> {
    if values.len() != 1 {
        return Err(DataFusionError::Execution(
            "wrong number of arguments to tdigest_mass".into(),
        ));
    }

    let digests: TDigestArray = (&values[0]).try_into()?;
    let mut result_builder = Float64Builder::with_capacity(digests.len());
    for index in 0..digests.len() {
        if digests.is_null(index) {
            result_builder.append_null();
            continue;
        }
        let masses = digests.get_masses(index)?;
        let total: f64 = (0..masses.len()).map(|i| masses.value(i)).sum();
        result_builder.append_value(total);
    }

    Ok(ColumnarValue::Array(Arc::new(result_builder.finish())))
}

pub fn make_tdigest_mass_udf() -> ScalarUDF {
    create_udf(
        "tdigest_mass",
        vec![make_tdigest_arrow_type()],
        DataType::Float64,
        Volatility::Immutable,
        Arc::new(&tdigest_mass),
    )
}

fn tdigest_size(values: &[ColumnarValue]) -> Result<ColumnarValue, DataFusionError> {
    if values.len() != 1 {
        return Err(DataFusionError::Execution(
            "wrong number of arguments to tdigest_size".into(),
        ));
    }

    let digests: TDigestArray = (&values[0]).try_into()?;
    let mut result_builder = UInt64Builder::with_capacity(digests.len());
    for index in 0..digests.len() {
        if digests.is_null(index) {
            result_builder.append_null();
            continue;
        }
        result_builder.append_value(digests.get_centroids(index)?.len() as u64);
    }

    Ok(ColumnarValue::Array(Arc::new(result_builder.finish())))
}

pub fn make_tdigest_size_udf() -> ScalarUDF {
    create_udf(
        "tdigest_size",
        vec![make_tdigest_arrow_type()],
        DataType::UInt64,
        Volatility::Immutable,
        Arc::new(&tdigest_size),
    )
}
