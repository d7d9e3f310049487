use datafusion::{
    arrow::datatypes::DataType,
    error::DataFusionError,
    logical_expr::{Accumulator, AggregateUDF, Volatility, function::AccumulatorArgs},
    physical_plan::expressions::Literal,
    prelude::*,
    scalar::ScalarValue,
};
use log::debug;
use std::sync::Arc;

use crate::accumulator::TDigestAccumulator;
use crate::adapter::NumericAdapter;
use crate::codec::make_tdigest_arrow_type;
use crate::error::SketchError;
use crate::functions::{make_tdigest_mass_udf, make_tdigest_quantile_udf, make_tdigest_size_udf};
use crate::tdigest::TDigest;

fn literal_arg(args: &AccumulatorArgs, index: usize) -> Result<ScalarValue, DataFusionError> {
    Ok(args
        .exprs
        .get(index)
        .ok_or_else(|| DataFusionError::Execution(format!("Reading argument {index}")))?
        .as_any()
        .downcast_ref::<Literal>()
        .ok_or_else(|| {
            DataFusionError::Execution(format!("Downcasting argument {index} to Literal"))
        })?
        .value()
        .clone())
}

fn make_state(args: AccumulatorArgs) -> Result<Box<dyn Accumulator>, DataFusionError> {
    let compression_arg = literal_arg(&args, 0)?;
    let compression = if let ScalarValue::Float64(Some(compression)) = compression_arg {
        compression
    } else {
        return Err(SketchError::Configuration(format!(
            "arg 0 (compression) should be a float64 literal, found {compression_arg:?}"
        ))
        .into());
    };

    let max_discrete_arg = literal_arg(&args, 1)?;
    let max_discrete = if let ScalarValue::Int64(Some(max_discrete)) = max_discrete_arg {
        max_discrete
    } else {
        return Err(SketchError::Configuration(format!(
            "arg 1 (max_discrete) should be an int64 literal, found {max_discrete_arg:?}"
        ))
        .into());
    };
    let max_discrete = i32::try_from(max_discrete).map_err(|_| {
        SketchError::Configuration(format!("max_discrete {max_discrete} out of range"))
    })?;

    let digest = TDigest::new(compression, max_discrete)?;

    // reject non-numeric inputs at plan time, while type information is
    // available
    let value_type = args
        .exprs
        .get(2)
        .ok_or_else(|| DataFusionError::Execution("Reading argument 2".into()))?
        .data_type(args.schema)?;
    let adapter = NumericAdapter::try_new(&value_type)?;

    Ok(Box::new(TDigestAccumulator::new(digest, adapter)))
}

/// Creates the aggregate building a t-digest from a value column:
/// `tdigest(compression, max_discrete, value)`.
pub fn make_tdigest_udaf() -> AggregateUDF {
    create_udaf(
        "tdigest",
        vec![DataType::Float64, DataType::Int64, DataType::Float64],
        Arc::new(make_tdigest_arrow_type()),
        Volatility::Immutable,
        Arc::new(&make_state),
        Arc::new(vec![make_tdigest_arrow_type()]),
    )
}

fn make_non_configured_state(
    _args: AccumulatorArgs,
) -> Result<Box<dyn Accumulator>, DataFusionError> {
    Ok(Box::new(TDigestAccumulator::new_non_configured()))
}

/// Creates the aggregate folding a column of encoded digests into one.
pub fn merge_tdigests_udaf() -> AggregateUDF {
    create_udaf(
        "merge_tdigests",
        vec![make_tdigest_arrow_type()],
        Arc::new(make_tdigest_arrow_type()),
        Volatility::Immutable,
        Arc::new(&make_non_configured_state),
        Arc::new(vec![make_tdigest_arrow_type()]),
    )
}

/// Registers the digest aggregates and accessor functions on a session.
pub fn register_tdigest_functions(ctx: &SessionContext) {
    debug!("registering t-digest functions");
    ctx.register_udaf(make_tdigest_udaf());
    ctx.register_udaf(merge_tdigests_udaf());
    ctx.register_udf(make_tdigest_quantile_udf());
    ctx.register_udf(make_tdigest_mass_udf());
    ctx.register_udf(make_tdigest_size_udf());
}
