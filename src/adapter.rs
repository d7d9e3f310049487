use datafusion::arrow::{
    array::{ArrayRef, Float64Array},
    compute::cast,
    datatypes::DataType,
};

use crate::error::SketchError;

/// Converts heterogeneous numeric column types into the digest's f64 domain.
///
/// Non-numeric columns are rejected at construction when static type
/// information is available, so per-row conversion never has to fail for a
/// well-typed plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericAdapter;

impl NumericAdapter {
    pub fn try_new(input_type: &DataType) -> Result<Self, SketchError> {
        if input_type.is_numeric() {
            Ok(Self)
        } else {
            Err(SketchError::Type(format!(
                "expected a numeric column, got {input_type}"
            )))
        }
    }

    /// Casts any numeric array to `Float64Array`, preserving nulls.
    pub fn to_f64(&self, array: &ArrayRef) -> Result<Float64Array, SketchError> {
        if !array.data_type().is_numeric() {
            return Err(SketchError::Type(format!(
                "expected a numeric array, got {}",
                array.data_type()
            )));
        }
        let cast_array = cast(array, &DataType::Float64).map_err(|e| {
            SketchError::Type(format!("casting {} to Float64: {e}", array.data_type()))
        })?;
        cast_array
            .as_any()
            .downcast_ref::<Float64Array>()
            .cloned()
            .ok_or_else(|| SketchError::Type("cast did not produce a Float64Array".into()))
    }
}
