use std::sync::Arc;

use datafusion::{
    arrow::{
        array::{
            Array, ArrayBuilder, ArrayRef, Float64Array, Float64Builder, Int32Array, ListArray,
            ListBuilder, PrimitiveBuilder, StructArray, StructBuilder,
        },
        datatypes::{DataType, Field, Fields, Float64Type, Int32Type},
    },
    error::DataFusionError,
    logical_expr::ColumnarValue,
    scalar::ScalarValue,
};
use lazy_static::lazy_static;

use crate::error::SketchError;
use crate::tdigest::TDigest;

/// Logical name of the digest column type.
pub const TDIGEST_TYPE_NAME: &str = "tdigest";

/// Fixed token letting a secondary language binding locate a compatible type
/// adapter. Naming only, no behavior attached.
pub const TDIGEST_INTEROP_TOKEN: &str = "datafusion_tdigest.tdigest.v1";

/// Returns the Arrow fields of the digest wire record.
///
/// This four-field shape is the persisted/shuffled representation whenever a
/// digest crosses a serialization boundary; partial aggregates and final
/// results use it alike.
pub fn digest_arrow_fields() -> Vec<Field> {
    vec![
        Field::new("compression", DataType::Float64, false),
        Field::new("max_discrete", DataType::Int32, false),
        Field::new(
            "centroids",
            DataType::List(Arc::new(Field::new("position", DataType::Float64, false))),
            false,
        ),
        Field::new(
            "masses",
            DataType::List(Arc::new(Field::new("mass", DataType::Float64, false))),
            false,
        ),
    ]
}

pub fn make_tdigest_arrow_type() -> DataType {
    DataType::Struct(Fields::from(digest_arrow_fields()))
}

/// A logical column type entry: name, interop token and wire shape.
///
/// Two instances declaring the same logical type compare equal and hash
/// identically, so repeated declarations are one type to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TDigestType {
    name: &'static str,
    interop_token: &'static str,
}

impl TDigestType {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interop_token(&self) -> &'static str {
        self.interop_token
    }

    pub fn data_type(&self) -> DataType {
        make_tdigest_arrow_type()
    }
}

lazy_static! {
    static ref LOGICAL_TYPES: Vec<TDigestType> = vec![TDigestType {
        name: TDIGEST_TYPE_NAME,
        interop_token: TDIGEST_INTEROP_TOKEN,
    }];
}

/// Looks a logical type up by name in the static registration table.
pub fn lookup_logical_type(name: &str) -> Option<&'static TDigestType> {
    LOGICAL_TYPES.iter().find(|t| t.name == name)
}

/// An array of encoded digests.
///
/// Construction validates the record shape once (exactly four fields of the
/// declared types); per-row decoding then only has to check centroid/mass
/// consistency.
#[derive(Debug)]
pub struct TDigestArray {
    inner: Arc<StructArray>,
}

impl TDigestArray {
    pub fn try_new(inner: Arc<StructArray>) -> Result<Self, SketchError> {
        Self::validate_shape(&inner)?;
        Ok(Self { inner })
    }

    fn validate_shape(inner: &StructArray) -> Result<(), SketchError> {
        let fields = inner.fields();
        if fields.len() != 4 {
            return Err(SketchError::Schema(format!(
                "expected 4 fields in digest record, got {}",
                fields.len()
            )));
        }
        if fields[0].data_type() != &DataType::Float64 {
            return Err(SketchError::Schema(format!(
                "field 0 (compression) should be Float64, got {}",
                fields[0].data_type()
            )));
        }
        if fields[1].data_type() != &DataType::Int32 {
            return Err(SketchError::Schema(format!(
                "field 1 (max_discrete) should be Int32, got {}",
                fields[1].data_type()
            )));
        }
        for (index, name) in [(2, "centroids"), (3, "masses")] {
            match fields[index].data_type() {
                DataType::List(item) if item.data_type() == &DataType::Float64 => {}
                other => {
                    return Err(SketchError::Schema(format!(
                        "field {index} ({name}) should be List<Float64>, got {other}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn inner(&self) -> Arc<StructArray> {
        self.inner.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.inner.is_null(index)
    }

    pub fn get_compression(&self, index: usize) -> Result<f64, SketchError> {
        let compressions = self
            .inner
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| SketchError::Schema("downcasting to Float64Array".into()))?;
        Ok(compressions.value(index))
    }

    pub fn get_max_discrete(&self, index: usize) -> Result<i32, SketchError> {
        let max_discretes = self
            .inner
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or_else(|| SketchError::Schema("downcasting to Int32Array".into()))?;
        Ok(max_discretes.value(index))
    }

    pub fn get_centroids(&self, index: usize) -> Result<Float64Array, SketchError> {
        Self::float_list_value(self.inner.column(2), index)
    }

    pub fn get_masses(&self, index: usize) -> Result<Float64Array, SketchError> {
        Self::float_list_value(self.inner.column(3), index)
    }

    fn float_list_value(column: &ArrayRef, index: usize) -> Result<Float64Array, SketchError> {
        let list = column
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| SketchError::Schema("downcasting to ListArray".into()))?;
        let values = list.value(index);
        let values = values
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| SketchError::Schema("downcasting to Float64Array".into()))?;
        Ok(values.clone())
    }

    /// Decodes the digest at `index`.
    ///
    /// Fails with a consistency error when centroid and mass lengths
    /// disagree; otherwise the digest is rebuilt directly from the record,
    /// trusting the encoded ordering.
    pub fn digest(&self, index: usize) -> Result<TDigest, SketchError> {
        let centroids = self.get_centroids(index)?;
        let masses = self.get_masses(index)?;
        if centroids.len() != masses.len() {
            return Err(SketchError::Consistency(format!(
                "{} centroid positions but {} masses at row {index}",
                centroids.len(),
                masses.len()
            )));
        }
        // copy element by element: the list values may be a slice into a
        // larger shared buffer
        let positions: Vec<f64> = (0..centroids.len()).map(|i| centroids.value(i)).collect();
        let mass_values: Vec<f64> = (0..masses.len()).map(|i| masses.value(i)).collect();
        TDigest::from_parts(
            self.get_compression(index)?,
            self.get_max_discrete(index)?,
            positions,
            mass_values,
        )
    }
}

impl TryFrom<&ArrayRef> for TDigestArray {
    type Error = DataFusionError;

    fn try_from(value: &ArrayRef) -> Result<Self, Self::Error> {
        value.as_ref().try_into()
    }
}

impl TryFrom<&dyn Array> for TDigestArray {
    type Error = DataFusionError;

    fn try_from(value: &dyn Array) -> Result<Self, Self::Error> {
        let struct_array = value
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| DataFusionError::Execution("downcasting to StructArray".into()))?;
        Self::try_new(Arc::new(struct_array.clone())).map_err(Into::into)
    }
}

impl TryFrom<&ColumnarValue> for TDigestArray {
    type Error = DataFusionError;

    fn try_from(value: &ColumnarValue) -> Result<Self, Self::Error> {
        match value {
            ColumnarValue::Array(array) => array.try_into(),
            ColumnarValue::Scalar(scalar_value) => {
                if let ScalarValue::Struct(array) = scalar_value {
                    Self::try_new(array.clone()).map_err(Into::into)
                } else {
                    Err(DataFusionError::Execution(
                        "Can't convert ColumnarValue into TDigestArray: ScalarValue is not a struct"
                            .into(),
                    ))
                }
            }
        }
    }
}

/// Encodes a digest into the four-field struct record.
///
/// Exactly `digest.size()` centroid positions and masses are copied, in
/// ascending order.
pub fn digest_to_scalar(digest: &TDigest) -> Result<ScalarValue, DataFusionError> {
    let mut struct_builder = StructBuilder::from_fields(digest_arrow_fields(), 1);

    let compression_builder = struct_builder
        .field_builder::<PrimitiveBuilder<Float64Type>>(0)
        .ok_or_else(|| {
            DataFusionError::Execution("Error accessing the compression builder".into())
        })?;
    compression_builder.append_value(digest.compression());

    let max_discrete_builder = struct_builder
        .field_builder::<PrimitiveBuilder<Int32Type>>(1)
        .ok_or_else(|| {
            DataFusionError::Execution("Error accessing the max_discrete builder".into())
        })?;
    max_discrete_builder.append_value(digest.max_discrete());

    append_float_list(&mut struct_builder, 2, &digest.centroid_positions())?;
    append_float_list(&mut struct_builder, 3, &digest.centroid_masses())?;

    struct_builder.append(true);
    Ok(ScalarValue::Struct(Arc::new(struct_builder.finish())))
}

fn append_float_list(
    struct_builder: &mut StructBuilder,
    field_index: usize,
    values: &[f64],
) -> Result<(), DataFusionError> {
    let list_builder = struct_builder
        .field_builder::<ListBuilder<Box<dyn ArrayBuilder>>>(field_index)
        .ok_or_else(|| {
            DataFusionError::Execution(format!("Error accessing the list builder {field_index}"))
        })?;
    let values_builder = list_builder
        .values()
        .as_any_mut()
        .downcast_mut::<Float64Builder>()
        .ok_or_else(|| {
            DataFusionError::Execution(format!(
                "Error accessing the values builder of list {field_index}"
            ))
        })?;
    values_builder.append_slice(values);
    list_builder.append(true);
    Ok(())
}
