use datafusion::{
    arrow::array::{Array, ArrayRef},
    error::DataFusionError,
    logical_expr::Accumulator,
    scalar::ScalarValue,
};

use crate::adapter::NumericAdapter;
use crate::codec::{TDigestArray, digest_to_scalar};
use crate::tdigest::TDigest;

/// An accumulator building one t-digest per aggregation group.
///
/// The digest is owned exclusively by the group; folding a partial state in
/// transfers the donor's contents, and the donor is never touched again.
/// Intermediate and final outputs share the digest wire record, so partial
/// results exchanged between workers look exactly like the final one.
#[derive(Debug)]
pub struct TDigestAccumulator {
    digest: Option<TDigest>,
    adapter: NumericAdapter,
}

impl TDigestAccumulator {
    pub fn new(digest: TDigest, adapter: NumericAdapter) -> Self {
        Self {
            digest: Some(digest),
            adapter,
        }
    }

    /// Variant for folding a column of encoded digests: configuration is
    /// taken from the first digest observed instead of literal arguments.
    pub fn new_non_configured() -> Self {
        Self {
            digest: None,
            adapter: NumericAdapter::default(),
        }
    }

    /// if not configured, takes the first non-null digest in the array as a
    /// template; if already configured or the array is empty, does nothing
    fn configure(&mut self, digests: &TDigestArray) -> datafusion::error::Result<()> {
        if self.digest.is_some() {
            return Ok(());
        }
        for index in 0..digests.len() {
            if !digests.is_null(index) {
                self.digest = Some(TDigest::new(
                    digests.get_compression(index)?,
                    digests.get_max_discrete(index)?,
                )?);
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn update_batch_values(&mut self, values: &ArrayRef) -> datafusion::error::Result<()> {
        let scalars = self.adapter.to_f64(values)?;
        let digest = self.digest.as_mut().ok_or_else(|| {
            DataFusionError::Execution(
                "can't record values in a non-configured digest accumulator".into(),
            )
        })?;
        for i in 0..scalars.len() {
            // nulls carry no mass; they are skipped, not treated as zero
            if !scalars.is_null(i) {
                digest.update(scalars.value(i));
            }
        }
        Ok(())
    }

    pub fn merge_digest_array(&mut self, digests: &TDigestArray) -> datafusion::error::Result<()> {
        self.configure(digests)?;
        let Some(target) = self.digest.as_mut() else {
            return Ok(());
        };
        for index in 0..digests.len() {
            if digests.is_null(index) {
                continue;
            }
            target.merge_from(digests.digest(index)?);
        }
        Ok(())
    }
}

impl Accumulator for TDigestAccumulator {
    fn update_batch(&mut self, values: &[ArrayRef]) -> datafusion::error::Result<()> {
        // we support two signatures
        // scalar case: [compression, max_discrete, values_to_accumulate]
        // digest-column case: [digests]

        match values.len() {
            3 => self.update_batch_values(&values[2]),
            1 => {
                let digests: TDigestArray = values[0].as_ref().try_into()?;
                self.merge_digest_array(&digests)
            }

            other => Err(DataFusionError::Execution(format!(
                "invalid arguments to TDigestAccumulator::update_batch, nb_values={other}"
            ))),
        }
    }

    fn evaluate(&mut self) -> datafusion::error::Result<ScalarValue> {
        match self.digest.as_mut() {
            Some(digest) => {
                digest.compress();
                digest_to_scalar(digest)
            }
            None => digest_to_scalar(&TDigest::default()),
        }
    }

    fn size(&self) -> usize {
        size_of_val(self)
            + self
                .digest
                .as_ref()
                .map_or(0, |d| d.size() * 2 * size_of::<f64>())
    }

    fn state(&mut self) -> datafusion::error::Result<Vec<ScalarValue>> {
        Ok(vec![self.evaluate()?])
    }

    fn merge_batch(&mut self, states: &[ArrayRef]) -> datafusion::error::Result<()> {
        for state in states {
            let digests: TDigestArray = state.try_into()?;
            self.merge_digest_array(&digests)?;
        }
        Ok(())
    }
}
