//! Schema for the reduction operator
//!
//! Collapses every dimension from a configured axis onwards to extent 1.
//! Deployed models carry shapes padded to rank 4, while a negative axis in
//! the framework definition still counts from the original rank, so
//! resolution adjusts by the padding amount before adding the rank.

use infergraph_core::adapter::TensorShape;

use crate::attrs::{AttrMap, AttrValue};
use crate::error::{Error, Result};
use crate::registry::{Framework, KernelLocator, OpSchema};

/// Rank padding applied when a rank-2 framework model is compiled to the
/// fixed rank-4 deployment layout
pub const RANK_PAD: usize = 2;

/// Reduction operation carried by the framework definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionOp {
    /// Sum of elements
    Sum,
    /// Sum of absolute values
    Asum,
    /// Sum of squares
    Sumsq,
    /// Arithmetic mean
    Mean,
}

impl ReductionOp {
    /// Attribute string for the operation
    pub fn as_str(self) -> &'static str {
        match self {
            ReductionOp::Sum => "SUM",
            ReductionOp::Asum => "ASUM",
            ReductionOp::Sumsq => "SUMSQ",
            ReductionOp::Mean => "MEAN",
        }
    }
}

/// Parameters of a framework reduction layer, each optional
#[derive(Debug, Clone, Copy, Default)]
pub struct ReductionParam {
    /// Which reduction to perform
    pub operation: Option<ReductionOp>,

    /// First axis to reduce over
    pub axis: Option<i64>,

    /// Output scaling coefficient
    pub coeff: Option<f32>,
}

/// Map a framework reduction definition onto an attribute set
///
/// Only attributes the definition actually carries are set; downstream
/// lookups default the rest.
pub fn parse_params(param: &ReductionParam, attrs: &mut AttrMap) {
    if let Some(axis) = param.axis {
        attrs.set("axis", AttrValue::Int(axis));
    }
    if let Some(coeff) = param.coeff {
        attrs.set("coeff", AttrValue::Float(coeff));
    }
    if let Some(operation) = param.operation {
        attrs.set("operation", AttrValue::Str(operation.as_str().to_string()));
    }
}

/// Infer the output shape of a reduction over `input`
///
/// Reads the `axis` attribute (default -1). A negative axis is adjusted by
/// `rank_pad` before adding the rank; the resolved axis must land in
/// `[0, rank)`. Every dimension from the resolved axis to the last is set
/// to extent 1.
pub fn infer_shape(attrs: &AttrMap, input: &TensorShape, rank_pad: usize) -> Result<TensorShape> {
    let rank = input.rank();
    let mut axis = attrs.int_or("axis", -1);

    if axis < 0 {
        axis -= rank_pad as i64;
    }
    if axis < 0 {
        axis += rank as i64;
    }
    if axis < 0 || axis >= rank as i64 {
        return Err(Error::InvalidAxis { axis, rank });
    }

    let mut dims = input.dims().to_vec();
    for dim in &mut dims[axis as usize..] {
        *dim = 1;
    }
    Ok(TensorShape::new(dims))
}

fn padded_infer(attrs: &AttrMap, input: &TensorShape) -> Result<TensorShape> {
    infer_shape(attrs, input, RANK_PAD)
}

/// Registration record for the custom reduction operator
pub fn schema() -> OpSchema {
    OpSchema {
        op_type: "custom_reduction".into(),
        origin_type: "Reduction".into(),
        framework: Framework::Caffe,
        infer_shape: padded_infer,
        kernel: KernelLocator::for_kernel("Reduction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn attrs_with_axis(axis: i64) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.set("axis", AttrValue::Int(axis));
        attrs
    }

    #[test_case(-1, &[1, 1, 7, 9], &[1, 1, 1, 1] ; "negative axis counts from the original rank")]
    #[test_case(-2, &[1, 1, 7, 9], &[1, 1, 1, 1] ; "axis minus two resolves to zero")]
    #[test_case(2, &[1, 1, 7, 9], &[1, 1, 1, 1] ; "explicit interior axis")]
    #[test_case(3, &[1, 1, 7, 9], &[1, 1, 7, 1] ; "last axis collapses one dimension")]
    #[test_case(0, &[2, 3, 4, 5], &[1, 1, 1, 1] ; "axis zero collapses everything")]
    fn test_infer_collapses_trailing_dims(axis: i64, input: &[usize], expected: &[usize]) {
        let shape = TensorShape::new(input.to_vec());
        let out = infer_shape(&attrs_with_axis(axis), &shape, RANK_PAD).unwrap();
        assert_eq!(out.dims(), expected);
    }

    #[test_case(5 ; "axis beyond the rank")]
    #[test_case(-3 ; "negative axis resolving below zero")]
    fn test_out_of_range_axis_is_rejected(axis: i64) {
        let shape = TensorShape::new(vec![1, 1, 7, 9]);
        assert!(matches!(
            infer_shape(&attrs_with_axis(axis), &shape, RANK_PAD),
            Err(Error::InvalidAxis { .. })
        ));
    }

    #[test]
    fn test_missing_axis_defaults_to_last_original_dim() {
        // No axis attribute: the default -1 resolves like an explicit -1.
        let shape = TensorShape::new(vec![1, 1, 7, 9]);
        let out = infer_shape(&AttrMap::new(), &shape, RANK_PAD).unwrap();
        assert_eq!(out.dims(), &[1, 1, 1, 1]);
    }

    #[test]
    fn test_parse_params_sets_only_present_attributes() {
        let mut attrs = AttrMap::new();
        parse_params(
            &ReductionParam {
                operation: Some(ReductionOp::Mean),
                axis: None,
                coeff: Some(2.0),
            },
            &mut attrs,
        );

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("axis"), None);
        assert_eq!(attrs.str_or("operation", "SUM"), "MEAN");
        assert_eq!(attrs.float_or("coeff", 1.0), 2.0);
    }

    #[test]
    fn test_registered_schema_infers_through_the_registry() {
        let mut registry = crate::registry::OpRegistry::new();
        registry.register(schema()).unwrap();

        let schema = registry.get("custom_reduction").unwrap();
        assert_eq!(schema.origin_type, "Reduction");

        let shape = TensorShape::new(vec![1, 1, 7, 9]);
        let out = (schema.infer_shape)(&attrs_with_axis(-1), &shape).unwrap();
        assert_eq!(out.dims(), &[1, 1, 1, 1]);
    }
}
