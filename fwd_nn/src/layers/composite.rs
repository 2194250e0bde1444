//! Sequential composition of units.

use std::io::{Read, Write};

use fwd_tensor::Tensor;
use log::trace;

use crate::error::{check_size, NnError, Result};
use crate::persist::{self, UnitTag};
use crate::unit::{input_derivative_or_zeros, Evaluation, Unit};

/// Units chained end to end, output of child `i` feeding child `i + 1`.
///
/// The global parameter space is the children's spaces laid out contiguously
/// in order: with counts `[6, 6, 6]`, global index 7 is index 1 of child 1.
#[derive(Debug)]
pub struct Composite {
    children: Vec<Box<dyn Unit>>,
    variable_count: usize,
}

impl Composite {
    /// Chain `children`; adjacent output and input sizes must agree.
    pub fn new(children: Vec<Box<dyn Unit>>) -> Result<Self> {
        if children.is_empty() {
            return Err(NnError::ShapeMismatch(
                "composite needs at least one child".to_string(),
            ));
        }
        for (i, pair) in children.windows(2).enumerate() {
            let (out, next_in) = (pair[0].output_size(), pair[1].input_size());
            if out != next_in {
                return Err(NnError::ShapeMismatch(format!(
                    "child {} outputs {} values but child {} takes {}",
                    i,
                    out,
                    i + 1,
                    next_in
                )));
            }
        }

        let variable_count = children.iter().map(|c| c.variable_count()).sum();
        trace!(
            "composite of {} children, {} parameters",
            children.len(),
            variable_count
        );
        Ok(Composite {
            children,
            variable_count,
        })
    }

    /// Map a global parameter index to `(child, local index)`.
    fn locate(&self, mut index: usize) -> Option<(usize, usize)> {
        for (i, child) in self.children.iter().enumerate() {
            let count = child.variable_count();
            if index < count {
                return Some((i, index));
            }
            index -= count;
        }
        None
    }

    fn out_of_range(&self, index: usize) -> NnError {
        NnError::ParameterOutOfRange {
            index,
            count: self.variable_count,
        }
    }

    pub(crate) fn read_payload(reader: &mut dyn Read, depth: usize) -> Result<Self> {
        let count = persist::read_len(reader)?;
        let children = (0..count)
            .map(|_| persist::read_unit_at(&mut *reader, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        Self::new(children).map_err(|e| match e {
            NnError::ShapeMismatch(msg) => {
                NnError::UnsupportedFormat(format!("composite record: {}", msg))
            }
            other => other,
        })
    }
}

impl Unit for Composite {
    fn input_size(&self) -> usize {
        self.children.first().map_or(0, |c| c.input_size())
    }

    fn output_size(&self) -> usize {
        self.children.last().map_or(0, |c| c.output_size())
    }

    fn variable_count(&self) -> usize {
        self.variable_count
    }

    fn evaluate(&self, input: &Tensor) -> Result<Tensor> {
        self.children
            .iter()
            .try_fold(input.clone(), |value, child| child.evaluate(&value))
    }

    fn evaluate_with_derivative(
        &self,
        input: &Tensor,
        input_derivative: Option<&Tensor>,
        parameter: Option<usize>,
    ) -> Result<Evaluation> {
        let mut eval = Evaluation {
            value: input.clone(),
            derivative: input_derivative_or_zeros(input, input_derivative)?,
        };
        let mut index = parameter;
        for child in &self.children {
            eval = child.evaluate_with_derivative(&eval.value, Some(&eval.derivative), index)?;
            // Below zero, no later child owns the index.
            index = index.and_then(|p| p.checked_sub(child.variable_count()));
        }
        Ok(eval)
    }

    fn add_all(&mut self, values: &[f32]) -> Result<()> {
        check_size(self.variable_count, values.len())?;
        let mut rest = values;
        for child in &mut self.children {
            let (head, tail) = rest.split_at(child.variable_count());
            child.add_all(head)?;
            rest = tail;
        }
        Ok(())
    }

    fn parameter(&self, index: usize) -> Result<f32> {
        let (child, local) = self.locate(index).ok_or_else(|| self.out_of_range(index))?;
        self.children[child].parameter(local)
    }

    fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        let (child, local) = self.locate(index).ok_or_else(|| self.out_of_range(index))?;
        self.children[child].set_parameter(local, value)
    }

    fn tag(&self) -> UnitTag {
        UnitTag::Composite
    }

    fn write_payload(&self, writer: &mut dyn Write) -> Result<()> {
        persist::write_len(writer, self.children.len())?;
        for child in &self.children {
            persist::write_unit(child.as_ref(), writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Affine;

    fn affine(rows: [[f32; 3]; 2]) -> Box<dyn Unit> {
        Box::new(Affine::from_augmented(rows.iter().map(|r| r.to_vec()).collect()).unwrap())
    }

    fn chain() -> Composite {
        Composite::new(vec![
            affine([[1.0, 2.0, 1.0], [3.0, 4.0, 1.0]]),
            affine([[5.0, 6.0, 1.0], [7.0, 8.0, 1.0]]),
            affine([[9.0, 10.0, 1.0], [11.0, 12.0, 1.0]]),
        ])
        .unwrap()
    }

    fn input() -> Tensor {
        Tensor::vector(vec![1.0, 2.0]).unwrap()
    }

    #[test]
    fn test_chain_forward() {
        let net = chain();
        assert_eq!(net.evaluate(&input()).unwrap().as_slice(), &[2318.0, 2802.0]);
        assert_eq!(net.variable_count(), 18);
        assert_eq!(net.input_size(), 2);
        assert_eq!(net.output_size(), 2);
    }

    #[test]
    fn test_chain_derivative_routes_to_middle_layer() {
        let net = chain();
        let eval = net.evaluate_with_derivative(&input(), None, Some(7)).unwrap();
        assert_eq!(eval.value.as_slice(), &[2318.0, 2802.0]);
        assert_eq!(eval.derivative.as_slice(), &[108.0, 132.0]);
    }

    #[test]
    fn test_chain_derivative_first_layer_bias() {
        // d/db1[0]: [1, 0] -> W2 -> [5, 7] -> W3 -> [115, 139]
        let net = chain();
        let eval = net.evaluate_with_derivative(&input(), None, Some(4)).unwrap();
        assert_eq!(eval.derivative.as_slice(), &[115.0, 139.0]);
    }

    #[test]
    fn test_out_of_range_index_has_zero_derivative() {
        let net = chain();
        for parameter in [None, Some(18), Some(1000)] {
            let eval = net.evaluate_with_derivative(&input(), None, parameter).unwrap();
            assert_eq!(eval.derivative.as_slice(), &[0.0, 0.0]);
        }
    }

    #[test]
    fn test_nested_composite_index_space() {
        let inner: Box<dyn Unit> = Box::new(chain());
        let net = Composite::new(vec![affine([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]), inner]).unwrap();
        assert_eq!(net.variable_count(), 24);
        // Global 13 = inner index 7.
        let eval = net.evaluate_with_derivative(&input(), None, Some(13)).unwrap();
        assert_eq!(eval.derivative.as_slice(), &[108.0, 132.0]);
    }

    #[test]
    fn test_add_all_partitions_in_order() {
        let mut net = chain();
        let delta: Vec<f32> = (0..18).map(|i| i as f32).collect();
        net.add_all(&delta).unwrap();
        // Child 1, local 1 is W2[0][1] = 6 + 7.
        assert_eq!(net.parameter(7).unwrap(), 13.0);
        // Child 2, bias[1] = 1 + 17.
        assert_eq!(net.parameter(17).unwrap(), 18.0);
        assert!(net.add_all(&delta[..17]).is_err());
    }

    #[test]
    fn test_set_parameter_routes() {
        let mut net = chain();
        net.set_parameter(12, 0.0).unwrap();
        assert_eq!(net.parameter(12).unwrap(), 0.0);
        assert!(matches!(
            net.set_parameter(18, 1.0),
            Err(NnError::ParameterOutOfRange { index: 18, count: 18 })
        ));
    }

    #[test]
    fn test_rejects_mismatched_children() {
        let narrow: Box<dyn Unit> = Box::new(Affine::new(vec![vec![1.0, 2.0, 3.0]], vec![0.0]).unwrap());
        let err = Composite::new(vec![affine([[1.0, 2.0, 1.0], [3.0, 4.0, 1.0]]), narrow])
            .unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch(_)));
        assert!(matches!(Composite::new(vec![]), Err(NnError::ShapeMismatch(_))));
    }
}
