use super::Tensor;
use super::ops::broadcast_shape;
use crate::errors::{Operator, TensorError};
use ndarray::{Axis, Ix2, Slice};

impl Tensor {
    pub fn reshape(&self, shape: &[usize]) -> Self {
        let new_total_elements: usize = shape.iter().product();
        assert!(
            self.size() == new_total_elements,
            "{}",
            TensorError::IncompatibleShape
        );
        Self::new(self.as_slice(), shape)
    }

    /// 广播到指定形状（返回拥有所有权的新张量）
    pub fn broadcast_to(&self, shape: &[usize]) -> Self {
        let view = self
            .data()
            .broadcast(shape)
            .unwrap_or_else(|| panic!("{}", TensorError::IncompatibleShape));
        Self::from_array(view.to_owned())
    }

    /// 把（由广播产生的）张量按求和方式规约回`shape`。
    /// 反向传播时，广播运算的梯度需要经过此规约才能回到原操作数的形状。
    pub fn sum_to_shape(&self, shape: &[usize]) -> Self {
        if self.shape() == shape {
            return self.clone();
        }
        assert!(
            broadcast_shape(self.shape(), shape).as_deref() == Some(self.shape()),
            "{}",
            TensorError::IncompatibleShape
        );
        let mut data = self.data().clone();
        // 先规约掉多出来的前导维
        while data.ndim() > shape.len() {
            data = data.sum_axis(Axis(0));
        }
        for (axis, &dim) in shape.iter().enumerate() {
            if dim == 1 && data.shape()[axis] != 1 {
                data = data.sum_axis(Axis(axis)).insert_axis(Axis(axis));
            }
        }
        Self::from_array(data)
    }

    /// 沿`axis`拼接多个张量，除`axis`外其余维度须一致
    pub fn concat(tensors: &[&Self], axis: usize) -> Self {
        assert!(!tensors.is_empty(), "{}", TensorError::EmptyList);
        let views = tensors.iter().map(|t| t.data().view()).collect::<Vec<_>>();
        let data = ndarray::concatenate(Axis(axis), &views).unwrap_or_else(|_| {
            panic!(
                "{}",
                TensorError::OperatorError {
                    operator: Operator::Concat,
                    tensor1_shape: tensors[0].shape().to_vec(),
                    tensor2_shape: tensors[tensors.len() - 1].shape().to_vec(),
                }
            )
        });
        Self::from_array(data)
    }

    /// 沿`axis`截取[start, start+len)的一段
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Self {
        assert!(
            axis < self.dimension(),
            "{}",
            TensorError::AxisOutOfRange {
                axis,
                rank: self.dimension()
            }
        );
        let view = self
            .data()
            .slice_axis(Axis(axis), Slice::from(start..start + len));
        Self::from_array(view.to_owned())
    }

    /// 二维矩阵转置
    pub fn transpose(&self) -> Self {
        assert!(
            self.dimension() == 2,
            "{}",
            TensorError::AxisOutOfRange {
                axis: 1,
                rank: self.dimension()
            }
        );
        Self::from_array(self.data().t().to_owned())
    }

    /// 二维矩阵乘法：[n, k] x [k, m] -> [n, m]
    pub fn matmul(&self, other: &Self) -> Self {
        let error = || TensorError::OperatorError {
            operator: Operator::MatMul,
            tensor1_shape: self.shape().to_vec(),
            tensor2_shape: other.shape().to_vec(),
        };
        let a = self
            .data()
            .view()
            .into_dimensionality::<Ix2>()
            .unwrap_or_else(|_| panic!("{}", error()));
        let b = other
            .data()
            .view()
            .into_dimensionality::<Ix2>()
            .unwrap_or_else(|_| panic!("{}", error()));
        assert!(a.ncols() == b.nrows(), "{}", error());
        Self::from_array(a.dot(&b).into_dyn())
    }

    /// 沿多个维度求和，保留被规约的维度（长度变为1）
    pub fn sum_axes_keepdim(&self, axes: &[usize]) -> Self {
        let mut data = self.data().clone();
        for &axis in axes {
            data = data.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
        Self::from_array(data)
    }

    /// 沿多个维度求均值，保留被规约的维度（长度变为1）
    pub fn mean_axes_keepdim(&self, axes: &[usize]) -> Self {
        let count: usize = axes.iter().map(|&a| self.shape()[a]).product();
        let sum = self.sum_axes_keepdim(axes);
        &sum / count.max(1) as f32
    }

    /// 沿最后一个维度做数值稳定的log-sum-exp，保留该维度（长度变为1）
    pub fn log_sum_exp_last(&self) -> Self {
        let last = Axis(self.dimension() - 1);
        let max = self
            .data()
            .fold_axis(last, f32::NEG_INFINITY, |acc, &x| acc.max(x))
            .insert_axis(last);
        let shifted = self.data() - &max;
        let sum = shifted.mapv(f32::exp).sum_axis(last).insert_axis(last);
        Self::from_array(sum.mapv(f32::ln) + max)
    }

    /// 沿最后一个维度做softmax
    pub fn softmax_last(&self) -> Self {
        let lse = self.log_sum_exp_last();
        (self - &lse).map(f32::exp)
    }

    /// 按扁平索引表收集元素：输出第i个元素取自输入的第`index[i]`个元素，None处填0。
    /// 平移、循环偏移等几何增强都归结为这种“重排+补零”。
    pub fn gather_flat(&self, index: &[Option<usize>], shape: &[usize]) -> Self {
        assert!(
            index.len() == shape.iter().product::<usize>(),
            "{}",
            TensorError::IncompatibleShape
        );
        let src = self.as_slice();
        let data = index
            .iter()
            .map(|i| i.map_or(0.0, |i| src[i]))
            .collect::<Vec<_>>();
        Self::new(&data, shape)
    }

    /// `gather_flat`的伴随运算：把梯度按索引表散射（累加）回输入形状
    pub fn scatter_add_flat(&self, index: &[Option<usize>], input_shape: &[usize]) -> Self {
        let mut out = Self::zeros(input_shape);
        let dst = out.as_slice_mut();
        for (value, i) in self.as_slice().iter().zip(index) {
            if let Some(i) = i {
                dst[*i] += value;
            }
        }
        out
    }
}
