/*
 * @Date         : 2026-03-02
 * @Description  : 本类仅包含一些属性方法及规约（求和、均值等）方法，不会修改张量本身
 */

use super::Tensor;

impl Tensor {
    /// 若为向量，`shape`可以是[n]、[1,n]、[n,1]；
    /// 若为矩阵，`shape`可以是[n,m]；
    /// 若为更高维度的数组，`shape`可以是[c,n,m,...]。
    pub fn shape(&self) -> &[usize] {
        self.data().shape()
    }

    /// 张量的维（dim）数、阶（rank）数
    /// 即`shape()`的元素个数--如：形状为`[]`的标量阶数为0，向量阶数为1，矩阵阶数为2，以此类推
    pub fn dimension(&self) -> usize {
        self.data().ndim()
    }

    /// 计算张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data().len()
    }

    /// 判断两个张量的形状是否严格一致。如：形状为 [1, 4]，[1, 4]和[4]是不一致的，会返回false
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// 判断张量是否为标量
    pub fn is_scalar(&self) -> bool {
        self.size() == 1
    }

    /// 转化为纯数（number）。若为标量，则返回Some(number)，否则返回None
    pub fn number(&self) -> Option<f32> {
        if self.is_scalar() {
            self.data().iter().next().copied()
        } else {
            None
        }
    }

    /// 所有元素是否都是有限值（无NaN/Inf）
    pub fn is_all_finite(&self) -> bool {
        self.data().iter().all(|x| x.is_finite())
    }

    /// 所有元素之和（纯数）
    pub fn sum_all(&self) -> f32 {
        self.data().sum()
    }

    /// 所有元素的均值（纯数），空张量返回0
    pub fn mean_all(&self) -> f32 {
        if self.size() == 0 {
            0.0
        } else {
            self.sum_all() / self.size() as f32
        }
    }

    pub fn max_abs(&self) -> f32 {
        self.data().iter().fold(0.0_f32, |acc, x| acc.max(x.abs()))
    }

    /// 逐元素开方
    pub fn sqrt(&self) -> Self {
        self.map(f32::sqrt)
    }
}
