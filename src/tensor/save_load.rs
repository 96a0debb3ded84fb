use std::io::{Read, Write};

use super::Tensor;

// 保存和加载张量（bincode编码，包含形状信息）
impl Tensor {
    /// 将单个Tensor写入`writer`
    pub fn save<W: Write>(&self, writer: W) -> bincode::Result<()> {
        bincode::serialize_into(writer, self)
    }

    /// 从`reader`加载单个Tensor
    pub fn load<R: Read>(reader: R) -> bincode::Result<Self> {
        let tensor: Self = bincode::deserialize_from(reader)?;
        // 反序列化得到的数组未必是标准布局
        Ok(Self::from_array(tensor.data))
    }
}
