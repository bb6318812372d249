//! 比特流写入器.
//!
//! 与 [`BitReader`](crate::BitReader) 对应的大端位序写入器, 用于构造测试码流与头部.

/// 比特流写入器
///
/// # 示例
/// ```
/// use tao_core::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bit(1);
/// assert_eq!(bw.finish(), vec![0b1011_1000]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    /// 尚未成字节的位, 低 `pending` 位有效
    acc: u64,
    pending: u32,
}

impl BitWriter {
    /// 创建空的写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.pending as usize
    }

    /// 写入 1 位
    pub fn write_bit(&mut self, bit: u32) {
        self.write_bits(bit & 1, 1);
    }

    /// 写入值的低 N 位 (最多 32 位), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={n} 超过 32 位");
        if n == 0 {
            return;
        }
        let mask = (1u64 << n) - 1;
        self.acc = (self.acc << n) | (u64::from(value) & mask);
        self.pending += n;
        while self.pending >= 8 {
            self.pending -= 8;
            self.data.push((self.acc >> self.pending) as u8);
        }
        self.acc &= (1u64 << self.pending) - 1;
    }

    /// 用 0 填充到字节边界
    pub fn align_to_byte(&mut self) {
        if self.pending > 0 {
            self.write_bits(0, 8 - self.pending);
        }
    }

    /// 结束写入并返回字节数据, 不足一字节的部分补 0
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitReader;

    #[test]
    fn test_write_unaligned_fields() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b01, 2);
        bw.write_bits(0xABCD, 16);
        bw.write_bits(0b111, 3);
        assert_eq!(bw.bits_written(), 21);
        let data = bw.finish();
        assert_eq!(data.len(), 3);

        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(2).unwrap(), 0b01);
        assert_eq!(br.read_bits(16).unwrap(), 0xABCD);
        assert_eq!(br.read_bits(3).unwrap(), 0b111);
        assert_eq!(br.read_bits(3).unwrap(), 0);
    }

    #[test]
    fn test_write_full_word_masks_high_bits() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xFFFF_FFFF, 32);
        bw.write_bits(0xFF, 4);
        assert_eq!(bw.finish(), vec![0xFF, 0xFF, 0xFF, 0xFF, 0xF0]);
    }
}
