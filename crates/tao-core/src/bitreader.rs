//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区读取, 供 VC-1 等视频码流的头部与宏块层使用.
//! 越界读取返回 `TaoError::Eof` 且不移动读取位置.

use crate::{TaoError, TaoResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use tao_core::BitReader;
///
/// let data = [0b1011_0001, 0b0101_0101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(12).unwrap(), 0b0001_0101_0101);
/// assert!(br.is_eof());
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 以位计的读取位置
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 剩余可读位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// 是否已读完
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 读取 1 位
    pub fn read_bit(&mut self) -> TaoResult<u32> {
        let byte = *self.data.get(self.pos >> 3).ok_or(TaoError::Eof)?;
        let bit = (byte >> (7 - (self.pos & 7))) & 1;
        self.pos += 1;
        Ok(u32::from(bit))
    }

    /// 读取 N 位 (最多 32 位), 返回值的低 N 位有效
    pub fn read_bits(&mut self, n: u32) -> TaoResult<u32> {
        let v = self.peek_bits(n)?;
        self.pos += n as usize;
        Ok(v)
    }

    /// 预读 N 位 (最多 32 位), 不移动读取位置
    pub fn peek_bits(&self, n: u32) -> TaoResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(TaoError::InvalidArgument(format!("peek_bits: n={n} 超过 32 位")));
        }
        if n as usize > self.bits_left() {
            return Err(TaoError::Eof);
        }
        // 取出覆盖 [pos, pos + n) 的至多 5 个字节
        let first = self.pos >> 3;
        let last = (self.pos + n as usize - 1) >> 3;
        let window = self.data[first..=last]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        let tail = (last + 1) * 8 - (self.pos + n as usize);
        Ok(((window >> tail) & ((1u64 << n) - 1)) as u32)
    }

    /// 跳过 N 位
    pub fn skip_bits(&mut self, n: u32) -> TaoResult<()> {
        if n as usize > self.bits_left() {
            return Err(TaoError::Eof);
        }
        self.pos += n as usize;
        Ok(())
    }

    /// 对齐到下一个字节边界
    pub fn align_to_byte(&mut self) {
        self.pos = (self.pos + 7) & !7;
    }

    /// 当前所在字节的索引
    pub fn byte_position(&self) -> usize {
        self.pos >> 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_across_bytes() {
        let data = [0b1011_0001, 0b0101_0101, 0xFF];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bit().unwrap(), 1);
        assert_eq!(br.read_bits(2).unwrap(), 0b01);
        assert_eq!(br.read_bits(9).unwrap(), 0b1_0001_0101);
        assert_eq!(br.bits_read(), 12);
        assert_eq!(br.bits_left(), 12);
    }

    #[test]
    fn test_read_32_bits_unaligned() {
        let data = [0x0F, 0xF0, 0x0F, 0xF0, 0x0F];
        let mut br = BitReader::new(&data);
        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(32).unwrap(), 0xFF00_FF00);
        assert_eq!(br.read_bits(4).unwrap(), 0xF);
        assert!(br.is_eof());
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0b1011_0001];
        let mut br = BitReader::new(&data);
        assert_eq!(br.peek_bits(4).unwrap(), 0b1011);
        assert_eq!(br.peek_bits(4).unwrap(), 0b1011);
        assert_eq!(br.read_bits(4).unwrap(), 0b1011);
        assert_eq!(br.peek_bits(4).unwrap(), 0b0001);
    }

    #[test]
    fn test_eof_keeps_position() {
        let data = [0xA5];
        let mut br = BitReader::new(&data);
        br.read_bits(6).unwrap();
        assert!(matches!(br.read_bits(3), Err(TaoError::Eof)));
        assert!(matches!(br.skip_bits(3), Err(TaoError::Eof)));
        assert_eq!(br.bits_read(), 6);
        assert_eq!(br.read_bits(2).unwrap(), 0b01);
        assert!(matches!(br.read_bit(), Err(TaoError::Eof)));
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0xFF, 0x5A];
        let mut br = BitReader::new(&data);
        br.align_to_byte();
        assert_eq!(br.byte_position(), 0);
        br.read_bits(3).unwrap();
        br.align_to_byte();
        assert_eq!(br.byte_position(), 1);
        assert_eq!(br.read_bits(8).unwrap(), 0x5A);
    }
}
