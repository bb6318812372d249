//! 通用位语法辅助函数

use tao_core::{BitReader, TaoResult};

/// 读取截断一元码: 遇到 `stop` 位或读满 `max` 位为止, 返回非 stop 位个数
pub(super) fn read_unary_limited(br: &mut BitReader, stop: u32, max: u32) -> TaoResult<u32> {
    let mut n = 0;
    while n < max && br.read_bit()? != stop {
        n += 1;
    }
    Ok(n)
}

/// 0 -> 0, 10 -> 1, 11 -> 2
pub(super) fn decode012(br: &mut BitReader) -> TaoResult<u32> {
    if br.read_bit()? == 0 {
        return Ok(0);
    }
    Ok(br.read_bit()? + 1)
}

/// 1 -> 0, 01 -> 1, 00 -> 2
pub(super) fn decode210(br: &mut BitReader) -> TaoResult<u32> {
    if br.read_bit()? == 1 {
        return Ok(0);
    }
    Ok(2 - br.read_bit()?)
}

/// 读取单个标志位
pub(super) fn read_flag(br: &mut BitReader) -> TaoResult<bool> {
    Ok(br.read_bit()? != 0)
}

/// 读取 n 位, n 为 0 时返回 0
pub(super) fn read_bits_or_zero(br: &mut BitReader, n: u32) -> TaoResult<u32> {
    if n == 0 { Ok(0) } else { br.read_bits(n) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tao_core::BitWriter;

    fn reader_bits(bits: &[(u32, u32)]) -> Vec<u8> {
        let mut bw = BitWriter::new();
        for &(v, n) in bits {
            bw.write_bits(v, n);
        }
        bw.finish()
    }

    #[test]
    fn test_decode012_and_decode210() {
        let data = reader_bits(&[(0b0, 1), (0b10, 2), (0b11, 2), (0b1, 1), (0b01, 2), (0b00, 2)]);
        let mut br = BitReader::new(&data);
        assert_eq!(decode012(&mut br).unwrap(), 0);
        assert_eq!(decode012(&mut br).unwrap(), 1);
        assert_eq!(decode012(&mut br).unwrap(), 2);
        assert_eq!(decode210(&mut br).unwrap(), 0);
        assert_eq!(decode210(&mut br).unwrap(), 1);
        assert_eq!(decode210(&mut br).unwrap(), 2);
        assert_eq!(br.bits_read(), 10);
    }

    #[test]
    fn test_unary_stops_at_limit() {
        // 图像类型: 110 -> 2, 1111 读满 4 位后停止
        let data = reader_bits(&[(0b110, 3), (0b1111, 4), (0b1, 1)]);
        let mut br = BitReader::new(&data);
        assert_eq!(read_unary_limited(&mut br, 0, 4).unwrap(), 2);
        assert_eq!(read_unary_limited(&mut br, 0, 4).unwrap(), 4);
        assert_eq!(br.bits_read(), 7);
        assert_eq!(read_bits_or_zero(&mut br, 0).unwrap(), 0);
        assert!(read_flag(&mut br).unwrap());
    }
}
