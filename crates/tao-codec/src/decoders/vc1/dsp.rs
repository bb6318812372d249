//! VC-1 像素级运算
//!
//! 整数反变换, 重叠平滑, 去块滤波, 亮度/色度插值.
//! 所有函数对切片 + 起始位置 + 行跨度工作, 系数块均为自然行优先布局.

#[inline]
fn clip_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[inline]
fn at(pos: usize, off: isize) -> usize {
    (pos as isize + off) as usize
}

// ============================================================
// 反变换
// ============================================================

/// 8 点一维反变换, 输出未移位
#[inline]
fn idct8(s: [i32; 8], rnd: i32) -> [i32; 8] {
    let t1 = 12 * (s[0] + s[4]) + rnd;
    let t2 = 12 * (s[0] - s[4]) + rnd;
    let t3 = 16 * s[2] + 6 * s[6];
    let t4 = 6 * s[2] - 16 * s[6];
    let (t5, t6, t7, t8) = (t1 + t3, t2 + t4, t2 - t4, t1 - t3);
    let o1 = 16 * s[1] + 15 * s[3] + 9 * s[5] + 4 * s[7];
    let o2 = 15 * s[1] - 4 * s[3] - 16 * s[5] - 9 * s[7];
    let o3 = 9 * s[1] - 16 * s[3] + 4 * s[5] + 15 * s[7];
    let o4 = 4 * s[1] - 9 * s[3] + 15 * s[5] - 16 * s[7];
    [
        t5 + o1,
        t6 + o2,
        t7 + o3,
        t8 + o4,
        t8 - o4,
        t7 - o3,
        t6 - o2,
        t5 - o1,
    ]
}

/// 4 点一维反变换, 输出未移位
#[inline]
fn idct4(s: [i32; 4], rnd: i32) -> [i32; 4] {
    let t1 = 17 * (s[0] + s[2]) + rnd;
    let t2 = 17 * (s[0] - s[2]) + rnd;
    let t3 = 22 * s[1] + 10 * s[3];
    let t4 = 22 * s[3] - 10 * s[1];
    [t1 + t3, t2 - t4, t2 + t4, t1 - t3]
}

fn row8(block: &[i16], base: usize) -> [i32; 8] {
    std::array::from_fn(|k| i32::from(block[base + k]))
}

fn row4(block: &[i16], base: usize) -> [i32; 4] {
    std::array::from_fn(|k| i32::from(block[base + k]))
}

/// 8x8 原位反变换 (行变换后列变换)
pub(super) fn inv_trans_8x8(block: &mut [i16]) {
    let mut tmp = [0i32; 64];
    for r in 0..8 {
        let out = idct8(row8(block, r * 8), 4);
        for k in 0..8 {
            tmp[r * 8 + k] = out[k] >> 3;
        }
    }
    for c in 0..8 {
        let col: [i32; 8] = std::array::from_fn(|k| tmp[k * 8 + c]);
        let out = idct8(col, 64);
        for k in 0..8 {
            let bias = i32::from(k >= 4);
            block[k * 8 + c] = ((out[k] + bias) >> 7) as i16;
        }
    }
}

fn add_dc(dst: &mut [u8], pos: usize, stride: usize, w: usize, h: usize, dc: i32) {
    for j in 0..h {
        let row = pos + j * stride;
        for px in &mut dst[row..row + w] {
            *px = clip_u8(i32::from(*px) + dc);
        }
    }
}

/// 只有 DC 系数的 8x8 反变换, 结果叠加到目标
pub(super) fn inv_trans_8x8_dc(dst: &mut [u8], pos: usize, stride: usize, dc: i16) {
    let dc = (3 * i32::from(dc) + 1) >> 1;
    let dc = (3 * dc + 16) >> 5;
    add_dc(dst, pos, stride, 8, 8, dc);
}

/// 只有 DC 系数的 8x4 (8 宽 4 高) 反变换
pub(super) fn inv_trans_8x4_dc(dst: &mut [u8], pos: usize, stride: usize, dc: i16) {
    let dc = (3 * i32::from(dc) + 1) >> 1;
    let dc = (17 * dc + 64) >> 7;
    add_dc(dst, pos, stride, 8, 4, dc);
}

/// 只有 DC 系数的 4x8 (4 宽 8 高) 反变换
pub(super) fn inv_trans_4x8_dc(dst: &mut [u8], pos: usize, stride: usize, dc: i16) {
    let dc = (17 * i32::from(dc) + 4) >> 3;
    let dc = (12 * dc + 64) >> 7;
    add_dc(dst, pos, stride, 4, 8, dc);
}

/// 只有 DC 系数的 4x4 反变换
pub(super) fn inv_trans_4x4_dc(dst: &mut [u8], pos: usize, stride: usize, dc: i16) {
    let dc = (17 * i32::from(dc) + 4) >> 3;
    let dc = (17 * dc + 64) >> 7;
    add_dc(dst, pos, stride, 4, 4, dc);
}

/// 8x4 反变换并叠加, 系数位于 `block[off..]`, 行跨度 8
pub(super) fn inv_trans_8x4(dst: &mut [u8], pos: usize, stride: usize, block: &[i16], off: usize) {
    let mut tmp = [0i32; 32];
    for r in 0..4 {
        let out = idct8(row8(block, off + r * 8), 4);
        for k in 0..8 {
            tmp[r * 8 + k] = out[k] >> 3;
        }
    }
    for c in 0..8 {
        let out = idct4(std::array::from_fn(|k| tmp[k * 8 + c]), 64);
        for (k, v) in out.iter().enumerate() {
            let p = pos + k * stride + c;
            dst[p] = clip_u8(i32::from(dst[p]) + (v >> 7));
        }
    }
}

/// 4x8 反变换并叠加
pub(super) fn inv_trans_4x8(dst: &mut [u8], pos: usize, stride: usize, block: &[i16], off: usize) {
    let mut tmp = [0i32; 32];
    for r in 0..8 {
        let out = idct4(row4(block, off + r * 8), 4);
        for k in 0..4 {
            tmp[r * 4 + k] = out[k] >> 3;
        }
    }
    for c in 0..4 {
        let out = idct8(std::array::from_fn(|k| tmp[k * 4 + c]), 64);
        for (k, v) in out.iter().enumerate() {
            let bias = i32::from(k >= 4);
            let p = pos + k * stride + c;
            dst[p] = clip_u8(i32::from(dst[p]) + ((v + bias) >> 7));
        }
    }
}

/// 4x4 反变换并叠加
pub(super) fn inv_trans_4x4(dst: &mut [u8], pos: usize, stride: usize, block: &[i16], off: usize) {
    let mut tmp = [0i32; 16];
    for r in 0..4 {
        let out = idct4(row4(block, off + r * 8), 4);
        for k in 0..4 {
            tmp[r * 4 + k] = out[k] >> 3;
        }
    }
    for c in 0..4 {
        let out = idct4(std::array::from_fn(|k| tmp[k * 4 + c]), 64);
        for (k, v) in out.iter().enumerate() {
            let p = pos + k * stride + c;
            dst[p] = clip_u8(i32::from(dst[p]) + (v >> 7));
        }
    }
}

/// 写出 8x8 无符号样本块
pub(super) fn put_pixels_clamped(block: &[i16], dst: &mut [u8], pos: usize, stride: usize) {
    for j in 0..8 {
        for i in 0..8 {
            dst[pos + j * stride + i] = clip_u8(i32::from(block[j * 8 + i]));
        }
    }
}

/// 写出 8x8 有符号样本块 (以 128 为中心)
pub(super) fn put_signed_pixels_clamped(block: &[i16], dst: &mut [u8], pos: usize, stride: usize) {
    for j in 0..8 {
        for i in 0..8 {
            dst[pos + j * stride + i] = clip_u8(i32::from(block[j * 8 + i]) + 128);
        }
    }
}

/// 8x8 残差叠加到预测样本
pub(super) fn add_pixels_clamped(block: &[i16], dst: &mut [u8], pos: usize, stride: usize) {
    for j in 0..8 {
        for i in 0..8 {
            let p = &mut dst[pos + j * stride + i];
            *p = clip_u8(i32::from(*p) + i32::from(block[j * 8 + i]));
        }
    }
}

// ============================================================
// 重叠平滑 (作用于块缓冲)
// ============================================================

/// 跨垂直边界的重叠平滑: 左块第 6/7 列与右块第 0/1 列
///
/// `flags` 位 0 表示逐行交替取整, 位 1 选择起始取整偏移.
pub(super) fn h_s_overlap(
    buf: &mut [i16],
    mut left: usize,
    mut right: usize,
    left_stride: usize,
    right_stride: usize,
    flags: u32,
) {
    let mut rnd1 = if flags & 2 != 0 { 3 } else { 4 };
    let mut rnd2 = 7 - rnd1;
    for _ in 0..8 {
        let a = i32::from(buf[left + 6]);
        let b = i32::from(buf[left + 7]);
        let c = i32::from(buf[right]);
        let d = i32::from(buf[right + 1]);
        let d1 = a - d;
        let d2 = a - d + b - c;
        buf[left + 6] = ((a * 8 - d1 + rnd1) >> 3) as i16;
        buf[left + 7] = ((b * 8 - d2 + rnd2) >> 3) as i16;
        buf[right] = ((c * 8 + d2 + rnd1) >> 3) as i16;
        buf[right + 1] = ((d * 8 + d1 + rnd2) >> 3) as i16;
        left += left_stride;
        right += right_stride;
        if flags & 1 != 0 {
            rnd1 = 7 - rnd1;
            rnd2 = 7 - rnd2;
        }
    }
}

/// 跨水平边界的重叠平滑: 上块第 6/7 行与下块第 0/1 行
pub(super) fn v_s_overlap(buf: &mut [i16], top: usize, bottom: usize) {
    let mut rnd1 = 4;
    let mut rnd2 = 3;
    for i in 0..8 {
        let a = i32::from(buf[top + 48 + i]);
        let b = i32::from(buf[top + 56 + i]);
        let c = i32::from(buf[bottom + i]);
        let d = i32::from(buf[bottom + 8 + i]);
        let d1 = a - d;
        let d2 = a - d + b - c;
        buf[top + 48 + i] = ((a * 8 - d1 + rnd1) >> 3) as i16;
        buf[top + 56 + i] = ((b * 8 - d2 + rnd2) >> 3) as i16;
        buf[bottom + i] = ((c * 8 + d2 + rnd1) >> 3) as i16;
        buf[bottom + 8 + i] = ((d * 8 + d1 + rnd2) >> 3) as i16;
        rnd1 = 7 - rnd1;
        rnd2 = 7 - rnd2;
    }
}

// ============================================================
// 去块滤波
// ============================================================

/// 对一条跨边界的像素线滤波, 返回是否满足滤波条件
fn filter_line(buf: &mut [u8], pos: usize, stride: isize, pq: i32) -> bool {
    let p = |k: isize| i32::from(buf[at(pos, k * stride)]);
    let a0 = (2 * (p(-2) - p(1)) - 5 * (p(-1) - p(0)) + 4) >> 3;
    let a0_sign = a0 >> 31;
    let a0 = a0.abs();
    if a0 >= pq {
        return false;
    }
    let a1 = ((2 * (p(-4) - p(-1)) - 5 * (p(-3) - p(-2)) + 4) >> 3).abs();
    let a2 = ((2 * (p(0) - p(3)) - 5 * (p(1) - p(2)) + 4) >> 3).abs();
    if a1 >= a0 && a2 >= a0 {
        return false;
    }
    let clip = p(-1) - p(0);
    let clip_sign = clip >> 31;
    let clip = clip.abs() >> 1;
    if clip != 0 {
        let d = 5 * (a1.min(a2) - a0);
        let d_sign = (d >> 31) ^ a0_sign;
        let d = d.abs() >> 3;
        if d_sign == clip_sign {
            let d = d.min(clip);
            let d = (d ^ d_sign) - d_sign;
            let (q, r) = (at(pos, -stride), pos);
            buf[q] = clip_u8(i32::from(buf[q]) - d);
            buf[r] = clip_u8(i32::from(buf[r]) + d);
        }
    }
    true
}

/// 每 4 条线先试第 3 条, 满足条件再处理其余 3 条
fn loop_filter(buf: &mut [u8], mut pos: usize, step: usize, stride: isize, len: usize, pq: i32) {
    for _ in (0..len).step_by(4) {
        if filter_line(buf, pos + 2 * step, stride, pq) {
            filter_line(buf, pos, stride, pq);
            filter_line(buf, pos + step, stride, pq);
            filter_line(buf, pos + 3 * step, stride, pq);
        }
        pos += 4 * step;
    }
}

/// 水平边界 (位于 `pos` 行之上) 的去块滤波, 长度 `len` 像素
pub(super) fn v_loop_filter(buf: &mut [u8], pos: usize, stride: usize, len: usize, pq: i32) {
    loop_filter(buf, pos, 1, stride as isize, len, pq);
}

/// 垂直边界 (位于 `pos` 列之左) 的去块滤波, 长度 `len` 行
pub(super) fn h_loop_filter(buf: &mut [u8], pos: usize, stride: usize, len: usize, pq: i32) {
    loop_filter(buf, pos, stride, 1, len, pq);
}

// ============================================================
// 运动补偿插值
// ============================================================

/// 写入方式: 覆盖或与已有预测取平均
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum McOp {
    Put,
    Avg,
}

impl McOp {
    #[inline]
    fn store(self, dst: &mut u8, v: i32) {
        let v = clip_u8(v);
        *dst = match self {
            McOp::Put => v,
            McOp::Avg => ((u32::from(*dst) + u32::from(v) + 1) >> 1) as u8,
        };
    }
}

/// 参考窗口: 连续存放, 原点为目标块左上角对应样本
pub(super) struct Window<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub origin: usize,
}

impl Window<'_> {
    #[inline]
    fn px(&self, x: isize, y: isize) -> i32 {
        i32::from(self.data[at(self.origin, y * self.stride as isize + x)])
    }
}

const MSPEL_TAPS: [[i32; 4]; 4] = [[0, 0, 0, 0], [-4, 53, 18, -3], [-1, 9, 9, -1], [-3, 18, 53, -4]];

#[inline]
fn mspel_taps(mode: usize, s: [i32; 4]) -> i32 {
    let t = MSPEL_TAPS[mode];
    t[0] * s[0] + t[1] * s[1] + t[2] * s[2] + t[3] * s[3]
}

#[inline]
fn mspel_single(mode: usize, s: [i32; 4], r: i32) -> i32 {
    match mode {
        0 => s[1],
        2 => (mspel_taps(2, s) + 8 - r) >> 4,
        _ => (mspel_taps(mode, s) + 32 - r) >> 6,
    }
}

/// 四分之一像素双三次插值, `hmode`/`vmode` 为 MV 低 2 位
#[allow(clippy::too_many_arguments)]
pub(super) fn mspel_mc(
    op: McOp,
    dst: &mut [u8],
    pos: usize,
    stride: usize,
    src: &Window<'_>,
    size: usize,
    hmode: usize,
    vmode: usize,
    rnd: i32,
) {
    let n = size as isize;
    if vmode != 0 && hmode != 0 {
        const SHIFT: [i32; 4] = [0, 5, 1, 5];
        let shift = (SHIFT[hmode] + SHIFT[vmode]) >> 1;
        let r = (1 << (shift - 1)) + rnd - 1;
        let tw = size + 3;
        let mut tmp = vec![0i32; tw * size];
        for j in 0..n {
            for i in 0..tw as isize {
                let x = i - 1;
                let s = [src.px(x, j - 1), src.px(x, j), src.px(x, j + 1), src.px(x, j + 2)];
                tmp[j as usize * tw + i as usize] = (mspel_taps(vmode, s) + r) >> shift;
            }
        }
        let r = 64 - rnd;
        for j in 0..size {
            for i in 0..size {
                let t = &tmp[j * tw + i..j * tw + i + 4];
                let v = (mspel_taps(hmode, [t[0], t[1], t[2], t[3]]) + r) >> 7;
                op.store(&mut dst[pos + j * stride + i], v);
            }
        }
    } else if vmode != 0 {
        let r = 1 - rnd;
        for j in 0..n {
            for i in 0..n {
                let s = [src.px(i, j - 1), src.px(i, j), src.px(i, j + 1), src.px(i, j + 2)];
                let v = mspel_single(vmode, s, r);
                op.store(&mut dst[pos + j as usize * stride + i as usize], v);
            }
        }
    } else {
        for j in 0..n {
            for i in 0..n {
                let s = [src.px(i - 1, j), src.px(i, j), src.px(i + 1, j), src.px(i + 2, j)];
                let v = mspel_single(hmode, s, rnd);
                op.store(&mut dst[pos + j as usize * stride + i as usize], v);
            }
        }
    }
}

/// 半像素双线性插值, `dxy` 位 0 为水平半像素, 位 1 为垂直半像素
///
/// `no_rnd` 时向下取整.
#[allow(clippy::too_many_arguments)]
pub(super) fn hpel_mc(
    op: McOp,
    dst: &mut [u8],
    pos: usize,
    stride: usize,
    src: &Window<'_>,
    size: usize,
    dxy: usize,
    no_rnd: bool,
) {
    let n = size as isize;
    let bias2 = if no_rnd { 0 } else { 1 };
    let bias4 = if no_rnd { 1 } else { 2 };
    for j in 0..n {
        for i in 0..n {
            let v = match dxy {
                0 => src.px(i, j),
                1 => (src.px(i, j) + src.px(i + 1, j) + bias2) >> 1,
                2 => (src.px(i, j) + src.px(i, j + 1) + bias2) >> 1,
                _ => {
                    (src.px(i, j) + src.px(i + 1, j) + src.px(i, j + 1) + src.px(i + 1, j + 1) + bias4)
                        >> 2
                }
            };
            op.store(&mut dst[pos + j as usize * stride + i as usize], v);
        }
    }
}

/// 色度 1/8 像素双线性插值, `no_rnd` 时使用偏小的取整常数
#[allow(clippy::too_many_arguments)]
pub(super) fn chroma_mc(
    op: McOp,
    dst: &mut [u8],
    pos: usize,
    stride: usize,
    src: &Window<'_>,
    size: usize,
    mx: i32,
    my: i32,
    no_rnd: bool,
) {
    let a = (8 - mx) * (8 - my);
    let b = mx * (8 - my);
    let c = (8 - mx) * my;
    let d = mx * my;
    let bias = if no_rnd { 28 } else { 32 };
    let n = size as isize;
    for j in 0..n {
        for i in 0..n {
            let v = (a * src.px(i, j)
                + b * src.px(i + 1, j)
                + c * src.px(i, j + 1)
                + d * src.px(i + 1, j + 1)
                + bias)
                >> 6;
            op.store(&mut dst[pos + j as usize * stride + i as usize], v);
        }
    }
}
