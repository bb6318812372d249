//! 宏块级比特平面 (跳过, 直接模式, 4MV 类型, AC 预测, 重叠标志等)

use log::trace;
use tao_core::{BitReader, TaoResult};

use super::vlc::Vc1Tables;

/// IMODE 码值
const IMODE_RAW: usize = 0;
const IMODE_NORM2: usize = 1;
const IMODE_DIFF2: usize = 2;
const IMODE_NORM6: usize = 3;
const IMODE_DIFF6: usize = 4;
const IMODE_ROWSKIP: usize = 5;
const IMODE_COLSKIP: usize = 6;

/// 每宏块一位的平面
///
/// `is_raw` 时平面内容不在图像头中, 由宏块层逐个读取.
#[derive(Debug, Clone, Default)]
pub(super) struct Bitplane {
    data: Vec<u8>,
    width: usize,
    height: usize,
    pub is_raw: bool,
}

impl Bitplane {
    pub(super) fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            width,
            height,
            is_raw: false,
        }
    }

    /// 调整尺寸并清零
    pub(super) fn reset(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width * height, 0);
        self.is_raw = false;
    }

    pub(super) fn clear(&mut self) {
        self.data.fill(0);
        self.is_raw = false;
    }

    #[inline]
    pub(super) fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x] != 0
    }

    #[inline]
    pub(super) fn set(&mut self, x: usize, y: usize, v: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = u8::from(v);
        }
    }

    /// 读取平面宏块值: 原始模式下从码流读 1 位并记录
    pub(super) fn read_or_get(&mut self, br: &mut BitReader, x: usize, y: usize) -> TaoResult<bool> {
        if self.is_raw {
            let v = br.read_bit()? != 0;
            self.set(x, y, v);
            Ok(v)
        } else {
            Ok(self.get(x, y))
        }
    }

    fn rowskip(&mut self, br: &mut BitReader, x0: usize, y0: usize, w: usize, h: usize) -> TaoResult<()> {
        for y in y0..y0 + h {
            let coded = br.read_bit()? != 0;
            for x in x0..x0 + w {
                let v = if coded { br.read_bit()? as u8 } else { 0 };
                self.data[y * self.width + x] = v;
            }
        }
        Ok(())
    }

    fn colskip(&mut self, br: &mut BitReader, x0: usize, y0: usize, w: usize, h: usize) -> TaoResult<()> {
        for x in x0..x0 + w {
            let coded = br.read_bit()? != 0;
            for y in y0..y0 + h {
                let v = if coded { br.read_bit()? as u8 } else { 0 };
                self.data[y * self.width + x] = v;
            }
        }
        Ok(())
    }

    /// 解码比特平面头与数据
    pub(super) fn decode(&mut self, br: &mut BitReader, tables: &Vc1Tables) -> TaoResult<()> {
        let invert = br.read_bit()? as u8;
        let imode = tables.imode.decode(br)?;
        let (w, h) = (self.width, self.height);
        self.is_raw = false;
        trace!("VC-1 比特平面: imode={imode}, invert={invert}, {w}x{h}");
        match imode {
            IMODE_RAW => {
                self.is_raw = true;
                return Ok(());
            }
            IMODE_NORM2 | IMODE_DIFF2 => {
                let total = w * h;
                let mut i = 0;
                if total & 1 != 0 {
                    self.data[0] = br.read_bit()? as u8;
                    i = 1;
                }
                // 余下个数为偶数, 两两一组
                while i < total {
                    let code = tables.norm2.decode(br)?;
                    self.data[i] = (code & 1) as u8;
                    self.data[i + 1] = (code >> 1) as u8;
                    i += 2;
                }
            }
            IMODE_NORM6 | IMODE_DIFF6 => {
                if h % 3 == 0 && w % 3 != 0 {
                    // 2x3 (宽 2 高 3) 拼块
                    for y in (0..h).step_by(3) {
                        for x in ((w & 1)..w).step_by(2) {
                            let code = tables.norm6.decode(br)?;
                            for k in 0..6 {
                                let (dx, dy) = (k & 1, k >> 1);
                                self.data[(y + dy) * w + x + dx] = ((code >> k) & 1) as u8;
                            }
                        }
                    }
                    if w & 1 != 0 {
                        self.colskip(br, 0, 0, 1, h)?;
                    }
                } else {
                    // 3x2 拼块
                    for y in ((h & 1)..h).step_by(2) {
                        for x in ((w % 3)..w).step_by(3) {
                            let code = tables.norm6.decode(br)?;
                            for k in 0..6 {
                                let (dx, dy) = (k % 3, k / 3);
                                self.data[(y + dy) * w + x + dx] = ((code >> k) & 1) as u8;
                            }
                        }
                    }
                    let x = w % 3;
                    if x != 0 {
                        self.colskip(br, 0, 0, x, h)?;
                    }
                    if h & 1 != 0 {
                        self.rowskip(br, x, 0, w - x, 1)?;
                    }
                }
            }
            IMODE_ROWSKIP => self.rowskip(br, 0, 0, w, h)?,
            IMODE_COLSKIP => self.colskip(br, 0, 0, w, h)?,
            _ => {}
        }

        if imode == IMODE_DIFF2 || imode == IMODE_DIFF6 {
            self.apply_diff(invert);
        } else if invert != 0 {
            for v in &mut self.data {
                *v ^= 1;
            }
        }
        Ok(())
    }

    /// 差分算子: 依据左邻与上邻恢复原值
    fn apply_diff(&mut self, invert: u8) {
        let w = self.width;
        if w == 0 || self.height == 0 {
            return;
        }
        let d = &mut self.data;
        d[0] ^= invert;
        for x in 1..w {
            d[x] ^= d[x - 1];
        }
        for y in 1..self.height {
            let row = y * w;
            d[row] ^= d[row - w];
            for x in 1..w {
                let p = row + x;
                if d[p - 1] != d[p - w] {
                    d[p] ^= invert;
                } else {
                    d[p] ^= d[p - 1];
                }
            }
        }
    }
}
