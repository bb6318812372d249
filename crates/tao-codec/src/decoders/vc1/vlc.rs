//! VLC 码表资源与解码
//!
//! 码表 (每个符号的码字与码长) 和扫描顺序作为 JSON 资源加载,
//! 校验后编译为不可变的 [`Vc1Tables`], 构造一次后以引用方式传入各解码函数.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tao_core::{BitReader, TaoError, TaoResult};

/// 单个码字: (码字, 码长). 码长为 0 表示该符号不出现.
pub type CodeWord = (u32, u8);

/// AC 系数编码集描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcCodingSetBook {
    /// 按索引的码字, 最后一项为转义码
    pub codes: Vec<CodeWord>,
    /// 每个非转义索引的 (run, level)
    pub run_level: Vec<(u8, u8)>,
    /// 大于等于该索引的码字表示 last 系数
    pub last_index: usize,
}

/// 扫描顺序资源 (自然行优先序)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanBook {
    /// 8x8 扫描: [Inter, Intra 常规, 水平预测, 垂直预测]
    pub zz_8x8: Vec<Vec<u8>>,
    /// Simple/Main 的 8x4 扫描 (32 项)
    pub zz_8x4: Vec<u8>,
    /// Simple/Main 的 4x8 扫描 (32 项)
    pub zz_4x8: Vec<u8>,
    /// 渐进 4x4 扫描 (16 项, 8 列步长)
    pub zz_4x4: Vec<u8>,
    pub adv_progressive_8x4: Vec<u8>,
    pub adv_progressive_4x8: Vec<u8>,
    pub adv_interlaced_8x8: Vec<u8>,
    pub adv_interlaced_8x4: Vec<u8>,
    pub adv_interlaced_4x8: Vec<u8>,
    pub adv_interlaced_4x4: Vec<u8>,
}

/// VC-1 码表资源 (JSON 可序列化)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vc1CodeBooks {
    /// I 帧 CBPCY (64 个符号)
    pub i_cbpcy: Vec<CodeWord>,
    /// P 帧 CBPCY, 4 组
    pub p_cbpcy: Vec<Vec<CodeWord>>,
    /// TTMB, 3 组
    pub ttmb: Vec<Vec<CodeWord>>,
    /// TTBLK, 3 组
    pub ttblk: Vec<Vec<CodeWord>>,
    /// SUBBLKPAT, 3 组
    pub subblkpat: Vec<Vec<CodeWord>>,
    /// 渐进 MV 差分, 4 组
    pub mv_diff: Vec<Vec<CodeWord>>,
    pub bfraction: Vec<CodeWord>,
    pub imode: Vec<CodeWord>,
    pub norm2: Vec<CodeWord>,
    pub norm6: Vec<CodeWord>,
    /// DC 亮度差分, 2 组 (120 个符号, 119 为转义)
    pub dc_luma: Vec<Vec<CodeWord>>,
    /// DC 色度差分, 2 组
    pub dc_chroma: Vec<Vec<CodeWord>>,
    /// AC 编码集, 8 组
    pub ac_coding_sets: Vec<AcCodingSetBook>,
    /// 4MV 块模式, 4 组
    pub fourmv_block_pattern: Vec<Vec<CodeWord>>,
    /// 2MV 块模式, 4 组
    pub twomv_block_pattern: Vec<Vec<CodeWord>>,
    /// 隔行 CBPCY, 8 组 (63 个符号)
    pub interlaced_cbpcy: Vec<Vec<CodeWord>>,
    /// 隔行帧 4MV 宏块模式, 4 组 (15 个符号)
    pub intfr_4mv_mbmode: Vec<Vec<CodeWord>>,
    /// 隔行帧非 4MV 宏块模式, 4 组 (9 个符号)
    pub intfr_non4mv_mbmode: Vec<Vec<CodeWord>>,
    /// 隔行场混合 MV 宏块模式, 8 组 (8 个符号)
    pub if_mmv_mbmode: Vec<Vec<CodeWord>>,
    /// 隔行场 1MV 宏块模式, 8 组 (6 个符号)
    pub if_1mv_mbmode: Vec<Vec<CodeWord>>,
    /// 单参考场 MVDATA, 4 组 (72 个符号)
    pub mvdata_1ref: Vec<Vec<CodeWord>>,
    /// 双参考场 MVDATA, 8 组 (126 个符号)
    pub mvdata_2ref: Vec<Vec<CodeWord>>,
    pub scans: ScanBook,
}

impl Vc1CodeBooks {
    /// 从 JSON 文本解析
    pub fn from_json(text: &str) -> TaoResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| TaoError::InvalidData(format!("VC-1 码表 JSON 解析失败: {e}")))
    }

    /// 从文件加载
    pub fn load(path: &Path) -> TaoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> TaoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| TaoError::InvalidData(format!("VC-1 码表序列化失败: {e}")))
    }
}

// ============================================================
// 二叉树 VLC 解码器
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Empty,
    Branch(u32),
    Leaf(u16),
}

/// 前缀码解码器, 逐位沿二叉树下降
#[derive(Debug, Clone)]
pub struct Vlc {
    nodes: Vec<[Node; 2]>,
    symbols: usize,
}

impl Vlc {
    /// 由 (码字, 码长) 列表构造, 符号即列表索引
    pub fn new(name: &str, codes: &[CodeWord]) -> TaoResult<Self> {
        let mut nodes = vec![[Node::Empty; 2]];
        for (sym, &(code, len)) in codes.iter().enumerate() {
            if len == 0 {
                continue;
            }
            if len > 32 || (len < 32 && code >> len != 0) {
                return Err(TaoError::InvalidData(format!(
                    "VC-1 码表 {name}: 符号 {sym} 码字 {code:#x} 超出码长 {len}"
                )));
            }
            let mut cur = 0usize;
            for i in (0..len).rev() {
                let bit = ((code >> i) & 1) as usize;
                let last = i == 0;
                match nodes[cur][bit] {
                    Node::Empty if last => nodes[cur][bit] = Node::Leaf(sym as u16),
                    Node::Empty => {
                        nodes.push([Node::Empty; 2]);
                        let next = nodes.len() - 1;
                        nodes[cur][bit] = Node::Branch(next as u32);
                        cur = next;
                    }
                    Node::Branch(next) if !last => cur = next as usize,
                    _ => {
                        return Err(TaoError::InvalidData(format!(
                            "VC-1 码表 {name}: 符号 {sym} 与已有码字冲突 (非前缀码)"
                        )));
                    }
                }
            }
        }
        Ok(Self {
            nodes,
            symbols: codes.len(),
        })
    }

    /// 符号总数
    pub fn len(&self) -> usize {
        self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols == 0
    }

    /// 解码一个符号
    pub fn decode(&self, br: &mut BitReader) -> TaoResult<usize> {
        let mut cur = 0usize;
        loop {
            let bit = br.read_bit()? as usize;
            match self.nodes[cur][bit] {
                Node::Leaf(sym) => return Ok(sym as usize),
                Node::Branch(next) => cur = next as usize,
                Node::Empty => {
                    return Err(TaoError::InvalidData("VC-1: 无效 VLC 码字".into()));
                }
            }
        }
    }
}

// ============================================================
// AC 编码集
// ============================================================

/// 编译后的 AC 编码集
#[derive(Debug, Clone)]
pub struct AcCodingSet {
    pub vlc: Vlc,
    pub run_level: Vec<(u8, u8)>,
    pub last_index: usize,
    /// 转义索引 (= 码字个数 - 1)
    pub escape_index: usize,
    /// 非 last 码字中每个 run 的最大 level
    pub delta_level: [u8; 64],
    /// last 码字中每个 run 的最大 level
    pub last_delta_level: [u8; 64],
    /// 非 last 码字中每个 level 的最大 run
    pub delta_run: [u8; 64],
    /// last 码字中每个 level 的最大 run
    pub last_delta_run: [u8; 64],
}

impl AcCodingSet {
    fn new(idx: usize, book: &AcCodingSetBook) -> TaoResult<Self> {
        let name = format!("ac[{idx}]");
        if book.codes.len() < 2 || book.run_level.len() + 1 != book.codes.len() {
            return Err(TaoError::InvalidData(format!(
                "VC-1 码表 {name}: run/level 项数 {} 与码字数 {} 不匹配",
                book.run_level.len(),
                book.codes.len()
            )));
        }
        if book.last_index > book.run_level.len() {
            return Err(TaoError::InvalidData(format!(
                "VC-1 码表 {name}: last_index {} 越界",
                book.last_index
            )));
        }
        let mut set = Self {
            vlc: Vlc::new(&name, &book.codes)?,
            run_level: book.run_level.clone(),
            last_index: book.last_index,
            escape_index: book.codes.len() - 1,
            delta_level: [0; 64],
            last_delta_level: [0; 64],
            delta_run: [0; 64],
            last_delta_run: [0; 64],
        };
        for (i, &(run, level)) in book.run_level.iter().enumerate() {
            let (run, level) = (run as usize, level as usize);
            if run >= 64 || level >= 64 {
                return Err(TaoError::InvalidData(format!(
                    "VC-1 码表 {name}: 索引 {i} 的 run/level 超出范围"
                )));
            }
            let (dl, dr) = if i >= book.last_index {
                (&mut set.last_delta_level, &mut set.last_delta_run)
            } else {
                (&mut set.delta_level, &mut set.delta_run)
            };
            dl[run] = dl[run].max(level as u8);
            dr[level] = dr[level].max(run as u8);
        }
        Ok(set)
    }
}

// ============================================================
// 扫描表
// ============================================================

/// 校验后的扫描顺序
#[derive(Debug, Clone)]
pub struct ScanTables {
    pub zz_8x8: [[u8; 64]; 4],
    pub zz_8x4: [u8; 32],
    pub zz_4x8: [u8; 32],
    pub zz_4x4: [u8; 16],
    pub adv_progressive_8x4: [u8; 32],
    pub adv_progressive_4x8: [u8; 32],
    pub adv_interlaced_8x8: [u8; 64],
    pub adv_interlaced_8x4: [u8; 32],
    pub adv_interlaced_4x8: [u8; 32],
    pub adv_interlaced_4x4: [u8; 16],
}

/// 校验扫描表: 长度正确, 无重复, 位置落在子块区域内
fn scan<const N: usize>(name: &str, src: &[u8], in_area: fn(u8) -> bool) -> TaoResult<[u8; N]> {
    if src.len() != N {
        return Err(TaoError::InvalidData(format!(
            "VC-1 扫描表 {name}: 需要 {N} 项, 实际 {}",
            src.len()
        )));
    }
    let mut seen = [false; 64];
    let mut out = [0u8; N];
    for (i, &pos) in src.iter().enumerate() {
        if pos >= 64 || !in_area(pos) || seen[pos as usize] {
            return Err(TaoError::InvalidData(format!(
                "VC-1 扫描表 {name}: 第 {i} 项位置 {pos} 非法或重复"
            )));
        }
        seen[pos as usize] = true;
        out[i] = pos;
    }
    Ok(out)
}

fn any_pos(_: u8) -> bool {
    true
}

fn top_half(pos: u8) -> bool {
    pos < 32
}

fn left_half(pos: u8) -> bool {
    pos & 7 < 4
}

fn top_left_quarter(pos: u8) -> bool {
    pos < 32 && pos & 7 < 4
}

impl ScanTables {
    fn new(book: &ScanBook) -> TaoResult<Self> {
        if book.zz_8x8.len() != 4 {
            return Err(TaoError::InvalidData("VC-1 扫描表 zz_8x8: 需要 4 组".into()));
        }
        let mut zz_8x8 = [[0u8; 64]; 4];
        for (i, table) in book.zz_8x8.iter().enumerate() {
            zz_8x8[i] = scan::<64>(&format!("zz_8x8[{i}]"), table, any_pos)?;
        }
        Ok(Self {
            zz_8x8,
            zz_8x4: scan("zz_8x4", &book.zz_8x4, top_half)?,
            zz_4x8: scan("zz_4x8", &book.zz_4x8, left_half)?,
            zz_4x4: scan("zz_4x4", &book.zz_4x4, top_left_quarter)?,
            adv_progressive_8x4: scan("adv_progressive_8x4", &book.adv_progressive_8x4, top_half)?,
            adv_progressive_4x8: scan(
                "adv_progressive_4x8",
                &book.adv_progressive_4x8,
                left_half,
            )?,
            adv_interlaced_8x8: scan("adv_interlaced_8x8", &book.adv_interlaced_8x8, any_pos)?,
            adv_interlaced_8x4: scan("adv_interlaced_8x4", &book.adv_interlaced_8x4, top_half)?,
            adv_interlaced_4x8: scan("adv_interlaced_4x8", &book.adv_interlaced_4x8, left_half)?,
            adv_interlaced_4x4: scan(
                "adv_interlaced_4x4",
                &book.adv_interlaced_4x4,
                top_left_quarter,
            )?,
        })
    }
}

// ============================================================
// 不可变码表集合
// ============================================================

/// 编译后的 VC-1 码表集合, 解码期间只读
#[derive(Debug, Clone)]
pub struct Vc1Tables {
    pub i_cbpcy: Vlc,
    pub p_cbpcy: [Vlc; 4],
    pub ttmb: [Vlc; 3],
    pub ttblk: [Vlc; 3],
    pub subblkpat: [Vlc; 3],
    pub mv_diff: [Vlc; 4],
    pub bfraction: Vlc,
    pub imode: Vlc,
    pub norm2: Vlc,
    pub norm6: Vlc,
    pub dc_luma: [Vlc; 2],
    pub dc_chroma: [Vlc; 2],
    pub ac: [AcCodingSet; 8],
    pub fourmv_block_pattern: [Vlc; 4],
    pub twomv_block_pattern: [Vlc; 4],
    pub interlaced_cbpcy: [Vlc; 8],
    pub intfr_4mv_mbmode: [Vlc; 4],
    pub intfr_non4mv_mbmode: [Vlc; 4],
    pub if_mmv_mbmode: [Vlc; 8],
    pub if_1mv_mbmode: [Vlc; 8],
    pub mvdata_1ref: [Vlc; 4],
    pub mvdata_2ref: [Vlc; 8],
    pub scans: ScanTables,
}

fn single(name: &str, codes: &[CodeWord], symbols: usize) -> TaoResult<Vlc> {
    if codes.len() != symbols {
        return Err(TaoError::InvalidData(format!(
            "VC-1 码表 {name}: 需要 {symbols} 个符号, 实际 {}",
            codes.len()
        )));
    }
    Vlc::new(name, codes)
}

fn group<const N: usize>(name: &str, books: &[Vec<CodeWord>], symbols: usize) -> TaoResult<[Vlc; N]> {
    if books.len() != N {
        return Err(TaoError::InvalidData(format!(
            "VC-1 码表 {name}: 需要 {N} 组, 实际 {}",
            books.len()
        )));
    }
    let list = books
        .iter()
        .enumerate()
        .map(|(i, codes)| single(&format!("{name}[{i}]"), codes, symbols))
        .collect::<TaoResult<Vec<_>>>()?;
    list.try_into()
        .map_err(|_| TaoError::InvalidData(format!("VC-1 码表 {name}: 组数不匹配")))
}

impl Vc1Tables {
    /// 校验并编译码表资源
    pub fn build(books: &Vc1CodeBooks) -> TaoResult<Self> {
        if books.ac_coding_sets.len() != 8 {
            return Err(TaoError::InvalidData(format!(
                "VC-1 码表 ac: 需要 8 组, 实际 {}",
                books.ac_coding_sets.len()
            )));
        }
        let ac: [AcCodingSet; 8] = books
            .ac_coding_sets
            .iter()
            .enumerate()
            .map(|(i, b)| AcCodingSet::new(i, b))
            .collect::<TaoResult<Vec<_>>>()?
            .try_into()
            .map_err(|_| TaoError::InvalidData("VC-1 码表 ac: 组数不匹配".into()))?;
        Ok(Self {
            i_cbpcy: single("i_cbpcy", &books.i_cbpcy, 64)?,
            p_cbpcy: group("p_cbpcy", &books.p_cbpcy, 64)?,
            ttmb: group("ttmb", &books.ttmb, 16)?,
            ttblk: group("ttblk", &books.ttblk, 8)?,
            subblkpat: group("subblkpat", &books.subblkpat, 15)?,
            mv_diff: group("mv_diff", &books.mv_diff, 73)?,
            bfraction: single("bfraction", &books.bfraction, 23)?,
            imode: single("imode", &books.imode, 7)?,
            norm2: single("norm2", &books.norm2, 4)?,
            norm6: single("norm6", &books.norm6, 64)?,
            dc_luma: group("dc_luma", &books.dc_luma, 120)?,
            dc_chroma: group("dc_chroma", &books.dc_chroma, 120)?,
            ac,
            fourmv_block_pattern: group("fourmv_block_pattern", &books.fourmv_block_pattern, 16)?,
            twomv_block_pattern: group("twomv_block_pattern", &books.twomv_block_pattern, 4)?,
            interlaced_cbpcy: group("interlaced_cbpcy", &books.interlaced_cbpcy, 63)?,
            intfr_4mv_mbmode: group("intfr_4mv_mbmode", &books.intfr_4mv_mbmode, 15)?,
            intfr_non4mv_mbmode: group("intfr_non4mv_mbmode", &books.intfr_non4mv_mbmode, 9)?,
            if_mmv_mbmode: group("if_mmv_mbmode", &books.if_mmv_mbmode, 8)?,
            if_1mv_mbmode: group("if_1mv_mbmode", &books.if_1mv_mbmode, 6)?,
            mvdata_1ref: group("mvdata_1ref", &books.mvdata_1ref, 72)?,
            mvdata_2ref: group("mvdata_2ref", &books.mvdata_2ref, 126)?,
            scans: ScanTables::new(&books.scans)?,
        })
    }

    /// 从 JSON 文件加载并编译
    pub fn load(path: &Path) -> TaoResult<Self> {
        Self::build(&Vc1CodeBooks::load(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tao_core::BitWriter;

    #[test]
    fn test_vlc_decodes_prefix_code() {
        let vlc = Vlc::new("t", &[(0b0, 1), (0b10, 2), (0b11, 2)]).unwrap();
        assert_eq!(vlc.len(), 3);
        let mut bw = BitWriter::new();
        bw.write_bits(0b0_10_11_0, 6);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let syms: Vec<_> = (0..4).map(|_| vlc.decode(&mut br).unwrap()).collect();
        assert_eq!(syms, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_vlc_rejects_bad_codes() {
        assert!(matches!(
            Vlc::new("t", &[(0b1, 1), (0b10, 2)]),
            Err(TaoError::InvalidData(_))
        ));
        assert!(matches!(Vlc::new("t", &[(4, 2)]), Err(TaoError::InvalidData(_))));
        // 未占用的分支在解码时报错
        let vlc = Vlc::new("t", &[(0b0, 1)]).unwrap();
        let mut br = BitReader::new(&[0x80]);
        assert!(matches!(vlc.decode(&mut br), Err(TaoError::InvalidData(_))));
    }

    #[test]
    fn test_ac_delta_tables_split_by_last() {
        let book = AcCodingSetBook {
            codes: vec![(0, 3), (1, 3), (2, 3), (3, 3), (4, 3)],
            run_level: vec![(0, 1), (0, 2), (1, 1), (0, 1)],
            last_index: 3,
        };
        let set = AcCodingSet::new(0, &book).unwrap();
        assert_eq!(set.escape_index, 4);
        assert_eq!(set.delta_level[0], 2);
        assert_eq!(set.delta_level[1], 1);
        assert_eq!(set.delta_run[1], 1);
        assert_eq!(set.last_delta_level[0], 1);
        assert_eq!(set.last_delta_level[1], 0);

        let short = AcCodingSetBook {
            run_level: vec![(0, 1)],
            ..book
        };
        assert!(AcCodingSet::new(0, &short).is_err());
    }

    #[test]
    fn test_scan_must_be_permutation_of_area() {
        let top: Vec<u8> = (0..32).collect();
        assert!(scan::<32>("t", &top, top_half).is_ok());
        let mut dup = top.clone();
        dup[5] = 4;
        assert!(scan::<32>("t", &dup, top_half).is_err());
        let outside: Vec<u8> = (32..64).collect();
        assert!(scan::<32>("t", &outside, top_half).is_err());
        assert!(scan::<32>("t", &top[..31], top_half).is_err());
    }
}
