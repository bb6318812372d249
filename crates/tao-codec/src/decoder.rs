//! 解码器 trait 定义.

use tao_core::TaoResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::Frame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. `open()` 传入流参数 (扩展数据, 显示尺寸)
/// 2. `send_packet()` 送入压缩数据, `receive_frame()` 取帧直到 `NeedMoreData`
/// 3. 送入空包以取出解码器中延迟输出的帧
pub trait Decoder: Send {
    /// 解码器标识
    fn codec_id(&self) -> CodecId;

    /// 解码器名称
    fn name(&self) -> &str;

    /// 使用流参数配置解码器
    fn open(&mut self, params: &CodecParameters) -> TaoResult<()>;

    /// 送入一个压缩数据包, 空包表示刷新
    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()>;

    /// 取出一帧, 队列为空时返回 `TaoError::NeedMoreData`
    fn receive_frame(&mut self) -> TaoResult<Frame>;

    /// 丢弃参考帧与待输出帧, 用于 seek
    fn flush(&mut self);
}
