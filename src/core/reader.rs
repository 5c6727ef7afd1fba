//! 顺序二进制读取器
//!
//! 所有链上布局都按字段顺序小端序写入，因此读取器只前进、不回退。
//! 越界读取一律返回 [`DecodeError::OutOfBounds`]，不会返回部分结果。

use solana_sdk::pubkey::Pubkey;

use crate::core::error::{DecodeError, DecodeResult};

#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryReader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// 剩余未读字节数
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }

    /// 未读部分（不移动游标）
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    #[inline]
    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(DecodeError::OutOfBounds { needed: n, remaining: self.remaining() });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    #[inline]
    fn take_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    #[inline]
    pub fn skip(&mut self, n: usize) -> DecodeResult<()> {
        self.take(n).map(|_| ())
    }

    #[inline]
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    #[inline]
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    #[inline]
    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    #[inline]
    pub fn read_u128(&mut self) -> DecodeResult<u128> {
        self.take_array().map(u128::from_le_bytes)
    }

    #[inline]
    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        self.take_array().map(i64::from_le_bytes)
    }

    #[inline]
    pub fn read_pubkey(&mut self) -> DecodeResult<Pubkey> {
        self.take_array::<32>().map(Pubkey::new_from_array)
    }

    /// 读取定长字节块
    #[inline]
    pub fn read_fixed_array(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        self.take(n)
    }

    /// u32 长度前缀 + UTF-8 内容
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}
