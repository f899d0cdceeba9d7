//! Length-prefixed binary framing used by every document crossing the
//! daemon boundary.
//!
//! # Layout
//!
//! ```text
//! ┌────────────┬─────────┬──────────────────────────────┐
//! │ magic (4B) │ version │ body (u8 / u32 / blobs / ...) │
//! └────────────┴─────────┴──────────────────────────────┘
//! ```
//!
//! Integers are big-endian. Strings and blobs carry a `u32` length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{FetchError, Result};
use crate::value::EncodedValue;

pub const FORMAT_VERSION: u8 = 1;

pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Starts a document with `magic` and the current format version.
    pub fn new(magic: &[u8; 4]) -> Self {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(magic);
        buf.put_u8(FORMAT_VERSION);
        Self { buf }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn put_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| FetchError::wire(format!("length {len} exceeds u32 range")))?;
        self.buf.put_u32(len);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_len(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn put_str(&mut self, value: &str) -> Result<()> {
        self.put_bytes(value.as_bytes())
    }

    pub fn put_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value).map_err(|source| FetchError::Serialization {
            type_tag: std::any::type_name::<T>().to_string(),
            source,
        })?;
        self.put_bytes(&json)
    }

    pub fn put_encoded(&mut self, value: &EncodedValue) -> Result<()> {
        self.put_str(value.tag())?;
        self.put_bytes(value.bytes())
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

pub struct WireReader {
    buf: Bytes,
}

impl WireReader {
    /// Opens a document, validating magic and format version.
    pub fn new(data: Bytes, magic: &[u8; 4]) -> Result<Self> {
        let mut reader = Self { buf: data };
        reader.require(5, "document header")?;
        let found = reader.buf.split_to(4);
        if found[..] != magic[..] {
            return Err(FetchError::wire(format!(
                "expected magic {:?}, found {:?}",
                String::from_utf8_lossy(magic),
                String::from_utf8_lossy(&found)
            )));
        }
        let version = reader.buf.get_u8();
        if version != FORMAT_VERSION {
            return Err(FetchError::wire(format!(
                "unsupported format version {version}"
            )));
        }
        Ok(reader)
    }

    fn require(&self, len: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < len {
            return Err(FetchError::wire(format!(
                "truncated {what}: need {len} bytes, {} left",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.require(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.require(4, "u32")?;
        Ok(self.buf.get_u32())
    }

    pub fn get_len(&mut self) -> Result<usize> {
        Ok(self.get_u32()? as usize)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FetchError::wire(format!("invalid bool byte {other}"))),
        }
    }

    pub fn get_bytes(&mut self) -> Result<Bytes> {
        let len = self.get_len()?;
        self.require(len, "blob")?;
        Ok(self.buf.split_to(len))
    }

    pub fn get_str(&mut self) -> Result<String> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| FetchError::wire(format!("invalid UTF-8 string: {err}")))
    }

    pub fn get_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.get_bytes()?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Deserialization {
            type_tag: std::any::type_name::<T>().to_string(),
            source,
        })
    }

    pub fn get_encoded(&mut self) -> Result<EncodedValue> {
        let tag = self.get_str()?;
        let bytes = self.get_bytes()?;
        Ok(EncodedValue::new(tag, bytes))
    }

    /// Fails if unread bytes remain.
    pub fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(FetchError::wire(format!(
                "{} trailing bytes after document",
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}
