use std::{borrow::Cow, fmt::Display};

use bytes::BufMut;
use itertools::Itertools as _;

use crate::errors::FormatError;

pub trait FromFixedBytes: Sized {
    const SIZE: usize;
    fn parse<B: bytes::Buf>(bytes: B) -> Self;
}

macro_rules! impl_fixed_bytes_for_num {
    ($($num:ty),*) => {
        $(
            impl FromFixedBytes for $num {
                const SIZE: usize = std::mem::size_of::<$num>();

                fn parse<B: bytes::Buf>(bytes: B) -> Self {
                    let mut byte_array = [0u8; <Self as FromFixedBytes>::SIZE];
                    (&mut byte_array[..]).put(bytes);
                    Self::from_le_bytes(byte_array)
                }
            }
        )*
    };
}

impl_fixed_bytes_for_num!(i8, i16, i32, i64);
impl_fixed_bytes_for_num!(u8, u16, u32, u64);
impl_fixed_bytes_for_num!(f32, f64);

macro_rules! impl_read_num {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, context: &str) -> Result<$ty> {
            self.read_value::<$ty>(context)
        }
    };
}

pub type Result<T> = std::result::Result<T, FormatError>;

/// One level of nesting in a decoded structure, used to describe where a
/// decoding error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    name: &'static str,
    index: Option<usize>,
}

impl Scope {
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self { name, index: None }
    }

    #[must_use]
    pub fn record(name: &'static str, index: usize) -> Self {
        Self {
            name,
            index: Some(index),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.name, index),
            None => f.write_str(self.name),
        }
    }
}

pub trait MemReader {
    #[must_use]
    fn tell(&self) -> usize;

    #[must_use]
    fn data_size(&self) -> usize;

    /// Fails with [`FormatError::NotEnoughData`] unless `len` more bytes can
    /// be read.
    fn ensure_available(&self, context: &str, len: usize) -> Result<()>;

    fn read_exact(&mut self, context: &str, buf: &mut [u8]) -> Result<()>;

    fn push_scope(&mut self, scope: Scope);

    fn pop_scope(&mut self);

    /// Create a [`FormatError::InvalidData`] located at the current position.
    fn invalid_data<'a, Msg>(&self, message: Msg) -> FormatError
    where
        Msg: Into<Cow<'a, str>>;

    #[must_use]
    fn remaining(&self) -> usize {
        self.data_size() - self.tell()
    }

    #[must_use]
    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Runs `body` with an extra scope naming the record being decoded.
    fn in_record<T, F>(&mut self, name: &'static str, index: usize, body: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.push_scope(Scope::record(name, index));
        let result = body(self);
        self.pop_scope();
        result
    }

    fn read_value<T: FromFixedBytes>(&mut self, context: &str) -> Result<T> {
        let mut const_buf = [0u8; 16];
        let mut dyn_buf = Vec::new();

        let buf = if T::SIZE <= const_buf.len() {
            &mut const_buf[..T::SIZE]
        } else {
            dyn_buf.resize(T::SIZE, 0);
            &mut dyn_buf[..]
        };
        self.read_exact(context, buf)?;
        Ok(T::parse(&buf[..]))
    }

    /// Reads `count` values. The whole run is checked up front, so a corrupt
    /// count fails before anything is allocated.
    fn read_values<T: FromFixedBytes>(&mut self, context: &str, count: usize) -> Result<Vec<T>> {
        self.ensure_available(context, count.saturating_mul(T::SIZE))?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_value(context)?);
        }
        Ok(values)
    }

    fn read_bytes(&mut self, context: &str, len: usize) -> Result<Vec<u8>> {
        self.ensure_available(context, len)?;
        let mut buf = vec![0; len];
        self.read_exact(context, &mut buf)?;
        Ok(buf)
    }

    /// Reads a NUL-terminated string. The terminator is consumed but not
    /// returned.
    fn read_cstr(&mut self, context: &str) -> Result<Vec<u8>> {
        let mut text = Vec::new();
        loop {
            if self.is_empty() {
                return Err(self.invalid_data(format!("unterminated string in {context}")));
            }
            let ch = self.read_u8(context)?;
            if ch == 0 {
                return Ok(text);
            }
            text.push(ch);
        }
    }

    impl_read_num!(read_u8, u8);
    impl_read_num!(read_u16_le, u16);
    impl_read_num!(read_u32_le, u32);
    impl_read_num!(read_f32_le, f32);
}

/// A [`MemReader`] over an in-memory byte slice.
///
/// Positions reported in errors are absolute offsets into the buffer the
/// root reader was created from, also for sub-readers.
#[derive(Debug, Clone)]
pub struct BufferMemReader<'a> {
    data: &'a [u8],
    base: usize,
    position: usize,
    scopes: Vec<Scope>,
}

impl<'a> BufferMemReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            base: 0,
            position: 0,
            scopes: Vec::new(),
        }
    }

    /// Splits off a reader over the next `len` bytes and advances past them.
    pub fn read_to_subreader(&mut self, name: &'static str, len: usize) -> Result<Self> {
        self.ensure_available(name, len)?;
        let data: &'a [u8] = self.data;
        let start = self.position;
        self.position += len;
        let mut scopes = self.scopes.clone();
        scopes.push(Scope::named(name));
        Ok(BufferMemReader {
            data: &data[start..start + len],
            base: self.base + start,
            position: 0,
            scopes,
        })
    }

    fn describe(&self, context: &str) -> String {
        if self.scopes.is_empty() {
            context.to_string()
        } else if context.is_empty() {
            self.scopes.iter().join(".")
        } else {
            format!("{}.{}", self.scopes.iter().join("."), context)
        }
    }

    fn not_enough_data(&self, context: &str, required: usize) -> FormatError {
        FormatError::NotEnoughData {
            context: self.describe(context),
            position: self.base + self.position,
            required,
            available: self.remaining(),
        }
    }
}

impl MemReader for BufferMemReader<'_> {
    fn tell(&self) -> usize {
        self.position
    }

    fn data_size(&self) -> usize {
        self.data.len()
    }

    fn ensure_available(&self, context: &str, len: usize) -> Result<()> {
        if self.remaining() < len {
            return Err(self.not_enough_data(context, len));
        }
        Ok(())
    }

    fn read_exact(&mut self, context: &str, buf: &mut [u8]) -> Result<()> {
        self.ensure_available(context, buf.len())?;
        let end = self.position + buf.len();
        buf.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(())
    }

    fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn invalid_data<'a, Msg>(&self, message: Msg) -> FormatError
    where
        Msg: Into<Cow<'a, str>>,
    {
        FormatError::InvalidData {
            context: if self.scopes.is_empty() {
                "file".to_string()
            } else {
                self.describe("")
            },
            position: self.base + self.position,
            message: message.into().into_owned(),
        }
    }
}
