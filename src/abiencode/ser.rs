//! Solidity ABI encoder driven by serde.
//!
//! Serialization happens in two steps. First the value is turned into a
//! [Token] tree by a [serde::Serializer], which only has to know how each Rust
//! shape maps to a Solidity shape:
//!
//! | Rust (serde)                    | Solidity                 |
//! |---------------------------------|--------------------------|
//! | `bool`, integers                | `bool`, `uintN`/`intN`   |
//! | `serialize_bytes` (32-byte)     | `bytes32`, `uint256`, …  |
//! | [DynamicBytes] / `as_bytes`     | `bytes`                  |
//! | `str`                           | `string`                 |
//! | sequences (`Vec<T>`, `&[T]`)    | `T[]`                    |
//! | tuples, fixed arrays, structs   | `(…)`, `T[N]`, `struct`  |
//!
//! Then the tree is written out using the head/tail layout of the ABI spec:
//! static values are written in place, dynamic values are replaced by an
//! offset in the head and appended to the tail.
//!
//! Enums, maps, options, floats and unit types are rejected, see
//! [Error::TypeNotRepresentable].

use super::error::{Error, Result};
use serde::{
    ser::{self, Impossible, SerializeSeq, SerializeStruct, SerializeTuple, SerializeTupleStruct},
    Serialize,
};

pub(super) const SLOT_SIZE: usize = 32; // bytes

/// Newtype struct name used to mark a byte sequence as `bytes`.
///
/// The characters have no special meaning, they have just been chosen in a
/// way that normal Rust types will never have this name.
const MARK_DYNAMIC_BYTES: &str = ":$&_DYNAMIC_BYTES";

/// Wrapper serializing a byte slice as Solidity `bytes`.
///
/// Without it a `&[u8]` is encoded as `uint8[]` (one slot per byte).
/// `serialize_bytes` cannot be used for this because it is already taken by
/// fixed-size values like `bytes32` and `uint256`.
pub struct DynamicBytes<'a>(pub &'a [u8]);

impl<'a> Serialize for DynamicBytes<'a> {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_newtype_struct(MARK_DYNAMIC_BYTES, self.0)
    }
}

/// Intermediate representation of an ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// One or more static slots, already padded to [SLOT_SIZE].
    Static(Vec<u8>),
    /// `bytes` and `string`: length prefix plus padded data.
    Bytes(Vec<u8>),
    /// `T[]`: length prefix plus the elements encoded like a tuple.
    Array(Vec<Token>),
    /// Structs, tuples and `T[N]`. Dynamic if any member is dynamic.
    Tuple(Vec<Token>),
}

impl Token {
    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Static(_) => false,
            Token::Bytes(_) | Token::Array(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
        }
    }

    /// Bytes taken up in the head of the enclosing sequence.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            SLOT_SIZE
        } else {
            match self {
                Token::Static(bytes) => bytes.len(),
                Token::Tuple(items) => items.iter().map(Token::head_size).sum(),
                // Unreachable: both are always dynamic.
                Token::Bytes(_) | Token::Array(_) => SLOT_SIZE,
            }
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Token::Static(bytes) => out.extend_from_slice(bytes),
            Token::Bytes(bytes) => {
                write_usize(out, bytes.len());
                out.extend_from_slice(&pad_right(bytes));
            }
            Token::Array(items) => {
                write_usize(out, items.len());
                encode_sequence(items, out);
            }
            Token::Tuple(items) => encode_sequence(items, out),
        }
    }
}

fn write_usize(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&right_aligned(&value.to_be_bytes()));
}

fn right_aligned(v: &[u8]) -> Vec<u8> {
    let mut slot = vec![0u8; SLOT_SIZE];
    slot[SLOT_SIZE - v.len()..].copy_from_slice(v);
    slot
}

fn signed(negative: bool, v: &[u8]) -> Vec<u8> {
    let filler = if negative { 0xff } else { 0x00 };
    let mut slot = vec![filler; SLOT_SIZE];
    slot[SLOT_SIZE - v.len()..].copy_from_slice(v);
    slot
}

fn pad_right(v: &[u8]) -> Vec<u8> {
    let mut out = v.to_vec();
    let rem = v.len() % SLOT_SIZE;
    if rem != 0 {
        out.resize(v.len() + SLOT_SIZE - rem, 0);
    }
    out
}

/// Head/tail layout shared by tuples, arrays and the outermost value.
fn encode_sequence(items: &[Token], out: &mut Vec<u8>) {
    let head_size: usize = items.iter().map(Token::head_size).sum();
    let mut tail = Vec::new();
    for item in items {
        if item.is_dynamic() {
            // Offsets are relative to the start of this sequence's head.
            write_usize(out, head_size + tail.len());
            item.encode_into(&mut tail);
        } else {
            item.encode_into(out);
        }
    }
    out.extend_from_slice(&tail);
}

/// Convert a value into its [Token] tree.
pub fn to_token<T>(value: &T) -> Result<Token>
where
    T: Serialize + ?Sized,
{
    value.serialize(TokenSerializer)
}

/// Equivalent to Solidity's `abi.encode(value)`.
///
/// Dynamic structs are preceded by their offset (`0x20`), like Solidity does
/// for a single dynamic argument.
pub fn to_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    encode_sequence(&[to_token(value)?], &mut out);
    Ok(out)
}

/// Equivalent to Solidity's `abi.encode(a, b, …)` for a Rust tuple or struct
/// holding the arguments: the members are encoded as a parameter list without
/// the outer offset.
pub fn to_args_bytes<T>(args: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    match to_token(args)? {
        Token::Tuple(items) => encode_sequence(&items, &mut out),
        token => encode_sequence(&[token], &mut out),
    }
    Ok(out)
}

struct TokenSerializer;

/// Collects the members of a sequence, tuple or struct.
pub struct SeqBuilder {
    items: Vec<Token>,
    array: bool,
}

impl SeqBuilder {
    fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(TokenSerializer)?);
        Ok(())
    }

    fn finish(self) -> Token {
        if self.array {
            Token::Array(self.items)
        } else {
            Token::Tuple(self.items)
        }
    }
}

impl ser::Serializer for TokenSerializer {
    type Ok = Token;
    type Error = Error;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = Impossible<Token, Error>;
    type SerializeMap = Impossible<Token, Error>;
    type SerializeStruct = SeqBuilder;
    type SerializeStructVariant = Impossible<Token, Error>;

    fn serialize_bool(self, v: bool) -> Result<Token> {
        self.serialize_u8(v as u8)
    }

    fn serialize_i8(self, v: i8) -> Result<Token> {
        Ok(Token::Static(signed(v < 0, &v.to_be_bytes())))
    }

    fn serialize_i16(self, v: i16) -> Result<Token> {
        Ok(Token::Static(signed(v < 0, &v.to_be_bytes())))
    }

    fn serialize_i32(self, v: i32) -> Result<Token> {
        Ok(Token::Static(signed(v < 0, &v.to_be_bytes())))
    }

    fn serialize_i64(self, v: i64) -> Result<Token> {
        Ok(Token::Static(signed(v < 0, &v.to_be_bytes())))
    }

    fn serialize_i128(self, v: i128) -> Result<Token> {
        Ok(Token::Static(signed(v < 0, &v.to_be_bytes())))
    }

    fn serialize_u8(self, v: u8) -> Result<Token> {
        Ok(Token::Static(right_aligned(&v.to_be_bytes())))
    }

    fn serialize_u16(self, v: u16) -> Result<Token> {
        Ok(Token::Static(right_aligned(&v.to_be_bytes())))
    }

    fn serialize_u32(self, v: u32) -> Result<Token> {
        Ok(Token::Static(right_aligned(&v.to_be_bytes())))
    }

    fn serialize_u64(self, v: u64) -> Result<Token> {
        Ok(Token::Static(right_aligned(&v.to_be_bytes())))
    }

    fn serialize_u128(self, v: u128) -> Result<Token> {
        Ok(Token::Static(right_aligned(&v.to_be_bytes())))
    }

    fn serialize_f32(self, _: f32) -> Result<Token> {
        Err(Error::TypeNotRepresentable("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<Token> {
        Err(Error::TypeNotRepresentable("f64"))
    }

    fn serialize_char(self, _: char) -> Result<Token> {
        Err(Error::TypeNotYetSupported("char"))
    }

    fn serialize_str(self, v: &str) -> Result<Token> {
        // string and bytes share the same encoding.
        Ok(Token::Bytes(v.as_bytes().to_vec()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Token> {
        // Fixed-size data (bytesN, uint256, address, ...). Anything longer than
        // one slot (e.g. a 65 byte signature) spans multiple static slots.
        Ok(Token::Static(pad_right(v)))
    }

    fn serialize_none(self) -> Result<Token> {
        Err(Error::TypeNotRepresentable("none"))
    }

    fn serialize_some<T: ?Sized>(self, _: &T) -> Result<Token>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("some"))
    }

    fn serialize_unit(self) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit struct"))
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit variant (enum)"))
    }

    fn serialize_newtype_struct<T: ?Sized>(self, name: &'static str, value: &T) -> Result<Token>
    where
        T: Serialize,
    {
        let token = value.serialize(TokenSerializer)?;
        if name != MARK_DYNAMIC_BYTES {
            return Ok(token);
        }

        // The marked value is a sequence of u8, each of which was written as
        // one right-aligned slot.
        match token {
            Token::Array(items) | Token::Tuple(items) => items
                .into_iter()
                .map(|item| match item {
                    Token::Static(slot) if slot.len() == SLOT_SIZE => Ok(slot[SLOT_SIZE - 1]),
                    _ => Err(Error::TypeNotRepresentable("non-u8 element in bytes")),
                })
                .collect::<Result<Vec<u8>>>()
                .map(Token::Bytes),
            _ => Err(Error::TypeNotRepresentable("bytes must wrap a sequence")),
        }
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Token>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("newtype variant (enum)"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
            array: true,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len),
            array: false,
        })
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder> {
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_struct(self, _: &'static str, len: usize) -> Result<SeqBuilder> {
        self.serialize_tuple(len)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }
}

impl SerializeSeq for SeqBuilder {
    type Ok = Token;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

impl SerializeTuple for SeqBuilder {
    type Ok = Token;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

impl SerializeTupleStruct for SeqBuilder {
    type Ok = Token;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

impl SerializeStruct for SeqBuilder {
    type Ok = Token;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}
