use crate::cryptography::keys::scalar_from_canonical_bytes;
use crate::error::ReadError;
use curve25519_dalek::Scalar;
use std::io::{self, Read, Write};

/// Fixed-layout binary encoding used for wire frames.
pub trait Writable {
    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Encode into a fresh buffer. The encoding stops at the first length-prefixed field longer than
    /// [`MAX_FIELD_LEN`]; use [`Writable::write`] where that must surface as an error.
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Err(e) = self.write(&mut buf) {
            log::error!("Encoding a frame failed: {e}");
        }
        buf
    }
}

pub trait Readable: Sized {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError>;
}

pub fn read_array<const N: usize, R: Read>(reader: &mut R, field: &str) -> Result<[u8; N], ReadError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| ReadError::new(field, e.to_string()))?;
    Ok(buf)
}

pub fn read_u8<R: Read>(reader: &mut R, field: &str) -> Result<u8, ReadError> {
    read_array::<1, _>(reader, field).map(|b| b[0])
}

pub fn write_scalar<W: Write>(writer: &mut W, scalar: &Scalar) -> io::Result<()> {
    writer.write_all(scalar.as_bytes())
}

pub fn read_scalar<R: Read>(reader: &mut R, field: &str) -> Result<Scalar, ReadError> {
    let bytes = read_array::<32, _>(reader, field)?;
    scalar_from_canonical_bytes(bytes).map_err(|e| ReadError::new(field, e.to_string()))
}

/// The longest variable-length field a frame can carry.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Writes a `u16` length prefix followed by the bytes. Fields longer than [`MAX_FIELD_LEN`] are refused.
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = u16::try_from(bytes.len()).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "field too long"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(bytes)
}

pub fn read_bytes<R: Read>(reader: &mut R, field: &str) -> Result<Vec<u8>, ReadError> {
    let len = u16::from_le_bytes(read_array::<2, _>(reader, field)?) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(|e| ReadError::new(field, e.to_string()))?;
    Ok(buf)
}
