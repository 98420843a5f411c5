//! Wire messages exchanged between the two parties of a swap.
//!
//! Each message is one frame: a tag byte followed by fixed-length fields. Points, scalars and escrow ids take 32 bytes,
//! signatures 64, and account addresses carry a 2-byte little-endian length prefix. The order in which messages are
//! sent is fixed:
//!
//! | # | From      | Message              |
//! |---|-----------|----------------------|
//! | 1 | Initiator | `Hello`              |
//! | 2 | Responder | `Hello`              |
//! | 3 | Initiator | `InitiatorKeys`      |
//! | 4 | Responder | `ResponderKeys`      |
//! | 5 | Initiator | `EscrowCreated`      |
//! | 6 | Responder | `EscrowCreated`      |
//! | 7 | Initiator | `PartialSignatures`  |
//! | 8 | Responder | `PreSignature`       |
//! | 9 | Initiator | `CompletedSignature` |
//!
//! Either side may send `Abort` in place of its next message.

use crate::cryptography::adapter_signature::{PartialSignature, PreSignature};
use crate::cryptography::keys::Curve25519PublicKey;
use crate::cryptography::pok::SchnorrPoK;
use crate::cryptography::schnorr::Signature;
use crate::error::ReadError;
use crate::ledger::{AccountAddress, EscrowReference};
use crate::swap_protocol::utils::{read_bytes, read_u8, write_bytes, Readable, Writable};
use std::fmt;
use std::io::{Read, Write};

pub const PROTOCOL_VERSION: u8 = 1;

const TAG_HELLO: u8 = 1;
const TAG_INITIATOR_KEYS: u8 = 2;
const TAG_RESPONDER_KEYS: u8 = 3;
const TAG_ESCROW_CREATED: u8 = 4;
const TAG_PARTIAL_SIGNATURES: u8 = 5;
const TAG_PRE_SIGNATURE: u8 = 6;
const TAG_COMPLETED_SIGNATURE: u8 = 7;
const TAG_ABORT: u8 = 0xff;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hello {
    pub version: u8,
    /// The ledger account the sender will claim with. It is bound into the message the sender's claim signature signs.
    pub address: AccountAddress,
}

/// A public point together with a proof that the sender knows its discrete log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvenPoint {
    pub point: Curve25519PublicKey,
    pub proof: SchnorrPoK,
}

/// The public half of one party's key material for one leg.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegKeys {
    pub signing: ProvenPoint,
    pub nonce: ProvenPoint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitiatorKeys {
    pub leg1: LegKeys,
    pub leg2: LegKeys,
    /// `T = t·G`.
    pub adaptor: ProvenPoint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponderKeys {
    pub leg1: LegKeys,
    pub leg2: LegKeys,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwapMessage {
    Hello(Hello),
    InitiatorKeys(InitiatorKeys),
    ResponderKeys(ResponderKeys),
    /// The sender's escrow is active on the ledger under this id.
    EscrowCreated(EscrowReference),
    /// The initiator's shares `ra_i + c_i·a_i` for both legs.
    PartialSignatures { leg1: PartialSignature, leg2: PartialSignature },
    /// The responder's combined leg 1 pre-signature `s'1`.
    PreSignature(PreSignature),
    /// The initiator's completed leg 1 claim signature. Also visible on the ledger once used.
    CompletedSignature(Signature),
    Abort { reason: String },
}

impl SwapMessage {
    pub fn name(&self) -> &'static str {
        match self {
            SwapMessage::Hello(_) => "Hello",
            SwapMessage::InitiatorKeys(_) => "InitiatorKeys",
            SwapMessage::ResponderKeys(_) => "ResponderKeys",
            SwapMessage::EscrowCreated(_) => "EscrowCreated",
            SwapMessage::PartialSignatures { .. } => "PartialSignatures",
            SwapMessage::PreSignature(_) => "PreSignature",
            SwapMessage::CompletedSignature(_) => "CompletedSignature",
            SwapMessage::Abort { .. } => "Abort",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            SwapMessage::Hello(_) => TAG_HELLO,
            SwapMessage::InitiatorKeys(_) => TAG_INITIATOR_KEYS,
            SwapMessage::ResponderKeys(_) => TAG_RESPONDER_KEYS,
            SwapMessage::EscrowCreated(_) => TAG_ESCROW_CREATED,
            SwapMessage::PartialSignatures { .. } => TAG_PARTIAL_SIGNATURES,
            SwapMessage::PreSignature(_) => TAG_PRE_SIGNATURE,
            SwapMessage::CompletedSignature(_) => TAG_COMPLETED_SIGNATURE,
            SwapMessage::Abort { .. } => TAG_ABORT,
        }
    }

    /// Decode a complete frame. Trailing bytes are an error.
    pub fn decode(frame: &[u8]) -> Result<Self, ReadError> {
        let mut reader = frame;
        let message = Self::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(ReadError::new(message.name(), format!("{} unexpected trailing bytes", reader.len())));
        }
        Ok(message)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn from_hex(hex: &str) -> Result<Self, ReadError> {
        let frame = hex::decode(hex).map_err(|e| ReadError::new("SwapMessage", format!("Invalid hex string: {e}")))?;
        Self::decode(&frame)
    }
}

impl fmt::Display for SwapMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Writable for ProvenPoint {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.point.write(writer)?;
        self.proof.write(writer)
    }
}

impl Readable for ProvenPoint {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        let point = Curve25519PublicKey::read(reader)?;
        let proof = SchnorrPoK::read(reader)?;
        Ok(Self { point, proof })
    }
}

impl Writable for LegKeys {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.signing.write(writer)?;
        self.nonce.write(writer)
    }
}

impl Readable for LegKeys {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        let signing = ProvenPoint::read(reader)?;
        let nonce = ProvenPoint::read(reader)?;
        Ok(Self { signing, nonce })
    }
}

impl Writable for SwapMessage {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&[self.tag()])?;
        match self {
            SwapMessage::Hello(hello) => {
                writer.write_all(&[hello.version])?;
                hello.address.write(writer)
            }
            SwapMessage::InitiatorKeys(keys) => {
                keys.leg1.write(writer)?;
                keys.leg2.write(writer)?;
                keys.adaptor.write(writer)
            }
            SwapMessage::ResponderKeys(keys) => {
                keys.leg1.write(writer)?;
                keys.leg2.write(writer)
            }
            SwapMessage::EscrowCreated(id) => id.write(writer),
            SwapMessage::PartialSignatures { leg1, leg2 } => {
                leg1.write(writer)?;
                leg2.write(writer)
            }
            SwapMessage::PreSignature(pre) => pre.write(writer),
            SwapMessage::CompletedSignature(sig) => sig.write(writer),
            SwapMessage::Abort { reason } => write_bytes(writer, reason.as_bytes()),
        }
    }
}

impl Readable for SwapMessage {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        let tag = read_u8(reader, "SwapMessage.tag")?;
        let message = match tag {
            TAG_HELLO => {
                let version = read_u8(reader, "Hello.version")?;
                let address = AccountAddress::read(reader)?;
                SwapMessage::Hello(Hello { version, address })
            }
            TAG_INITIATOR_KEYS => {
                let leg1 = LegKeys::read(reader)?;
                let leg2 = LegKeys::read(reader)?;
                let adaptor = ProvenPoint::read(reader)?;
                SwapMessage::InitiatorKeys(InitiatorKeys { leg1, leg2, adaptor })
            }
            TAG_RESPONDER_KEYS => {
                let leg1 = LegKeys::read(reader)?;
                let leg2 = LegKeys::read(reader)?;
                SwapMessage::ResponderKeys(ResponderKeys { leg1, leg2 })
            }
            TAG_ESCROW_CREATED => SwapMessage::EscrowCreated(EscrowReference::read(reader)?),
            TAG_PARTIAL_SIGNATURES => {
                let leg1 = PartialSignature::read(reader)?;
                let leg2 = PartialSignature::read(reader)?;
                SwapMessage::PartialSignatures { leg1, leg2 }
            }
            TAG_PRE_SIGNATURE => SwapMessage::PreSignature(PreSignature::read(reader)?),
            TAG_COMPLETED_SIGNATURE => SwapMessage::CompletedSignature(Signature::read(reader)?),
            TAG_ABORT => {
                let bytes = read_bytes(reader, "Abort.reason")?;
                let reason = String::from_utf8(bytes).map_err(|e| ReadError::new("Abort.reason", e.to_string()))?;
                SwapMessage::Abort { reason }
            }
            other => return Err(ReadError::new("SwapMessage.tag", format!("Unknown message tag {other}"))),
        };
        Ok(message)
    }
}
