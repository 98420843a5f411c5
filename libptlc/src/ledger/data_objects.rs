use crate::cryptography::keys::Curve25519PublicKey;
use crate::cryptography::schnorr::{verify, Signature};
use crate::error::ReadError;
use crate::helpers::Timestamp;
use crate::swap_protocol::utils::{read_array, read_bytes, write_bytes, Readable, Writable};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt::{Debug, Display, Formatter};
use std::io::{Read, Write};

/// The opaque identifier the ledger hands back when an escrow is created.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowReference(
    #[serde(serialize_with = "crate::helpers::to_hex", deserialize_with = "crate::helpers::array_from_hex")]
    [u8; 32],
);

impl EscrowReference {
    pub fn new(id: [u8; 32]) -> Self {
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut id = [0u8; 32];
        hex::decode_to_slice(hex, &mut id)?;
        Ok(Self(id))
    }
}

impl Display for EscrowReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Debug for EscrowReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowReference({})", self.as_hex())
    }
}

impl Writable for EscrowReference {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl Readable for EscrowReference {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        read_array::<32, _>(reader, "EscrowReference").map(Self)
    }
}

/// A ledger account. Only ever used as opaque bytes by the swap protocol.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountAddress(
    #[serde(serialize_with = "crate::helpers::to_hex", deserialize_with = "crate::helpers::from_hex")] Vec<u8>,
);

impl AccountAddress {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The address a ledger account with this public key is known by: the first 20 bytes of `SHA3-256(key)`.
    pub fn from_public_key(key: &Curve25519PublicKey) -> Self {
        let digest = Sha3_256::digest(key.as_bytes());
        Self(digest[..20].to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Display for AccountAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Debug for AccountAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountAddress({})", self.as_hex())
    }
}

impl Writable for AccountAddress {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_bytes(writer, &self.0)
    }
}

impl Readable for AccountAddress {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        let bytes = read_bytes(reader, "AccountAddress")?;
        if bytes.is_empty() {
            return Err(ReadError::new("AccountAddress", "address cannot be empty"));
        }
        Ok(Self(bytes))
    }
}

/// The token standard of an asset held in escrow, e.g. `ZNN`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What an escrow holds, until when, and which key can release it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTerms {
    pub asset: AssetId,
    pub amount: u64,
    pub expiration: Timestamp,
    /// The aggregated leg key. A valid Ed25519 signature under this key over the leg message releases the funds.
    pub lock_key: Curve25519PublicKey,
}

impl Writable for EscrowTerms {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_bytes(writer, self.asset.as_str().as_bytes())?;
        writer.write_all(&self.amount.to_le_bytes())?;
        writer.write_all(&self.expiration.as_secs().to_le_bytes())?;
        self.lock_key.write(writer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Active,
    /// Released by `by` with `signature`. The signature is public ledger state from here on.
    Unlocked { signature: Signature, by: AccountAddress },
    /// Expired without being unlocked; the funds went back to the owner.
    Expired,
}

impl Display for EscrowStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowStatus::Active => write!(f, "Active"),
            EscrowStatus::Unlocked { by, .. } => write!(f, "Unlocked by {by}"),
            EscrowStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub id: EscrowReference,
    pub owner: AccountAddress,
    pub terms: EscrowTerms,
    pub status: EscrowStatus,
}

impl EscrowRecord {
    pub fn is_active(&self) -> bool {
        matches!(self.status, EscrowStatus::Active)
    }
}

/// The ledger's acknowledgement that an unlock took effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub escrow: EscrowReference,
    pub confirmed_at: Timestamp,
}

/// A state change requested from the ledger. It must be signed by the account submitting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerAction {
    CreateEscrow(EscrowTerms),
    Unlock { escrow: EscrowReference, signature: Signature },
}

impl LedgerAction {
    /// The 32-byte digest an account signs to authorize this action.
    pub fn digest(&self) -> [u8; 32] {
        Sha3_256::digest(Writable::serialize(self)).into()
    }
}

impl Writable for LedgerAction {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            LedgerAction::CreateEscrow(terms) => {
                writer.write_all(&[0])?;
                terms.write(writer)
            }
            LedgerAction::Unlock { escrow, signature } => {
                writer.write_all(&[1])?;
                escrow.write(writer)?;
                signature.write(writer)
            }
        }
    }
}

/// A [`LedgerAction`] together with the account that authorized it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAction {
    pub action: LedgerAction,
    pub sender: AccountAddress,
    pub sender_key: Curve25519PublicKey,
    pub signature: Signature,
}

impl SignedAction {
    /// True if the sender address belongs to `sender_key` and the signature over the action digest verifies.
    pub fn verify(&self) -> bool {
        AccountAddress::from_public_key(&self.sender_key) == self.sender
            && verify(&self.sender_key, &self.action.digest(), &self.signature)
    }
}
