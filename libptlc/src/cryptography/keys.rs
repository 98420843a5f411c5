use crate::error::ReadError;
use crate::swap_protocol::utils::{read_array, Readable, Writable};
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::traits::Identity;
use curve25519_dalek::{EdwardsPoint, Scalar};
use hex::FromHexError;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::{Read, Write};
use std::ops::{Add, Mul, Sub};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

pub trait SecretKey: Clone + Send + Sync {}

pub trait PublicKey: Clone + PartialEq + Eq + Send + Sync + Serialize + for<'de> Deserialize<'de> {
    type SecretKey: SecretKey + Debug;

    fn keypair<R: CryptoRng + RngCore>(rng: &mut R) -> (Self::SecretKey, Self);
    fn from_secret(secret_key: &Self::SecretKey) -> Self;
}

/// Maps a wide (64-byte) digest to a scalar in `[0, L)`.
pub fn reduce_wide(bytes: &[u8; 64]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(bytes)
}

/// Decodes a 32-byte little-endian scalar, rejecting values that are not fully reduced.
pub fn scalar_from_canonical_bytes(bytes: [u8; 32]) -> Result<Scalar, KeyError> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes)).ok_or(KeyError::NonCanonicalScalar)
}

pub fn scalar_from_hex(hex: &str) -> Result<Scalar, KeyError> {
    if hex.len() != 64 {
        return Err(KeyError::InvalidStringLength);
    }
    let mut canonical = [0u8; 32];
    hex::decode_to_slice(hex.as_bytes(), &mut canonical)?;
    scalar_from_canonical_bytes(canonical)
}

/// A secret scalar: signing keys, nonces and the adaptor secret.
///
/// Cloning is safe because the underlying scalar is zeroized on drop automatically.
#[derive(Clone)]
pub struct Curve25519Secret(Zeroizing<Scalar>);

impl Curve25519Secret {
    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    pub fn random<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut scalar_bytes = Zeroizing::new([0u8; 64]);
        rng.fill_bytes(&mut scalar_bytes[..]);
        Self::from(reduce_wide(&scalar_bytes))
    }

    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        scalar_from_hex(hex).map(Self::from)
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl SecretKey for Curve25519Secret {}

impl PartialEq for Curve25519Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&*other.0).into()
    }
}

impl Eq for Curve25519Secret {}

impl Debug for Curve25519Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Curve25519Secret")
    }
}

impl From<Scalar> for Curve25519Secret {
    fn from(value: Scalar) -> Self {
        Self(Zeroizing::new(value))
    }
}

impl Add for &Curve25519Secret {
    type Output = Curve25519Secret;

    fn add(self, rhs: Self) -> Curve25519Secret {
        Curve25519Secret::from(*self.0 + *rhs.0)
    }
}

impl Sub for &Curve25519Secret {
    type Output = Curve25519Secret;

    fn sub(self, rhs: Self) -> Curve25519Secret {
        Curve25519Secret::from(*self.0 - *rhs.0)
    }
}

impl Mul<&Scalar> for &Curve25519Secret {
    type Output = Curve25519Secret;

    fn mul(self, rhs: &Scalar) -> Curve25519Secret {
        Curve25519Secret::from(*self.0 * rhs)
    }
}

/// A curve point in its canonical compressed encoding, together with the decoded point.
#[derive(Clone, PartialEq, Eq)]
pub struct Curve25519PublicKey {
    compressed_point: CompressedEdwardsY,
    point: EdwardsPoint,
}

impl Curve25519PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.compressed_point.as_bytes()
    }

    pub fn as_point(&self) -> EdwardsPoint {
        self.point
    }

    /// Decodes a compressed point. Encodings that do not decompress, or that decompress but are not the canonical
    /// encoding of the resulting point, are rejected.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, KeyError> {
        let compressed_point = CompressedEdwardsY(bytes);
        let point = compressed_point.decompress().ok_or(KeyError::InvalidPoint)?;
        if point.compress() != compressed_point {
            return Err(KeyError::NonCanonicalPoint);
        }
        Ok(Self { compressed_point, point })
    }

    /// Tries to deserialize a hex string into a `Curve25519PublicKey`. The hex string must represent a valid,
    /// canonically encoded compressed point on the curve.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        if hex.len() != 64 {
            return Err(KeyError::InvalidStringLength);
        }
        let mut compressed = [0u8; 32];
        hex::decode_to_slice(hex.as_bytes(), &mut compressed)?;
        Self::from_bytes(compressed)
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.compressed_point.to_bytes())
    }

    pub fn identity() -> Self {
        EdwardsPoint::identity().into()
    }

    /// Points in the small torsion subgroup carry no key material and are refused from counterparties.
    pub fn is_small_order(&self) -> bool {
        self.point.is_small_order()
    }

    pub fn scalar_mul(&self, scalar: &Scalar) -> Self {
        (self.point * scalar).into()
    }

    /// Dealer-free 2-of-2 key aggregation: the plain sum of the parties' points.
    pub fn aggregate<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a Curve25519PublicKey>,
    {
        keys.into_iter().map(|k| k.point).fold(EdwardsPoint::identity(), |acc, p| acc + p).into()
    }

    /// Base-point multiplication of a public scalar.
    pub fn from_scalar(scalar: &Scalar) -> Self {
        (scalar * ED25519_BASEPOINT_TABLE).into()
    }
}

impl Add for &Curve25519PublicKey {
    type Output = Curve25519PublicKey;

    fn add(self, rhs: Self) -> Curve25519PublicKey {
        (self.point + rhs.point).into()
    }
}

impl From<EdwardsPoint> for Curve25519PublicKey {
    fn from(value: EdwardsPoint) -> Self {
        let compressed_point = value.compress();
        Self { compressed_point, point: value }
    }
}

impl PublicKey for Curve25519PublicKey {
    type SecretKey = Curve25519Secret;

    fn keypair<R: CryptoRng + RngCore>(rng: &mut R) -> (Curve25519Secret, Self) {
        let secret_key = Curve25519Secret::random(rng);
        let public_key = Self::from_secret(&secret_key);
        (secret_key, public_key)
    }

    fn from_secret(secret_key: &Self::SecretKey) -> Self {
        Self::from_scalar(secret_key.as_scalar())
    }
}

impl Debug for Curve25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Serialize for Curve25519PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for Curve25519PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        Curve25519PublicKey::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

impl Writable for Curve25519PublicKey {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

impl Readable for Curve25519PublicKey {
    fn read<R: Read>(reader: &mut R) -> Result<Self, ReadError> {
        let bytes = read_array::<32, _>(reader, "Curve25519PublicKey")?;
        Self::from_bytes(bytes).map_err(|e| ReadError::new("Curve25519PublicKey", e.to_string()))
    }
}

/// A secret scalar and its public image `secret·B`.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: Curve25519Secret,
    public: Curve25519PublicKey,
}

impl KeyPair {
    pub fn from_secret(secret: Curve25519Secret) -> Self {
        let public = Curve25519PublicKey::from_secret(&secret);
        Self { secret, public }
    }

    /// A fresh keypair drawn from `rng`, clamped as an Ed25519 secret.
    pub fn random<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(&mut seed[..]);
        crate::cryptography::schnorr::keygen(&seed)
    }

    pub fn secret(&self) -> &Curve25519Secret {
        &self.secret
    }

    pub fn public(&self) -> &Curve25519PublicKey {
        &self.public
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyError {
    #[error("Invalid point on curve")]
    InvalidPoint,
    #[error("Point is not canonically encoded")]
    NonCanonicalPoint,
    #[error("Could not deserialize from hex: {0}")]
    HexDeserializationError(#[from] FromHexError),
    #[error("Invalid string length")]
    InvalidStringLength,
    #[error("Not a valid secret key")]
    NonCanonicalScalar,
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// The Ed25519 group order, little-endian.
    const L_BYTES: [u8; 32] = [
        0xed, 0xd3, 0xf5, 0x5c, 0x1a, 0x63, 0x12, 0x58, 0xd6, 0x9c, 0xf7, 0xa2, 0xde, 0xf9, 0xde, 0x14, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
    ];

    fn rng() -> StdRng {
        StdRng::from_seed([7u8; 32])
    }

    fn lt_l(bytes: &[u8; 32]) -> bool {
        for i in (0..32).rev() {
            if bytes[i] != L_BYTES[i] {
                return bytes[i] < L_BYTES[i];
            }
        }
        false
    }

    #[test]
    fn test_keypair() {
        let (secret, public) = Curve25519PublicKey::keypair(&mut rng());
        let public2 = Curve25519PublicKey::from_secret(&secret);
        assert_eq!(public, public2);
    }

    #[test]
    fn test_from_hex() {
        let hex_k = "ce89029949049c902fdd5f2bf1493977dd061e782c44fd634b512bd75bc5ec08";
        let hex_p = "4dd896d542721742aff8671ba42aff0c4c846bea79065cf39a191bbeb11ea634";
        let secret = Curve25519Secret::from_hex(hex_k).unwrap();
        let public = Curve25519PublicKey::from_hex(hex_p).unwrap();
        assert_eq!(secret.as_hex(), hex_k);
        assert_eq!(public.as_hex(), hex_p);
    }

    #[test]
    fn test_from_hex_errors() {
        let hex_k = "ce89029949049c902fdd5f2bf1493977dd061e782c44fd634b512bd75bc5ecff";
        assert!(matches!(Curve25519Secret::from_hex(hex_k), Err(KeyError::NonCanonicalScalar)));

        let hex_k = "ce89029949049c902fdd5f2bf1493977dd061e782c44fd6";
        assert!(matches!(Curve25519Secret::from_hex(hex_k), Err(KeyError::InvalidStringLength)));

        let hex_p = "4dd896d542721742aff8671ba42aff0c4c846bea79065cf39a191bbeb11ea635";
        let public = Curve25519PublicKey::from_hex(hex_p);
        assert!(matches!(public, Err(KeyError::InvalidPoint)), "Should fail: {public:?}");

        let hex_p = "4dd896d542721742aff8671ba42aff0c4c846bea79065cf39a191bbeb11ea63x";
        let public = Curve25519PublicKey::from_hex(hex_p);
        assert!(matches!(
            public,
            Err(KeyError::HexDeserializationError(FromHexError::InvalidHexCharacter { c: 'x', index: 63 }))
        ));
    }

    #[test]
    fn non_canonical_point_is_rejected() {
        // y = p + 1 encodes the same point as y = 1 (the identity) but is not canonical.
        let mut y_plus_p = [0xffu8; 32];
        y_plus_p[0] = 0xee;
        y_plus_p[31] = 0x7f;
        assert!(matches!(Curve25519PublicKey::from_bytes(y_plus_p), Err(KeyError::NonCanonicalPoint)));
        // The canonical identity encoding is accepted.
        let mut one = [0u8; 32];
        one[0] = 1;
        let identity = Curve25519PublicKey::from_bytes(one).unwrap();
        assert_eq!(identity, Curve25519PublicKey::identity());
        assert!(identity.is_small_order());
    }

    #[test]
    fn reduce_wide_is_below_group_order() {
        let mut rng = rng();
        for _ in 0..64 {
            let mut wide = [0u8; 64];
            rng.fill_bytes(&mut wide);
            assert!(lt_l(&reduce_wide(&wide).to_bytes()));
        }
        assert!(lt_l(&reduce_wide(&[0xff; 64]).to_bytes()));
    }

    #[test]
    fn point_addition_is_commutative_and_associative() {
        let mut rng = rng();
        let (_, p) = Curve25519PublicKey::keypair(&mut rng);
        let (_, q) = Curve25519PublicKey::keypair(&mut rng);
        let (_, r) = Curve25519PublicKey::keypair(&mut rng);
        assert_eq!(&p + &q, &q + &p);
        assert_eq!(&(&p + &q) + &r, &p + &(&q + &r));
        assert_eq!(Curve25519PublicKey::aggregate([&p, &q, &r]), &(&p + &q) + &r);
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut rng = rng();
        let (_, p) = Curve25519PublicKey::keypair(&mut rng);
        let decoded = Curve25519PublicKey::from_bytes(*p.as_bytes()).unwrap();
        assert_eq!(decoded, p);
        let read = Curve25519PublicKey::read(&mut &Writable::serialize(&p)[..]).unwrap();
        assert_eq!(read, p);
    }

    #[test]
    fn aggregated_key_matches_summed_secret() {
        let mut rng = rng();
        let (a, pa) = Curve25519PublicKey::keypair(&mut rng);
        let (b, pb) = Curve25519PublicKey::keypair(&mut rng);
        let joint = Curve25519PublicKey::aggregate([&pa, &pb]);
        assert_eq!(joint, Curve25519PublicKey::aggregate([&pb, &pa]));
        assert_eq!(joint, Curve25519PublicKey::from_secret(&(&a + &b)));
    }

    #[test]
    fn scalar_arithmetic() {
        let mut rng = rng();
        let a = Curve25519Secret::random(&mut rng);
        let b = Curve25519Secret::random(&mut rng);
        assert_eq!(&(&a + &b) - &b, a);
        let c = Scalar::from(3u64);
        assert_eq!(&a * &c, &(&a + &a) + &a);
        let pa = Curve25519PublicKey::from_secret(&a);
        assert_eq!(pa.scalar_mul(&c), Curve25519PublicKey::from_secret(&(&a * &c)));
    }

    #[test]
    fn secret_debug_does_not_leak() {
        let a = Curve25519Secret::random(&mut rng());
        assert_eq!(format!("{a:?}"), "Curve25519Secret");
    }
}
