//! Value types shared by every record in the wire protocol: the two
//! 25-byte bearer tokens, the SIM identifier kinds, and the small status
//! enums.

use num_enum::{FromPrimitive, IntoPrimitive};

/// Length in bytes of a [`Token`] or [`SessionToken`] on the wire.
pub const TOKEN_LEN: usize = 25;

/// Bearer identifier presented to the REST admin surface as
/// `Authorization: Bearer <base64>`.
///
/// Structurally identical to [`SessionToken`] but never comparable to
/// one: the two are deliberately distinct types with no shared trait
/// impl, so the `__eq__`-against-the-wrong-class bug this project was
/// distilled from (see DESIGN.md) can't reoccur here.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token([u8; TOKEN_LEN]);

/// Bearer identifier minted by the REST layer after login and presented
/// by tunnel clients during [`crate::proto::auth::AuthRequest`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken([u8; TOKEN_LEN]);

macro_rules! token_impl {
    ($name:ident) => {
        impl $name {
            pub const LEN: usize = TOKEN_LEN;

            pub fn from_bytes(bytes: [u8; TOKEN_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
                &self.0
            }

            pub fn as_base64(&self) -> String {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD.encode(self.0)
            }

            pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
                use base64::Engine as _;
                let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
                let bytes: [u8; TOKEN_LEN] = bytes
                    .try_into()
                    .map_err(|_| base64::DecodeError::InvalidLength(TOKEN_LEN))?;
                Ok(Self(bytes))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:02x?})"), &self.0[..4])
            }
        }
    };
}

token_impl!(Token);
token_impl!(SessionToken);

#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IdentifierType {
    Iccid = 0,
    Imsi = 1,
    #[num_enum(catch_all)]
    Other(u8),
}

#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthStatus {
    Success = 0,
    InvalidToken = 1,
    NotRegistered = 2,
    #[num_enum(catch_all)]
    Other(u8),
}

#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectStatus {
    Success = 0,
    NotFound = 1,
    Forbidden = 2,
    NotAvailable = 3,
    #[num_enum(catch_all)]
    Other(u8),
}

#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduOp {
    Apdu = 0,
    Reset = 1,
    #[num_enum(catch_all)]
    Other(u8),
}

fn only_digits(s: &[u8]) -> bool {
    s.iter().all(|&b| b.is_ascii_digit())
}

/// Validates and stores a digit-only identifier string, zero-padded to a
/// fixed width on the wire. `Imsi` and `Iccid` share this shape with
/// different `LEN`/length-bound pairs, so the logic lives once here and
/// both newtypes delegate to it.
fn validate_digits(s: &str, min: usize, max: usize) -> Result<(), IdentifierError> {
    if s.len() < min || s.len() > max {
        return Err(IdentifierError::Length {
            len: s.len(),
            min,
            max,
        });
    }
    if !only_digits(s.as_bytes()) {
        return Err(IdentifierError::NonDigit);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier length {len} outside allowed range {min}..={max}")]
    Length { len: usize, min: usize, max: usize },
    #[error("identifier contains a non-digit byte")]
    NonDigit,
}

macro_rules! digit_identifier {
    ($name:ident, $wire_len:expr, $min:expr, $max:expr, $kind:expr) => {
        #[derive(Clone, PartialEq, Eq, Hash, Debug)]
        pub struct $name(String);

        impl $name {
            pub const WIRE_LEN: usize = $wire_len;
            pub const MIN_LEN: usize = $min;
            pub const MAX_LEN: usize = $max;

            pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let value = value.into();
                validate_digits(&value, Self::MIN_LEN, Self::MAX_LEN)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn identifier_type(&self) -> IdentifierType {
                $kind
            }

            /// Left-aligns the digits and zero-pads to `WIRE_LEN` bytes.
            pub fn encode_padded(&self) -> [u8; $wire_len] {
                let mut buf = [0u8; $wire_len];
                buf[..self.0.len()].copy_from_slice(self.0.as_bytes());
                buf
            }

            /// Strips trailing NULs then re-validates.
            pub fn decode_padded(buf: &[u8; $wire_len]) -> Result<Self, IdentifierError> {
                let stripped = {
                    let mut end = buf.len();
                    while end > 0 && buf[end - 1] == 0 {
                        end -= 1;
                    }
                    &buf[..end]
                };
                if stripped.iter().any(|&b| b == 0) {
                    // A NUL followed by a non-NUL byte: not a valid trailing pad.
                    return Err(IdentifierError::NonDigit);
                }
                let s = std::str::from_utf8(stripped).map_err(|_| IdentifierError::NonDigit)?;
                Self::new(s)
            }
        }
    };
}

digit_identifier!(Imsi, 15, 5, 15, IdentifierType::Imsi);
digit_identifier!(Iccid, 20, 5, 20, IdentifierType::Iccid);

/// Tagged union of the two SIM identifier kinds, carrying its own
/// [`IdentifierType`] so the wire codec never has to guess.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum SimIdentifier {
    Imsi(Imsi),
    Iccid(Iccid),
}

impl SimIdentifier {
    pub fn identifier_type(&self) -> IdentifierType {
        match self {
            SimIdentifier::Imsi(_) => IdentifierType::Imsi,
            SimIdentifier::Iccid(_) => IdentifierType::Iccid,
        }
    }
}

impl std::fmt::Display for SimIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimIdentifier::Imsi(v) => write!(f, "imsi:{}", v.as_str()),
            SimIdentifier::Iccid(v) => write!(f, "iccid:{}", v.as_str()),
        }
    }
}
