//! Embed and extract over an in-memory image.

use cryptoguard_core::config::{StegConfig, StegFraming};
use cryptoguard_core::{GuardError, GuardResult};
use image::{DynamicImage, GenericImageView, RgbaImage};

use crate::lsb::{read_bytes, write_bits};

/// Channel bytes taken by the length header in [`Framing::LengthPrefixed`].
pub const LENGTH_HEADER_BITS: u64 = 32;

/// How the payload boundary is recorded in the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Framing {
    /// 32-bit big-endian byte count, then the payload.
    #[default]
    LengthPrefixed,
    /// Payload followed by a literal marker; extraction stops at the first
    /// occurrence, so a payload containing the marker is truncated.
    Marker(Vec<u8>),
}

impl From<&StegConfig> for Framing {
    fn from(cfg: &StegConfig) -> Self {
        match cfg.framing {
            StegFraming::Length => Framing::LengthPrefixed,
            StegFraming::Marker => Framing::Marker(cfg.marker.clone().into_bytes()),
        }
    }
}

impl Framing {
    fn overhead_bits(&self) -> GuardResult<u64> {
        match self {
            Framing::LengthPrefixed => Ok(LENGTH_HEADER_BITS),
            Framing::Marker(marker) if marker.is_empty() => {
                Err(GuardError::Config("steg marker must not be empty".into()))
            }
            Framing::Marker(marker) => Ok(marker.len() as u64 * 8),
        }
    }
}

fn channel_bytes(image: &DynamicImage) -> u64 {
    let (width, height) = image.dimensions();
    u64::from(width) * u64::from(height) * 4
}

/// Payload bits `image` can carry under `framing`.
pub fn capacity_bits(image: &DynamicImage, framing: &Framing) -> GuardResult<u64> {
    Ok(channel_bytes(image).saturating_sub(framing.overhead_bits()?))
}

/// Return a copy of `carrier` with `payload` hidden in its low bits.
///
/// Fails with [`GuardError::CapacityExceeded`] before touching any pixel if
/// the framed payload does not fit. `carrier` itself is never modified.
pub fn embed(carrier: &DynamicImage, payload: &[u8], framing: &Framing) -> GuardResult<RgbaImage> {
    let available = channel_bytes(carrier);
    let required = framing.overhead_bits()? + payload.len() as u64 * 8;
    if required > available {
        return Err(GuardError::CapacityExceeded {
            required,
            available,
        });
    }

    let mut image = carrier.to_rgba8();
    let channels: &mut [u8] = &mut image;
    match framing {
        Framing::LengthPrefixed => {
            let len = u32::try_from(payload.len())
                .map_err(|_| GuardError::format("payload exceeds the 32-bit length header"))?;
            write_bits(channels, 0, &len.to_be_bytes());
            write_bits(channels, LENGTH_HEADER_BITS as usize, payload);
        }
        Framing::Marker(marker) => {
            write_bits(channels, 0, payload);
            write_bits(channels, payload.len() * 8, marker);
        }
    }

    tracing::debug!(payload_bytes = payload.len(), required, available, "payload embedded");
    Ok(image)
}

/// Recover the payload hidden by [`embed`] with the same `framing`.
pub fn extract(carrier: &DynamicImage, framing: &Framing) -> GuardResult<Vec<u8>> {
    let image = carrier.to_rgba8();
    let channels: &[u8] = &image;

    match framing {
        Framing::LengthPrefixed => {
            let header_len = LENGTH_HEADER_BITS as usize;
            if channels.len() < header_len {
                return Err(GuardError::format("carrier too small to hold a length header"));
            }
            let header = read_bytes(channels, 0, 4);
            let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let available = channels.len() - header_len;
            if len as u64 * 8 > available as u64 {
                return Err(GuardError::Format(format!(
                    "declared payload of {len} bytes exceeds carrier capacity of {} bytes",
                    available / 8
                )));
            }
            Ok(read_bytes(channels, header_len, len))
        }
        Framing::Marker(marker) => {
            framing.overhead_bits()?;
            let mut bytes = read_bytes(channels, 0, channels.len() / 8);
            let end = bytes
                .windows(marker.len())
                .position(|w| w == marker.as_slice())
                .ok_or(GuardError::MarkerNotFound)?;
            bytes.truncate(end);
            Ok(bytes)
        }
    }
}
