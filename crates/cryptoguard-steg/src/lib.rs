//! cryptoguard-steg: hide a byte payload in the least-significant bits of an
//! image's channel bytes.
//!
//! Carriers are normalised to 8-bit RGBA, so every pixel contributes four
//! channel bytes (alpha included) and one payload bit per channel byte. Bits
//! are written most-significant first, in row-major pixel order, R G B A
//! within a pixel. Output is always PNG so the hidden bits survive encoding.
//!
//! Not resistant to statistical steganalysis.

pub mod carrier;
pub mod codec;
mod lsb;

pub use carrier::{capacity_bits, embed, extract, Framing, LENGTH_HEADER_BITS};
pub use codec::{decode_image, embed_file, encode_png, extract_file, load_image};
