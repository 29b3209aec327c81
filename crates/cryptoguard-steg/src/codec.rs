//! Image decode/encode and path-level embed/extract.

use std::io::Cursor;
use std::path::Path;

use cryptoguard_core::{GuardError, GuardResult, IoContext};
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};

use crate::carrier::{embed, extract, Framing};

/// Decode an image file, guessing the format from its contents.
pub fn load_image(path: &Path) -> GuardResult<DynamicImage> {
    let reader = ImageReader::open(path)
        .io_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()
        .io_context(|| format!("reading {}", path.display()))?;
    reader
        .decode()
        .map_err(|e| GuardError::Image(format!("decoding {}: {e}", path.display())))
}

pub fn decode_image(bytes: &[u8]) -> GuardResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| GuardError::Image(format!("decoding image: {e}")))
}

/// Encode as PNG, which keeps every channel bit intact.
pub fn encode_png(image: &RgbaImage) -> GuardResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| GuardError::Image(format!("encoding PNG: {e}")))?;
    Ok(buf.into_inner())
}

/// Hide `payload` in the image at `carrier_path` and write the result as PNG
/// to `output_path`. Nothing is written if the payload does not fit.
pub fn embed_file(
    carrier_path: &Path,
    payload: &[u8],
    output_path: &Path,
    framing: &Framing,
) -> GuardResult<()> {
    let carrier = load_image(carrier_path)?;
    let stego = embed(&carrier, payload, framing)?;
    let png = encode_png(&stego)?;

    let is_png = output_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if !is_png {
        tracing::warn!(output = %output_path.display(), "output is PNG data regardless of extension");
    }

    std::fs::write(output_path, png).io_context(|| format!("writing {}", output_path.display()))?;
    tracing::info!(
        carrier = %carrier_path.display(),
        output = %output_path.display(),
        payload_bytes = payload.len(),
        "payload embedded"
    );
    Ok(())
}

/// Recover the payload hidden in the image at `path`.
pub fn extract_file(path: &Path, framing: &Framing) -> GuardResult<Vec<u8>> {
    let carrier = load_image(path)?;
    let payload = extract(&carrier, framing)?;
    tracing::info!(image = %path.display(), payload_bytes = payload.len(), "payload extracted");
    Ok(payload)
}
