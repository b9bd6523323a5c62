use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::Luma;
use qrcode::QrCode;

use crate::error::GatewayError;

/// Render text as a PNG QR code packed into a `data:` URL, ready for an
/// `<img>` tag.
pub fn data_url(contents: &str) -> Result<String, GatewayError> {
    let code = QrCode::new(contents.as_bytes()).map_err(|e| GatewayError::Qr(e.to_string()))?;
    let img = code.render::<Luma<u8>>().max_dimensions(300, 300).build();

    let mut png = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut png),
        image::ImageFormat::Png,
    )
    .map_err(|e| GatewayError::Qr(e.to_string()))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}
