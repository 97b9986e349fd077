use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

const DARK: &str = "#135D66";
const LIGHT: &str = "#FFF5E0";

/// Render the identity badge for `content` (the public profile URL) as SVG.
pub fn badge_svg(content: &str) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::L)?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .quiet_zone(true)
        .dark_color(svg::Color(DARK))
        .light_color(svg::Color(LIGHT))
        .build())
}
