use qrcode::render::unicode;
use qrcode::QrCode;

use crate::error::CoreError;

/// Renders a pairing code as half-block text suitable for a terminal.
pub fn render_pairing_code(code: &str) -> Result<String, CoreError> {
    let qr = QrCode::new(code.as_bytes()).map_err(|e| CoreError::Qr(e.to_string()))?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Where pairing progress is shown to the user.
pub trait PairingDisplay: Send {
    fn show_code(&mut self, code: &str);
    fn paired(&mut self, jid: &str);
    fn failed(&mut self, reason: &str);
}

/// Prints pairing codes and notices to stdout.
#[derive(Debug, Default)]
pub struct TerminalDisplay;

impl PairingDisplay for TerminalDisplay {
    fn show_code(&mut self, code: &str) {
        println!("\nScan this QR code with your WhatsApp app:");
        match render_pairing_code(code) {
            Ok(rendered) => println!("{}", rendered),
            Err(_) => println!("{}", code),
        }
    }

    fn paired(&mut self, jid: &str) {
        println!("\nSuccessfully connected and authenticated as {}!", jid);
    }

    fn failed(&mut self, reason: &str) {
        eprintln!("\nPairing failed: {}", reason);
    }
}
