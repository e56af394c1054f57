//! Terminal rendering of link tokens

use std::io::{self, Write};

use bdaybot_core::LinkPresenter;
use bdaybot_domain::LinkToken;
use parking_lot::Mutex;
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;
use tracing::warn;

/// Prints link tokens for an operator sitting at the terminal.
///
/// Uses the bridge's pre-rendered QR code when it sent one, otherwise renders
/// the token itself with half-block characters.
pub struct TerminalLinkPresenter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for TerminalLinkPresenter {
    fn default() -> Self {
        Self::new(Box::new(io::stderr()))
    }
}

impl TerminalLinkPresenter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn render(out: &mut dyn Write, token: &LinkToken) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "Link this device: open the messaging app on your phone,")?;
        writeln!(out, "go to Settings > Linked devices > Link a device and scan:")?;
        writeln!(out)?;
        match &token.ascii {
            Some(ascii) => writeln!(out, "{ascii}")?,
            None => match render_qr(&token.data) {
                Some(code) => writeln!(out, "{code}")?,
                None => writeln!(out, "  {}", token.data)?,
            },
        }
        writeln!(out)?;
        out.flush()
    }
}

/// Render `data` as a terminal QR code, light modules on a dark background.
fn render_qr(data: &str) -> Option<String> {
    match QrCode::new(data.as_bytes()) {
        Ok(code) => Some(
            code.render::<Dense1x2>()
                .dark_color(Dense1x2::Light)
                .light_color(Dense1x2::Dark)
                .build(),
        ),
        Err(err) => {
            warn!(error = %err, len = data.len(), "presenter.qr_encode_failed");
            None
        }
    }
}

impl LinkPresenter for TerminalLinkPresenter {
    fn present(&self, token: &LinkToken) {
        let mut out = self.out.lock();
        if let Err(err) = Self::render(&mut **out, token) {
            warn!(error = %err, "presenter.write_failed");
        }
    }
}
