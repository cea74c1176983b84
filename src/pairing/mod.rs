//! Pairing display.
//!
//! When the transport requests pairing it hands over a challenge that must
//! be rendered out-of-band (scanned from another device). Rendering is a
//! collaborator concern; the gateway only forwards the challenge.

use tracing::info;

use crate::transport::PairingChallenge;

/// Capability interface for rendering a pairing challenge. Fire-and-forget:
/// the session manager does not wait for the user to act on it.
pub trait PairingDisplay: Send + Sync {
    fn show(&self, challenge: &PairingChallenge);
}

/// Displays the pairing challenge on the local console.
pub struct ConsolePairingDisplay;

impl PairingDisplay for ConsolePairingDisplay {
    fn show(&self, challenge: &PairingChallenge) {
        info!(
            target: "session",
            timeout_secs = challenge.timeout_secs,
            "pairing required; scan the challenge below"
        );
        println!("==== pairing challenge ====");
        println!("{}", challenge.code);
        println!("===========================");
    }
}

/// Discards pairing challenges. Useful in tests that drive the transport
/// directly past the pairing phase.
#[derive(Default)]
pub struct NullPairingDisplay;

impl PairingDisplay for NullPairingDisplay {
    fn show(&self, _challenge: &PairingChallenge) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_display_does_not_panic() {
        let display = ConsolePairingDisplay;
        display.show(&PairingChallenge {
            code: "pair-me".to_string(),
            timeout_secs: 60,
        });
    }
}
