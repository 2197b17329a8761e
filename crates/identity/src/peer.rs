// Path: crates/identity/src/peer.rs

//! Peer-identity assertion for mTLS request handlers.
//!
//! Transport-level verification already pins both sides to the shared CA;
//! this module adds the game-id binding on top: the presented leaf must
//! carry `holomush-<game_id>` as a DNS subject-alternative name.

use crate::bootstrap::{der_has_dns_san, GAME_ID_PREFIX};
use tonic::{Request, Status};

/// The DNS name every peer of this game instance must present.
pub fn expected_peer_name(game_id: &str) -> String {
    format!("{GAME_ID_PREFIX}{game_id}")
}

/// Asserts that the request's client certificate is bound to `game_id`.
///
/// Returns `UNAUTHENTICATED` when no client certificate is available and
/// `PERMISSION_DENIED` when the leaf names a different game.
pub fn verify_peer<T>(request: &Request<T>, game_id: &str) -> Result<(), Status> {
    let certs = request
        .peer_certs()
        .ok_or_else(|| Status::unauthenticated("client certificate required"))?;
    let expected = expected_peer_name(game_id);

    let leaf_matches = certs.iter().any(|cert| der_has_dns_san(cert.as_ref(), &expected));
    if !leaf_matches {
        return Err(Status::permission_denied(format!(
            "peer certificate is not bound to {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_name_uses_prefix() {
        assert_eq!(expected_peer_name("limbo"), "holomush-limbo");
    }

    #[test]
    fn der_san_check_matches_generated_leaf() {
        let mut params =
            rcgen::CertificateParams::new(vec!["holomush-limbo".to_string()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "core");
        let keypair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&keypair).unwrap();

        assert!(der_has_dns_san(cert.der(), "holomush-limbo"));
        assert!(!der_has_dns_san(cert.der(), "holomush-elsewhere"));
        assert!(!der_has_dns_san(b"junk", "holomush-limbo"));
    }

    #[test]
    fn request_without_peer_certs_is_unauthenticated() {
        let request = Request::new(());
        let err = verify_peer(&request, "limbo").unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }
}
