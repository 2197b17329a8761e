// Path: crates/identity/src/bootstrap.rs

//! Generates or loads the self-signed CA and per-component leaf
//! certificates, and derives the stable game id from the CA subject.

use crate::peer::expected_peer_name;
use holomush_types::error::IdentityError;
use holomush_types::Component;
use std::fs;
use std::io::BufReader;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

const CA_CERT_FILE: &str = "root-ca.crt";
const CA_KEY_FILE: &str = "root-ca.key";

/// Subject common-name prefix the game id is embedded behind.
pub const GAME_ID_PREFIX: &str = "holomush-";

/// The usable TLS output of [`ensure`]: ready-made tonic configurations for
/// this component's server sockets and its client link to the peer
/// component, plus the game id every peer is verified against.
pub struct TlsBundle {
    /// mTLS acceptor configuration for this component's listeners.
    pub server: ServerTlsConfig,
    /// mTLS dial configuration toward the peer component.
    pub client: ClientTlsConfig,
    /// The game id extracted from (or generated into) the CA subject.
    pub game_id: String,
}

fn expected_files(dir: &Path) -> [PathBuf; 6] {
    [
        dir.join(CA_CERT_FILE),
        dir.join(CA_KEY_FILE),
        dir.join(Component::Core.cert_file()),
        dir.join(Component::Core.key_file()),
        dir.join(Component::Gateway.cert_file()),
        dir.join(Component::Gateway.key_file()),
    ]
}

/// Loads the certificate set, generating it first when the directory holds
/// none of the expected files.
///
/// Any existing expected file makes the on-disk set authoritative: a
/// partial or unreadable set is a fatal load error, never silently
/// completed or regenerated. Calling this twice leaves the files
/// byte-identical.
pub fn ensure(
    certs_dir: &Path,
    component: Component,
    requested_game_id: Option<&str>,
) -> Result<TlsBundle, IdentityError> {
    if let Ok(meta) = fs::metadata(certs_dir) {
        if !meta.is_dir() {
            return Err(IdentityError::CertsDir {
                path: certs_dir.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "exists but is not a directory",
                ),
            });
        }
    }

    let any_exist = expected_files(certs_dir).iter().any(|p| p.exists());
    if !any_exist {
        generate(certs_dir, requested_game_id)?;
    }
    load(certs_dir, component)
}

/// Loads the certificate set without ever generating it.
///
/// Used by short-lived tools (the `status` subcommand) that must observe
/// the identity of the running servers, not mint one.
pub fn load_existing(certs_dir: &Path, component: Component) -> Result<TlsBundle, IdentityError> {
    load(certs_dir, component)
}

/// Reads only the CA certificate and returns the game id from its subject.
///
/// The common name must match `holomush-<id>`; anything else is a
/// malformed-CA error.
pub fn extract_game_id(certs_dir: &Path) -> Result<String, IdentityError> {
    let ca_path = certs_dir.join(CA_CERT_FILE);
    let pem = fs::read(&ca_path)
        .map_err(|e| IdentityError::GameIdExtract(format!("{}: {e}", ca_path.display())))?;
    game_id_from_ca_pem(&pem)
}

fn game_id_from_ca_pem(pem_bytes: &[u8]) -> Result<String, IdentityError> {
    let (_, pem) = parse_x509_pem(pem_bytes)
        .map_err(|e| IdentityError::GameIdExtract(format!("CA certificate is not PEM: {e}")))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| IdentityError::GameIdExtract(format!("CA certificate is not X.509: {e}")))?;
    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .ok_or_else(|| {
            IdentityError::GameIdExtract("CA subject has no common name".to_string())
        })?;
    match cn.strip_prefix(GAME_ID_PREFIX) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(IdentityError::GameIdExtract(format!(
            "CA common name {cn:?} does not match \"{GAME_ID_PREFIX}<id>\""
        ))),
    }
}

/// Generates a fresh CA plus a leaf per component and persists all six
/// files. Only called when no expected file exists; generation is never
/// retried over a partial set.
fn generate(certs_dir: &Path, requested_game_id: Option<&str>) -> Result<(), IdentityError> {
    create_private_dir(certs_dir)?;

    let game_id = match requested_game_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let raw = uuid::Uuid::new_v4().simple().to_string();
            raw.chars().take(8).collect()
        }
    };
    tracing::info!(
        game_id = %game_id,
        dir = %certs_dir.display(),
        "generating mTLS CA and component certificates"
    );

    let gen_err = |what: &str, e: rcgen::Error| IdentityError::TlsLoad(format!("{what}: {e}"));

    let mut ca_params = rcgen::CertificateParams::new(Vec::new())
        .map_err(|e| gen_err("CA parameters", e))?;
    ca_params
        .distinguished_name
        .push(rcgen::DnType::CommonName, format!("{GAME_ID_PREFIX}{game_id}"));
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    ca_params.key_usages = vec![
        rcgen::KeyUsagePurpose::KeyCertSign,
        rcgen::KeyUsagePurpose::CrlSign,
    ];
    let ca_keypair = rcgen::KeyPair::generate().map_err(|e| gen_err("CA keypair", e))?;
    let ca_cert = ca_params
        .self_signed(&ca_keypair)
        .map_err(|e| gen_err("CA certificate", e))?;

    write_private(&certs_dir.join(CA_CERT_FILE), ca_cert.pem().as_bytes())?;
    write_private(&certs_dir.join(CA_KEY_FILE), ca_keypair.serialize_pem().as_bytes())?;

    let peer_name = expected_peer_name(&game_id);
    for component in [Component::Core, Component::Gateway] {
        let mut params = rcgen::CertificateParams::new(vec![
            peer_name.clone(),
            "localhost".to_string(),
        ])
        .map_err(|e| gen_err("leaf parameters", e))?;
        params
            .subject_alt_names
            .push(rcgen::SanType::IpAddress(Ipv4Addr::LOCALHOST.into()));
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, component.name());
        params.extended_key_usages = vec![
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let keypair = rcgen::KeyPair::generate().map_err(|e| gen_err("leaf keypair", e))?;
        let cert = params
            .signed_by(&keypair, &ca_cert, &ca_keypair)
            .map_err(|e| gen_err("leaf certificate", e))?;

        write_private(&certs_dir.join(component.cert_file()), cert.pem().as_bytes())?;
        write_private(
            &certs_dir.join(component.key_file()),
            keypair.serialize_pem().as_bytes(),
        )?;
    }

    Ok(())
}

/// Loads and validates the full certificate set, building the tonic
/// configurations for `component`.
fn load(certs_dir: &Path, component: Component) -> Result<TlsBundle, IdentityError> {
    let mut contents = Vec::with_capacity(6);
    for path in expected_files(certs_dir) {
        let bytes = fs::read(&path).map_err(|e| {
            IdentityError::TlsLoad(format!("{} (partial or unreadable set): {e}", path.display()))
        })?;
        contents.push((path, bytes));
    }

    let ca_pem = &contents[0].1;
    let game_id = game_id_from_ca_pem(ca_pem)?;
    let peer_name = expected_peer_name(&game_id);

    // Every leaf must parse and carry the game id as a SAN; keys must hold
    // exactly one private key.
    for (path, bytes) in &contents[2..] {
        let name = path.display();
        if path.extension().is_some_and(|e| e == "crt") {
            let (_, pem) = parse_x509_pem(bytes)
                .map_err(|e| IdentityError::TlsLoad(format!("{name}: not PEM: {e}")))?;
            let cert = pem
                .parse_x509()
                .map_err(|e| IdentityError::TlsLoad(format!("{name}: not X.509: {e}")))?;
            if !cert_has_dns_san(&cert, &peer_name) {
                return Err(IdentityError::TlsLoad(format!(
                    "{name}: certificate does not carry SAN {peer_name:?}"
                )));
            }
        } else {
            let mut reader = BufReader::new(bytes.as_slice());
            rustls_pemfile::private_key(&mut reader)
                .map_err(|e| IdentityError::TlsLoad(format!("{name}: {e}")))?
                .ok_or_else(|| {
                    IdentityError::TlsLoad(format!("{name}: no private key found"))
                })?;
        }
    }

    let cert_pem = fs::read(certs_dir.join(component.cert_file()))
        .map_err(|e| IdentityError::TlsLoad(e.to_string()))?;
    let key_pem = fs::read(certs_dir.join(component.key_file()))
        .map_err(|e| IdentityError::TlsLoad(e.to_string()))?;

    let identity = Identity::from_pem(&cert_pem, &key_pem);
    let ca = Certificate::from_pem(ca_pem);

    let server = ServerTlsConfig::new()
        .identity(identity.clone())
        .client_ca_root(ca.clone());
    let client = ClientTlsConfig::new()
        .ca_certificate(ca)
        .identity(identity)
        .domain_name(peer_name.clone());

    Ok(TlsBundle {
        server,
        client,
        game_id,
    })
}

fn cert_has_dns_san(cert: &X509Certificate<'_>, expected: &str) -> bool {
    cert.subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value.general_names.iter().any(|name| {
                matches!(name, GeneralName::DNSName(dns) if *dns == expected)
            })
        })
        .unwrap_or(false)
}

/// Checks a DER-encoded peer certificate for the expected game-id SAN.
pub(crate) fn der_has_dns_san(der: &[u8], expected: &str) -> bool {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert_has_dns_san(&cert, expected))
        .unwrap_or(false)
}

fn create_private_dir(dir: &Path) -> Result<(), IdentityError> {
    let map = |source: std::io::Error| IdentityError::CertsDir {
        path: dir.display().to_string(),
        source,
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(map)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir).map_err(map)
    }
}

/// Owner-only atomic write: temp file, then rename into place.
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), IdentityError> {
    let map = |e: std::io::Error| IdentityError::TlsLoad(format!("{}: {e}", path.display()));
    let tmp = path.with_extension("tmp");
    {
        use std::io::Write;
        #[cfg(unix)]
        let mut file = {
            use std::os::unix::fs::OpenOptionsExt;
            fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp)
                .map_err(map)?
        };
        #[cfg(not(unix))]
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(map)?;
        file.write_all(bytes).map_err(map)?;
        file.sync_all().map_err(map)?;
    }
    fs::rename(&tmp, path).map_err(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn read_all(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        expected_files(dir)
            .iter()
            .map(|p| (p.clone(), fs::read(p).unwrap()))
            .collect()
    }

    #[test]
    fn ensure_generates_full_set_with_requested_id() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
        assert_eq!(bundle.game_id, "limbo");
        for path in expected_files(dir.path()) {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert_eq!(extract_game_id(dir.path()).unwrap(), "limbo");
    }

    #[test]
    fn ensure_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
        let first = read_all(dir.path());
        ensure(dir.path(), Component::Gateway, Some("limbo")).unwrap();
        assert_eq!(first, read_all(dir.path()));
    }

    #[test]
    fn generated_id_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let a = ensure(dir.path(), Component::Core, None).unwrap().game_id;
        let b = ensure(dir.path(), Component::Gateway, None).unwrap().game_id;
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn partial_set_is_never_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
        fs::remove_file(dir.path().join(Component::Gateway.key_file())).unwrap();

        let err = ensure(dir.path(), Component::Core, Some("limbo")).unwrap_err();
        assert!(matches!(err, IdentityError::TlsLoad(_)), "{err}");
        // The missing file must not have been recreated.
        assert!(!dir.path().join(Component::Gateway.key_file()).exists());
    }

    #[test]
    fn corrupt_ca_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
        fs::write(dir.path().join(CA_CERT_FILE), b"not a valid certificate").unwrap();

        let err = ensure(dir.path(), Component::Gateway, Some("limbo")).unwrap_err();
        assert!(matches!(err, IdentityError::GameIdExtract(_)), "{err}");
    }

    #[test]
    fn wrong_cn_prefix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        // Build a CA whose CN does not carry the expected prefix.
        let mut params = rcgen::CertificateParams::new(Vec::new()).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "mush-limbo");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let keypair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&keypair).unwrap();
        fs::write(dir.path().join(CA_CERT_FILE), cert.pem()).unwrap();

        let err = extract_game_id(dir.path()).unwrap_err();
        assert!(matches!(err, IdentityError::GameIdExtract(_)), "{err}");
    }

    #[test]
    fn file_in_place_of_certs_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("certs");
        fs::write(&not_a_dir, b"oops").unwrap();

        let err = ensure(&not_a_dir, Component::Core, None).unwrap_err();
        assert!(matches!(err, IdentityError::CertsDir { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn generated_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let certs = dir.path().join("certs");
        ensure(&certs, Component::Core, Some("limbo")).unwrap();

        assert_eq!(fs::metadata(&certs).unwrap().permissions().mode() & 0o777, 0o700);
        for path in expected_files(&certs) {
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "{} mode {:o}", path.display(), mode);
        }
    }

    #[test]
    fn leaf_san_carries_game_id() {
        let dir = tempfile::tempdir().unwrap();
        ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
        let pem = fs::read(dir.path().join(Component::Core.cert_file())).unwrap();
        let (_, parsed) = parse_x509_pem(&pem).unwrap();
        let cert = parsed.parse_x509().unwrap();
        assert!(cert_has_dns_san(&cert, "holomush-limbo"));
        assert!(!cert_has_dns_san(&cert, "holomush-other"));
    }
}
