//! Certificate issuance.
//!
//! Every certificate is produced from one [`IssuanceRequest`]. The three
//! entry points ([`generate_ca`], [`generate_server_cert`],
//! [`generate_client_cert`]) only fill in the request for their role.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Builder, X509Name, X509};

use crate::cert::{Certificate, CertifiedKey};
use crate::crypto::{PrivateKey, DEFAULT_KEY_BITS};
use crate::error::{PkiError, Result};

/// X.509 version field value for v3 certificates.
const X509_VERSION_3: i32 = 2;

/// Validity window of every issued certificate.
pub const VALIDITY_DAYS: u32 = 1000;

/// Bits of randomness in a serial number.
const SERIAL_BITS: i32 = 128;

/// What an issued certificate is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertRole {
    /// Self-signed trust anchor that signs server and client certificates.
    Authority,
    /// TLS server identity.
    Server,
    /// Per-user client identity.
    Client,
}

/// Distinguished name fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub common_name: Option<String>,
    /// Two-letter ISO country code.
    pub country: String,
    pub organization: String,
    pub organizational_unit: String,
}

impl Default for Subject {
    fn default() -> Self {
        Self {
            common_name: None,
            country: "US".to_string(),
            organization: "latchkey".to_string(),
            organizational_unit: "rpc".to_string(),
        }
    }
}

impl Subject {
    /// Replace the common name.
    pub fn with_common_name(mut self, common_name: impl Into<String>) -> Self {
        self.common_name = Some(common_name.into());
        self
    }

    fn to_name(&self) -> Result<X509Name> {
        let mut name = X509Name::builder().map_err(issuance)?;
        name.append_entry_by_nid(Nid::COUNTRYNAME, &self.country)
            .map_err(issuance)?;
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, &self.organization)
            .map_err(issuance)?;
        name.append_entry_by_nid(Nid::ORGANIZATIONALUNITNAME, &self.organizational_unit)
            .map_err(issuance)?;
        if let Some(cn) = &self.common_name {
            name.append_entry_by_nid(Nid::COMMONNAME, cn)
                .map_err(issuance)?;
        }
        Ok(name.build())
    }
}

/// Who signs the certificate.
#[derive(Debug, Clone, Copy)]
pub enum Signer<'a> {
    /// The new key signs its own certificate.
    SelfSigned,
    /// An existing certificate and key sign it.
    Issuer(&'a CertifiedKey),
}

/// Parameters for a single certificate.
#[derive(Debug, Clone)]
pub struct IssuanceRequest<'a> {
    pub role: CertRole,
    pub bits: u32,
    pub subject: Subject,
    pub dns_names: Vec<String>,
    pub validity_days: u32,
    pub signer: Signer<'a>,
}

impl<'a> IssuanceRequest<'a> {
    /// A request with default subject, key size and validity, self-signed.
    pub fn new(role: CertRole) -> Self {
        Self {
            role,
            bits: DEFAULT_KEY_BITS,
            subject: Subject::default(),
            dns_names: Vec::new(),
            validity_days: VALIDITY_DAYS,
            signer: Signer::SelfSigned,
        }
    }

    pub fn bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn dns_name(mut self, name: impl Into<String>) -> Self {
        self.dns_names.push(name.into());
        self
    }

    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    pub fn signed_by(mut self, issuer: &'a CertifiedKey) -> Self {
        self.signer = Signer::Issuer(issuer);
        self
    }

    /// Generate a fresh key and a certificate for it.
    pub fn issue(self) -> Result<CertifiedKey> {
        match (self.role, &self.signer) {
            (CertRole::Authority, Signer::Issuer(_)) => {
                return Err(PkiError::Issuance(
                    "authority certificates must be self-signed".into(),
                ))
            }
            (CertRole::Client, Signer::SelfSigned) => {
                return Err(PkiError::Issuance(
                    "client certificates require an issuer".into(),
                ))
            }
            _ => {}
        }

        let private_key = PrivateKey::generate(self.bits)?;
        let x509 = self.build(&private_key)?;
        Ok(CertifiedKey {
            certificate: Certificate::from_x509(x509),
            private_key,
        })
    }

    fn build(&self, key: &PrivateKey) -> Result<X509> {
        let mut builder = X509::builder().map_err(issuance)?;
        builder.set_version(X509_VERSION_3).map_err(issuance)?;

        let mut serial = BigNum::new().map_err(randomness)?;
        serial
            .rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)
            .map_err(randomness)?;
        let serial = serial.to_asn1_integer().map_err(issuance)?;
        builder.set_serial_number(&serial).map_err(issuance)?;

        let subject = self.subject.to_name()?;
        builder.set_subject_name(&subject).map_err(issuance)?;
        match self.signer {
            Signer::SelfSigned => builder.set_issuer_name(&subject).map_err(issuance)?,
            Signer::Issuer(issuer) => builder
                .set_issuer_name(issuer.certificate.as_x509().subject_name())
                .map_err(issuance)?,
        }

        let not_before = Asn1Time::days_from_now(0).map_err(issuance)?;
        let not_after = Asn1Time::days_from_now(self.validity_days).map_err(issuance)?;
        builder.set_not_before(&not_before).map_err(issuance)?;
        builder.set_not_after(&not_after).map_err(issuance)?;
        builder.set_pubkey(key.as_pkey()).map_err(issuance)?;

        self.append_extensions(&mut builder)?;

        let signing_key = match self.signer {
            Signer::SelfSigned => key.as_pkey(),
            Signer::Issuer(issuer) => issuer.private_key.as_pkey(),
        };
        builder
            .sign(signing_key, MessageDigest::sha256())
            .map_err(issuance)?;
        Ok(builder.build())
    }

    fn append_extensions(&self, builder: &mut X509Builder) -> Result<()> {
        let self_signed = matches!(self.signer, Signer::SelfSigned);

        match self.role {
            CertRole::Authority => {
                let bc = BasicConstraints::new().critical().ca().build().map_err(issuance)?;
                builder.append_extension(bc).map_err(issuance)?;
                let ku = KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .digital_signature()
                    .build()
                    .map_err(issuance)?;
                builder.append_extension(ku).map_err(issuance)?;
            }
            CertRole::Server | CertRole::Client => {
                // A self-signed server certificate is its own trust anchor and
                // signs client certificates, yet must stay an end-entity for
                // TLS stacks that refuse CA certificates as server identities.
                let anchors_itself = self.role == CertRole::Server && self_signed;
                if !anchors_itself {
                    let bc = BasicConstraints::new().critical().build().map_err(issuance)?;
                    builder.append_extension(bc).map_err(issuance)?;
                }

                let mut ku = KeyUsage::new();
                ku.critical()
                    .digital_signature()
                    .key_encipherment()
                    .data_encipherment();
                if anchors_itself {
                    ku.key_cert_sign();
                }
                builder
                    .append_extension(ku.build().map_err(issuance)?)
                    .map_err(issuance)?;

                let eku = ExtendedKeyUsage::new()
                    .server_auth()
                    .client_auth()
                    .build()
                    .map_err(issuance)?;
                builder.append_extension(eku).map_err(issuance)?;
            }
        }

        if !self.dns_names.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for name in &self.dns_names {
                san.dns(name);
            }
            let issuer = match self.signer {
                Signer::SelfSigned => None,
                Signer::Issuer(issuer) => Some(&**issuer.certificate.as_x509()),
            };
            let san = san
                .build(&builder.x509v3_context(issuer, None))
                .map_err(issuance)?;
            builder.append_extension(san).map_err(issuance)?;
        }

        Ok(())
    }
}

/// Create a self-signed CA valid for `dns_names`.
pub fn generate_ca(bits: u32, subject: Subject, dns_names: &[String]) -> Result<CertifiedKey> {
    let mut request = IssuanceRequest::new(CertRole::Authority)
        .bits(bits)
        .subject(subject);
    request.dns_names = dns_names.to_vec();
    request.issue()
}

/// Create a server certificate for `host`, signed by `signer`.
pub fn generate_server_cert(bits: u32, host: &str, signer: Signer<'_>) -> Result<CertifiedKey> {
    let mut request = IssuanceRequest::new(CertRole::Server)
        .bits(bits)
        .subject(Subject::default().with_common_name(host))
        .dns_name(host);
    request.signer = signer;
    request.issue()
}

/// Create a client certificate signed by `issuer`.
pub fn generate_client_cert(bits: u32, issuer: &CertifiedKey) -> Result<CertifiedKey> {
    IssuanceRequest::new(CertRole::Client)
        .bits(bits)
        .signed_by(issuer)
        .issue()
}

fn issuance(e: openssl::error::ErrorStack) -> PkiError {
    PkiError::Issuance(e.to_string())
}

fn randomness(e: openssl::error::ErrorStack) -> PkiError {
    PkiError::KeyGeneration(format!("serial number: {e}"))
}
