//! Server certificate verification hook.
//!
//! The handshake hands the received chain to a [`ServerCertVerifier`] before
//! any key material is derived. Chain building and path validation are left
//! to implementors; the crate ships only [`AcceptAnyCertificate`].

use crate::Result;

/// Decides whether the server's certificate chain is acceptable.
pub trait ServerCertVerifier: Send + Sync {
    /// Inspect the DER chain (leaf first) presented for `server_name`.
    ///
    /// Returning an error aborts the handshake.
    fn verify(&self, server_name: &str, chain: &[Vec<u8>]) -> Result<()>;
}

/// Accepts every certificate chain, including an empty one.
///
/// The connection is then only protected against passive observers. Not
/// suitable for untrusted networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify(&self, server_name: &str, chain: &[Vec<u8>]) -> Result<()> {
        tracing::warn!(
            server_name,
            certificates = chain.len(),
            "Server certificate NOT verified - connection is open to active interception"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct RequireLeaf;

    impl ServerCertVerifier for RequireLeaf {
        fn verify(&self, _server_name: &str, chain: &[Vec<u8>]) -> Result<()> {
            if chain.is_empty() {
                Err(Error::Certificate("empty chain".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_accept_any() {
        assert!(AcceptAnyCertificate.verify("example.com", &[]).is_ok());
        assert!(AcceptAnyCertificate
            .verify("example.com", &[vec![0x30, 0x82]])
            .is_ok());
    }

    #[test]
    fn test_custom_verifier_as_trait_object() {
        let verifier: Box<dyn ServerCertVerifier> = Box::new(RequireLeaf);
        assert!(matches!(
            verifier.verify("example.com", &[]),
            Err(Error::Certificate(_))
        ));
        assert!(verifier.verify("example.com", &[vec![1]]).is_ok());
    }
}
