use anyhow::Result;
use async_trait::async_trait;
use authzn_credentials::{
    AssertionResponse, AssertionVerifier, AttestationResponse, Authenticator, CredentialBroker,
    CredentialError, RelyingParty, SoftwareAuthenticator, TokenKind, UserIdentity,
    render_tokens,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn rp() -> RelyingParty {
    RelyingParty {
        id: "localhost".into(),
        name: "authzn".into(),
    }
}

fn user() -> UserIdentity {
    UserIdentity {
        id: vec![0x42; 32],
        name: "alice".into(),
        display_name: "alice".into(),
    }
}

#[tokio::test]
async fn it_registers_then_asserts_with_a_verifiable_signature() -> Result<()> {
    let broker = CredentialBroker::new(SoftwareAuthenticator::new("http://localhost"));
    let credential = broker.register(&rp(), &user(), &[7u8; 32]).await?;

    let challenge = [9u8; 32];
    let assertion = broker
        .assert(&[credential.id.clone()], &challenge)
        .await?;

    assert_eq!(assertion.credential_id, credential.id);
    assert_eq!(
        render_tokens(&assertion.client_data_tokens).into_bytes(),
        assertion.client_data_json
    );

    AssertionVerifier::from_cose(&credential.public_key)?
        .verify_assertion(&challenge, &assertion)?;
    Ok(())
}

#[tokio::test]
async fn it_tokenizes_client_data_with_literal_cross_origin() -> Result<()> {
    let broker = CredentialBroker::new(SoftwareAuthenticator::new("http://localhost"));
    let credential = broker.register(&rp(), &user(), &[7u8; 32]).await?;
    let assertion = broker.assert(&[credential.id], &[1u8; 32]).await?;

    let kinds: Vec<_> = assertion
        .client_data_tokens
        .iter()
        .map(|t| (t.key.as_str(), t.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("type", TokenKind::String),
            ("challenge", TokenKind::String),
            ("origin", TokenKind::String),
            ("crossOrigin", TokenKind::Literal),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn it_fails_fast_without_candidates() -> Result<()> {
    let broker = CredentialBroker::new(SoftwareAuthenticator::new("http://localhost"));
    let result = broker.assert(&[], &[1u8; 32]).await;
    assert_eq!(result, Err(CredentialError::NoCredentials));
    Ok(())
}

#[tokio::test]
async fn it_does_not_verify_under_another_challenge() -> Result<()> {
    let broker = CredentialBroker::new(SoftwareAuthenticator::new("http://localhost"));
    let credential = broker.register(&rp(), &user(), &[7u8; 32]).await?;
    let assertion = broker.assert(&[credential.id.clone()], &[1u8; 32]).await?;

    let verifier = AssertionVerifier::from_cose(&credential.public_key)?;
    assert!(verifier.verify_assertion(&[2u8; 32], &assertion).is_err());
    Ok(())
}

/// Never finishes a ceremony, like a prompt the user walks away from.
struct Unresponsive;

#[async_trait]
impl Authenticator for Unresponsive {
    async fn create(
        &self,
        _rp: &RelyingParty,
        _user: &UserIdentity,
        _challenge: &[u8],
        _timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError> {
        std::future::pending().await
    }

    async fn get(
        &self,
        _allowed: &[Vec<u8>],
        _challenge: &[u8],
        _timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn it_times_out_an_abandoned_ceremony() -> Result<()> {
    let broker = CredentialBroker::new(Unresponsive).with_timeout(Duration::from_millis(20));

    let created = broker.register(&rp(), &user(), &[0u8; 32]).await;
    assert_eq!(
        created,
        Err(CredentialError::TimedOut(Duration::from_millis(20)))
    );

    let asserted = broker.assert(&[vec![1u8; 32]], &[0u8; 32]).await;
    assert_eq!(
        asserted,
        Err(CredentialError::TimedOut(Duration::from_millis(20)))
    );
    Ok(())
}

/// Answers every assertion with a credential nobody asked for.
struct Impostor(SoftwareAuthenticator);

#[async_trait]
impl Authenticator for Impostor {
    async fn create(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError> {
        self.0.create(rp, user, challenge, timeout).await
    }

    async fn get(
        &self,
        allowed: &[Vec<u8>],
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError> {
        let mut response = self.0.get(allowed, challenge, timeout).await?;
        response.raw_id = vec![0xEE; 32];
        Ok(response)
    }
}

#[tokio::test]
async fn it_rejects_an_assertion_from_outside_the_candidate_set() -> Result<()> {
    let broker = CredentialBroker::new(Impostor(SoftwareAuthenticator::new("http://localhost")));
    let credential = broker.register(&rp(), &user(), &[0u8; 32]).await?;

    let result = broker.assert(&[credential.id], &[1u8; 32]).await;
    assert!(matches!(result, Err(CredentialError::InvalidAssertion(_))));
    Ok(())
}
