use alloy_primitives::{Address, B256, U256, address, b256};
use anyhow::Result;
use authzn_common::time::Duration;
use authzn_credentials::{
    Credential, CredentialBroker, RelyingParty, SoftwareAuthenticator, UserIdentity,
};
use authzn_protocol::{
    AuthznError, GaslessRegistrar, MemoryLedger, TransactionRelay, register_args,
};
use pretty_assertions::assert_eq;

const MANAGER: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
const CHAIN_ID: u64 = 0x5aff;
const SALT: B256 = b256!("0000000000000000000000000000000000000000000000000000000000000001");

async fn credential(user: u8) -> Result<(B256, Credential)> {
    let broker = CredentialBroker::new(SoftwareAuthenticator::new("http://localhost"));
    let hashed_username = B256::repeat_byte(user);
    let credential = broker
        .register(
            &RelyingParty {
                id: "localhost".into(),
                name: "authzn".into(),
            },
            &UserIdentity {
                id: hashed_username.to_vec(),
                name: format!("user{user}"),
                display_name: format!("user{user}"),
            },
            &[0u8; 32],
        )
        .await?;
    Ok((hashed_username, credential))
}

fn registrar(ledger: &MemoryLedger) -> GaslessRegistrar<MemoryLedger, MemoryLedger> {
    GaslessRegistrar::new(ledger.clone(), ledger.clone())
        .with_poll_interval(Duration::from_millis(5))
        .with_inclusion_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn it_reads_sponsor_terms_from_the_sponsor_account() -> Result<()> {
    let ledger = MemoryLedger::new(MANAGER, CHAIN_ID, SALT);
    ledger.set_gas_price(U256::from(7u64));

    let terms = registrar(&ledger).sponsor_terms().await?;
    assert_eq!(terms.sponsor, ledger.sponsor());
    assert_eq!(terms.nonce, 0);
    assert_eq!(terms.gas_price, U256::from(7u64));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_submits_and_waits_for_inclusion() -> Result<()> {
    let ledger = MemoryLedger::new(MANAGER, CHAIN_ID, SALT);
    let registrar = registrar(&ledger);
    let (hashed, credential) = credential(1).await?;

    let terms = registrar.sponsor_terms().await?;
    let signed = registrar
        .build_signed_registration(
            hashed,
            &credential.id,
            &credential.public_key,
            terms.nonce,
            terms.gas_price,
        )
        .await?;
    let receipt = registrar.submit(signed).await?;

    assert_eq!(receipt.block_number, 1);
    assert_eq!(ledger.transaction_count(ledger.sponsor()).await?, 1);
    Ok(())
}

#[tokio::test]
async fn it_fails_the_second_registration_built_on_the_same_nonce() -> Result<()> {
    let ledger = MemoryLedger::new(MANAGER, CHAIN_ID, SALT);
    let registrar = registrar(&ledger);
    let (alice, alice_credential) = credential(1).await?;
    let (bob, bob_credential) = credential(2).await?;

    let terms = registrar.sponsor_terms().await?;
    let first = registrar
        .build_signed_registration(
            alice,
            &alice_credential.id,
            &alice_credential.public_key,
            terms.nonce,
            terms.gas_price,
        )
        .await?;
    let second = registrar
        .build_signed_registration(
            bob,
            &bob_credential.id,
            &bob_credential.public_key,
            terms.nonce,
            terms.gas_price,
        )
        .await?;

    registrar.submit(first).await?;
    let result = registrar.submit(second).await;
    assert_eq!(
        result,
        Err(AuthznError::Submission {
            code: -32000,
            message: "nonce too low".into(),
        })
    );
    Ok(())
}

#[tokio::test]
async fn it_reports_the_contract_refusing_to_sign() -> Result<()> {
    let ledger = MemoryLedger::new(MANAGER, CHAIN_ID, SALT);
    ledger.refuse_signing("registration closed");
    let (hashed, credential) = credential(1).await?;

    let result = registrar(&ledger)
        .build_signed_registration(hashed, &credential.id, &credential.public_key, 0, U256::ZERO)
        .await;
    assert_eq!(
        result,
        Err(AuthznError::Signing {
            reason: "registration closed".into()
        })
    );
    Ok(())
}

#[tokio::test]
async fn it_gives_up_when_inclusion_takes_too_long() -> Result<()> {
    let ledger = MemoryLedger::new(MANAGER, CHAIN_ID, SALT);
    ledger.hold_receipts(true);
    let registrar = registrar(&ledger).with_inclusion_timeout(Duration::from_millis(50));
    let (hashed, credential) = credential(1).await?;

    let signed = registrar
        .build_signed_registration(hashed, &credential.id, &credential.public_key, 0, U256::ZERO)
        .await?;
    let result = registrar.submit(signed).await;
    assert_eq!(
        result,
        Err(AuthznError::Timeout {
            operation: "transaction inclusion",
            after: Duration::from_millis(50),
        })
    );
    Ok(())
}

#[test]
fn it_leaves_the_optional_password_zero() {
    let key = authzn_credentials::CoseKey {
        kty: 2,
        alg: -7,
        crv: 1,
        x: [1u8; 32],
        y: [2u8; 32],
    };
    let args = register_args(B256::repeat_byte(9), &[3u8; 32], &key);
    assert_eq!(args.optionalPassword, B256::ZERO);
    assert_eq!(args.pubkey.x, U256::from_be_bytes([1u8; 32]));
}
