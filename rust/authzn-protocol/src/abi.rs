//! Solidity bindings for the account manager, the per-user account and the
//! TOTP example contract.
//!
//! Method names, argument order and types here are the wire protocol: they
//! must match the deployed contracts exactly.

use alloy_sol_types::sol;

sol! {
    /// An EC2 P-256 public key in the shape the account manager stores.
    #[derive(Debug, PartialEq, Eq)]
    struct CosePublicKey {
        uint8 kty;
        int8 alg;
        uint8 crv;
        uint256 x;
        uint256 y;
    }

    /// Arguments of a gasless registration.
    #[derive(Debug, PartialEq, Eq)]
    struct RegisterArgs {
        bytes32 hashedUsername;
        bytes credentialId;
        CosePublicKey pubkey;
        bytes32 optionalPassword;
    }

    /// One top-level member of `clientDataJSON`. `t` is `0` for strings and
    /// `1` for literals.
    #[derive(Debug, PartialEq, Eq)]
    struct ClientDataField {
        uint8 t;
        string k;
        string v;
    }

    /// A WebAuthn assertion as the account manager verifies it.
    #[derive(Debug, PartialEq, Eq)]
    struct AuthenticatorResponse {
        bytes authenticatorData;
        ClientDataField[] clientDataTokens;
        uint256 sigR;
        uint256 sigS;
    }

    /// A secp256k1 signature produced by an account.
    #[derive(Debug, PartialEq, Eq)]
    struct SignatureRSV {
        bytes32 r;
        bytes32 s;
        uint256 v;
    }

    /// The account manager: user registry, gas sponsor and assertion gate.
    interface AccountManager {
        function salt() external view returns (bytes32);
        function userExists(bytes32 in_usernameHash) external view returns (bool);
        function credentialIdsByUsername(bytes32 in_usernameHash) external view returns (bytes32[] out_credentialIds);
        function gaspayingAddress() external view returns (address);
        function gasless_registerECES256P256(RegisterArgs args, uint64 nonce, uint256 gasPrice) external view returns (bytes out_data);
        function proxyViewECES256P256(bytes32 in_credentialIdHashed, AuthenticatorResponse in_resp, bytes in_data) external view returns (bytes out_data);
    }

    /// The per-user account a proxied call executes as.
    interface Account {
        function sign(bytes32 digest) external view returns (SignatureRSV);
        function staticcall(address in_contract, bytes in_data) external view returns (bool success, bytes out_data);
    }

    /// The TOTP example contract.
    interface TOTPExample {
        function deriveSecret() external view returns (bytes32);
        function generate() external view returns (uint32);
    }
}
