//! `navigator.credentials` as an [`Authenticator`].

use crate::{
    AssertionResponse, AttestationResponse, Authenticator, COSE_ALG_ES256, CredentialError,
    RelyingParty, UserIdentity,
};
use async_trait::async_trait;
use js_sys::{Array, Object, Reflect, Uint8Array};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// The browser's platform authenticator.
///
/// Registration asks for a resident, user-verified ES256 credential.
/// Assertions are scoped to the relying party id given at construction.
#[derive(Debug, Clone)]
pub struct BrowserAuthenticator {
    rp_id: String,
}

impl BrowserAuthenticator {
    /// Create an authenticator for assertions scoped to `rp_id`.
    pub fn new(rp_id: impl Into<String>) -> Self {
        Self {
            rp_id: rp_id.into(),
        }
    }
}

#[async_trait(?Send)]
impl Authenticator for BrowserAuthenticator {
    async fn create(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError> {
        let public_key_opts = Object::new();
        js_set(
            &public_key_opts,
            "challenge",
            &Uint8Array::from(challenge),
        )?;

        let rp_opts = Object::new();
        js_set(&rp_opts, "id", &JsValue::from_str(&rp.id))?;
        js_set(&rp_opts, "name", &JsValue::from_str(&rp.name))?;
        js_set(&public_key_opts, "rp", &rp_opts)?;

        let user_opts = Object::new();
        js_set(&user_opts, "id", &Uint8Array::from(user.id.as_slice()))?;
        js_set(&user_opts, "name", &JsValue::from_str(&user.name))?;
        js_set(
            &user_opts,
            "displayName",
            &JsValue::from_str(&user.display_name),
        )?;
        js_set(&public_key_opts, "user", &user_opts)?;

        let params = Array::new();
        let param = Object::new();
        js_set(&param, "type", &JsValue::from_str("public-key"))?;
        js_set(&param, "alg", &JsValue::from_f64(COSE_ALG_ES256 as f64))?;
        params.push(&param);
        js_set(&public_key_opts, "pubKeyCredParams", &params)?;

        let selection = Object::new();
        js_set(&selection, "residentKey", &JsValue::from_str("required"))?;
        js_set(
            &selection,
            "userVerification",
            &JsValue::from_str("required"),
        )?;
        js_set(&public_key_opts, "authenticatorSelection", &selection)?;
        js_set(
            &public_key_opts,
            "timeout",
            &JsValue::from_f64(timeout.as_millis() as f64),
        )?;

        let options = Object::new();
        js_set(&options, "publicKey", &public_key_opts)?;

        let credential = call_container("create", &options, timeout).await?;

        let raw_id = array_buffer_to_vec(&js_get(&credential, "rawId")?);
        let response = js_get(&credential, "response")?;

        Ok(AttestationResponse {
            raw_id,
            attestation_object: array_buffer_to_vec(&js_get(&response, "attestationObject")?),
            client_data_json: array_buffer_to_vec(&js_get(&response, "clientDataJSON")?),
        })
    }

    async fn get(
        &self,
        allowed: &[Vec<u8>],
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError> {
        let public_key_opts = Object::new();
        js_set(
            &public_key_opts,
            "challenge",
            &Uint8Array::from(challenge),
        )?;
        js_set(&public_key_opts, "rpId", &JsValue::from_str(&self.rp_id))?;
        js_set(
            &public_key_opts,
            "userVerification",
            &JsValue::from_str("required"),
        )?;
        js_set(
            &public_key_opts,
            "timeout",
            &JsValue::from_f64(timeout.as_millis() as f64),
        )?;

        let allow_credentials = Array::new();
        for id in allowed {
            let descriptor = Object::new();
            js_set(&descriptor, "type", &JsValue::from_str("public-key"))?;
            js_set(&descriptor, "id", &Uint8Array::from(id.as_slice()))?;
            allow_credentials.push(&descriptor);
        }
        js_set(&public_key_opts, "allowCredentials", &allow_credentials)?;

        let options = Object::new();
        js_set(&options, "publicKey", &public_key_opts)?;

        let credential = call_container("get", &options, timeout).await?;

        let raw_id = array_buffer_to_vec(&js_get(&credential, "rawId")?);
        let response = js_get(&credential, "response")?;

        Ok(AssertionResponse {
            raw_id,
            authenticator_data: array_buffer_to_vec(&js_get(&response, "authenticatorData")?),
            client_data_json: array_buffer_to_vec(&js_get(&response, "clientDataJSON")?),
            signature: array_buffer_to_vec(&js_get(&response, "signature")?),
        })
    }
}

/// Call `navigator.credentials[method](options)` and await the credential.
async fn call_container(
    method: &str,
    options: &Object,
    timeout: Duration,
) -> Result<JsValue, CredentialError> {
    let credentials = get_credentials_container()?;
    let function: js_sys::Function = js_get(&credentials, method)?
        .dyn_into()
        .map_err(|_| CredentialError::NotAvailable(format!("credentials.{method} missing")))?;
    let promise: js_sys::Promise = function
        .call1(&credentials, options)
        .map_err(|e| map_dom_exception(e, timeout))?
        .unchecked_into();
    let credential = JsFuture::from(promise)
        .await
        .map_err(|e| map_dom_exception(e, timeout))?;

    if credential.is_null() || credential.is_undefined() {
        return Err(CredentialError::NotAllowed(
            "platform returned no credential".into(),
        ));
    }
    Ok(credential)
}

/// Classify a rejected ceremony by its `DOMException` name.
fn map_dom_exception(error: JsValue, timeout: Duration) -> CredentialError {
    let name = Reflect::get(&error, &JsValue::from_str("name"))
        .ok()
        .and_then(|name| name.as_string())
        .unwrap_or_default();
    let message = Reflect::get(&error, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{error:?}"));

    match name.as_str() {
        "NotAllowedError" => CredentialError::NotAllowed(message),
        "InvalidStateError" => CredentialError::DuplicateCredential,
        "NotSupportedError" => CredentialError::UnsupportedAlgorithm(COSE_ALG_ES256),
        "AbortError" | "TimeoutError" => CredentialError::TimedOut(timeout),
        "SecurityError" => CredentialError::NotAvailable(message),
        _ => CredentialError::JsError(message),
    }
}

fn get_credentials_container() -> Result<JsValue, CredentialError> {
    let global = js_sys::global();
    let navigator = Reflect::get(&global, &"navigator".into())
        .map_err(|_| CredentialError::NotAvailable("navigator not found".into()))?;
    if navigator.is_undefined() {
        return Err(CredentialError::NotAvailable(
            "navigator is undefined".into(),
        ));
    }
    let credentials = Reflect::get(&navigator, &"credentials".into())
        .map_err(|_| CredentialError::NotAvailable("credentials not found".into()))?;
    if credentials.is_undefined() {
        return Err(CredentialError::NotAvailable(
            "navigator.credentials is undefined".into(),
        ));
    }
    Ok(credentials)
}

fn js_get(obj: &JsValue, key: &str) -> Result<JsValue, CredentialError> {
    Reflect::get(obj, &JsValue::from_str(key))
        .map_err(|e| CredentialError::JsError(format!("failed to get '{key}': {e:?}")))
}

fn js_set(obj: &Object, key: &str, value: &JsValue) -> Result<(), CredentialError> {
    Reflect::set(obj, &JsValue::from_str(key), value)
        .map_err(|e| CredentialError::JsError(format!("failed to set '{key}': {e:?}")))?;
    Ok(())
}

/// Copy a JS `ArrayBuffer` (or typed-array view) into a `Vec<u8>`.
fn array_buffer_to_vec(value: &JsValue) -> Vec<u8> {
    let array = Uint8Array::new(value);
    let mut bytes = vec![0u8; array.length() as usize];
    array.copy_to(&mut bytes);
    bytes
}

#[cfg(all(test, feature = "web-integration-tests"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn it_classifies_dom_exceptions_by_name() {
        let error = Object::new();
        js_set(&error, "name", &JsValue::from_str("InvalidStateError")).unwrap();
        assert_eq!(
            map_dom_exception(error.into(), Duration::from_secs(1)),
            CredentialError::DuplicateCredential
        );
    }
}
