//! `clientDataJSON` tokenization.
//!
//! The account contract never parses JSON. It rebuilds `clientDataJSON` from a
//! flat list of `{t, k, v}` tokens, hashes the result and checks the embedded
//! challenge. Tokenizing therefore has to be lossless: rendering the tokens
//! must reproduce the platform's bytes exactly, or the signature will not
//! verify on-chain.

use crate::CredentialError;
use serde_json::Value;

/// How a token's value is rendered back into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenKind {
    /// A JSON string; rendered quoted and escaped.
    String = 0,
    /// A JSON literal (`true`, `false`, `null` or a number); rendered verbatim.
    Literal = 1,
}

/// One top-level `"key": value` pair of `clientDataJSON`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDataToken {
    /// How `value` is rendered.
    pub kind: TokenKind,
    /// The member name.
    pub key: String,
    /// The unescaped string contents, or the literal's source text.
    pub value: String,
}

/// Split `clientDataJSON` into tokens, preserving member order.
///
/// Fails if the document is not a flat JSON object, or if its canonical
/// rendering differs from the original bytes (for example because of
/// insignificant whitespace the contract cannot reproduce).
pub fn tokenize_client_data(json: &[u8]) -> Result<Vec<ClientDataToken>, CredentialError> {
    let document: Value = serde_json::from_slice(json)
        .map_err(|e| CredentialError::InvalidAssertion(format!("clientDataJSON: {e}")))?;
    let Value::Object(members) = document else {
        return Err(CredentialError::InvalidAssertion(
            "clientDataJSON is not an object".into(),
        ));
    };

    let tokens = members
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok(ClientDataToken {
                kind: TokenKind::String,
                key,
                value,
            }),
            Value::Bool(_) | Value::Number(_) | Value::Null => Ok(ClientDataToken {
                kind: TokenKind::Literal,
                key,
                value: value.to_string(),
            }),
            Value::Array(_) | Value::Object(_) => Err(CredentialError::InvalidAssertion(format!(
                "clientDataJSON member {key:?} is not a scalar"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if render_tokens(&tokens).as_bytes() != json {
        return Err(CredentialError::InvalidAssertion(
            "clientDataJSON is not in canonical compact form".into(),
        ));
    }

    Ok(tokens)
}

/// Render tokens back into compact JSON, exactly as the contract does.
pub fn render_tokens(tokens: &[ClientDataToken]) -> String {
    let mut out = String::from("{");
    for (index, token) in tokens.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&quote(&token.key));
        out.push(':');
        match token.kind {
            TokenKind::String => out.push_str(&quote(&token.value)),
            TokenKind::Literal => out.push_str(&token.value),
        }
    }
    out.push('}');
    out
}

/// Quote `text` the way browsers serialize `CollectedClientData`. Only `"`
/// and `\` get a backslash; other control characters become `\u00xx`.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if u32::from(c) < 0x20 => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CHROME: &str = r#"{"type":"webauthn.get","challenge":"q83vEjRWeJA","origin":"https://auth.example","crossOrigin":false,"other_keys_can_be_added_here":"do not compare clientDataJSON against a template. See https://goo.gl/yabPex"}"#;

    #[test]
    fn it_preserves_member_order_and_kinds() {
        let tokens = tokenize_client_data(CHROME.as_bytes()).unwrap();
        let keys: Vec<_> = tokens.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "type",
                "challenge",
                "origin",
                "crossOrigin",
                "other_keys_can_be_added_here"
            ]
        );
        assert_eq!(tokens[3].kind, TokenKind::Literal);
        assert_eq!(tokens[3].value, "false");
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].value, "q83vEjRWeJA");
    }

    #[test]
    fn it_renders_the_original_bytes() {
        let tokens = tokenize_client_data(CHROME.as_bytes()).unwrap();
        assert_eq!(render_tokens(&tokens), CHROME);
    }

    #[test]
    fn it_refuses_whitespace_the_contract_cannot_reproduce() {
        let spaced = r#"{"type": "webauthn.get", "challenge": "AA"}"#;
        assert!(matches!(
            tokenize_client_data(spaced.as_bytes()),
            Err(CredentialError::InvalidAssertion(_))
        ));
    }

    #[test]
    fn it_refuses_nested_members() {
        let nested = r#"{"type":"webauthn.get","tokenBinding":{"status":"present"}}"#;
        assert!(tokenize_client_data(nested.as_bytes()).is_err());
    }

    #[test]
    fn it_escapes_string_values() {
        let tokens = vec![ClientDataToken {
            kind: TokenKind::String,
            key: "origin".into(),
            value: "say \"hi\"".into(),
        }];
        assert_eq!(render_tokens(&tokens), r#"{"origin":"say \"hi\""}"#);
    }

    #[test]
    fn it_escapes_control_characters_as_unicode_escapes() -> testresult::TestResult {
        let tokens = vec![ClientDataToken {
            kind: TokenKind::String,
            key: "origin".into(),
            value: "a\nb\tc\\d\u{1}é/".into(),
        }];
        let rendered = render_tokens(&tokens);
        assert_eq!(rendered, r#"{"origin":"a\u000ab\u0009c\\d\u0001é/"}"#);

        let reparsed = tokenize_client_data(rendered.as_bytes())?;
        assert_eq!(reparsed, tokens);
        Ok(())
    }

    #[test]
    fn it_refuses_short_escapes_the_contract_would_not_produce() {
        let short = r#"{"type":"webauthn.get","origin":"a\nb"}"#;
        assert!(tokenize_client_data(short.as_bytes()).is_err());
    }
}
