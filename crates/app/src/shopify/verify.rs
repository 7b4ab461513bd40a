//! HMAC signature checks for requests Shopify sends or signs.
//!
//! All three schemes use HMAC-SHA256 keyed with the app's API secret and
//! compare in constant time.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 webhook signature.
pub const WEBHOOK_HMAC_HEADER: &str = "x-shopify-hmac-sha256";

fn mac(secret: &str, message: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(mac)
}

/// Decode an `application/x-www-form-urlencoded` query into pairs.
fn query_pairs(raw_query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw_query.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

// =============================================================================
// OAuth callback
// =============================================================================

/// Verify the `hmac` parameter of an OAuth callback (or admin launch) query.
///
/// The message is every parameter except `hmac` and `signature`, sorted by key and
/// joined as `k=v` pairs with `&`. The digest is hex encoded.
#[must_use]
pub fn verify_oauth_query(raw_query: &str, secret: &str) -> bool {
    let mut pairs = query_pairs(raw_query);

    let Some(provided) = pairs
        .iter()
        .find(|(k, _)| k == "hmac")
        .map(|(_, v)| v.clone())
    else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    pairs.retain(|(k, _)| k != "hmac" && k != "signature");
    pairs.sort();

    let message = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    mac(secret, message.as_bytes()).is_some_and(|m| m.verify_slice(&provided).is_ok())
}

// =============================================================================
// Webhooks
// =============================================================================

/// Verify a webhook body against its `X-Shopify-Hmac-Sha256` header.
#[must_use]
pub fn verify_webhook(body: &[u8], header_b64: &str, secret: &str) -> bool {
    let Ok(provided) = BASE64.decode(header_b64.trim()) else {
        return false;
    };

    mac(secret, body).is_some_and(|m| m.verify_slice(&provided).is_ok())
}

// =============================================================================
// App Proxy
// =============================================================================

/// Verify the `signature` parameter Shopify adds to App Proxy requests.
///
/// Parameters other than `signature` are grouped by key (repeated keys join
/// their values with `,`), sorted and concatenated as `k=v` with no
/// separator. The digest is hex encoded.
#[must_use]
pub fn verify_app_proxy(raw_query: &str, secret: &str) -> bool {
    let pairs = query_pairs(raw_query);

    let Some(provided) = pairs
        .iter()
        .find(|(k, _)| k == "signature")
        .map(|(_, v)| v.clone())
    else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    let message = app_proxy_message(&pairs);
    mac(secret, message.as_bytes()).is_some_and(|m| m.verify_slice(&provided).is_ok())
}

fn app_proxy_message(pairs: &[(String, String)]) -> String {
    let mut grouped: std::collections::BTreeMap<&str, Vec<&str>> = std::collections::BTreeMap::new();
    for (k, v) in pairs.iter().filter(|(k, _)| k != "signature") {
        grouped.entry(k.as_str()).or_default().push(v.as_str());
    }

    grouped
        .into_iter()
        .map(|(k, values)| format!("{k}={}", values.join(",")))
        .collect()
}

// =============================================================================
// Signing helpers (tests)
// =============================================================================

/// Append a valid OAuth `hmac` to a query. Used by tests.
#[doc(hidden)]
#[must_use]
pub fn sign_oauth_query(raw_query: &str, secret: &str) -> String {
    let mut pairs = query_pairs(raw_query);
    pairs.sort();
    let message = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let digest = mac(secret, message.as_bytes())
        .map(|m| hex::encode(m.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{raw_query}&hmac={digest}")
}

/// Base64 webhook signature of `body`. Used by tests.
#[doc(hidden)]
#[must_use]
pub fn sign_webhook(body: &[u8], secret: &str) -> String {
    mac(secret, body)
        .map(|m| BASE64.encode(m.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Append a valid App Proxy `signature` to a query. Used by tests.
#[doc(hidden)]
#[must_use]
pub fn sign_app_proxy_query(raw_query: &str, secret: &str) -> String {
    let message = app_proxy_message(&query_pairs(raw_query));
    let digest = mac(secret, message.as_bytes())
        .map(|m| hex::encode(m.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{raw_query}&signature={digest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "hush";

    // =========================================================================
    // OAuth Tests
    // =========================================================================

    #[test]
    fn test_oauth_query_known_vector() {
        // Example from Shopify's OAuth documentation.
        let query = "code=0907a61c0c8d55e99db179b68161bc00&hmac=700e2dadb827fcc8609e9d5ce208b2e9cdaab9df07390d2cbca10d7c328fc4bf&shop=some-shop.myshopify.com&state=0.6784241404160823&timestamp=1337178173";
        assert!(verify_oauth_query(query, SECRET));
    }

    #[test]
    fn test_oauth_query_order_independent() {
        let signed = sign_oauth_query("timestamp=1&shop=demo.myshopify.com&code=abc", SECRET);
        assert!(verify_oauth_query(&signed, SECRET));
    }

    #[test]
    fn test_oauth_query_rejects_tampering() {
        let signed = sign_oauth_query("code=abc&shop=demo.myshopify.com", SECRET);
        let tampered = signed.replace("code=abc", "code=abd");
        assert!(!verify_oauth_query(&tampered, SECRET));
        assert!(!verify_oauth_query(&signed, "other"));
    }

    #[test]
    fn test_oauth_query_missing_or_malformed_hmac() {
        assert!(!verify_oauth_query("code=abc&shop=demo.myshopify.com", SECRET));
        assert!(!verify_oauth_query("code=abc&hmac=not-hex", SECRET));
    }

    // =========================================================================
    // Webhook Tests
    // =========================================================================

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"id":1}"#;
        let header = sign_webhook(body, SECRET);
        assert!(verify_webhook(body, &header, SECRET));
        assert!(!verify_webhook(br#"{"id":2}"#, &header, SECRET));
        assert!(!verify_webhook(body, &header, "other"));
    }

    #[test]
    fn test_webhook_rejects_non_base64() {
        assert!(!verify_webhook(b"{}", "***", SECRET));
        assert!(!verify_webhook(b"{}", "", SECRET));
    }

    // =========================================================================
    // App Proxy Tests
    // =========================================================================

    #[test]
    fn test_app_proxy_known_vector() {
        let query = "extra=1&extra=2&shop=shop-name.myshopify.com&logged_in_customer_id=1&path_prefix=%2Fapps%2Fawesome_reviews&timestamp=1317327555&signature=4c68c8624d737112c91818c11017d24d334b524cb5c2b8ba08daa056f7395ddb";
        assert!(verify_app_proxy(query, SECRET));
    }

    #[test]
    fn test_app_proxy_message_groups_repeated_keys() {
        let pairs = query_pairs("b=2&a=1&b=3&signature=x");
        assert_eq!(app_proxy_message(&pairs), "a=1b=2,3");
    }

    #[test]
    fn test_app_proxy_rejects_tampering() {
        let signed = sign_app_proxy_query("shop=demo.myshopify.com&timestamp=1", SECRET);
        assert!(verify_app_proxy(&signed, SECRET));
        assert!(!verify_app_proxy(&signed.replace("timestamp=1", "timestamp=2"), SECRET));
        assert!(!verify_app_proxy("shop=demo.myshopify.com", SECRET));
    }
}
