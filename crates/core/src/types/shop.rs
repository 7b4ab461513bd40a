//! Shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input is not a `*.myshopify.com` host.
    #[error("invalid shop domain: {0}")]
    Invalid(String),
}

/// A Shopify shop domain (e.g. `my-store.myshopify.com`).
///
/// Every persisted record in the app is keyed by this value, and it is
/// used to build Admin API endpoints, so it must never carry a scheme,
/// path or an attacker-chosen host.
///
/// ## Constraints
///
/// - Length: 1-255 characters
/// - Lowercased and trimmed on parse
/// - `<name>.myshopify.com` where `<name>` starts with an ASCII alphanumeric
///   and continues with ASCII alphanumerics or `-`
///
/// ## Examples
///
/// ```
/// use vton_core::ShopDomain;
///
/// assert!(ShopDomain::parse("test-modera.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("Test-Modera.MyShopify.com").is_ok());
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("evil.com").is_err());
/// assert!(ShopDomain::parse("https://shop.myshopify.com").is_err());
/// assert!(ShopDomain::parse("-shop.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a DNS host name.
    pub const MAX_LENGTH: usize = 255;

    /// Suffix every Shopify-hosted shop domain carries.
    pub const MYSHOPIFY_SUFFIX: &'static str = ".myshopify.com";

    /// Parse a `ShopDomain` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or is not a
    /// `*.myshopify.com` host.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        Self::parse_with_custom(s, None)
    }

    /// Parse a `ShopDomain`, additionally accepting an exact match with a
    /// configured custom shop domain.
    ///
    /// # Errors
    ///
    /// Same as [`ShopDomain::parse`], except that `custom` is accepted verbatim
    /// (case-insensitively).
    pub fn parse_with_custom(s: &str, custom: Option<&str>) -> Result<Self, ShopDomainError> {
        let normalized = s.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if normalized.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(custom) = custom
            && !custom.is_empty()
            && normalized == custom.trim().to_ascii_lowercase()
        {
            return Ok(Self(normalized));
        }

        let Some(name) = normalized.strip_suffix(Self::MYSHOPIFY_SUFFIX) else {
            return Err(ShopDomainError::Invalid(normalized));
        };

        let mut chars = name.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid_start || !valid_rest {
            return Err(ShopDomainError::Invalid(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the shop domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Shop admin URL (e.g. `https://shop.myshopify.com/admin`).
    #[must_use]
    pub fn admin_url(&self) -> String {
        format!("https://{}/admin", self.0)
    }

    /// Id of the offline session stored for this shop.
    #[must_use]
    pub fn offline_session_id(&self) -> String {
        format!("offline_{}", self.0)
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(shop: ShopDomain) -> Self {
        shop.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShopDomain {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShopDomain {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values were validated on the way in
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShopDomain {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
