//! Storefront try-on button configuration.

use serde::{Deserialize, Serialize};

/// Where the theme extension places the try-on button on a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonPosition {
    #[default]
    BelowAddToCart,
    AboveAddToCart,
    BelowProductTitle,
    BelowPrice,
}

impl ButtonPosition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BelowAddToCart => "below_add_to_cart",
            Self::AboveAddToCart => "above_add_to_cart",
            Self::BelowProductTitle => "below_product_title",
            Self::BelowPrice => "below_price",
        }
    }
}

impl std::fmt::Display for ButtonPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ButtonPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "below_add_to_cart" => Ok(Self::BelowAddToCart),
            "above_add_to_cart" => Ok(Self::AboveAddToCart),
            "below_product_title" => Ok(Self::BelowProductTitle),
            "below_price" => Ok(Self::BelowPrice),
            _ => Err(format!("invalid button position: {s}")),
        }
    }
}

/// Per-shop button settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonSettings {
    pub button_text: String,
    pub button_position: ButtonPosition,
    pub is_enabled: bool,
}

impl ButtonSettings {
    pub const DEFAULT_TEXT: &'static str = "Try On Virtually";
    pub const MAX_TEXT_LENGTH: usize = 100;
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            button_text: Self::DEFAULT_TEXT.to_string(),
            button_position: ButtonPosition::default(),
            is_enabled: false,
        }
    }
}

/// Partial update submitted from the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonSettingsUpdate {
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub button_position: Option<ButtonPosition>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

impl ButtonSettingsUpdate {
    /// Merge this update on top of `current`.
    ///
    /// Blank text keeps the current text; text longer than
    /// [`ButtonSettings::MAX_TEXT_LENGTH`] characters is truncated.
    #[must_use]
    pub fn apply_to(self, current: ButtonSettings) -> ButtonSettings {
        let button_text = match self.button_text {
            Some(text) if !text.trim().is_empty() => text
                .trim()
                .chars()
                .take(ButtonSettings::MAX_TEXT_LENGTH)
                .collect(),
            _ => current.button_text,
        };

        ButtonSettings {
            button_text,
            button_position: self.button_position.unwrap_or(current.button_position),
            is_enabled: self.is_enabled.unwrap_or(current.is_enabled),
        }
    }
}

/// Garment category understood by the try-on vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GarmentCategory {
    #[default]
    Tshirt,
    Pants,
    Dress,
}

impl GarmentCategory {
    /// Map the storefront's body-part selector to a vendor category.
    #[must_use]
    pub fn from_body_part(body_part: &str) -> Self {
        match body_part {
            "lower_body" => Self::Pants,
            "full_body" => Self::Dress,
            _ => Self::Tshirt,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tshirt => "tshirt",
            Self::Pants => "pants",
            Self::Dress => "dress",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ButtonSettings::default();
        assert_eq!(settings.button_text, "Try On Virtually");
        assert_eq!(settings.button_position, ButtonPosition::BelowAddToCart);
        assert!(!settings.is_enabled);
    }

    #[test]
    fn test_position_parse() {
        assert_eq!(
            "below_price".parse::<ButtonPosition>(),
            Ok(ButtonPosition::BelowPrice)
        );
        assert!("sidebar".parse::<ButtonPosition>().is_err());
        assert_eq!(ButtonPosition::AboveAddToCart.to_string(), "above_add_to_cart");
    }

    #[test]
    fn test_update_merges_partial_fields() {
        let update = ButtonSettingsUpdate {
            is_enabled: Some(true),
            ..ButtonSettingsUpdate::default()
        };
        let merged = update.apply_to(ButtonSettings::default());
        assert_eq!(merged.button_text, "Try On Virtually");
        assert!(merged.is_enabled);
    }

    #[test]
    fn test_update_blank_text_is_ignored() {
        let update = ButtonSettingsUpdate {
            button_text: Some("   ".to_string()),
            button_position: Some(ButtonPosition::BelowPrice),
            is_enabled: None,
        };
        let merged = update.apply_to(ButtonSettings::default());
        assert_eq!(merged.button_text, "Try On Virtually");
        assert_eq!(merged.button_position, ButtonPosition::BelowPrice);
    }

    #[test]
    fn test_update_truncates_long_text() {
        let update = ButtonSettingsUpdate {
            button_text: Some("x".repeat(300)),
            ..ButtonSettingsUpdate::default()
        };
        let merged = update.apply_to(ButtonSettings::default());
        assert_eq!(merged.button_text.len(), ButtonSettings::MAX_TEXT_LENGTH);
    }

    #[test]
    fn test_update_deserializes_camel_case() {
        let update: ButtonSettingsUpdate =
            serde_json::from_str(r#"{"buttonText":"Try it","buttonPosition":"above_add_to_cart"}"#)
                .unwrap();
        assert_eq!(update.button_text.as_deref(), Some("Try it"));
        assert_eq!(update.button_position, Some(ButtonPosition::AboveAddToCart));
        assert_eq!(update.is_enabled, None);
    }

    #[test]
    fn test_garment_category_mapping() {
        assert_eq!(GarmentCategory::from_body_part("upper_body"), GarmentCategory::Tshirt);
        assert_eq!(GarmentCategory::from_body_part("lower_body"), GarmentCategory::Pants);
        assert_eq!(GarmentCategory::from_body_part("full_body"), GarmentCategory::Dress);
        assert_eq!(GarmentCategory::from_body_part("hat"), GarmentCategory::Tshirt);
        assert_eq!(GarmentCategory::Dress.as_str(), "dress");
    }
}
