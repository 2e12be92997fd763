//! Popup template rendering.
//!
//! Templates use `{{field}}` placeholders over a closed set of fields
//! ([`TemplateField`]). Every field has a default, so a config that only
//! ships a template still renders. Unknown or unterminated placeholders are
//! errors instead of leaking into the page.

use crate::error::{PopupResult, TemplateError};
use crate::types::{PopupConfig, PopupId};

/// Fields a popup template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateField {
    PopupId,
    Title,
    Subtitle,
    ButtonText,
    PlaceholderText,
    SuccessMessage,
    BackgroundColor,
    TextColor,
    ButtonColor,
    ButtonTextColor,
    OverlayColor,
}

impl TemplateField {
    pub const ALL: [TemplateField; 11] = [
        TemplateField::PopupId,
        TemplateField::Title,
        TemplateField::Subtitle,
        TemplateField::ButtonText,
        TemplateField::PlaceholderText,
        TemplateField::SuccessMessage,
        TemplateField::BackgroundColor,
        TemplateField::TextColor,
        TemplateField::ButtonColor,
        TemplateField::ButtonTextColor,
        TemplateField::OverlayColor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TemplateField::PopupId => "popup_id",
            TemplateField::Title => "title",
            TemplateField::Subtitle => "subtitle",
            TemplateField::ButtonText => "button_text",
            TemplateField::PlaceholderText => "placeholder_text",
            TemplateField::SuccessMessage => "success_message",
            TemplateField::BackgroundColor => "background_color",
            TemplateField::TextColor => "text_color",
            TemplateField::ButtonColor => "button_color",
            TemplateField::ButtonTextColor => "button_text_color",
            TemplateField::OverlayColor => "overlay_color",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Value used when the config leaves the token unset. `PopupId` has no
    /// static default; it always comes from the config.
    pub fn default_value(&self) -> &'static str {
        match self {
            TemplateField::PopupId => "",
            TemplateField::Title => "Special Offer!",
            TemplateField::Subtitle => {
                "Subscribe to get an exclusive discount on your first order."
            }
            TemplateField::ButtonText => "Get My Discount",
            TemplateField::PlaceholderText => "Enter your email address",
            TemplateField::SuccessMessage => "Thank you! Here is your discount code:",
            TemplateField::BackgroundColor => "#ffffff",
            TemplateField::TextColor => "#333333",
            TemplateField::ButtonColor => "#007bff",
            TemplateField::ButtonTextColor => "#ffffff",
            TemplateField::OverlayColor => "rgba(0, 0, 0, 0.5)",
        }
    }
}

pub const DEFAULT_HTML_TEMPLATE: &str = r#"<div class="popup-overlay" data-popup-id="{{popup_id}}">
  <div class="popup-container">
    <button type="button" class="popup-close" aria-label="Close">&times;</button>
    <div class="popup-content">
      <h2 class="popup-title">{{title}}</h2>
      <p class="popup-subtitle">{{subtitle}}</p>
      <form class="popup-form" novalidate>
        <input type="email" class="popup-email" placeholder="{{placeholder_text}}" required>
        <button type="submit" class="popup-submit">{{button_text}}</button>
        <div class="popup-error" role="alert"></div>
      </form>
    </div>
  </div>
</div>"#;

pub const DEFAULT_CSS_TEMPLATE: &str = r#".popup-overlay {
  position: fixed; inset: 0; z-index: 10000;
  display: flex; align-items: center; justify-content: center;
  background: {{overlay_color}};
  opacity: 0; transition: opacity 0.3s ease;
}
.popup-overlay.show { opacity: 1; }
.popup-container {
  position: relative; max-width: 440px; width: 90%; padding: 32px;
  border-radius: 12px; background: {{background_color}}; color: {{text_color}};
}
.popup-close { position: absolute; top: 12px; right: 12px; border: 0; background: none; font-size: 24px; }
.popup-submit { background: {{button_color}}; color: {{button_text_color}}; border: 0; padding: 12px 20px; }
.popup-error { color: #d9534f; min-height: 1em; }"#;

/// Resolved value for every template field of one popup.
#[derive(Debug, Clone)]
pub struct TemplateValues {
    popup_id: String,
    title: String,
    subtitle: String,
    button_text: String,
    placeholder_text: String,
    success_message: String,
    background_color: String,
    text_color: String,
    button_color: String,
    button_text_color: String,
    overlay_color: String,
}

impl TemplateValues {
    pub fn from_config(config: &PopupConfig) -> Self {
        let t = &config.tokens;
        let pick = |value: &Option<String>, field: TemplateField| -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v.clone(),
                _ => field.default_value().to_string(),
            }
        };
        Self {
            popup_id: config.id.to_string(),
            title: pick(&t.title, TemplateField::Title),
            subtitle: pick(&t.subtitle, TemplateField::Subtitle),
            button_text: pick(&t.button_text, TemplateField::ButtonText),
            placeholder_text: pick(&t.placeholder_text, TemplateField::PlaceholderText),
            success_message: pick(&t.success_message, TemplateField::SuccessMessage),
            background_color: pick(&t.background_color, TemplateField::BackgroundColor),
            text_color: pick(&t.text_color, TemplateField::TextColor),
            button_color: pick(&t.button_color, TemplateField::ButtonColor),
            button_text_color: pick(&t.button_text_color, TemplateField::ButtonTextColor),
            overlay_color: pick(&t.overlay_color, TemplateField::OverlayColor),
        }
    }

    pub fn get(&self, field: TemplateField) -> &str {
        match field {
            TemplateField::PopupId => &self.popup_id,
            TemplateField::Title => &self.title,
            TemplateField::Subtitle => &self.subtitle,
            TemplateField::ButtonText => &self.button_text,
            TemplateField::PlaceholderText => &self.placeholder_text,
            TemplateField::SuccessMessage => &self.success_message,
            TemplateField::BackgroundColor => &self.background_color,
            TemplateField::TextColor => &self.text_color,
            TemplateField::ButtonColor => &self.button_color,
            TemplateField::ButtonTextColor => &self.button_text_color,
            TemplateField::OverlayColor => &self.overlay_color,
        }
    }
}

/// Substitute every `{{field}}` in `template`. Whitespace inside the braces
/// is ignored.
pub fn render(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + start))?;
        let name = after_open[..end].trim();
        let field = TemplateField::from_name(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        out.push_str(values.get(field));

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

/// A popup ready to be mounted into the page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPopup {
    pub popup_id: PopupId,
    pub html: String,
    pub css: String,
    /// Resolved submit label, restored after a failed submission.
    pub button_text: String,
}

/// Render both templates of `config`. Empty templates fall back to the
/// built-in defaults.
pub fn render_popup(config: &PopupConfig) -> PopupResult<RenderedPopup> {
    let values = TemplateValues::from_config(config);
    let html_template = if config.html_template.trim().is_empty() {
        DEFAULT_HTML_TEMPLATE
    } else {
        config.html_template.as_str()
    };
    let css_template = if config.css_template.trim().is_empty() {
        DEFAULT_CSS_TEMPLATE
    } else {
        config.css_template.as_str()
    };

    Ok(RenderedPopup {
        popup_id: config.id.clone(),
        html: render(html_template, &values)?,
        css: render(css_template, &values)?,
        button_text: values.get(TemplateField::ButtonText).to_string(),
    })
}

/// Body shown in place of the form after a successful submission.
pub fn render_success(config: &PopupConfig, discount_code: Option<&str>) -> String {
    let values = TemplateValues::from_config(config);
    let message = values.get(TemplateField::SuccessMessage);
    match discount_code {
        Some(code) if !code.is_empty() => format!(
            r#"<div class="popup-success"><h2 class="popup-title">{message}</h2><div class="popup-discount-code">{}</div></div>"#,
            escape_html(code)
        ),
        _ => format!(
            r#"<div class="popup-success"><h2 class="popup-title">{message}</h2></div>"#
        ),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
