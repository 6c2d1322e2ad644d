//! Flyer layout model shared by the AI client, the local fallback generator
//! and the compositor.
//!
//! Wire names follow the upstream contract: camelCase keys, Portuguese form
//! fields and item kinds.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Category of a text element. The upstream AI emits a small set of tags but
/// is not strict about it; unknown tags decode as [`ItemKind::Outro`] and
/// render as plain styled text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Titulo,
    Subtitulo,
    Contato,
    Endereco,
    #[serde(other)]
    Outro,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One text element to draw. `x`/`y` are percentages of the canvas size;
/// every style field is optional and resolved to a default at render time.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    #[serde(rename = "type", default = "ItemKind::outro")]
    pub kind: ItemKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_shadow: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_blur: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
}

impl ItemKind {
    fn outro() -> Self {
        ItemKind::Outro
    }
}

/// Layout plus the AI's free-text commentary. Lives for one request.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct LayoutData {
    pub layout: Vec<LayoutItem>,
    #[serde(default)]
    pub analysis: String,
}

impl LayoutData {
    /// Sanitize a layout coming off the wire: drop items with nothing to
    /// draw and force coordinates back into the 0..=100 percent range.
    pub fn normalized(mut self) -> Self {
        self.layout.retain(|it| !it.text.trim().is_empty());
        for it in &mut self.layout {
            if !(0.0..=100.0).contains(&it.x) || !(0.0..=100.0).contains(&it.y) {
                tracing::warn!(
                    kind = ?it.kind,
                    x = it.x,
                    y = it.y,
                    "layout item outside canvas, clamping"
                );
                it.x = it.x.clamp(0.0, 100.0);
                it.y = it.y.clamp(0.0, 100.0);
            }
        }
        self
    }
}

/// The business-description form as submitted by the client.
/// All fields optional on the wire; absent fields are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct FlyerForm {
    pub titulo: String,
    pub subtitulo: String,
    pub whatsapp: String,
    pub facebook: String,
    pub instagram: String,
    pub endereco: String,
    pub email: String,
    pub descricao: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_decodes_with_defaults() {
        let it: LayoutItem = serde_json::from_str(
            r#"{"type":"titulo","text":"X","x":50,"y":15,"fontSize":60,"align":"center"}"#,
        )
        .unwrap();
        assert_eq!(it.kind, ItemKind::Titulo);
        assert_eq!(it.align, Some(Align::Center));
        assert_eq!(it.font_size, Some(60.0));
        assert!(it.color.is_none());
        assert!(it.rotation.is_none());
    }

    #[test]
    fn unknown_kind_decodes_as_outro() {
        let it: LayoutItem =
            serde_json::from_str(r#"{"type":"rodape","text":"x","x":1,"y":1}"#).unwrap();
        assert_eq!(it.kind, ItemKind::Outro);
    }

    #[test]
    fn missing_kind_decodes_as_outro() {
        let it: LayoutItem = serde_json::from_str(r#"{"text":"x","x":1,"y":1}"#).unwrap();
        assert_eq!(it.kind, ItemKind::Outro);
    }

    #[test]
    fn normalization_clamps_and_drops_empty() {
        let data: LayoutData = serde_json::from_str(
            r#"{"layout":[
                {"type":"titulo","text":"ok","x":120,"y":-5},
                {"type":"contato","text":"   ","x":50,"y":50}
            ],"analysis":"a"}"#,
        )
        .unwrap();
        let data = data.normalized();
        assert_eq!(data.layout.len(), 1);
        assert_eq!(data.layout[0].x, 100.0);
        assert_eq!(data.layout[0].y, 0.0);
    }

    #[test]
    fn form_accepts_partial_wire_object() {
        let form: FlyerForm =
            serde_json::from_str(r#"{"titulo":"Promoção","whatsapp":"11999999999"}"#).unwrap();
        assert_eq!(form.titulo, "Promoção");
        assert!(form.endereco.is_empty());
    }

    #[test]
    fn kind_round_trips_lowercase() {
        let s = serde_json::to_string(&ItemKind::Endereco).unwrap();
        assert_eq!(s, r#""endereco""#);
    }
}
