//! Deterministic default layout, used whenever the AI layout endpoint is
//! unreachable or answers garbage.
//!
//! Five fixed slots; a slot is emitted only when its form field is non-empty.

use crate::layout::{Align, FlyerForm, ItemKind, LayoutData, LayoutItem};
use crate::util;

const TITLE_MAX_CHARS: usize = 60;

fn text_item(kind: ItemKind, text: String, x: f32, y: f32, size: f32, family: &str) -> LayoutItem {
    LayoutItem {
        kind,
        text,
        x,
        y,
        font_size: Some(size),
        font_family: Some(family.to_string()),
        color: Some("#FFFFFF".to_string()),
        align: Some(Align::Center),
        font_weight: None,
        stroke_color: None,
        stroke_width: None,
        text_shadow: None,
        shadow_color: None,
        shadow_blur: None,
        background_color: None,
        padding: None,
        rotation: None,
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

pub fn default_layout(form: &FlyerForm) -> LayoutData {
    let titulo = non_empty(&form.titulo).map(|t| {
        let mut it = text_item(
            ItemKind::Titulo,
            util::truncate_with_ellipsis(t.to_string(), TITLE_MAX_CHARS),
            50.0,
            15.0,
            60.0,
            "Impact",
        );
        it.font_weight = Some("bold".to_string());
        it.stroke_color = Some("#000000".to_string());
        it.stroke_width = Some(4.0);
        it.text_shadow = Some(true);
        it
    });

    let subtitulo = non_empty(&form.subtitulo)
        .map(|t| text_item(ItemKind::Subtitulo, t.to_string(), 50.0, 25.0, 32.0, "Arial"));

    let whatsapp = non_empty(&form.whatsapp).map(|t| {
        let mut it = text_item(
            ItemKind::Contato,
            format!("WhatsApp: {t}"),
            50.0,
            85.0,
            36.0,
            "Arial Black",
        );
        it.font_weight = Some("bold".to_string());
        it.background_color = Some("#25D366".to_string());
        it.padding = Some(12.0);
        it
    });

    let instagram = non_empty(&form.instagram).map(|t| {
        text_item(
            ItemKind::Contato,
            format!("@{}", t.trim_start_matches('@')),
            50.0,
            92.0,
            28.0,
            "Arial",
        )
    });

    let endereco = non_empty(&form.endereco)
        .map(|t| text_item(ItemKind::Endereco, t.to_string(), 50.0, 97.0, 22.0, "Arial"));

    let layout: Vec<LayoutItem> = [titulo, subtitulo, whatsapp, instagram, endereco]
        .into_iter()
        .flatten()
        .collect();

    LayoutData {
        layout,
        analysis: "Layout padrão aplicado (IA indisponível).".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(
        titulo: &str,
        subtitulo: &str,
        whatsapp: &str,
        instagram: &str,
        endereco: &str,
    ) -> FlyerForm {
        FlyerForm {
            titulo: titulo.into(),
            subtitulo: subtitulo.into(),
            whatsapp: whatsapp.into(),
            instagram: instagram.into(),
            endereco: endereco.into(),
            ..FlyerForm::default()
        }
    }

    #[test]
    fn slot_count_matches_non_empty_fields() {
        assert_eq!(default_layout(&form("a", "b", "c", "d", "e")).layout.len(), 5);
        assert_eq!(default_layout(&form("a", "", "c", "", "")).layout.len(), 2);
        assert_eq!(default_layout(&form("", "", "", "", "")).layout.len(), 0);
        // whitespace-only counts as empty
        assert_eq!(default_layout(&form("  ", "", "", "", "x")).layout.len(), 1);
    }

    #[test]
    fn unrelated_fields_do_not_create_slots() {
        let mut f = form("", "", "", "", "");
        f.facebook = "fb.com/loja".into();
        f.email = "a@b.com".into();
        f.descricao = "vendemos bolos".into();
        assert!(default_layout(&f).layout.is_empty());
    }

    #[test]
    fn title_slot_is_styled_for_impact() {
        let data = default_layout(&form("Promoção", "", "", "", ""));
        let it = &data.layout[0];
        assert_eq!(it.kind, ItemKind::Titulo);
        assert_eq!((it.x, it.y), (50.0, 15.0));
        assert_eq!(it.font_size, Some(60.0));
        assert_eq!(it.font_family.as_deref(), Some("Impact"));
        assert_eq!(it.stroke_width, Some(4.0));
        assert_eq!(it.text_shadow, Some(true));
    }

    #[test]
    fn whatsapp_slot_gets_the_green_pill() {
        let data = default_layout(&form("", "", "11999999999", "", ""));
        let it = &data.layout[0];
        assert_eq!(it.text, "WhatsApp: 11999999999");
        assert_eq!(it.background_color.as_deref(), Some("#25D366"));
        assert_eq!(it.padding, Some(12.0));
        assert_eq!((it.x, it.y), (50.0, 85.0));
    }

    #[test]
    fn instagram_handle_is_not_doubled() {
        let data = default_layout(&form("", "", "", "@loja", ""));
        assert_eq!(data.layout[0].text, "@loja");
        let data = default_layout(&form("", "", "", "loja", ""));
        assert_eq!(data.layout[0].text, "@loja");
    }

    #[test]
    fn output_is_deterministic() {
        let f = form("Promoção", "até 50% off", "11999999999", "loja", "Rua A, 1");
        assert_eq!(default_layout(&f), default_layout(&f));
    }

    #[test]
    fn items_keep_form_order() {
        let data = default_layout(&form("t", "", "w", "", "e"));
        let kinds: Vec<_> = data.layout.iter().map(|it| it.kind).collect();
        assert_eq!(
            kinds,
            vec![ItemKind::Titulo, ItemKind::Contato, ItemKind::Endereco]
        );
    }
}
