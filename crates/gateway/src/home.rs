//! Home-menu fallback.
//!
//! The router has no default reply; when nothing claims a message the
//! gateway re-shows the top-level menu and parks the sender in the
//! `home_menu` state. Selections from that menu carry domain-qualified
//! ids, which the router routes by prefix on the next message.

use tracing::error;

use {
    sango_common::Result,
    sango_locale::Language,
    sango_outbound::{send_validated, ReplyPayload, Section},
    sango_router::{DomainRegistry, RouterContext},
    sango_store::ChatState,
};

/// State key owned by the gateway, not by any domain handler.
pub const HOME_MENU_KEY: &str = "home_menu";

/// Keywords that always re-open the menu, whatever domains register.
pub const HOME_KEYWORDS: &[&str] = &["menu", "home", "hi", "hello", "start"];

pub fn is_home_keyword(normalized: &str) -> bool {
    HOME_KEYWORDS.contains(&normalized)
}

/// Park the sender in the menu state and send the menu.
///
/// The reply is best-effort: a send failure is logged, not propagated, so
/// a flaky adapter cannot turn an otherwise-handled message into a
/// transport retry that would replay the whole event.
pub async fn show_home(
    ctx: &RouterContext,
    registry: &DomainRegistry,
    locale: Language,
) -> Result<()> {
    ctx.states
        .set(&ctx.msg.profile_id, &ChatState {
            key: HOME_MENU_KEY.to_string(),
            data: serde_json::json!({}),
        })
        .await
        .map_err(sango_common::Error::from)?;

    let payload = menu_payload(registry, locale);
    if let Err(err) = send_validated(ctx.sink.as_ref(), ctx.msg.identity.as_str(), payload).await
    {
        error!(
            correlation_id = %ctx.msg.correlation_id,
            sender = %ctx.msg.masked_sender(),
            error = %err,
            "failed to send home menu"
        );
    }
    Ok(())
}

/// The top-level menu: one selectable row per registered domain.
pub fn menu_payload(registry: &DomainRegistry, locale: Language) -> ReplyPayload {
    let mut section = Section::new(section_title(locale));
    for name in registry.names() {
        // Row id doubles as the routing key: it must fall inside the
        // domain's state-key namespace.
        section = section.row(format!("{name}_start"), title_case(name), None);
    }

    let mut payload = ReplyPayload::text(menu_body(locale)).with_footer(footer(locale));
    if !section.rows.is_empty() {
        payload = payload.with_section(section);
    }
    payload
}

fn menu_body(locale: Language) -> &'static str {
    match locale {
        Language::En => "What would you like to do? Pick a service below.",
        Language::Fr => "Que souhaitez-vous faire ? Choisissez un service ci-dessous.",
        Language::Rw => "Ushaka gukora iki? Hitamo serivisi hano hasi.",
        Language::Sw => "Ungependa kufanya nini? Chagua huduma hapa chini.",
    }
}

fn section_title(locale: Language) -> &'static str {
    match locale {
        Language::En => "Services",
        Language::Fr => "Services",
        Language::Rw => "Serivisi",
        Language::Sw => "Huduma",
    }
}

fn footer(locale: Language) -> &'static str {
    match locale {
        Language::En => "Reply 'menu' anytime to come back here.",
        Language::Fr => "Répondez 'menu' pour revenir ici.",
        Language::Rw => "Andika 'menu' igihe cyose usubire hano.",
        Language::Sw => "Jibu 'menu' wakati wowote kurudi hapa.",
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn home_keywords_match_normalized_text() {
        assert!(is_home_keyword("menu"));
        assert!(is_home_keyword("hello"));
        assert!(!is_home_keyword("insurance"));
    }

    #[test]
    fn menu_lists_registered_domains_and_validates() {
        let registry = DomainRegistry::new();
        let payload = menu_payload(&registry, Language::En);
        assert!(sango_outbound::validate(&payload).is_empty());
        assert!(payload.sections.is_empty());
    }

    #[test]
    fn title_case_capitalizes_first_letter() {
        assert_eq!(title_case("insurance"), "Insurance");
        assert_eq!(title_case(""), "");
    }
}
