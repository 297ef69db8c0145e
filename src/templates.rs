//! Template Responder
//!
//! Deterministic replies. Every string starts with the persona tag so canned
//! answers look the same as model answers.

use crate::classify::{Intent, WorkShortcut};
use crate::persona::Persona;
use crate::text::truncate_chars;

/// Reply for a classified intent
pub fn render(intent: Intent, display_name: Option<&str>, persona: &Persona) -> String {
    match intent {
        Intent::Greeting => greeting(persona, display_name),
        Intent::Farewell => farewell(persona),
        Intent::Networking(topic) => networking(persona, topic),
    }
}

pub fn greeting(persona: &Persona, display_name: Option<&str>) -> String {
    match display_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!(
            "{} Hello {}, how are you? I'm {}'s assistant. How can I help you today?",
            persona.tag, name, persona.name
        ),
        None => format!(
            "{} Hello! I'm {}'s assistant ({}). How can I help with analytics or automation?",
            persona.tag, persona.name, persona.site
        ),
    }
}

pub fn farewell(persona: &Persona) -> String {
    format!(
        "{} Thanks! Anything technical, just send a message.",
        persona.tag
    )
}

pub fn networking(persona: &Persona, topic: &str) -> String {
    format!(
        "{} {} specializes in {}. Want to see some GitHub cases or book a technical call?",
        persona.tag, persona.name, topic
    )
}

pub fn busy(persona: &Persona) -> String {
    format!(
        "{} {} is busy right now. Leave your message and it will be answered as soon as possible.",
        persona.tag, persona.name
    )
}

pub fn focus_mode(persona: &Persona) -> String {
    format!(
        "{} {} is in focused work mode. Your message was saved and will be answered later.",
        persona.tag, persona.name
    )
}

pub fn work_shortcut(persona: &Persona, shortcut: WorkShortcut) -> String {
    match shortcut {
        WorkShortcut::Pricing => format!(
            "{} For quotes, please send the project details to {}.",
            persona.tag, persona.email
        ),
        WorkShortcut::Meeting => format!(
            "{} {} will confirm a time for the call soon. Suggest a few slots that work for you.",
            persona.tag, persona.name
        ),
        WorkShortcut::Services => format!(
            "{} Services: {}. Details at {}.",
            persona.tag,
            persona.services.join(", "),
            persona.site
        ),
        WorkShortcut::Contact => format!(
            "{} Email: {} | Site: {}",
            persona.tag, persona.email, persona.site
        ),
    }
}

pub fn access_denied(persona: &Persona) -> String {
    format!("{} Sorry, that command is only available to {}.", persona.tag, persona.name)
}

pub fn unknown_command(persona: &Persona, prefix: char) -> String {
    format!(
        "{} Unknown command. Send {}help to see the available commands.",
        persona.tag, prefix
    )
}

/// Top-level routing failure
pub fn apology(persona: &Persona) -> String {
    format!(
        "{} I ran into a problem here. Could you rephrase that?",
        persona.tag
    )
}

/// Model returned nothing usable
pub fn clarify(persona: &Persona) -> String {
    format!("{} Got it. Could you give me more details about what you need?", persona.tag)
}

/// Provider failure
pub fn provider_fallback(persona: &Persona) -> String {
    format!("{} Let me check that. Could you send it again?", persona.tag)
}

/// Provider rejected our credentials
pub fn auth_fallback(persona: &Persona) -> String {
    format!(
        "{} I'm having technical trouble right now. Please email {} directly.",
        persona.tag, persona.email
    )
}

pub fn media_received(persona: &Persona) -> String {
    format!(
        "{} I can't open attachments here. Could you describe what you need in text?",
        persona.tag
    )
}

/// Forward to the owner when a contact flags urgency
pub fn urgent_notification(persona: &Persona, sender: &str, text: &str) -> String {
    format!(
        "{} URGENT MESSAGE\nFrom: {}\nMessage: {}",
        persona.tag,
        sender,
        truncate_chars(text, 200)
    )
}
