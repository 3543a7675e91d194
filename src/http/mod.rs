//! HTTP surface: route table, static control page, platform server binding.

use std::borrow::Cow;

pub mod router;
#[cfg(target_os = "espidf")]
pub mod server;

const PAGE_TEMPLATE: &str = include_str!("control_page.html");
const ACTUATOR_SLOT: &str = "<!-- actuators -->";

/// Control page served at `/`, with one radio group per wired actuator.
pub fn control_page(actuator_count: u8) -> String {
    let mut groups = String::new();
    for id in 1..=actuator_count {
        groups.push_str(&format!("<h3>Actuator {id}</h3>\n"));
        for (action, label) in [("extend", "Extend"), ("retract", "Retract"), ("stop", "Stop")] {
            let checked = if action == "stop" { " checked" } else { "" };
            groups.push_str(&format!(
                "<label><input type=\"radio\" name=\"actuator_{id}\" \
                 onclick=\"move({id}, '{action}')\"{checked}> {label}</label><br>\n"
            ));
        }
    }
    PAGE_TEMPLATE.replace(ACTUATOR_SLOT, &groups)
}

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";

/// Transport-neutral response produced by the application service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Cow<'static, str>,
}

impl Response {
    pub fn html(body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: 200,
            content_type: TEXT_HTML,
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
