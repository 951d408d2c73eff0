//! Payload rendering for the notification channels.
//!
//! Both channels carry the same seven facts about an occurrence; the chat
//! channel represents them as display-colored template fields, the email
//! channel as rows of a fixed HTML table.

use crate::config::Config;
use crate::core::{ChatField, ChatMessage, EmailMessage, ErrorOccurrence, GeoRegion, RequestContext};

/// The display color every chat template field is tagged with.
pub const FIELD_COLOR: &str = "#f5222d";

/// The accent color for values in the email table.
const VALUE_COLOR: &str = "#1890ff";

const TABLE_STYLE: &str = "width: 80vw; margin: 20px auto; background: #fff; \
     border-radius: 10px; font-size: 14px; line-height: 1.5; \
     color: rgba(0, 0, 0, 0.55); padding: 10px 15px;";

/// The facts shared by both channels, in template order.
fn template_fields(
    config: &Config,
    error: &ErrorOccurrence,
    ctx: &RequestContext,
    region: &GeoRegion,
) -> Vec<(&'static str, String)> {
    vec![
        ("name", config.app_name.clone()),
        ("router", ctx.url.clone()),
        ("ip", ctx.source_ip.to_string()),
        ("region", region.formatted()),
        ("type", error.name.clone()),
        ("time", ctx.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("stack", error.stack_trace.clone()),
    ]
}

/// Builds the chat template message for an occurrence.
pub fn chat_message(
    config: &Config,
    error: &ErrorOccurrence,
    ctx: &RequestContext,
    region: &GeoRegion,
) -> ChatMessage {
    let fields = template_fields(config, error, ctx, region)
        .into_iter()
        .map(|(key, value)| {
            (
                key.to_string(),
                ChatField {
                    value,
                    color: FIELD_COLOR.to_string(),
                },
            )
        })
        .collect();

    ChatMessage {
        recipient: config.notify.chat.recipient.clone(),
        template_id: config.notify.chat.template_id.clone(),
        fields,
    }
}

/// Builds the HTML email for an occurrence.
pub fn email_message(
    config: &Config,
    error: &ErrorOccurrence,
    ctx: &RequestContext,
    region: &GeoRegion,
) -> EmailMessage {
    let labels = [
        "Application",
        "Route",
        "Source IP",
        "Region",
        "Exception type",
        "Time",
        "Stack trace",
    ];

    let mut rows = String::new();
    for (label, (_, value)) in labels
        .iter()
        .zip(template_fields(config, error, ctx, region))
    {
        rows.push_str(&format!(
            "<tr style=\"border-bottom: 1px solid #e8e8e8; width: 100%; padding: 16px 0;\">\
             <td style=\"width: 120px; padding: 6px 0;\">{label}:</td>\
             <td style=\"margin: 20px; color: {VALUE_COLOR}; white-space: pre-wrap;\">{value}</td></tr>"
        ));
    }

    EmailMessage {
        from: format!("{} <{}>", config.app_name, config.mail.account),
        to: config.notify.email.to.clone(),
        subject: format!("{} exception report", config.app_name),
        html: format!("<table style=\"{TABLE_STYLE}\"><tbody>{rows}</tbody></table>"),
    }
}
