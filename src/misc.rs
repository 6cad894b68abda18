use html_escape::encode_text;
use teloxide::types::{Message, User};

/// The message's text, or its caption for media, or nothing.
#[must_use]
pub fn message_text(message: &Message) -> &str {
    message.text().or_else(|| message.caption()).unwrap_or("")
}

/// An HTML-safe mention of the user: `@username` when there is one,
/// otherwise their name wrapped in a `tg://user` link.
#[must_use]
pub fn user_mention_html(user: &User) -> String {
    if let Some(username) = &user.username {
        return format!("@{username}");
    }

    let mut mention = format!(
        "<a href=\"tg://user?id={}\">{}",
        user.id,
        encode_text(&user.first_name)
    );
    if let Some(last_name) = &user.last_name {
        mention.push(' ');
        mention.push_str(&encode_text(last_name));
    }
    mention.push_str("</a>");
    mention
}
