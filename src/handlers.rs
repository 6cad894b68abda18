//! Functions that handle events from Telegram: the moderation pipeline
//! entry point and the admin command layer.

use std::{future::Future, pin::Pin, sync::Arc};

use html_escape::encode_text;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    sugar::request::RequestReplyExt,
    types::{BotCommand, Me, Message, ParseMode},
    Bot, RequestError,
};

use crate::{
    database::Database,
    membership,
    misc::{message_text, user_mention_html},
    moderation,
    platform::TelegramPlatform,
    types::InboundMessage,
};

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    database: Arc<Database>,
    platform: Arc<TelegramPlatform>,
) -> Result<(), RequestError> {
    if message.chat.is_private() {
        return handle_private_message(bot, me, message, database, platform).await;
    }

    // Only group contexts are moderated.
    if !message.chat.is_group() && !message.chat.is_supergroup() {
        return Ok(());
    }

    // Commands are configuration traffic and don't go through moderation.
    if let Some(params) = CommandParams::new(&bot, &me, &message, &database, &platform) {
        return params.run().await;
    }

    let Some(sender) = message.from.clone() else {
        // Channel posts and anonymous admins have no user to check.
        return Ok(());
    };

    let mention = user_mention_html(&sender);
    let inbound = InboundMessage {
        chat_id: message.chat.id,
        message_id: message.id,
        sender: sender.id,
        sender_mention: &mention,
        text: message_text(&message),
    };

    moderation::moderate_message(platform.as_ref(), &database, &inbound)
        .await
        .expect("Database died!");

    Ok(())
}

async fn handle_private_message(
    bot: Bot,
    me: Me,
    message: Message,
    database: Arc<Database>,
    platform: Arc<TelegramPlatform>,
) -> Result<(), RequestError> {
    if let Some(params) = CommandParams::new(&bot, &me, &message, &database, &platform) {
        return params.run().await;
    }

    // Telegram automatically trims preceding and following newlines, so this is fine.
    bot.send_message(
        message.chat.id,
        "
This bot keeps groups clean in two ways: it requires members to join the group's required channels before posting, and it removes advertisements, links and banned keywords.

Add it to a group, give it administrator status with the \"Remove messages\" permission, and configure it with the commands from /help.",
    )
    .await?;
    Ok(())
}

///////////////////////////////////////
///////////////// COMMANDS
///////////////////////////////////////

pub const COMMANDS: &[Command] = &[
    START,
    HELP,
    SET_CHANNELS,
    SET_KEYWORDS,
    ENABLE_MEMBERSHIP,
    DISABLE_MEMBERSHIP,
    ENABLE_ADBLOCK,
    DISABLE_ADBLOCK,
    SET_BUTTON_TEXT,
    SET_PROMPT,
    SETTINGS,
];

type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RequestError>> + Send + 'a>>;

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    function: fn(CommandParams) -> CommandFuture,
    /// Group-only commands that require the sender to be a group admin
    /// or the owner.
    admin_only: bool,
}

impl Command {
    fn is_matching_callname(&self, command: &str) -> bool {
        self.callname.eq_ignore_ascii_case(command)
    }
}

pub fn generate_bot_commands() -> Vec<BotCommand> {
    COMMANDS
        .iter()
        .map(|command| BotCommand {
            command: command.callname.trim_start_matches('/').to_string(),
            description: command.description.to_string(),
        })
        .collect()
}

fn generate_help() -> String {
    let mut response = String::from("Commands:\n\n");
    for command in COMMANDS {
        response.push_str(command.callname);
        response.push_str(" - ");
        response.push_str(command.description);
        if command.admin_only {
            response.push_str(" (group admins only)");
        }
        response.push('\n');
    }
    response
}

pub struct CommandParams<'a> {
    bot: &'a Bot,
    message: &'a Message,
    database: &'a Database,
    platform: &'a TelegramPlatform,
    message_text: &'a str,
    callname: &'a str,
    command_len: usize,
}

impl<'a> CommandParams<'a> {
    /// Returns [`None`] if the message doesn't address a command to us.
    fn new(
        bot: &'a Bot,
        me: &'a Me,
        message: &'a Message,
        database: &'a Database,
        platform: &'a TelegramPlatform,
    ) -> Option<CommandParams<'a>> {
        let message_text = message.text()?;
        if !message_text.starts_with('/') {
            return None;
        }
        let command = message_text.split_whitespace().next()?;
        if !command.is_ascii() {
            // Telegram commands must be ASCII.
            return None;
        }

        // "/settings@SomeOtherBot" is not for us.
        let callname = if let Some(at) = command.find('@') {
            if !command[at + 1..].eq_ignore_ascii_case(me.username()) {
                return None;
            }
            &command[..at]
        } else {
            command
        };

        Some(CommandParams {
            bot,
            message,
            database,
            platform,
            message_text,
            callname,
            command_len: command.len(),
        })
    }

    /// Everything after the command itself.
    fn params(&self) -> &'a str {
        self.message_text[self.command_len..].trim()
    }

    async fn run(self) -> Result<(), RequestError> {
        for command in COMMANDS {
            if !command.is_matching_callname(self.callname) {
                continue;
            }
            if command.admin_only && !self.authorize().await? {
                return Ok(());
            }
            return (command.function)(self).await;
        }
        // Unknown command. Stay quiet, same as the rest of the bot.
        Ok(())
    }

    /// Gate for the configuration commands: inside a group, sent by one of
    /// its admins. Replies with the reason when declining.
    async fn authorize(&self) -> Result<bool, RequestError> {
        if !self.message.chat.is_group() && !self.message.chat.is_supergroup() {
            self.respond("This command only works inside a group.").await?;
            return Ok(false);
        }
        let Some(sender) = &self.message.from else {
            return Ok(false);
        };
        if !membership::is_admin_or_owner(self.platform, self.message.chat.id, sender.id).await {
            self.respond("Only this group's administrators can use this command.")
                .await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn respond(&self, text: impl Into<String>) -> Result<(), RequestError> {
        self.bot
            .send_message(self.message.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_to(self.message.id)
            .await?;
        Ok(())
    }

    /// Split a comma-separated argument list, dropping empties.
    fn list_params(&self) -> Vec<String> {
        self.params()
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |params| Box::pin($thing(params))
    };
}

const START: Command = Command {
    callname: "/start",
    description: "what this bot does and how to set it up",
    function: wrap!(start),
    admin_only: false,
};

const HELP: Command = Command {
    callname: "/help",
    description: "list all commands",
    function: wrap!(help),
    admin_only: false,
};

const SET_CHANNELS: Command = Command {
    callname: "/setchannels",
    description: "set the channels users must join before posting, comma separated",
    function: wrap!(set_channels),
    admin_only: true,
};

const SET_KEYWORDS: Command = Command {
    callname: "/setkeywords",
    description: "set the banned keyword list, comma separated",
    function: wrap!(set_keywords),
    admin_only: true,
};

const ENABLE_MEMBERSHIP: Command = Command {
    callname: "/enable_membership",
    description: "turn the membership requirement on",
    function: wrap!(enable_membership),
    admin_only: true,
};

const DISABLE_MEMBERSHIP: Command = Command {
    callname: "/disable_membership",
    description: "turn the membership requirement off",
    function: wrap!(disable_membership),
    admin_only: true,
};

const ENABLE_ADBLOCK: Command = Command {
    callname: "/enable_adblock",
    description: "turn the advertisement filter on",
    function: wrap!(enable_adblock),
    admin_only: true,
};

const DISABLE_ADBLOCK: Command = Command {
    callname: "/disable_adblock",
    description: "turn the advertisement filter off",
    function: wrap!(disable_adblock),
    admin_only: true,
};

const SET_BUTTON_TEXT: Command = Command {
    callname: "/setbuttontext",
    description: "set the text on the join buttons",
    function: wrap!(set_button_text),
    admin_only: true,
};

const SET_PROMPT: Command = Command {
    callname: "/setprompt",
    description: "set the join prompt shown to users who haven't joined",
    function: wrap!(set_prompt),
    admin_only: true,
};

const SETTINGS: Command = Command {
    callname: "/settings",
    description: "show this group's current settings",
    function: wrap!(settings),
    admin_only: true,
};

async fn start(params: CommandParams<'_>) -> Result<(), RequestError> {
    params
        .respond(concat!(
            "Hello! In groups it moderates, this bot:\n",
            "• checks that members have joined the group's required channels,\n",
            "• removes messages from users who haven't joined yet, with a join prompt,\n",
            "• removes advertisements, links and banned keywords.\n\n",
            "Add it to a group as an administrator and configure it with the commands from /help."
        ))
        .await
}

async fn help(params: CommandParams<'_>) -> Result<(), RequestError> {
    params.respond(generate_help()).await
}

async fn set_channels(params: CommandParams<'_>) -> Result<(), RequestError> {
    let channels = params.list_params();
    if channels.is_empty() {
        return params
            .respond(
                "Please list the required channels.\n\
                Example: <code>/setchannels @channel1, @channel2</code>",
            )
            .await;
    }

    params
        .database
        .set_required_channels(params.message.chat.id, &channels)
        .await
        .expect("Database died!");

    params
        .respond(format!(
            "Required channels set:\n{}",
            encode_text(&channels.join("\n"))
        ))
        .await
}

async fn set_keywords(params: CommandParams<'_>) -> Result<(), RequestError> {
    let keywords = params.list_params();
    if keywords.is_empty() {
        return params
            .respond(
                "Please list the banned keywords.\n\
                Example: <code>/setkeywords word1, word2, word3</code>",
            )
            .await;
    }

    params
        .database
        .set_banned_keywords(params.message.chat.id, &keywords)
        .await
        .expect("Database died!");

    params
        .respond(format!(
            "Banned keywords set: {}",
            encode_text(&keywords.join(", "))
        ))
        .await
}

async fn enable_membership(params: CommandParams<'_>) -> Result<(), RequestError> {
    params
        .database
        .set_enforce_membership(params.message.chat.id, true)
        .await
        .expect("Database died!");
    params
        .respond(
            "Membership checking is now on. Messages from users who haven't \
            joined the required channels will be removed.",
        )
        .await
}

async fn disable_membership(params: CommandParams<'_>) -> Result<(), RequestError> {
    params
        .database
        .set_enforce_membership(params.message.chat.id, false)
        .await
        .expect("Database died!");
    params.respond("Membership checking is now off.").await
}

async fn enable_adblock(params: CommandParams<'_>) -> Result<(), RequestError> {
    params
        .database
        .set_enforce_adblock(params.message.chat.id, true)
        .await
        .expect("Database died!");
    params.respond("The advertisement filter is now on.").await
}

async fn disable_adblock(params: CommandParams<'_>) -> Result<(), RequestError> {
    params
        .database
        .set_enforce_adblock(params.message.chat.id, false)
        .await
        .expect("Database died!");
    params.respond("The advertisement filter is now off.").await
}

async fn set_button_text(params: CommandParams<'_>) -> Result<(), RequestError> {
    let text = params.params();
    if text.is_empty() {
        return params
            .respond("Please provide the button text.\nExample: <code>/setbuttontext Join us</code>")
            .await;
    }

    params
        .database
        .set_join_button_text(params.message.chat.id, text)
        .await
        .expect("Database died!");

    params
        .respond(format!("Join button text set to: {}", encode_text(text)))
        .await
}

async fn set_prompt(params: CommandParams<'_>) -> Result<(), RequestError> {
    let text = params.params();
    if text.is_empty() {
        return params
            .respond(
                "Please provide the prompt text.\n\
                Example: <code>/setprompt Join our channels first, please.</code>",
            )
            .await;
    }

    params
        .database
        .set_join_prompt(params.message.chat.id, text)
        .await
        .expect("Database died!");

    params
        .respond(format!("Join prompt set to: {}", encode_text(text)))
        .await
}

async fn settings(params: CommandParams<'_>) -> Result<(), RequestError> {
    params
        .database
        .ensure_group(params.message.chat.id)
        .await
        .expect("Database died!");
    let config = params
        .database
        .get_group(params.message.chat.id)
        .await
        .expect("Database died!")
        .unwrap_or_default();

    let channels = if config.required_channels.is_empty() {
        "none".to_string()
    } else {
        config.required_channels.join(", ")
    };

    params
        .respond(format!(
            "<b>Group settings:</b>\n\n\
            <b>Required channels:</b> {}\n\
            <b>Banned keywords:</b> {}\n\
            <b>Membership checking:</b> {}\n\
            <b>Advertisement filter:</b> {}\n\
            <b>Join button text:</b> {}\n\
            <b>Join prompt:</b> {}",
            encode_text(&channels),
            encode_text(&config.keyword_list().join(", ")),
            on_off(config.enforce_membership),
            on_off(config.enforce_adblock),
            encode_text(config.button_text()),
            encode_text(config.prompt_text()),
        ))
        .await
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
