use crate::error::{CommandError, NickError};

pub const NICK_PROMPT: &str = "Please enter your nickname:";

pub const HELP: &str = "Available commands:\n\
    /send <name> <message> or /s <name> <message> - Send a private message to a user\n\
    /all <message> or /a <message> - Send a broadcast message to all users\n\
    /users or /u - List all active users\n\
    /quit or /q - Quit the chat\n\
    /? or /help - Show this help message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send { to: String, text: String },
    All(String),
    Users,
    Quit,
    Help,
}

/// Strips the framing whitespace clients send around a line: space, tab,
/// CR and LF.
pub fn trim_line(line: &str) -> &str {
    line.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// Splits off the first whitespace-delimited word; the remainder is trimmed.
fn split_word(s: &str) -> (&str, &str) {
    let s = trim_line(s);

    match s.find(char::is_whitespace) {
        Some(at) => (&s[..at], trim_line(&s[at..])),
        None => (s, ""),
    }
}

/// Parses a trimmed line that starts with `/`.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let (cmd, rest) = split_word(line);

    match cmd {
        "/send" | "/s" => {
            let (to, text) = split_word(rest);
            if to.is_empty() || text.is_empty() {
                return Err(CommandError::SendUsage);
            }

            Ok(Command::Send {
                to: to.to_string(),
                text: text.to_string(),
            })
        }
        "/all" | "/a" => {
            if rest.is_empty() {
                return Err(CommandError::AllUsage);
            }

            Ok(Command::All(rest.to_string()))
        }
        "/users" | "/u" => Ok(Command::Users),
        "/quit" | "/q" => Ok(Command::Quit),
        "/?" | "/help" => Ok(Command::Help),
        _ => Err(CommandError::Unknown(cmd.to_string())),
    }
}

pub fn validate_nickname(nick: &str, max_len: usize) -> Result<(), NickError> {
    if nick.is_empty() {
        return Err(NickError::Empty);
    }

    if nick.chars().any(char::is_whitespace) {
        return Err(NickError::Whitespace);
    }

    if nick.chars().count() > max_len {
        return Err(NickError::TooLong(max_len));
    }

    Ok(())
}

pub fn user_list<S: AsRef<str>>(nicks: &[S]) -> String {
    let mut out = String::from("Active users:");

    for nick in nicks {
        out.push_str("\n - ");
        out.push_str(nick.as_ref());
    }

    out
}

pub fn welcome(nick: &str) -> String {
    format!("Welcome to the chat, {nick}!\nType /? to see available commands.")
}

pub fn joined(nick: &str) -> String {
    format!("{nick} has joined the chat!")
}

pub fn left(nick: &str) -> String {
    format!("{nick} has left the chat.")
}

pub fn chat_line(nick: &str, text: &str) -> String {
    format!("{nick}: {text}")
}

pub fn all_line(nick: &str, text: &str) -> String {
    format!("[All] {nick}: {text}")
}

pub fn private_line(from: &str, text: &str) -> String {
    format!("[!] Message from {from}: {text}")
}

pub fn nick_rejected(err: &NickError) -> String {
    match err {
        NickError::Taken(_) => "Nickname already taken. Connection will be closed.".to_string(),
        other => format!("Invalid nickname: {other}. Connection will be closed."),
    }
}
