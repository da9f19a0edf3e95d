use tracing::{debug, info};

use crate::config::Config;
use crate::protocol::{self, Command};
use crate::registry::{ConnId, Registry};
use crate::router::{broadcast, unicast};

/// What the event loop should do with a connection after a handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Limits applied while handling client input.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_nick_len: usize,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            max_nick_len: config.max_nick_len,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Greets a freshly registered connection.
pub fn greet(registry: &Registry, id: ConnId) {
    unicast(registry, id, protocol::NICK_PROMPT);
}

/// Handles one line received from `id`.
pub fn handle_line(registry: &mut Registry, id: ConnId, raw: &str, limits: Limits) -> Flow {
    let line = protocol::trim_line(raw);
    if line.is_empty() {
        return Flow::Continue;
    }

    let nick = match registry.nickname(id) {
        Some(nick) => nick.to_string(),
        None => {
            debug!(conn = %id, "line for closed connection ignored");
            return Flow::Continue;
        }
    };

    if nick.is_empty() {
        return claim_nickname(registry, id, line, limits);
    }

    if line.starts_with('/') {
        return match protocol::parse_command(line) {
            Ok(cmd) => handle_command(registry, id, &nick, cmd),
            Err(err) => {
                unicast(registry, id, &err.to_string());
                Flow::Continue
            }
        };
    }

    broadcast(registry, &protocol::chat_line(&nick, line), Some(id));

    Flow::Continue
}

/// Removes `id` and, if it had joined, tells the others it left. Safe to
/// call for a connection that is already gone.
pub fn disconnect(registry: &mut Registry, id: ConnId) -> Option<String> {
    let client = registry.unregister(id)?;
    let nick = client.nick().to_string();
    drop(client);

    if nick.is_empty() {
        info!(conn = %id, "client disconnected before choosing a nickname");
        return None;
    }

    broadcast(registry, &protocol::left(&nick), Some(id));
    info!(conn = %id, nick = %nick, "client left");

    Some(nick)
}

fn claim_nickname(registry: &mut Registry, id: ConnId, nick: &str, limits: Limits) -> Flow {
    let claimed = protocol::validate_nickname(nick, limits.max_nick_len)
        .and_then(|()| registry.assign(id, nick));

    if let Err(err) = claimed {
        info!(conn = %id, "nickname refused: {err}");
        unicast(registry, id, &protocol::nick_rejected(&err));
        return Flow::Close;
    }

    info!(conn = %id, nick = %nick, "nickname set");

    unicast(registry, id, &protocol::welcome(nick));
    unicast(registry, id, &protocol::user_list(&registry.active_nicknames()));
    broadcast(registry, &protocol::joined(nick), Some(id));

    Flow::Continue
}

fn handle_command(registry: &mut Registry, id: ConnId, nick: &str, cmd: Command) -> Flow {
    match cmd {
        Command::Help => {
            unicast(registry, id, protocol::HELP);
        }

        Command::Users => {
            unicast(registry, id, &protocol::user_list(&registry.active_nicknames()));
        }

        Command::Quit => {
            unicast(registry, id, "Goodbye.");
            info!(conn = %id, nick = %nick, "client quit");
            return Flow::Close;
        }

        Command::All(text) => {
            broadcast(registry, &protocol::all_line(nick, &text), Some(id));
        }

        Command::Send { to, text } => match registry.lookup(&to) {
            Some(recipient) => {
                unicast(registry, recipient, &protocol::private_line(nick, &text));
                debug!(conn = %id, to = %to, "private message delivered");
            }
            None => unicast(registry, id, "User not found"),
        },
    }

    Flow::Continue
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::mpsc;

    use super::*;
    use crate::outbox::Outbox;

    struct Peer {
        id: ConnId,
        rx: mpsc::Receiver<String>,
    }

    impl Peer {
        fn connect(reg: &mut Registry) -> Self {
            let (outbox, rx) = Outbox::new(64);
            let id = reg.register(outbox);
            greet(reg, id);
            let mut peer = Self { id, rx };
            assert_eq!(peer.drain(), vec![format!("{}\n", protocol::NICK_PROMPT)]);
            peer
        }

        fn named(reg: &mut Registry, nick: &str) -> Self {
            let mut peer = Self::connect(reg);
            assert_eq!(peer.say(reg, nick), Flow::Continue);
            peer.drain();
            peer
        }

        fn say(&self, reg: &mut Registry, line: &str) -> Flow {
            handle_line(reg, self.id, line, Limits::default())
        }

        fn drain(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(line) = self.rx.try_recv() {
                out.push(line);
            }
            out
        }
    }

    #[test]
    fn first_line_claims_nickname() {
        let mut reg = Registry::new();
        let mut alice = Peer::connect(&mut reg);

        assert_eq!(alice.say(&mut reg, "alice\r\n"), Flow::Continue);

        assert_eq!(reg.nickname(alice.id), Some("alice"));
        assert_eq!(
            alice.drain(),
            vec![
                "Welcome to the chat, alice!\nType /? to see available commands.\n".to_string(),
                "Active users:\n - alice\n".to_string(),
            ]
        );
    }

    #[test]
    fn join_is_announced_to_named_clients_only() {
        let mut reg = Registry::new();
        let mut alice = Peer::named(&mut reg, "alice");
        let mut pending = Peer::connect(&mut reg);
        let bob = Peer::connect(&mut reg);

        bob.say(&mut reg, "bob");

        assert_eq!(alice.drain(), vec!["bob has joined the chat!\n"]);
        assert!(pending.drain().is_empty());
    }

    #[test]
    fn slash_line_is_a_nickname_before_joining() {
        let mut reg = Registry::new();
        let odd = Peer::connect(&mut reg);

        assert_eq!(odd.say(&mut reg, "/quit"), Flow::Continue);
        assert_eq!(reg.nickname(odd.id), Some("/quit"));
    }

    #[test]
    fn blank_lines_do_nothing() {
        let mut reg = Registry::new();
        let mut fresh = Peer::connect(&mut reg);
        let mut alice = Peer::named(&mut reg, "alice");
        let mut bob = Peer::named(&mut reg, "bob");
        alice.drain();

        for line in ["", "   ", "\r\n", "\t \n"] {
            assert_eq!(fresh.say(&mut reg, line), Flow::Continue);
            assert_eq!(alice.say(&mut reg, line), Flow::Continue);
        }

        assert_eq!(reg.nickname(fresh.id), Some(""));
        assert!(fresh.drain().is_empty());
        assert!(alice.drain().is_empty());
        assert!(bob.drain().is_empty());
    }

    #[test]
    fn taken_nickname_closes_the_newcomer() {
        let mut reg = Registry::new();
        let first = Peer::named(&mut reg, "bob");
        let mut second = Peer::connect(&mut reg);

        assert_eq!(second.say(&mut reg, "bob"), Flow::Close);
        assert_eq!(
            second.drain(),
            vec!["Nickname already taken. Connection will be closed.\n"]
        );

        assert_eq!(disconnect(&mut reg, second.id), None);
        assert_eq!(reg.lookup("bob"), Some(first.id));
        assert!(!reg.contains(second.id));
    }

    #[test]
    fn nickname_with_whitespace_is_refused() {
        let mut reg = Registry::new();
        let mut p = Peer::connect(&mut reg);

        assert_eq!(p.say(&mut reg, "two words"), Flow::Close);
        assert_eq!(
            p.drain(),
            vec!["Invalid nickname: nicknames may not contain whitespace. Connection will be closed.\n"]
        );
    }

    #[test]
    fn overlong_nickname_is_refused() {
        let mut reg = Registry::new();
        let p = Peer::connect(&mut reg);
        let limits = Limits { max_nick_len: 3 };

        assert_eq!(handle_line(&mut reg, p.id, "abcd", limits), Flow::Close);
        assert_eq!(reg.nickname(p.id), Some(""));
    }

    #[test]
    fn chat_reaches_everyone_else() {
        let mut reg = Registry::new();
        let mut alice = Peer::named(&mut reg, "alice");
        let mut bob = Peer::named(&mut reg, "bob");
        let mut pending = Peer::connect(&mut reg);
        alice.drain();

        alice.say(&mut reg, "hi");

        assert_eq!(bob.drain(), vec!["alice: hi\n"]);
        assert!(alice.drain().is_empty());
        assert!(pending.drain().is_empty());
    }

    #[test]
    fn all_excludes_sender() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let mut b = Peer::named(&mut reg, "b");
        a.drain();

        a.say(&mut reg, "/all hey");

        assert_eq!(b.drain(), vec!["[All] a: hey\n"]);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn all_without_text_gets_usage() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let mut b = Peer::named(&mut reg, "b");
        a.drain();

        a.say(&mut reg, "/a   ");

        assert_eq!(a.drain(), vec!["Usage: /all <message>\n"]);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn private_message_goes_to_recipient_only() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let mut b = Peer::named(&mut reg, "b");
        let mut c = Peer::named(&mut reg, "c");
        a.drain();
        b.drain();

        a.say(&mut reg, "/s b psst, over here");

        assert_eq!(b.drain(), vec!["[!] Message from a: psst, over here\n"]);
        assert!(a.drain().is_empty());
        assert!(c.drain().is_empty());
    }

    #[test]
    fn private_message_to_unknown_user() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let mut b = Peer::named(&mut reg, "b");
        a.drain();

        a.say(&mut reg, "/send bobby hello");

        assert_eq!(a.drain(), vec!["User not found\n"]);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn private_message_usage() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");

        a.say(&mut reg, "/send b");

        assert_eq!(a.drain(), vec!["Usage: /send <name> <message>\n"]);
    }

    #[test]
    fn users_lists_named_clients() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let _b = Peer::named(&mut reg, "b");
        let _pending = Peer::connect(&mut reg);
        a.drain();

        a.say(&mut reg, "/users");

        let reply = a.drain();
        assert_eq!(reply.len(), 1);
        let mut lines = reply[0].lines();
        assert_eq!(lines.next(), Some("Active users:"));
        let listed: HashSet<_> = lines.collect();
        assert_eq!(listed, HashSet::from([" - a", " - b"]));
    }

    #[test]
    fn help_and_unknown_commands() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");

        a.say(&mut reg, "/?");
        assert_eq!(a.drain(), vec![format!("{}\n", protocol::HELP)]);

        a.say(&mut reg, "/dance");
        assert_eq!(a.drain(), vec!["Unknown command: use /help\n"]);
    }

    #[test]
    fn quit_announces_departure_once() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let mut b = Peer::named(&mut reg, "b");
        a.drain();

        assert_eq!(b.say(&mut reg, "/quit"), Flow::Close);
        assert_eq!(b.drain(), vec!["Goodbye.\n"]);

        assert_eq!(disconnect(&mut reg, b.id), Some("b".to_string()));
        assert_eq!(disconnect(&mut reg, b.id), None);

        assert!(!reg.contains(b.id));
        assert_eq!(a.drain(), vec!["b has left the chat.\n"]);
    }

    #[test]
    fn unnamed_disconnect_is_silent() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let pending = Peer::connect(&mut reg);

        assert_eq!(disconnect(&mut reg, pending.id), None);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn lines_after_disconnect_are_ignored() {
        let mut reg = Registry::new();
        let mut a = Peer::named(&mut reg, "a");
        let b = Peer::named(&mut reg, "b");
        disconnect(&mut reg, b.id);
        a.drain();

        assert_eq!(b.say(&mut reg, "still here?"), Flow::Continue);
        assert!(a.drain().is_empty());
    }
}
