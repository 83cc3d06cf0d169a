use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::warn;

use crate::dashboard::RelayKey;

/// A user action typed on stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `on`/`off` set the relay, `toggle` flips it (`None`).
    Switch { key: RelayKey, on: Option<bool> },
    Motion { key: RelayKey },
    Talk { room: String },
    StopTalk { room: String },
    Theme,
    Status,
    Log,
}

/// Parse one console line.
/// Expected forms: `on|off|toggle <room> <relay>`, `motion <room> <relay>`,
/// `talk|stop <room>`, `theme`, `status`, `log`.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    let args: Vec<&str> = words.collect();

    let relay_key = |args: &[&str]| match args {
        [room, relay] => Some(RelayKey::new(*room, *relay)),
        _ => None,
    };
    let room = |args: &[&str]| match args {
        [room] => Some(room.to_string()),
        _ => None,
    };

    match verb.to_ascii_lowercase().as_str() {
        "on" => Some(ConsoleCommand::Switch {
            key: relay_key(&args)?,
            on: Some(true),
        }),
        "off" => Some(ConsoleCommand::Switch {
            key: relay_key(&args)?,
            on: Some(false),
        }),
        "toggle" => Some(ConsoleCommand::Switch {
            key: relay_key(&args)?,
            on: None,
        }),
        "motion" => Some(ConsoleCommand::Motion {
            key: relay_key(&args)?,
        }),
        "talk" => Some(ConsoleCommand::Talk { room: room(&args)? }),
        "stop" => Some(ConsoleCommand::StopTalk { room: room(&args)? }),
        "theme" if args.is_empty() => Some(ConsoleCommand::Theme),
        "status" if args.is_empty() => Some(ConsoleCommand::Status),
        "log" if args.is_empty() => Some(ConsoleCommand::Log),
        _ => None,
    }
}

/// Forward parsed commands until input ends or the receiver goes away.
pub async fn read_commands<R>(input: R, cmd_tx: mpsc::Sender<ConsoleCommand>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!("Console read failed: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(cmd) => {
                if cmd_tx.send(cmd).await.is_err() {
                    return;
                }
            }
            None => warn!("Unknown command: {}", line.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relay_commands() {
        assert_eq!(
            parse_command("on kitchen 1"),
            Some(ConsoleCommand::Switch {
                key: RelayKey::new("kitchen", "1"),
                on: Some(true),
            })
        );
        assert_eq!(
            parse_command("  OFF kitchen 2 "),
            Some(ConsoleCommand::Switch {
                key: RelayKey::new("kitchen", "2"),
                on: Some(false),
            })
        );
        assert_eq!(
            parse_command("toggle hall 3"),
            Some(ConsoleCommand::Switch {
                key: RelayKey::new("hall", "3"),
                on: None,
            })
        );
        assert_eq!(
            parse_command("motion hall 3"),
            Some(ConsoleCommand::Motion {
                key: RelayKey::new("hall", "3"),
            })
        );
    }

    #[test]
    fn parses_room_and_view_commands() {
        assert_eq!(
            parse_command("talk kitchen"),
            Some(ConsoleCommand::Talk {
                room: "kitchen".into()
            })
        );
        assert_eq!(
            parse_command("stop kitchen"),
            Some(ConsoleCommand::StopTalk {
                room: "kitchen".into()
            })
        );
        assert_eq!(parse_command("theme"), Some(ConsoleCommand::Theme));
        assert_eq!(parse_command("status"), Some(ConsoleCommand::Status));
        assert_eq!(parse_command("log"), Some(ConsoleCommand::Log));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("on kitchen"), None);
        assert_eq!(parse_command("toggle kitchen 1 extra"), None);
        assert_eq!(parse_command("talk"), None);
        assert_eq!(parse_command("theme dark"), None);
        assert_eq!(parse_command("dance"), None);
    }

    #[tokio::test]
    async fn read_commands_skips_unknown_lines() {
        let input: &[u8] = b"status\n\nbogus\ntalk kitchen\n";
        let (tx, mut rx) = mpsc::channel(8);
        read_commands(input, tx).await;

        assert_eq!(rx.recv().await, Some(ConsoleCommand::Status));
        assert_eq!(
            rx.recv().await,
            Some(ConsoleCommand::Talk {
                room: "kitchen".into()
            })
        );
        assert_eq!(rx.recv().await, None);
    }
}
