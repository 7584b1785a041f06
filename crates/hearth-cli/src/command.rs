//! Parsing of REPL input lines.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        email: String,
        password: String,
        username: String,
    },
    Login {
        email: String,
        password: String,
    },
    Guest,
    Search(String),
    Add(String),
    Requests,
    Accept(String),
    Decline(String),
    Friends,
    Group(String),
    Channels,
    Open(String),
    /// Search GIFs, or send result `#n` of the last search.
    Gif(String),
    Logout,
    Quit,
    Help,
    /// Plain text for the open channel.
    Say(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command /{0}. Type /help for a list.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
/register <email> <password> <username>   create an account
/login <email> <password>                 sign in
/guest                                    sign in anonymously
/search <prefix>                          find users by name
/add <uid>                                send a friend request
/requests                                 list pending requests
/accept <id> | /decline <id>              answer a request
/friends                                  list friends
/group <name>                             create a group
/channels                                 list your channels
/open <channel id>                        open a channel
/gif [query] | /gif #<n>                  search GIFs, send result n
/logout | /quit
Anything else is sent to the open channel.";

/// Parse one input line.  Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "register" => {
            let mut parts = args.splitn(3, char::is_whitespace);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(email), Some(password), Some(username))
                    if !email.is_empty() && !username.trim().is_empty() =>
                {
                    Command::Register {
                        email: email.to_string(),
                        password: password.to_string(),
                        username: username.trim().to_string(),
                    }
                }
                _ => return Err(ParseError::Usage("/register <email> <password> <username>")),
            }
        }
        "login" => match args.split_whitespace().collect::<Vec<_>>()[..] {
            [email, password] => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => return Err(ParseError::Usage("/login <email> <password>")),
        },
        "guest" => Command::Guest,
        "search" => Command::Search(required(args, "/search <prefix>")?),
        "add" => Command::Add(required(args, "/add <uid>")?),
        "requests" => Command::Requests,
        "accept" => Command::Accept(required(args, "/accept <request id>")?),
        "decline" => Command::Decline(required(args, "/decline <request id>")?),
        "friends" => Command::Friends,
        "group" => Command::Group(required(args, "/group <name>")?),
        "channels" => Command::Channels,
        "open" => Command::Open(required(args, "/open <channel id>")?),
        "gif" => Command::Gif(args.to_string()),
        "logout" => Command::Logout,
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required(args: &str, usage: &'static str) -> Result<String, ParseError> {
    if args.is_empty() {
        Err(ParseError::Usage(usage))
    } else {
        Ok(args.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse("  hello there ").unwrap(),
            Some(Command::Say("hello there".into()))
        );
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn register_keeps_spaces_in_username() {
        assert_eq!(
            parse("/register a@example.com secret1 Alpha Centauri").unwrap(),
            Some(Command::Register {
                email: "a@example.com".into(),
                password: "secret1".into(),
                username: "Alpha Centauri".into(),
            })
        );
        assert!(matches!(
            parse("/register a@example.com"),
            Err(ParseError::Usage(_))
        ));
    }

    #[test]
    fn arguments_are_required_where_needed() {
        assert_eq!(
            parse("/group Book club").unwrap(),
            Some(Command::Group("Book club".into()))
        );
        assert!(matches!(parse("/group"), Err(ParseError::Usage(_))));
        assert!(matches!(parse("/login only-email"), Err(ParseError::Usage(_))));
        assert_eq!(parse("/gif").unwrap(), Some(Command::Gif(String::new())));
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert_eq!(
            parse("/dance"),
            Err(ParseError::Unknown("dance".into()))
        );
    }
}
