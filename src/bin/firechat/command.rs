//! Input lines as commands.

#[derive(Debug, PartialEq, Eq)]
pub enum LoginCommand<'a> {
    Toggle,
    Quit,
    /// The value for the field being prompted.
    Input(&'a str),
}

impl<'a> LoginCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "/toggle" => LoginCommand::Toggle,
            "/quit" => LoginCommand::Quit,
            value => LoginCommand::Input(value),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FeedCommand<'a> {
    Send(&'a str),
    /// 1-based row number as shown in the list.
    Select(usize),
    Delete,
    ToggleEmoji,
    PickEmoji(&'a str),
    Logout,
    Quit,
    Unknown(&'a str),
}

impl<'a> FeedCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let Some(command) = line.trim_start().strip_prefix('/') else {
            return FeedCommand::Send(line);
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match (name, arg) {
            ("select", n) => match n.parse() {
                Ok(row) => FeedCommand::Select(row),
                Err(_) => FeedCommand::Unknown(line.trim()),
            },
            ("delete", "") => FeedCommand::Delete,
            ("emoji", "") => FeedCommand::ToggleEmoji,
            ("emoji", emoji) => FeedCommand::PickEmoji(emoji),
            ("logout", "") => FeedCommand::Logout,
            ("quit", "") => FeedCommand::Quit,
            _ => FeedCommand::Unknown(line.trim()),
        }
    }
}
