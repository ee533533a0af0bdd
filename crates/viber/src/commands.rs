use cmdbot_core::envelope::split_destination;

pub const COMMAND_PREFIX: char = '/';

/// What a slash-command asks the bot to do, resolved in dispatch precedence
/// order. Anything that is not a built-in is left to the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Version,
    Echo(Option<String>),
    AddNote(String),
    ShowNote(i64),
    ShowAllNotes,
    RemoveNote(i64),
    RemoveAllNotes,
    InvalidNoteIndex(String),
    Registered(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: BotCommand,
    /// Hosts the command is addressed to; empty means every host.
    pub destination: Vec<String>,
}

/// Parses message text, ignoring surrounding whitespace. Returns `None` when
/// the text is not a command.
pub fn parse_message(text: &str) -> Option<ParsedCommand> {
    text.trim().strip_prefix(COMMAND_PREFIX).map(parse_command)
}

/// Parses the text following the command prefix.
pub fn parse_command(command_line: &str) -> ParsedCommand {
    let (command, destination) = split_destination(command_line);
    ParsedCommand { command: classify(command.trim()), destination }
}

fn classify(command: &str) -> BotCommand {
    match command {
        "" | "help" => return BotCommand::Help,
        "version" => return BotCommand::Version,
        "echo" => return BotCommand::Echo(None),
        "note" => return BotCommand::ShowNote(-1),
        "notes" => return BotCommand::ShowAllNotes,
        "removenote" => return BotCommand::RemoveNote(-1),
        "removenotes" => return BotCommand::RemoveAllNotes,
        _ => {}
    }

    if let Some(text) = command.strip_prefix("echo ") {
        return BotCommand::Echo(Some(text.to_owned()));
    }
    if let Some(text) = command.strip_prefix("note ") {
        let text = text.trim();
        return if text.is_empty() {
            BotCommand::ShowNote(-1)
        } else {
            BotCommand::AddNote(text.to_owned())
        };
    }
    if let Some(index) = command.strip_prefix("removenote") {
        return note_index(index).map_or_else(BotCommand::InvalidNoteIndex, BotCommand::RemoveNote);
    }
    if let Some(index) = command.strip_prefix("note") {
        return note_index(index).map_or_else(BotCommand::InvalidNoteIndex, BotCommand::ShowNote);
    }

    BotCommand::Registered(command.to_owned())
}

fn note_index(raw: &str) -> Result<i64, String> {
    raw.trim().parse::<i64>().map_err(|_| raw.to_owned())
}
