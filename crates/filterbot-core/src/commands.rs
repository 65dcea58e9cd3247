//! Slash-command parsing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Filter,
    Skip,
    Stop,
    Filters,
    /// Argument is the raw remainder of the message, if any.
    DeleteFilter(Option<String>),
    Unknown(String),
}

impl Command {
    /// Parse `text` as a command. `None` when it does not start with '/'.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let (word, rest) = match body.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (body, ""),
        };
        // "/filter@my_bot" addresses a specific bot in groups
        let word = word.split('@').next().unwrap_or(word).to_lowercase();
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        let command = match word.as_str() {
            "start" | "help" => Command::Start,
            "filter" => Command::Filter,
            "skip" => Command::Skip,
            "stop" | "cancel" => Command::Stop,
            "filters" => Command::Filters,
            "deletefilter" => Command::DeleteFilter(argument),
            _ => Command::Unknown(word),
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_basic_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/help"), Some(Command::Start));
        assert_eq!(Command::parse("/filter"), Some(Command::Filter));
        assert_eq!(Command::parse(" /SKIP "), Some(Command::Skip));
        assert_eq!(Command::parse("/stop"), Some(Command::Stop));
        assert_eq!(Command::parse("/cancel"), Some(Command::Stop));
        assert_eq!(Command::parse("/filters"), Some(Command::Filters));
    }

    #[test]
    fn test_bot_suffix_is_ignored() {
        assert_eq!(Command::parse("/filter@filter_bot"), Some(Command::Filter));
    }

    #[test]
    fn test_deletefilter_argument() {
        assert_eq!(
            Command::parse("/deletefilter Good Morning "),
            Some(Command::DeleteFilter(Some("Good Morning".into())))
        );
        assert_eq!(Command::parse("/deletefilter"), Some(Command::DeleteFilter(None)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(Command::parse("/ban"), Some(Command::Unknown("ban".into())));
    }
}
