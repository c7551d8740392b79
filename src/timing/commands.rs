use anyhow::{anyhow, bail, Context, Result};
use std::{str::FromStr, time::Duration};

use crate::models::SegmentId;

use super::TimingEditor;

/// Editor input, one line at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorCommand {
    TogglePlayback,
    ToggleArmed,
    Click(SegmentId),
    DoubleClick(SegmentId),
    Clear(SegmentId),
    Seek(Duration),
    Stop,
    Export,
    Autoscroll(Option<bool>),
    Status,
    List,
    NextCollection,
    PreviousCollection,
    Help,
    Quit,
}

fn segment_arg<'a>(verb: &str, words: &mut impl Iterator<Item = &'a str>) -> Result<SegmentId> {
    let raw = words
        .next()
        .ok_or_else(|| anyhow!("'{verb}' needs a verse number"))?;
    let id: u32 = raw
        .parse()
        .with_context(|| format!("'{raw}' is not a verse number"))?;
    Ok(SegmentId(id))
}

impl FromStr for EditorCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;

        let command = match verb {
            "t" | "toggle" | "play" | "pause" => EditorCommand::TogglePlayback,
            "r" | "rec" | "arm" => EditorCommand::ToggleArmed,
            "c" | "click" => EditorCommand::Click(segment_arg(verb, &mut words)?),
            "d" | "double" => EditorCommand::DoubleClick(segment_arg(verb, &mut words)?),
            "x" | "clear" => EditorCommand::Clear(segment_arg(verb, &mut words)?),
            "seek" => {
                let raw = words
                    .next()
                    .ok_or_else(|| anyhow!("seek needs a position in seconds"))?;
                let secs: f64 = raw
                    .parse()
                    .with_context(|| format!("'{raw}' is not a number of seconds"))?;
                let position = Duration::try_from_secs_f64(secs)
                    .map_err(|_| anyhow!("cannot seek to {raw}"))?;
                EditorCommand::Seek(position)
            }
            "s" | "stop" => EditorCommand::Stop,
            "e" | "export" => EditorCommand::Export,
            "autoscroll" => match words.next() {
                None => EditorCommand::Autoscroll(None),
                Some("on") => EditorCommand::Autoscroll(Some(true)),
                Some("off") => EditorCommand::Autoscroll(Some(false)),
                Some(other) => bail!("autoscroll takes 'on' or 'off', not '{other}'"),
            },
            "st" | "status" => EditorCommand::Status,
            "l" | "ls" | "list" => EditorCommand::List,
            "next" => EditorCommand::NextCollection,
            "prev" => EditorCommand::PreviousCollection,
            "h" | "?" | "help" => EditorCommand::Help,
            "q" | "quit" | "exit" => EditorCommand::Quit,
            other => bail!("unknown command '{other}'"),
        };

        if words.next().is_some() {
            bail!("too many arguments for '{verb}'");
        }
        Ok(command)
    }
}

impl EditorCommand {
    pub const HELP: &'static str = "\
t             play / pause the recording
r             arm / disarm recording
c <n>         click verse n (start, then end)
d <n>         stamp verse n with the default span
x <n>         clear verse n
seek <secs>   jump to a position
s             stop and rewind
e             export timings
autoscroll [on|off]
st            status
l             list verses with their timings
next / prev   switch collection (unexported timings are dropped)
q             quit";
}

/// Apply a command to the editor. Returns a line worth echoing, if any.
pub async fn execute(editor: &mut TimingEditor, command: EditorCommand) -> Result<Option<String>> {
    let message = match command {
        EditorCommand::TogglePlayback => {
            if editor.toggle_playback().await? {
                "playing".to_string()
            } else {
                "paused".to_string()
            }
        }
        EditorCommand::ToggleArmed => {
            if editor.toggle_armed() {
                "recording armed".to_string()
            } else {
                "recording disarmed".to_string()
            }
        }
        EditorCommand::Click(id) => {
            editor.click(id)?;
            return Ok(None);
        }
        EditorCommand::DoubleClick(id) => {
            editor.double_click(id)?;
            return Ok(None);
        }
        EditorCommand::Clear(id) => {
            editor.clear(id)?;
            format!("verse {id} cleared")
        }
        EditorCommand::Seek(position) => {
            editor.seek(position);
            return Ok(None);
        }
        EditorCommand::Stop => {
            editor.stop();
            "stopped".to_string()
        }
        EditorCommand::Export => {
            let path = editor.export()?;
            format!("timings written to {}", path.display())
        }
        EditorCommand::Autoscroll(setting) => {
            let enabled = setting.unwrap_or(!editor.autoscroll());
            editor.set_autoscroll(enabled);
            format!("autoscroll {}", if enabled { "on" } else { "off" })
        }
        EditorCommand::Status
        | EditorCommand::List
        | EditorCommand::NextCollection
        | EditorCommand::PreviousCollection
        | EditorCommand::Help
        | EditorCommand::Quit => return Ok(None),
    };
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verse_commands() {
        assert_eq!(
            "c 4".parse::<EditorCommand>().unwrap(),
            EditorCommand::Click(SegmentId(4))
        );
        assert_eq!(
            "double 2".parse::<EditorCommand>().unwrap(),
            EditorCommand::DoubleClick(SegmentId(2))
        );
        assert_eq!(
            "x 7".parse::<EditorCommand>().unwrap(),
            EditorCommand::Clear(SegmentId(7))
        );
    }

    #[test]
    fn parses_seek_and_autoscroll() {
        assert_eq!(
            "seek 12.5".parse::<EditorCommand>().unwrap(),
            EditorCommand::Seek(Duration::from_millis(12_500))
        );
        assert_eq!(
            "autoscroll".parse::<EditorCommand>().unwrap(),
            EditorCommand::Autoscroll(None)
        );
        assert_eq!(
            "autoscroll off".parse::<EditorCommand>().unwrap(),
            EditorCommand::Autoscroll(Some(false))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("c".parse::<EditorCommand>().is_err());
        assert!("seek -3".parse::<EditorCommand>().is_err());
        assert!("seek soon".parse::<EditorCommand>().is_err());
        assert!("autoscroll maybe".parse::<EditorCommand>().is_err());
        assert!("e now".parse::<EditorCommand>().is_err());
    }
}
