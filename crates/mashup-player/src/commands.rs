//! Console command parsing
//!
//! One command per line. Track numbers are 1-based as shown on screen.

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Toggle,
    Stop,
    Select { channel: String, track: usize },
    Master(f32),
    Volume { channel: String, level: f32 },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start                    start all channels on the beat
  p | play | pause         pause / resume
  stop                     stop playback
  s <channel> <n>          switch <channel> to track <n> at the next bar
  master <0..1>            master volume
  vol <channel> <0..1>     channel volume
  status                   show channels
  help                     this text
  q | quit                 exit";

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("start", []) => Command::Start,
        ("p" | "play" | "pause" | "toggle", []) => Command::Toggle,
        ("stop", []) => Command::Stop,
        ("s" | "select", [channel, track]) => Command::Select {
            channel: channel.to_string(),
            track: parse_track(track)?,
        },
        ("master", [level]) => Command::Master(parse_level(level)?),
        ("vol" | "volume", [channel, level]) => Command::Volume {
            channel: channel.to_string(),
            level: parse_level(level)?,
        },
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("q" | "quit" | "exit", []) => Command::Quit,
        (
            "start" | "p" | "play" | "pause" | "toggle" | "stop" | "s" | "select" | "master"
            | "vol" | "volume" | "status" | "help" | "?" | "q" | "quit" | "exit",
            _,
        ) => bail!("wrong arguments for '{}' (type 'help')", verb),
        _ => bail!("unknown command '{}' (type 'help')", verb),
    };
    Ok(Some(command))
}

/// 1-based track number to index
fn parse_track(word: &str) -> Result<usize> {
    let number: usize = word
        .parse()
        .with_context(|| format!("'{}' is not a track number", word))?;
    number
        .checked_sub(1)
        .ok_or_else(|| anyhow!("track numbers start at 1"))
}

fn parse_level(word: &str) -> Result<f32> {
    let level: f32 = word
        .parse()
        .with_context(|| format!("'{}' is not a level", word))?;
    if !(0.0..=1.0).contains(&level) {
        bail!("level must be between 0 and 1");
    }
    Ok(level)
}
