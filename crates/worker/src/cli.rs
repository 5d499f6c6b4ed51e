//! Command-line arguments.

pub const USAGE: &str = "usage:
  kontext-worker generate <prompt>
  kontext-worker edit <image-url> <instruction> [<instruction>...]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text-to-image from a single prompt.
    Generate { prompt: String },
    /// Apply each instruction in turn, each to the previous result.
    Edit {
        image: String,
        instructions: Vec<String>,
    },
}

/// Parse the arguments following the program name.
pub fn parse<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next().unwrap_or_default();
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "generate" if !rest.is_empty() => Ok(Command::Generate {
            prompt: rest.join(" "),
        }),
        "edit" if rest.len() >= 2 => {
            let mut rest = rest.into_iter();
            let image = rest.next().unwrap_or_default();
            Ok(Command::Edit {
                image,
                instructions: rest.collect(),
            })
        }
        _ => anyhow::bail!("{USAGE}"),
    }
}
