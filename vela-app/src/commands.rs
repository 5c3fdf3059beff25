//! Line commands read from stdin

use anyhow::{anyhow, bail};
use vela_audio::{ChainState, EffectSlot, FxCommand, ReverbPreset};

/// A parsed user command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `<unit> on|off`
    Toggle(EffectSlot, bool),
    /// `delay pingpong on|off`
    PingPong(bool),
    /// `reverb <preset>`
    Preset(ReverbPreset),
    /// `mix <unit> <value>`
    Mix(EffectSlot, f32),
    Save,
    Quit,
    Help,
}

pub const HELP: &str = "\
commands:
  <eq|filter|compressor|delay|reverb> on|off
  delay pingpong on|off
  reverb <small-room|medium-room|large-hall|plate|cathedral>
  mix <delay|reverb> <0.0-1.0>
  save
  quit";

fn parse_switch(word: &str) -> anyhow::Result<bool> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => bail!("expected on|off, got '{}'", word),
    }
}

/// Parse one input line
pub fn parse(line: &str) -> anyhow::Result<Command> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["quit"] | ["exit"] => Ok(Command::Quit),
        ["save"] => Ok(Command::Save),
        ["help"] | ["?"] => Ok(Command::Help),
        ["delay", "pingpong", switch] => Ok(Command::PingPong(parse_switch(switch)?)),
        ["mix", unit, value] => {
            let slot: EffectSlot = unit.parse()?;
            let mix: f32 = value
                .parse()
                .map_err(|_| anyhow!("expected a number, got '{}'", value))?;
            Ok(Command::Mix(slot, mix))
        }
        ["reverb", arg] if *arg != "on" && *arg != "off" => Ok(Command::Preset(arg.parse()?)),
        [unit, switch] => Ok(Command::Toggle(unit.parse()?, parse_switch(switch)?)),
        _ => bail!("unrecognized command '{}' (try 'help')", line.trim()),
    }
}

/// Update the control-plane copy of the chain state and build the engine command
pub fn apply(command: &Command, state: &mut ChainState) -> anyhow::Result<Option<FxCommand>> {
    let fx = match *command {
        Command::Toggle(slot, on) => match slot {
            EffectSlot::Eq => {
                state.eq.enabled = on;
                FxCommand::UpdateEq(state.eq)
            }
            EffectSlot::Filter => {
                state.filter.enabled = on;
                FxCommand::UpdateFilter(state.filter)
            }
            EffectSlot::Compressor => {
                state.compressor.enabled = on;
                FxCommand::UpdateCompressor(state.compressor)
            }
            EffectSlot::Delay => {
                state.delay.enabled = on;
                FxCommand::UpdateDelay(state.delay)
            }
            EffectSlot::Reverb => {
                state.reverb.enabled = on;
                FxCommand::UpdateReverb(state.reverb)
            }
        },
        Command::PingPong(on) => {
            state.delay.ping_pong = on;
            FxCommand::UpdateDelay(state.delay)
        }
        Command::Preset(preset) => {
            state.reverb.preset = preset;
            FxCommand::UpdateReverb(state.reverb)
        }
        Command::Mix(EffectSlot::Delay, mix) => {
            state.delay.mix = mix.clamp(0.0, 1.0);
            FxCommand::UpdateDelay(state.delay)
        }
        Command::Mix(EffectSlot::Reverb, mix) => {
            state.reverb.mix = mix.clamp(0.0, 1.0);
            FxCommand::UpdateReverb(state.reverb)
        }
        Command::Mix(slot, _) => bail!("{} has no adjustable mix", slot),
        Command::Save | Command::Quit | Command::Help => return Ok(None),
    };
    Ok(Some(fx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toggles() {
        assert_eq!(parse("eq on").unwrap(), Command::Toggle(EffectSlot::Eq, true));
        assert_eq!(
            parse("  reverb   off ").unwrap(),
            Command::Toggle(EffectSlot::Reverb, false)
        );
        assert!(parse("eq maybe").is_err());
    }

    #[test]
    fn test_parse_delay_and_reverb() {
        assert_eq!(parse("delay pingpong on").unwrap(), Command::PingPong(true));
        assert_eq!(
            parse("reverb cathedral").unwrap(),
            Command::Preset(ReverbPreset::Cathedral)
        );
        assert!(parse("reverb stadium").is_err());
    }

    #[test]
    fn test_parse_mix() {
        assert_eq!(parse("mix delay 0.25").unwrap(), Command::Mix(EffectSlot::Delay, 0.25));
        assert!(parse("mix delay loud").is_err());
    }

    #[test]
    fn test_apply_updates_state() {
        let mut state = ChainState::default();
        let cmd = apply(&Command::PingPong(true), &mut state).unwrap();
        assert!(state.delay.ping_pong);
        assert!(matches!(cmd, Some(FxCommand::UpdateDelay(d)) if d.ping_pong));

        assert!(apply(&Command::Mix(EffectSlot::Eq, 0.5), &mut state).is_err());
        assert!(apply(&Command::Save, &mut state).unwrap().is_none());
    }
}
