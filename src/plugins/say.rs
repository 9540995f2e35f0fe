//! Say plugin: /say echoes text back, with options.
//!
//! The handler is synchronous and runs on the blocking pool.

use herald::{CommandSpec, Handler, Invocation, OptionSpec, ParamSpec, ParamType, Plugin, PluginError, PluginRegistrar, Value};

/// Upper bound for `--times`, keeps one command from flooding a chat.
const MAX_REPEAT: i64 = 5;

pub struct SayPlugin;

impl Plugin for SayPlugin {
    fn name(&self) -> &str {
        "say"
    }

    fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError> {
        registrar.command(
            CommandSpec::new("say", Handler::from_fn(say))
                .alias("echo")
                .param(ParamSpec::required("text", ParamType::Rest))
                .option(OptionSpec::value("times", ParamType::Int).short('n').default(1i64))
                .option(OptionSpec::flag("shout").short('s'))
                .describe("Repeat text back"),
        )?;
        Ok(())
    }
}

fn say(inv: Invocation) -> anyhow::Result<()> {
    let text = render(&inv)?;
    let times = inv.named("times").and_then(Value::as_int).unwrap_or(1);
    if !(1..=MAX_REPEAT).contains(&times) {
        anyhow::bail!("--times must be between 1 and {MAX_REPEAT}");
    }

    for _ in 0..times {
        inv.reply_blocking(text.clone())?;
    }
    Ok(())
}

fn render(inv: &Invocation) -> anyhow::Result<String> {
    let text = inv
        .arg(0)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("nothing to say"))?;

    Ok(if inv.flag("shout") {
        text.to_uppercase()
    } else {
        text.to_string()
    })
}
