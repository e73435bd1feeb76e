use anyhow::{bail, Context, Result};
use crac_fuzzy::{FuzzyEngine, Inputs, DEFAULT_TOP_RULES};
use std::env;
use tracing::debug;

const USAGE: &str =
    "Usage: erro delta_erro temp_externa carga_termica [--trace] [--top N] [--log-level LEVEL]";

struct Options {
    inputs: Inputs,
    trace: bool,
    top: usize,
    log_level: tracing::Level,
}

fn parse_number(name: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .with_context(|| format!("{} is not a number: {}", name, value))
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut numbers = Vec::new();
    let mut trace = false;
    let mut top = DEFAULT_TOP_RULES;
    let mut log_level = tracing::Level::WARN;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--trace" => trace = true,
            "--top" => {
                let Some(value) = iter.next() else { bail!("--top needs a value") };
                top = value.parse().with_context(|| format!("bad --top: {}", value))?;
            }
            "--log-level" => {
                let Some(value) = iter.next() else { bail!("--log-level needs a value") };
                log_level = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("unknown log level '{}'", value))?;
            }
            _ => numbers.push(arg.as_str()),
        }
    }

    if numbers.len() != 4 {
        bail!(USAGE);
    }
    Ok(Options {
        inputs: Inputs::new(
            parse_number("erro", numbers[0])?,
            parse_number("delta_erro", numbers[1])?,
            parse_number("temp_externa", numbers[2])?,
            parse_number("carga_termica", numbers[3])?,
        ),
        trace,
        top,
        log_level,
    })
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(&args)?;
    tracing_subscriber::fmt()
        .with_max_level(options.log_level)
        .with_writer(std::io::stderr)
        .init();

    let engine = FuzzyEngine::new().context("failed to build the fuzzy engine")?;
    let (power, trace) = engine.evaluate(options.inputs);
    debug!("{} rules fired", trace.fired.len());

    let output = if options.trace {
        serde_json::json!({
            "potencia_crac": power,
            "inference_details": trace.report(options.top)
        })
    } else {
        serde_json::json!({ "potencia_crac": power })
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
