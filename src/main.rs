use std::path::PathBuf;

use reels_agent::RunOptions;

const HELP: &str = "Reels Agent - Upload media and answer comments from the terminal.

Usage: reels-agent [OPTIONS]

  --base-url URL       Backend to talk to (default http://127.0.0.1:5000)
  --config PATH        Read configuration from PATH
  --demo               Use built-in sample data instead of a backend
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

fn main() {
    let opts = match handle_cli_flags(std::env::args().skip(1)) {
        Ok(Some(opts)) => opts,
        Ok(None) => return,
        Err(msg) => {
            eprintln!("error: {msg}\n\nRun `reels-agent --help` for usage.");
            std::process::exit(2);
        }
    };

    if let Err(err) = reels_agent::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// `Ok(None)` means an informational flag was handled and the app should not
/// start.
fn handle_cli_flags(mut args: impl Iterator<Item = String>) -> Result<Option<RunOptions>, String> {
    let mut opts = RunOptions::default();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg.clone(), None),
        };
        match flag.as_str() {
            "--version" | "-V" => {
                println!("Reels Agent {}", reels_agent::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(None);
            }
            "--demo" => opts.demo = true,
            "--base-url" => {
                let value = inline
                    .or_else(|| args.next())
                    .ok_or("--base-url needs a value")?;
                opts.base_url = Some(value);
            }
            "--config" => {
                let value = inline
                    .or_else(|| args.next())
                    .ok_or("--config needs a value")?;
                opts.config_file = Some(PathBuf::from(value));
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(Some(opts))
}
