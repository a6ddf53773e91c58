//! Command-line argument parsing.
//!
//! Usage:
//!   rill [-e<source>] [-s<seed>] [-q] [<script>]
//!
//! With a script path the file is executed in batch mode; without one (and
//! without `-e`) the binary starts an interactive session.

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Source to execute directly (`-e<source>`).
    pub eval: Option<String>,
    /// Seed for the random library (`-s<seed>`).
    pub seed: Option<u64>,
    /// Suppress the interactive banner (`-q`).
    pub quiet: bool,
    /// Script file to run in batch mode.
    pub script: Option<PathBuf>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'q' => args.quiet = true,

                // -e<source>
                'e' => {
                    let source = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-e requires a source argument".to_owned());
                    };
                    args.eval = Some(source);
                }

                // -s<seed>
                's' => {
                    let seed = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-s requires a seed argument".to_owned());
                    };
                    args.seed = Some(
                        seed.parse()
                            .map_err(|_| format!("invalid seed: {seed}"))?,
                    );
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    match positional.len() {
        0 => {}
        1 => args.script = Some(PathBuf::from(positional.remove(0))),
        n => return Err(format!("too many arguments ({n})")),
    }

    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(a.eval.is_none());
        assert!(a.script.is_none());
        assert!(!a.quiet);
    }

    #[test]
    fn script_positional() {
        let a = parse_argv(&argv(&["demo.rill"])).unwrap();
        assert_eq!(a.script, Some(PathBuf::from("demo.rill")));
    }

    #[test]
    fn eval_embedded() {
        let a = parse_argv(&argv(&["-ex = 1"])).unwrap();
        assert_eq!(a.eval.as_deref(), Some("x = 1"));
    }

    #[test]
    fn eval_separate() {
        let a = parse_argv(&argv(&["-e", "x = 1"])).unwrap();
        assert_eq!(a.eval.as_deref(), Some("x = 1"));
    }

    #[test]
    fn seed_parses() {
        let a = parse_argv(&argv(&["-s42"])).unwrap();
        assert_eq!(a.seed, Some(42));
        assert!(parse_argv(&argv(&["-s", "pony"])).is_err());
    }

    #[test]
    fn combined_flags() {
        let a = parse_argv(&argv(&["-qe", "1 + 1"])).unwrap();
        assert!(a.quiet);
        assert_eq!(a.eval.as_deref(), Some("1 + 1"));
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-weird-name"])).unwrap();
        assert_eq!(a.script, Some(PathBuf::from("-weird-name")));
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
