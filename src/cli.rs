// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use clap::Parser;

/// Command line surface: `--help` / `--version` only; no arguments means
/// interactive mode.
#[derive(Debug, Parser)]
#[command(name = "coda", version, about = "An interactive terminal AI coding agent")]
pub struct Cli {}

/// Parse argv, honoring the exit-code contract: help and version print and
/// exit 0, any unrecognized argument reports an error and exits 1.
pub fn parse_or_exit() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => std::process::exit(0),
                _ => std::process::exit(1),
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn no_arguments_parses_to_interactive_mode() {
        assert!(Cli::try_parse_from(["coda"]).is_ok());
    }

    #[test]
    fn version_flag_is_recognized() {
        let err = Cli::try_parse_from(["coda", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn help_flags_are_recognized() {
        for flag in ["--help", "-h"] {
            let err = Cli::try_parse_from(["coda", flag]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp, "{flag}");
        }
    }

    #[test]
    fn positional_arguments_are_rejected() {
        let err = Cli::try_parse_from(["coda", "unexpected"]).unwrap_err();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);
        assert_ne!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = Cli::try_parse_from(["coda", "--bogus"]).unwrap_err();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);
    }
}
