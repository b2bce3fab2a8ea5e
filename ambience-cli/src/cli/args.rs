//! CLI argument definitions for `ambience-cli`.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

fn catalog_arg() -> Arg {
    Arg::new("catalog")
        .long("catalog")
        .short('c')
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("JSON catalog to use instead of the built-in tracks")
}

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("Ambience")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Mix looping ambient sounds from the command line")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List the tracks in the catalog")
                .arg(catalog_arg()),
        )
        .subcommand(
            Command::new("play")
                .about("Play one or more tracks together")
                .arg(catalog_arg())
                .arg(
                    Arg::new("root")
                        .long("root")
                        .short('r')
                        .value_name("DIR")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(".")
                        .help("Directory the track files are resolved against"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON mixer settings; flags below override its values"),
                )
                .arg(
                    Arg::new("volume")
                        .long("volume")
                        .short('v')
                        .value_name("VOLUME")
                        .value_parser(value_parser!(f32))
                        .help("Shared volume for every track (0.0-1.0)"),
                )
                .arg(
                    Arg::new("fade-in")
                        .long("fade-in")
                        .value_name("SECONDS")
                        .value_parser(value_parser!(f32))
                        .help("Fade-in duration when a track starts"),
                )
                .arg(
                    Arg::new("fade-out")
                        .long("fade-out")
                        .value_name("SECONDS")
                        .value_parser(value_parser!(f32))
                        .help("Fade-out duration when a track stops"),
                )
                .arg(
                    Arg::new("no-loop")
                        .long("no-loop")
                        .action(ArgAction::SetTrue)
                        .help("Play each track once instead of looping"),
                )
                .arg(
                    Arg::new("sleep")
                        .long("sleep")
                        .short('s')
                        .value_name("MINUTES")
                        .value_parser(value_parser!(u32))
                        .help("Stop everything after the given number of minutes"),
                )
                .arg(
                    Arg::new("duration")
                        .long("duration")
                        .short('d')
                        .value_name("SECONDS")
                        .value_parser(value_parser!(f32))
                        .help("Fade everything out after the given number of seconds"),
                )
                .arg(
                    Arg::new("silent")
                        .long("silent")
                        .action(ArgAction::SetTrue)
                        .help("Run the mixer without opening an audio device"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Do not print status lines"),
                )
                .arg(
                    Arg::new("TRACK")
                        .help("Track ids to play")
                        .required(true)
                        .num_args(1..),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn play_collects_tracks_and_typed_flags() {
        let matches = build_cli()
            .try_get_matches_from([
                "ambience", "play", "--volume", "0.3", "--no-loop", "--sleep", "20", "rain",
                "waves",
            ])
            .unwrap();
        let (name, play) = matches.subcommand().unwrap();
        assert_eq!(name, "play");

        let tracks: Vec<&String> = play.get_many::<String>("TRACK").unwrap().collect();
        assert_eq!(tracks, ["rain", "waves"]);
        assert_eq!(play.get_one::<f32>("volume"), Some(&0.3));
        assert_eq!(play.get_one::<u32>("sleep"), Some(&20));
        assert!(play.get_flag("no-loop"));
        assert!(!play.get_flag("silent"));
        assert_eq!(
            play.get_one::<PathBuf>("root"),
            Some(&PathBuf::from("."))
        );
    }

    #[test]
    fn play_requires_a_track() {
        assert!(build_cli()
            .try_get_matches_from(["ambience", "play", "--silent"])
            .is_err());
    }
}
