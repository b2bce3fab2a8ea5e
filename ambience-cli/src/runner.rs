use std::{
    path::PathBuf,
    sync::Arc,
    thread::sleep,
    time::{Duration, Instant},
};

use ambience_lib::{
    config::clamp_seconds, playback::SilentOutput, reporter::StateReporter, Catalog,
    MixerFacade, MixerSettings, Result,
};
use clap::ArgMatches;
use log::info;

use crate::status;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const REPORT_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: &ArgMatches) -> Result<i32> {
    match args.subcommand() {
        Some(("list", sub)) => list(sub),
        Some(("play", sub)) => play(sub),
        _ => Ok(2),
    }
}

fn load_catalog(args: &ArgMatches) -> Result<Catalog> {
    match args.get_one::<PathBuf>("catalog") {
        Some(path) => Catalog::from_json_file(path),
        None => Ok(Catalog::builtin()),
    }
}

fn load_settings(args: &ArgMatches) -> Result<MixerSettings> {
    let mut settings = match args.get_one::<PathBuf>("settings") {
        Some(path) => MixerSettings::from_json_file(path)?,
        None => MixerSettings::default(),
    };

    if let Some(volume) = args.get_one::<f32>("volume") {
        settings.volume = *volume;
    }
    if let Some(seconds) = args.get_one::<f32>("fade-in") {
        settings.fade_in_seconds = *seconds;
    }
    if let Some(seconds) = args.get_one::<f32>("fade-out") {
        settings.fade_out_seconds = *seconds;
    }
    if args.get_flag("no-loop") {
        settings.loop_enabled = false;
    }
    if let Some(minutes) = args.get_one::<u32>("sleep") {
        settings.sleep_timer_minutes = *minutes;
    }

    Ok(settings.normalized())
}

fn list(args: &ArgMatches) -> Result<i32> {
    let catalog = load_catalog(args)?;
    for track in catalog.tracks() {
        println!("{}\t{}\t{}", track.id, track.display_name, track.category);
    }
    Ok(0)
}

fn play(args: &ArgMatches) -> Result<i32> {
    let catalog = load_catalog(args)?;
    let settings = load_settings(args)?;
    let tracks: Vec<&String> = args.get_many::<String>("TRACK").unwrap().collect();
    let quiet = args.get_flag("quiet");

    let facade = if args.get_flag("silent") {
        let output = SilentOutput::new();
        MixerFacade::new(
            catalog,
            settings,
            Arc::new(output.clone()),
            Arc::new(output),
        )
    } else {
        let root = args.get_one::<PathBuf>("root").unwrap().clone();
        MixerFacade::with_rodio(catalog, settings, root)
    };
    facade.retry_output()?;

    for id in tracks {
        facade.start_track(id)?;
    }

    let reporter = StateReporter::new(
        facade.observer(),
        move |state| {
            if !quiet {
                println!("{}", status::status_line(&state));
            }
        },
        REPORT_INTERVAL,
    );
    reporter.start();

    let mut deadline = args
        .get_one::<f32>("duration")
        .and_then(|seconds| Duration::try_from_secs_f32(clamp_seconds(*seconds)).ok())
        .and_then(|duration| Instant::now().checked_add(duration));

    // Runs until the sleep timer or the duration stops every track.
    while facade.is_any_playing() {
        if deadline.is_some_and(|at| Instant::now() >= at) {
            info!("duration elapsed, stopping all tracks");
            deadline = None;
            facade.stop_all_now().wait();
            continue;
        }
        sleep(POLL_INTERVAL);
    }

    reporter.stop();
    facade.shutdown();
    Ok(0)
}
