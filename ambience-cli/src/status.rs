//! One-line mixer status for the console.

use ambience_lib::MixerState;

/// The sleep field is the length the timer was armed with, not the time left.
pub fn status_line(state: &MixerState) -> String {
    let playing = if state.is_any_playing() {
        let ids: Vec<&str> = state.active_track_ids.iter().map(String::as_str).collect();
        format!("▶ {}", ids.join(", "))
    } else {
        "■ idle".to_string()
    };
    let looping = if state.loop_enabled { "on" } else { "off" };
    let sleep = if state.sleep_timer_minutes > 0 {
        format_time(u64::from(state.sleep_timer_minutes) * 60)
    } else {
        "off".to_string()
    };

    format!(
        "{}   vol: {:.2} | loop: {} | fade: {:.1}s/{:.1}s | sleep: {}",
        playing,
        state.shared_volume,
        looping,
        state.fade_in_seconds,
        state.fade_out_seconds,
        sleep
    )
}

fn format_time(seconds: u64) -> String {
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
